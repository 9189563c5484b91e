//! Marketplace aggregation engine.
//!
//! Merges two independently-cached, independently-paginated sources, the
//! local CLI's server list and the remote MCP Registry, into one
//! deduplicated collection. The engine owns the merged arrays and the
//! registry continuation cursor for the lifetime of one mounted view; the
//! source caches are process-wide and outlive it.
//!
//! Concurrency model: callback-driven, no parallel mutation of the merged
//! state. Re-entrant triggers (rapid scrolling, a refresh racing an
//! in-flight page fetch) are handled by two guards:
//! - an in-flight flag collapses concurrent `load_more` calls to one
//!   request (later triggers are dropped, not queued);
//! - a generation counter tags every load; results from a superseded
//!   generation are discarded instead of overwriting fresher state.

pub mod cache;
pub mod local;
pub mod record;
pub mod registry;
pub mod view;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

pub use cache::SourceCaches;
pub use local::{ClaudeCli, LocalAdapter, LocalListing};
pub use record::{LaunchSpec, RegistryPage, ServerRecord};
pub use registry::{HttpTransport, RegistryAdapter, RegistryTransport, REGISTRY_BASE_URL};
pub use view::{filter_servers, sort_servers, Paginator, MARKETPLACE_PAGE_SIZE};

/// Registry page size requested by the engine.
const REGISTRY_PAGE_LIMIT: u32 = 50;

#[derive(Default)]
struct EngineState {
    local_servers: Vec<ServerRecord>,
    registry_servers: Vec<ServerRecord>,
    /// Continuation token for the next registry page.
    cursor: Option<String>,
    has_more: bool,
    last_updated: Option<DateTime<Utc>>,
    search: String,
}

/// The aggregation engine. One instance per mounted marketplace view.
pub struct Marketplace {
    local: LocalAdapter,
    registry: RegistryAdapter,
    caches: Arc<SourceCaches>,
    state: RwLock<EngineState>,
    generation: AtomicU64,
    loading_more: AtomicBool,
}

impl Marketplace {
    pub fn new(local: LocalAdapter, registry: RegistryAdapter, caches: Arc<SourceCaches>) -> Self {
        Self {
            local,
            registry,
            caches,
            state: RwLock::new(EngineState::default()),
            generation: AtomicU64::new(0),
            loading_more: AtomicBool::new(false),
        }
    }

    /// Set the registry search text. Takes effect on the next `load_all`;
    /// the caller is expected to reset its paginator alongside.
    pub async fn set_search(&self, text: &str) {
        self.state.write().await.search = text.trim().to_string();
    }

    pub async fn search(&self) -> String {
        self.state.read().await.search.clone()
    }

    /// Initial or full (re)load.
    ///
    /// Local resolves first so the registry page can be deduplicated against
    /// its names; both adapters absorb their own failures, so this always
    /// terminates with whatever partial state the sources produced.
    pub async fn load_all(&self, skip_cache: bool) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let search = self.search().await;
        let search_opt = if search.is_empty() {
            None
        } else {
            Some(search.as_str())
        };

        let local_servers = self.local.fetch(skip_cache).await;
        let local_names: HashSet<String> =
            local_servers.iter().map(|s| s.dedup_key()).collect();

        let page = self
            .registry
            .fetch_page(REGISTRY_PAGE_LIMIT, None, search_opt, skip_cache)
            .await;
        let registry_servers: Vec<ServerRecord> = page
            .servers
            .into_iter()
            .filter(|s| !local_names.contains(&s.dedup_key()))
            .collect();

        let last_updated = match self.registry.last_fetch_time().await {
            Some(at) => Some(at),
            None => self.caches.local_timestamp().await,
        };

        let mut state = self.state.write().await;
        // Checked under the lock: a newer load may have finished while this
        // one was suspended, and its state must not be overwritten.
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Marketplace: discarding superseded load (gen {})", generation);
            return;
        }
        tracing::info!(
            "Marketplace: loaded {} local + {} registry servers (more: {})",
            local_servers.len(),
            registry_servers.len(),
            page.next_cursor.is_some()
        );
        state.local_servers = local_servers;
        state.registry_servers = registry_servers;
        state.has_more = page.next_cursor.is_some();
        state.cursor = page.next_cursor;
        state.last_updated = last_updated;
    }

    /// Fetch the next registry page and append its unseen entries.
    ///
    /// No-op when the registry is exhausted, no cursor is held, or a fetch
    /// is already in flight; concurrent triggers collapse to one request.
    /// Returns whether a fetch was performed.
    pub async fn load_more(&self) -> bool {
        if self.loading_more.swap(true, Ordering::SeqCst) {
            return false;
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let (cursor, search) = {
            let state = self.state.read().await;
            match (&state.cursor, state.has_more) {
                (Some(cursor), true) => (cursor.clone(), state.search.clone()),
                _ => {
                    self.loading_more.store(false, Ordering::SeqCst);
                    return false;
                }
            }
        };
        let search_opt = if search.is_empty() {
            None
        } else {
            Some(search.as_str())
        };

        // The cursor differentiates pages, so the per-key cache is honored.
        let page = self
            .registry
            .fetch_page(REGISTRY_PAGE_LIMIT, Some(&cursor), search_opt, false)
            .await;

        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Marketplace: discarding incremental page from stale generation");
        } else {
            let mut known: HashSet<String> = state
                .local_servers
                .iter()
                .chain(state.registry_servers.iter())
                .map(|s| s.dedup_key())
                .collect();
            let mut appended = 0usize;
            for server in page.servers {
                if known.insert(server.dedup_key()) {
                    state.registry_servers.push(server);
                    appended += 1;
                }
            }
            state.has_more = page.next_cursor.is_some();
            state.cursor = page.next_cursor;
            tracing::debug!(
                "Marketplace: appended {} registry servers (more: {})",
                appended,
                state.has_more
            );
        }

        self.loading_more.store(false, Ordering::SeqCst);
        true
    }

    /// Manual refresh: drop both source caches unconditionally, then reload
    /// everything fresh. The only path that proactively invalidates caches.
    pub async fn refresh(&self) {
        tracing::info!("Marketplace: manual refresh");
        self.caches.clear_all().await;
        self.load_all(true).await;
    }

    /// The merged collection: local entries first in their own order, then
    /// registry entries in fetch order. This is the base sequence fed to
    /// filtering; no extra sort pass happens here.
    pub async fn all_servers(&self) -> Vec<ServerRecord> {
        let state = self.state.read().await;
        state
            .local_servers
            .iter()
            .chain(state.registry_servers.iter())
            .cloned()
            .collect()
    }

    pub async fn has_more(&self) -> bool {
        self.state.read().await.has_more
    }

    pub fn is_loading_more(&self) -> bool {
        self.loading_more.load(Ordering::SeqCst)
    }

    pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.last_updated
    }

    /// Keep two pages of look-ahead materialized for the given view.
    ///
    /// One fetch may leave the buffer under the threshold, so this loops
    /// until the prefetch predicate is satisfied or the registry is
    /// exhausted. Call after any page change, search change, or completed
    /// load.
    pub async fn ensure_lookahead(&self, filter_query: &str, paginator: &Paginator) {
        loop {
            let visible = filter_servers(&self.all_servers().await, filter_query).len();
            let has_more = self.has_more().await;
            if !paginator.needs_prefetch(visible, has_more, self.is_loading_more()) {
                return;
            }
            if !self.load_more().await {
                return;
            }
        }
    }
}
