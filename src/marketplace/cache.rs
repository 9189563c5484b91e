//! Process-wide source caches.
//!
//! Both marketplace sources cache independently: the local CLI list in a
//! single slot, registry pages in a map keyed by their exact query
//! parameters. The caches outlive any one mounted view (remounting the
//! marketplace reuses whatever is still within TTL) and are only cleared
//! proactively by a user-initiated refresh.
//!
//! The service is owned explicitly and injected into the adapters rather
//! than living in a module-level global, so tests can supply an isolated
//! instance per case.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use super::record::{RegistryPage, ServerRecord};

/// Both sources share the same 60-minute time-to-live.
pub const SOURCE_TTL_MINUTES: i64 = 60;

fn ttl() -> Duration {
    Duration::minutes(SOURCE_TTL_MINUTES)
}

/// A cached value and the instant it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub fetched_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn new(data: T, fetched_at: DateTime<Utc>) -> Self {
        Self { data, fetched_at }
    }

    /// Valid while `now - fetched_at < TTL`.
    pub fn is_fresh(&self) -> bool {
        Utc::now() - self.fetched_at < ttl()
    }
}

/// The two source caches, shared by every marketplace instance in the process.
#[derive(Default)]
pub struct SourceCaches {
    local: RwLock<Option<CacheEntry<Vec<ServerRecord>>>>,
    registry: RwLock<HashMap<String, CacheEntry<RegistryPage>>>,
}

impl SourceCaches {
    /// Canonical cache key for one registry query. Distinct cursors (and
    /// distinct search texts) always produce distinct keys: the cursor is an
    /// opaque server-issued token, so both variable parts are length-prefixed
    /// to keep a token containing the separator from colliding with another
    /// tuple.
    pub fn registry_key(limit: u32, cursor: Option<&str>, search: Option<&str>) -> String {
        let cursor = cursor.unwrap_or("");
        let search = search.unwrap_or("");
        format!(
            "limit={}|cursor[{}]={}|search[{}]={}",
            limit,
            cursor.len(),
            cursor,
            search.len(),
            search
        )
    }

    /// Snapshot of the local slot if it is still fresh.
    pub async fn local_get(&self) -> Option<Vec<ServerRecord>> {
        let slot = self.local.read().await;
        slot.as_ref()
            .filter(|entry| entry.is_fresh())
            .map(|entry| entry.data.clone())
    }

    /// Overwrite the local slot with freshly fetched data.
    pub async fn local_put(&self, data: Vec<ServerRecord>) {
        self.local_put_at(data, Utc::now()).await;
    }

    pub(crate) async fn local_put_at(&self, data: Vec<ServerRecord>, fetched_at: DateTime<Utc>) {
        *self.local.write().await = Some(CacheEntry::new(data, fetched_at));
    }

    /// When the local slot was last filled, fresh or not.
    pub async fn local_timestamp(&self) -> Option<DateTime<Utc>> {
        self.local.read().await.as_ref().map(|entry| entry.fetched_at)
    }

    /// Snapshot of a cached registry page if it is still fresh.
    pub async fn registry_get(&self, key: &str) -> Option<RegistryPage> {
        let pages = self.registry.read().await;
        pages
            .get(key)
            .filter(|entry| entry.is_fresh())
            .map(|entry| entry.data.clone())
    }

    /// Store one registry page under its query key.
    pub async fn registry_put(&self, key: &str, page: RegistryPage) {
        self.registry_put_at(key, page, Utc::now()).await;
    }

    pub(crate) async fn registry_put_at(
        &self,
        key: &str,
        page: RegistryPage,
        fetched_at: DateTime<Utc>,
    ) {
        self.registry
            .write()
            .await
            .insert(key.to_string(), CacheEntry::new(page, fetched_at));
    }

    /// Most recent fetch across all cached registry pages.
    /// Used purely for "last updated" display.
    pub async fn last_registry_fetch(&self) -> Option<DateTime<Utc>> {
        self.registry
            .read()
            .await
            .values()
            .map(|entry| entry.fetched_at)
            .max()
    }

    /// Drop every cached registry page across all keys.
    pub async fn clear_registry(&self) {
        self.registry.write().await.clear();
    }

    /// Drop the local slot.
    pub async fn clear_local(&self) {
        *self.local.write().await = None;
    }

    /// Drop every entry from both sources. Called by manual refresh.
    pub async fn clear_all(&self) {
        self.clear_local().await;
        self.clear_registry().await;
        tracing::debug!("Marketplace: source caches cleared");
    }

    #[cfg(test)]
    pub(crate) async fn registry_len(&self) -> usize {
        self.registry.read().await.len()
    }
}
