//! Core library of the MCP server manager.
//!
//! The interesting part lives in [`marketplace`]: merging the locally
//! installed CLI's server list with the remote MCP Registry into one
//! deduplicated, searchable, infinitely-scrollable collection. [`agents`]
//! is the thin CRUD layer that materializes a picked server into an
//! agent's config file. Rendering is the embedding application's job; this
//! crate only produces the data and the driving callbacks.

pub mod agents;
pub mod error;
pub mod marketplace;

use std::sync::Arc;

pub use error::{DeckError, Result};
pub use marketplace::Marketplace;

use marketplace::{
    ClaudeCli, HttpTransport, LocalAdapter, RegistryAdapter, SourceCaches, REGISTRY_BASE_URL,
};

/// Shared application state.
///
/// The source caches are process-wide: every marketplace view built from
/// the same `AppState` reuses them, so remounting a view within the TTL
/// costs no I/O.
pub struct AppState {
    caches: Arc<SourceCaches>,
    registry_base_url: String,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_registry(REGISTRY_BASE_URL)
    }

    /// Point the registry adapter somewhere else (tests, mirrors).
    pub fn with_registry(base_url: &str) -> Self {
        Self {
            caches: Arc::new(SourceCaches::default()),
            registry_base_url: base_url.to_string(),
        }
    }

    /// Build the aggregation engine for one mounted marketplace view.
    /// The engine owns its merged state; the caches outlive it.
    pub fn marketplace(&self) -> Result<Marketplace> {
        let transport = Arc::new(HttpTransport::new(&self.registry_base_url)?);
        Ok(Marketplace::new(
            LocalAdapter::new(Arc::new(ClaudeCli), self.caches.clone()),
            RegistryAdapter::new(transport, self.caches.clone()),
            self.caches.clone(),
        ))
    }

    pub fn caches(&self) -> Arc<SourceCaches> {
        self.caches.clone()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the global tracing subscriber. Call once at startup.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mcpdeck=info")),
        )
        .init();
}
