//! Registry source adapter: the official MCP Registry over HTTP.
//!
//! Fetches pages of servers from `registry.modelcontextprotocol.io` using
//! cursor-based pagination with optional text search, and normalizes each
//! upstream entry into a [`ServerRecord`]. Results are cached per exact
//! query tuple `(limit, cursor, search)` so re-requesting the identical page
//! within the TTL window is free.
//!
//! Fetch failures (network, non-2xx, malformed JSON) are absorbed here:
//! the adapter logs and returns an empty page, never an error; a registry
//! outage must not take the locally-sourced half of the marketplace with it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cache::SourceCaches;
use super::record::{
    github_avatar_url, github_owner, LaunchSpec, RegistryPage, ServerRecord, NO_DESCRIPTION,
    REGISTRY_PUBLISHER,
};

/// Base URL for the official MCP Registry API.
pub const REGISTRY_BASE_URL: &str = "https://registry.modelcontextprotocol.io";

/// API version path.
const REGISTRY_API_VERSION: &str = "v0.1";

/// Simple percent-encoding for URL query parameters.
fn url_encode(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len() * 2);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    encoded
}

// Wire format (server.json)

/// A server entry from the registry API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryServer {
    /// Unique reverse-domain name (e.g., "io.github.user/server-name").
    pub name: String,
    /// Server description.
    #[serde(default)]
    pub description: String,
    /// Installable packages (npm, pypi, oci, nuget, mcpb).
    #[serde(default)]
    pub packages: Vec<RegistryPackage>,
    /// Remote server endpoints (streamable-http, sse).
    #[serde(default)]
    pub remotes: Vec<RegistryRemote>,
    /// Source repository.
    pub repository: Option<RegistryRepository>,
}

/// A package in the registry (how to install/run the server).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryPackage {
    /// Package registry type: "npm", "pip"/"pypi", "oci", "nuget", "mcpb".
    #[serde(rename = "registryType")]
    pub registry_type: String,
    /// Package identifier (e.g., "@modelcontextprotocol/server-filesystem").
    pub identifier: String,
    /// Required environment variables.
    #[serde(rename = "environmentVariables", default)]
    pub environment_variables: Vec<RegistryEnvVar>,
}

/// Environment variable declaration from the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEnvVar {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Remote server endpoint from the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryRemote {
    /// Type: "streamable-http", "sse".
    #[serde(rename = "type")]
    pub remote_type: String,
    /// Server URL.
    pub url: String,
}

/// Repository metadata from the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryRepository {
    pub url: Option<String>,
}

/// API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryApiResponse {
    pub servers: Vec<RegistryServerWrapper>,
    pub metadata: RegistryMetadata,
}

/// Wrapper around a server entry in the API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryServerWrapper {
    pub server: RegistryServer,
}

/// Pagination metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryMetadata {
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<String>,
    pub count: Option<u64>,
}

// Transport seam

/// Raw page fetch against the registry. Isolated behind a trait so the
/// adapter's cache behavior can be tested with a call-counting stub.
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    async fn get_page(
        &self,
        limit: u32,
        cursor: Option<&str>,
        search: Option<&str>,
    ) -> anyhow::Result<RegistryApiResponse>;
}

/// Production transport: reqwest against the registry HTTP API.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> crate::error::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("mcpdeck/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RegistryTransport for HttpTransport {
    async fn get_page(
        &self,
        limit: u32,
        cursor: Option<&str>,
        search: Option<&str>,
    ) -> anyhow::Result<RegistryApiResponse> {
        let mut url = format!(
            "{}/{}/servers?limit={}&version=latest",
            self.base_url, REGISTRY_API_VERSION, limit
        );
        if let Some(c) = cursor {
            url.push_str(&format!("&cursor={}", url_encode(c)));
        }
        if let Some(s) = search.filter(|s| !s.is_empty()) {
            url.push_str(&format!("&search={}", url_encode(s)));
        }

        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("registry API returned HTTP {}", resp.status());
        }
        Ok(resp.json::<RegistryApiResponse>().await?)
    }
}

// Adapter

/// Read-through cached access to the remote registry.
pub struct RegistryAdapter {
    transport: Arc<dyn RegistryTransport>,
    caches: Arc<SourceCaches>,
}

impl RegistryAdapter {
    pub fn new(transport: Arc<dyn RegistryTransport>, caches: Arc<SourceCaches>) -> Self {
        Self { transport, caches }
    }

    /// Fetch one page of registry servers.
    ///
    /// Serves a fresh cache entry for the exact `(limit, cursor, search)`
    /// tuple unless `skip_cache` is set. Never fails: any transport error
    /// yields an empty page.
    pub async fn fetch_page(
        &self,
        limit: u32,
        cursor: Option<&str>,
        search: Option<&str>,
        skip_cache: bool,
    ) -> RegistryPage {
        let key = SourceCaches::registry_key(limit, cursor, search);

        if !skip_cache {
            if let Some(page) = self.caches.registry_get(&key).await {
                tracing::debug!("Registry: cache hit for {}", key);
                return page;
            }
        }

        match self.transport.get_page(limit, cursor, search).await {
            Ok(resp) => {
                let page = RegistryPage {
                    servers: resp
                        .servers
                        .into_iter()
                        .map(|wrapper| to_record(wrapper.server))
                        .collect(),
                    next_cursor: resp.metadata.next_cursor,
                    total_count: resp.metadata.count.unwrap_or(0),
                };
                tracing::debug!(
                    "Registry: fetched {} servers (cursor present: {})",
                    page.servers.len(),
                    page.next_cursor.is_some()
                );
                self.caches.registry_put(&key, page.clone()).await;
                page
            }
            Err(e) => {
                tracing::warn!("Registry: fetch failed: {:#}", e);
                RegistryPage::default()
            }
        }
    }

    /// Empty every cached page across all keys.
    pub async fn clear_cache(&self) {
        self.caches.clear_registry().await;
    }

    /// Most recent fetch across all cached pages, for "last updated" display.
    pub async fn last_fetch_time(&self) -> Option<DateTime<Utc>> {
        self.caches.last_registry_fetch().await
    }
}

/// Normalize one upstream registry entry.
///
/// The publisher and avatar come from a `github.com/<owner>` repository URL
/// when present; the install config is built from the first listed package
/// (npm and pip/pypi are runnable locally) or, failing that, from the first
/// remote endpoint. Registry entries never report popularity.
pub(crate) fn to_record(server: RegistryServer) -> ServerRecord {
    let owner = server
        .repository
        .as_ref()
        .and_then(|repo| repo.url.as_deref())
        .and_then(github_owner);

    let publisher = owner
        .clone()
        .unwrap_or_else(|| REGISTRY_PUBLISHER.to_string());
    let avatar_url = owner.map(|o| github_avatar_url(&o)).unwrap_or_default();

    let description = if server.description.trim().is_empty() {
        NO_DESCRIPTION.to_string()
    } else {
        server.description.clone()
    };

    let mut install_config = HashMap::new();
    if let Some(spec) = launch_spec_for(&server) {
        install_config.insert(server.name.clone(), spec);
    }

    ServerRecord {
        name: server.name,
        description,
        publisher,
        popularity: 0,
        install_config,
        enabled: false,
        avatar_url,
    }
}

/// Map `registryType` to a local launch descriptor:
/// - `npm` → `npx -y <identifier>`
/// - `pip`/`pypi` → `uvx <identifier>`
/// - otherwise fall back to the first remote endpoint, if any.
fn launch_spec_for(server: &RegistryServer) -> Option<LaunchSpec> {
    if let Some(pkg) = server.packages.first() {
        let (command, args) = match pkg.registry_type.as_str() {
            "npm" => ("npx", vec!["-y".to_string(), pkg.identifier.clone()]),
            "pip" | "pypi" => ("uvx", vec![pkg.identifier.clone()]),
            _ => return remote_spec(server),
        };

        let env: HashMap<String, String> = pkg
            .environment_variables
            .iter()
            .map(|ev| (ev.name.clone(), placeholder_value(ev)))
            .collect();

        return Some(LaunchSpec {
            transport: "stdio".to_string(),
            command: Some(command.to_string()),
            args,
            url: None,
            env,
        });
    }

    remote_spec(server)
}

fn remote_spec(server: &RegistryServer) -> Option<LaunchSpec> {
    server.remotes.first().map(|remote| LaunchSpec {
        transport: remote.remote_type.clone(),
        command: None,
        args: vec![],
        url: Some(remote.url.clone()),
        env: HashMap::new(),
    })
}

/// Angle-bracketed placeholder the user replaces with a real value.
fn placeholder_value(ev: &RegistryEnvVar) -> String {
    if ev.description.trim().is_empty() {
        format!("<{}>", ev.name)
    } else {
        format!("<{}>", ev.description.trim())
    }
}
