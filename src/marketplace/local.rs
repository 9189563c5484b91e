//! Local source adapter: MCP servers known to the locally installed CLI.
//!
//! Wraps the `claude` command-line tool: a quick `which`/`where` probe plus
//! `claude mcp list` for the actual listing. The tool may simply not be
//! installed; that is not an error, and the marketplace degrades to
//! registry-only operation. Successful listings are cached in a single
//! process-wide slot with the shared 60-minute TTL.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::cache::SourceCaches;
use super::record::{LaunchSpec, ServerRecord, NO_DESCRIPTION};

/// Publisher shown for locally-sourced entries.
pub const LOCAL_PUBLISHER: &str = "Claude CLI";

/// The local CLI collaborator: an availability probe and a listing operation.
/// Both may fail or be unavailable.
#[async_trait]
pub trait LocalListing: Send + Sync {
    async fn is_available(&self) -> bool;
    async fn list(&self) -> anyhow::Result<Vec<ServerRecord>>;
}

/// Production listing backed by the `claude` CLI.
pub struct ClaudeCli;

#[async_trait]
impl LocalListing for ClaudeCli {
    async fn is_available(&self) -> bool {
        command_exists("claude").await
    }

    async fn list(&self) -> anyhow::Result<Vec<ServerRecord>> {
        let output = tokio::process::Command::new("claude")
            .args(["mcp", "list"])
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            anyhow::bail!("claude mcp list exited with {}", output.status);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_mcp_list(&stdout))
    }
}

/// Check if a command exists via `which` (Unix) or `where` (Windows).
async fn command_exists(cmd: &str) -> bool {
    #[cfg(target_os = "windows")]
    let check_cmd = "where";
    #[cfg(not(target_os = "windows"))]
    let check_cmd = "which";

    tokio::process::Command::new(check_cmd)
        .arg(cmd)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Parse `claude mcp list` output.
///
/// Each configured server prints as one `name: launch - status` line, e.g.
/// `github: npx -y @modelcontextprotocol/server-github - ✓ Connected` or
/// `linear: https://mcp.linear.app/sse (SSE) - ✓ Connected`. Header and
/// blank lines are skipped.
fn parse_mcp_list(stdout: &str) -> Vec<ServerRecord> {
    let mut records = Vec::new();

    for line in stdout.lines() {
        let line = line.trim();
        let Some((name, rest)) = line.split_once(": ") else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || name.contains(' ') {
            continue;
        }

        // Drop the trailing health indicator, if any.
        let launch = rest.split(" - ").next().unwrap_or(rest).trim();
        if launch.is_empty() {
            continue;
        }

        let spec = if launch.starts_with("http://") || launch.starts_with("https://") {
            let url = launch.split_whitespace().next().unwrap_or(launch);
            let transport = if launch.contains("(SSE)") {
                "sse"
            } else {
                "streamable-http"
            };
            LaunchSpec {
                transport: transport.to_string(),
                command: None,
                args: vec![],
                url: Some(url.to_string()),
                env: HashMap::new(),
            }
        } else {
            let mut tokens = launch.split_whitespace().map(String::from);
            let Some(command) = tokens.next() else {
                continue;
            };
            LaunchSpec {
                transport: "stdio".to_string(),
                command: Some(command),
                args: tokens.collect(),
                url: None,
                env: HashMap::new(),
            }
        };

        let mut install_config = HashMap::new();
        install_config.insert(name.to_string(), spec);

        records.push(ServerRecord {
            name: name.to_string(),
            description: NO_DESCRIPTION.to_string(),
            publisher: LOCAL_PUBLISHER.to_string(),
            popularity: 0,
            install_config,
            enabled: true,
            avatar_url: String::new(),
        });
    }

    records
}

/// Read-through cached access to the local CLI listing.
pub struct LocalAdapter {
    listing: Arc<dyn LocalListing>,
    caches: Arc<SourceCaches>,
}

impl LocalAdapter {
    pub fn new(listing: Arc<dyn LocalListing>, caches: Arc<SourceCaches>) -> Self {
        Self { listing, caches }
    }

    /// Fetch the local server list.
    ///
    /// Returns the cached slot when it is fresh (unless `skip_cache`), an
    /// empty list when the CLI is absent, and an empty list on listing
    /// failure; a broken local tool must not block registry loading.
    pub async fn fetch(&self, skip_cache: bool) -> Vec<ServerRecord> {
        if !skip_cache {
            if let Some(cached) = self.caches.local_get().await {
                tracing::debug!("Local: cache hit ({} servers)", cached.len());
                return cached;
            }
        }

        if !self.listing.is_available().await {
            tracing::debug!("Local: CLI not installed, skipping");
            return vec![];
        }

        match self.listing.list().await {
            Ok(servers) => {
                tracing::debug!("Local: listed {} servers", servers.len());
                self.caches.local_put(servers.clone()).await;
                servers
            }
            Err(e) => {
                tracing::warn!("Local: listing failed: {:#}", e);
                vec![]
            }
        }
    }
}
