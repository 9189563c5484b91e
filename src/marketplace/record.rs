//! Normalized server records shared by both marketplace sources.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Placeholder description for upstream entries that don't provide one.
pub const NO_DESCRIPTION: &str = "No description available";

/// Publisher shown for registry entries whose repository isn't on GitHub.
pub const REGISTRY_PUBLISHER: &str = "MCP Registry";

/// How to launch one MCP server: a stdio child process or a remote endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Transport type: "stdio", "streamable-http", or "sse".
    /// Some agent configs omit it for plain command entries.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub transport: String,
    /// For stdio: the command to execute (e.g., "npx", "uvx").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// For stdio: arguments to the command.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// For remote transports: the server URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Environment variables (placeholder values until the user fills them in).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

/// One installable MCP server, normalized across sources.
///
/// Records from the local CLI and from the remote registry are merged into a
/// single collection; the lowercase `name` is the deduplication key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecord {
    /// Case-sensitive display identifier.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Publisher ("by" line in the UI).
    pub publisher: String,
    /// Star count when the source exposes one; registry entries report 0.
    pub popularity: u64,
    /// Server name → launch descriptor, passed through to agent configs unmodified.
    pub install_config: HashMap<String, LaunchSpec>,
    /// Whether this server is active for the selected agent.
    /// Only meaningful for locally-sourced entries.
    pub enabled: bool,
    /// GitHub avatar URL when the repository owner is known, else empty.
    pub avatar_url: String,
}

impl ServerRecord {
    /// The case-insensitive deduplication key.
    pub fn dedup_key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// One page of normalized registry results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryPage {
    pub servers: Vec<ServerRecord>,
    /// Opaque continuation token; `None` means the registry is exhausted.
    pub next_cursor: Option<String>,
    pub total_count: u64,
}

/// Extract the owner segment from a `github.com/<owner>/...` repository URL.
pub fn github_owner(repo_url: &str) -> Option<String> {
    let rest = repo_url
        .strip_prefix("https://github.com/")
        .or_else(|| repo_url.strip_prefix("http://github.com/"))
        .or_else(|| repo_url.strip_prefix("github.com/"))?;
    let owner = rest.split('/').next()?.trim();
    if owner.is_empty() {
        None
    } else {
        Some(owner.to_string())
    }
}

/// GitHub avatar URL for a repository owner.
pub fn github_avatar_url(owner: &str) -> String {
    format!("https://github.com/{}.png", owner)
}
