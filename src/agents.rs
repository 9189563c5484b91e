//! Agent config files: where each AI coding agent keeps its MCP servers.
//!
//! Every supported agent stores a JSON document with a name-keyed map of
//! launch descriptors under either `mcpServers` or `mcp`. This module is
//! plain CRUD over those documents: it only touches the server map and
//! leaves every other key in the file untouched. The install action invoked
//! from a marketplace card lands here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{DeckError, Result};
use crate::marketplace::{LaunchSpec, ServerRecord};

/// One supported agent and where its MCP config lives.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AgentSpec {
    /// Stable identifier (e.g., "cursor").
    pub id: String,
    /// Display name.
    pub name: String,
    /// Path to the agent's JSON config file.
    pub config_path: PathBuf,
    /// Top-level key holding the server name → launch descriptor map.
    pub server_key: String,
}

fn agent(id: &str, name: &str, config_path: PathBuf, server_key: &str) -> AgentSpec {
    AgentSpec {
        id: id.to_string(),
        name: name.to_string(),
        config_path,
        server_key: server_key.to_string(),
    }
}

/// The agents this build knows how to configure.
pub fn known_agents() -> Vec<AgentSpec> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let config = dirs::config_dir().unwrap_or_else(|| home.join(".config"));

    vec![
        agent(
            "claude-desktop",
            "Claude Desktop",
            config.join("Claude").join("claude_desktop_config.json"),
            "mcpServers",
        ),
        agent(
            "claude-code",
            "Claude Code",
            home.join(".claude.json"),
            "mcpServers",
        ),
        agent(
            "cursor",
            "Cursor",
            home.join(".cursor").join("mcp.json"),
            "mcpServers",
        ),
        agent(
            "opencode",
            "Opencode",
            config.join("opencode").join("opencode.json"),
            "mcp",
        ),
        agent(
            "windsurf",
            "Windsurf",
            home.join(".codeium").join("windsurf").join("mcp_config.json"),
            "mcpServers",
        ),
    ]
}

/// Look up an agent by its stable id.
pub fn agent_by_id(id: &str) -> Result<AgentSpec> {
    known_agents()
        .into_iter()
        .find(|a| a.id == id)
        .ok_or_else(|| DeckError::UnknownAgent(id.to_string()))
}

/// Read an agent's config document. A missing file is an empty document.
fn load_document(path: &Path) -> Result<Value> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Value::Object(Map::new())),
        Err(e) => Err(e.into()),
    }
}

fn save_document(path: &Path, doc: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut json = serde_json::to_string_pretty(doc)?;
    json.push('\n');
    std::fs::write(path, json)?;
    tracing::info!("Agents: wrote {}", path.display());
    Ok(())
}

/// Get (or create) the mutable server map inside a config document.
fn server_map<'a>(doc: &'a mut Value, agent: &AgentSpec) -> Result<&'a mut Map<String, Value>> {
    let root = doc.as_object_mut().ok_or_else(|| {
        DeckError::AgentConfig(format!(
            "{} is not a JSON object",
            agent.config_path.display()
        ))
    })?;
    root.entry(agent.server_key.clone())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| {
            DeckError::AgentConfig(format!(
                "'{}' in {} is not an object",
                agent.server_key,
                agent.config_path.display()
            ))
        })
}

/// The servers currently configured for an agent. Entries that don't parse
/// as launch descriptors are skipped rather than failing the whole read.
pub fn load_servers(agent: &AgentSpec) -> Result<HashMap<String, LaunchSpec>> {
    let doc = load_document(&agent.config_path)?;
    let Some(map) = doc.get(&agent.server_key).and_then(Value::as_object) else {
        return Ok(HashMap::new());
    };
    Ok(map
        .iter()
        .filter_map(|(name, value)| {
            serde_json::from_value::<LaunchSpec>(value.clone())
                .ok()
                .map(|spec| (name.clone(), spec))
        })
        .collect())
}

/// Lowercase names of the servers configured for an agent, for marking
/// marketplace cards as already installed.
pub fn installed_names(agent: &AgentSpec) -> Result<Vec<String>> {
    Ok(load_servers(agent)?.keys().map(|n| n.to_lowercase()).collect())
}

/// Materialize a marketplace record into an agent's config.
///
/// The record's launch descriptors are passed through unmodified; any
/// existing entry with the same name is overwritten. Other keys in the
/// config document are preserved.
pub fn install_server(agent: &AgentSpec, record: &ServerRecord) -> Result<()> {
    if record.install_config.is_empty() {
        return Err(DeckError::AgentConfig(format!(
            "'{}' has no launch configuration to install",
            record.name
        )));
    }

    let mut doc = load_document(&agent.config_path)?;
    let servers = server_map(&mut doc, agent)?;
    for (name, spec) in &record.install_config {
        servers.insert(name.clone(), serde_json::to_value(spec)?);
    }
    save_document(&agent.config_path, &doc)?;
    tracing::info!("Agents: installed '{}' into {}", record.name, agent.name);
    Ok(())
}

/// Remove a server from an agent's config. Returns whether it was present.
pub fn remove_server(agent: &AgentSpec, name: &str) -> Result<bool> {
    let mut doc = load_document(&agent.config_path)?;
    let servers = server_map(&mut doc, agent)?;
    let removed = servers.remove(name).is_some();
    if removed {
        save_document(&agent.config_path, &doc)?;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_agent(test: &str) -> AgentSpec {
        let path = std::env::temp_dir().join(format!(
            "mcpdeck_test_{}_{}.json",
            test,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        agent("test", "Test Agent", path, "mcpServers")
    }

    fn record_with_config(name: &str) -> ServerRecord {
        let mut install_config = HashMap::new();
        install_config.insert(
            name.to_string(),
            LaunchSpec {
                transport: "stdio".into(),
                command: Some("npx".into()),
                args: vec!["-y".into(), format!("@test/{}", name)],
                url: None,
                env: HashMap::new(),
            },
        );
        ServerRecord {
            name: name.into(),
            description: "test".into(),
            publisher: "test".into(),
            popularity: 0,
            install_config,
            enabled: false,
            avatar_url: String::new(),
        }
    }

    #[test]
    fn test_missing_config_reads_as_empty() {
        let agent = temp_agent("missing");
        assert!(load_servers(&agent).unwrap().is_empty());
        assert!(installed_names(&agent).unwrap().is_empty());
    }

    #[test]
    fn test_install_then_load_round_trip() {
        let agent = temp_agent("round_trip");

        install_server(&agent, &record_with_config("filesystem")).unwrap();

        let servers = load_servers(&agent).unwrap();
        assert_eq!(servers.len(), 1);
        let spec = &servers["filesystem"];
        assert_eq!(spec.command.as_deref(), Some("npx"));
        assert_eq!(spec.args, vec!["-y", "@test/filesystem"]);
        assert_eq!(installed_names(&agent).unwrap(), vec!["filesystem"]);

        let _ = std::fs::remove_file(&agent.config_path);
    }

    #[test]
    fn test_install_preserves_unrelated_keys() {
        let agent = temp_agent("preserves");
        std::fs::write(
            &agent.config_path,
            r#"{"theme": "dark", "mcpServers": {"existing": {"command": "uvx"}}}"#,
        )
        .unwrap();

        install_server(&agent, &record_with_config("filesystem")).unwrap();

        let doc: Value =
            serde_json::from_str(&std::fs::read_to_string(&agent.config_path).unwrap()).unwrap();
        assert_eq!(doc["theme"], "dark");
        assert!(doc["mcpServers"].get("existing").is_some());
        assert!(doc["mcpServers"].get("filesystem").is_some());

        let _ = std::fs::remove_file(&agent.config_path);
    }

    #[test]
    fn test_remove_server() {
        let agent = temp_agent("remove");
        install_server(&agent, &record_with_config("filesystem")).unwrap();

        assert!(remove_server(&agent, "filesystem").unwrap());
        assert!(!remove_server(&agent, "filesystem").unwrap());
        assert!(load_servers(&agent).unwrap().is_empty());

        let _ = std::fs::remove_file(&agent.config_path);
    }

    #[test]
    fn test_install_rejects_record_without_config() {
        let agent = temp_agent("rejects");
        let mut record = record_with_config("bare");
        record.install_config.clear();

        let err = install_server(&agent, &record).unwrap_err();
        assert!(matches!(err, DeckError::AgentConfig(_)));
    }

    #[test]
    fn test_malformed_server_key_is_an_error() {
        let agent = temp_agent("malformed");
        std::fs::write(&agent.config_path, r#"{"mcpServers": "oops"}"#).unwrap();

        let err = install_server(&agent, &record_with_config("x")).unwrap_err();
        assert!(matches!(err, DeckError::AgentConfig(_)));

        let _ = std::fs::remove_file(&agent.config_path);
    }

    #[test]
    fn test_known_agents_have_distinct_ids() {
        let agents = known_agents();
        let mut ids = std::collections::HashSet::new();
        for a in &agents {
            assert!(ids.insert(a.id.clone()), "duplicate agent id: {}", a.id);
            assert!(!a.server_key.is_empty());
        }
        assert!(agent_by_id("cursor").is_ok());
        assert!(matches!(
            agent_by_id("nope"),
            Err(DeckError::UnknownAgent(_))
        ));
    }
}
