use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Agent config error: {0}")]
    AgentConfig(String),
}

pub type Result<T> = std::result::Result<T, DeckError>;
