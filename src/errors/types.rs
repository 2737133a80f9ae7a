use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatecheckError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("A scan is already running for context {0}")]
    AlreadyRunning(i64),

    #[error("Scan mode violation: {0}")]
    ModeViolation(String),

    #[error("Malformed recorded message: {0}")]
    MalformedMessage(String),

    #[error("History storage error: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unknown user id: {0}")]
    UnknownUser(i64),

    #[error("Unknown context id: {0}")]
    UnknownContext(i64),

    #[error("No scan has been run for context {0}")]
    NoScan(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
