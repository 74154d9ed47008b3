use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("configuration not found at {0}")]
    ConfigNotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("inventory not found at {0}")]
    InventoryNotFound(String),

    #[error("unknown host group: {0}")]
    UnknownGroup(String),

    #[error("host group '{0}' resolved to no hosts")]
    EmptyGroup(String),

    #[error("transport failure on {host}: {reason}")]
    Transport { host: String, reason: String },

    #[error("template rendering failed: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("checkpoint query on {host} failed: {reason}")]
    CheckpointQuery { host: String, reason: String },

    #[error("cannot parse replication checkpoint from '{line}': {reason}")]
    Checkpoint { line: String, reason: String },

    #[error("ssh key bootstrap failed: {0}")]
    KeyBootstrap(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Regex(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, InstallError>;
