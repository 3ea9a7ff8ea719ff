use brainnet::error::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid network config: {0}")]
    Config(#[from] ConfigError),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Args(String),
}
