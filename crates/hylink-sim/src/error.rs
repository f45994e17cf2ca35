use hylink_core::config::ConfigError;
use hylink_core::HybridError;

/// Result type for testbed operations
pub type SimResult<T> = Result<T, SimError>;

/// Errors that can occur while building or running a testbed
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("block error: {0}")]
    Block(#[from] HybridError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid loopback link: {0}")]
    InvalidLink(String),

    #[error("invalid scenario: {0}")]
    InvalidScenario(String),
}
