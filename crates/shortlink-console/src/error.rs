// Error types for the console

use shortlink_client::ClientError;

/// Errors that can occur during console operations
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Organization {0} not found")]
    OrganizationNotFound(u64),
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
