use thiserror::Error;

/// Main error type for Rinnai Touch module operations
#[derive(Error, Debug)]
pub enum RinnaiError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("No UDP announcement received from a Rinnai Touch module")]
    DiscoveryTimeout,

    #[error("Command was not confirmed by the module: {0}")]
    CommandTimeout(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Frame invalid: {0}")]
    Frame(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias for Rinnai Touch module operations
pub type RinnaiResult<T> = Result<T, RinnaiError>;
