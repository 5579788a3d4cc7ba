use thiserror::Error;

/// Core error types for esptail
#[derive(Debug, Error)]
pub enum EsptailError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config store error: {0}")]
    Store(String),

    #[error("Module error in '{module}': {message}")]
    Module { module: String, message: String },
}

/// Errors raised while capturing bytes from the serial source
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("Serial source error: {0}")]
    Serial(String),

    #[error("Channel closed")]
    ChannelClosed,
}

/// Errors raised while formatting or delivering a push request
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Payload needs {needed} bytes but the scratch buffer holds {capacity}")]
    PayloadOverflow { needed: usize, capacity: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for esptail operations
pub type Result<T> = std::result::Result<T, EsptailError>;
