//! Error types for Cinder

use thiserror::Error;

/// The main error type for Cinder operations
#[derive(Debug, Error)]
pub enum CinderError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid effect: {0}")]
    InvalidEffect(String),

    #[error("Invalid curve: {0}")]
    InvalidCurve(String),

    #[error("Prototype handle is stale or deleted")]
    StalePrototype,

    #[error("Instance handle is stale or destroyed")]
    StaleInstance,

    #[error("Instance limit reached: {max} instances")]
    InstanceLimit { max: u32 },

    #[error("Prototype is still referenced by {count} instance(s)")]
    PrototypeInUse { count: u32 },

    #[error("Emitter index {index} out of range: effect has {count} emitter(s)")]
    EmitterIndexOutOfRange { index: usize, count: usize },
}

/// Result type alias for Cinder operations
pub type Result<T> = std::result::Result<T, CinderError>;

impl From<toml::de::Error> for CinderError {
    fn from(err: toml::de::Error) -> Self {
        CinderError::ParseError(err.to_string())
    }
}

impl From<std::str::Utf8Error> for CinderError {
    fn from(err: std::str::Utf8Error) -> Self {
        CinderError::ParseError(format!("effect data is not valid UTF-8: {err}"))
    }
}
