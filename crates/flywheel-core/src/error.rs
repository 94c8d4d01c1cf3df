use thiserror::Error;

/// Core error type for flywheel operations.
#[derive(Error, Debug)]
pub enum FlywheelError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Trigger error: {0}")]
    Trigger(String),

    /// The listener reports the triggered effect already exists from a prior
    /// attempt. Callers treat this as success for schedule advancement.
    #[error("Already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("Schedule error: {0}")]
    Schedule(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Aggregated failure from closing multiple backends. Every backend's
    /// close is attempted; the first failure becomes the primary and the
    /// rest are retained rather than dropped.
    #[error("Backend shutdown failed: {primary} ({n} secondary failure(s))", n = .secondary.len())]
    BackendShutdown {
        primary: Box<FlywheelError>,
        secondary: Vec<FlywheelError>,
    },
}

impl FlywheelError {
    /// Whether this error is the idempotent-conflict signal from a trigger
    /// listener.
    pub fn is_already_initialized(&self) -> bool {
        matches!(self, FlywheelError::AlreadyInitialized(_))
    }
}

impl From<serde_json::Error> for FlywheelError {
    fn from(e: serde_json::Error) -> Self {
        FlywheelError::Serialization(e.to_string())
    }
}

/// Result type alias using FlywheelError.
pub type Result<T> = std::result::Result<T, FlywheelError>;
