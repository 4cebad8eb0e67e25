//! Error types for the instance pool

use thiserror::Error;

/// Boxed error carried as the source of backend failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("failed to compile module: {reason}")]
    Compile {
        reason: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to instantiate module: {reason}")]
    Instantiation {
        reason: String,
        #[source]
        source: BoxError,
    },

    #[error("export not found: {name}")]
    ExportNotFound { name: String },

    #[error("export {name} has an unexpected signature: {message}")]
    SignatureMismatch { name: String, message: String },

    #[error("instance trapped: {message}")]
    Trap {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("Admission limit reached - all instances are checked out")]
    LimitReached,

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("engine configuration error: {reason}")]
    Config {
        reason: String,
        #[source]
        source: BoxError,
    },
}

impl PoolError {
    /// Wraps a backend compile failure.
    pub fn compile(reason: impl Into<String>, source: impl Into<BoxError>) -> Self {
        PoolError::Compile {
            reason: reason.into(),
            source: source.into(),
        }
    }

    /// Wraps a backend instantiation failure.
    pub fn instantiation(reason: impl Into<String>, source: impl Into<BoxError>) -> Self {
        PoolError::Instantiation {
            reason: reason.into(),
            source: source.into(),
        }
    }

    /// Wraps a guest trap. `message` should carry the full cause chain.
    pub fn trap(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        PoolError::Trap {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Wraps an engine or linker configuration failure.
    pub fn config(reason: impl Into<String>, source: impl Into<BoxError>) -> Self {
        PoolError::Config {
            reason: reason.into(),
            source: source.into(),
        }
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
