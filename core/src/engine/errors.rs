//! Error types for the execution engine
//!
//! Runtime errors never unwind the scheduler: they are caught at the task
//! boundary and reported through the failing source's failure channel.

use thiserror::Error;

/// Error raised by an external command effect or redirect modifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CommandError {
    pub message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error raised while binding arguments into a function body
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct InstantiationError {
    pub message: String,
}

impl InstantiationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Engine-level errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Can't start a trace from inside a traced execution")]
    RecursiveTrace,

    #[error("Maximum number of contexts ({0}) reached")]
    ForkLimit(usize),

    #[error("Failed to instantiate function {id}: {source}")]
    Instantiation {
        id: String,
        #[source]
        source: InstantiationError,
    },

    #[error(transparent)]
    Command(#[from] CommandError),
}
