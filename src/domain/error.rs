use thiserror::Error;

use crate::domain::fault::Fault;

/// Common error types for the chain runtime
#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    /// Invalid sequence arguments, chain definitions or settings
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A chain was looked up by a name the registry does not know
    #[error("chain not found: {0}")]
    ChainNotFound(String),

    /// Nested chain call would exceed the sequence stack depth
    #[error("nested chain stack overflow (max depth {max_depth})")]
    NestedStackOverflow { max_depth: usize },

    /// Level or step outside of the current stack
    #[error("invalid position: level {level}, step {step}")]
    InvalidPosition { level: usize, step: isize },

    /// No chain on the stack declares a fallback for the fault
    #[error("no exception handler for fault {fault} raised at level {level}, step {step}")]
    NoExceptionHandler { fault: Fault, level: usize, step: isize },

    /// The sequence is exhausted or terminated
    #[error("message processing sequence is already finished")]
    SequenceFinished,

    /// Timeout errors
    #[error("{0}")]
    Timeout(String),

    /// Actor messaging errors
    #[error("{0}")]
    Dispatch(String),

    /// Spawn errors
    #[error("{0}")]
    Spawn(String),

    /// Serialization/deserialization errors
    #[error("{0}")]
    Serialization(String),

    /// File system related errors
    #[error("{0}")]
    FileSystem(String)
}

impl RuntimeError {
    /// Fault kind used when this error escapes from a receiver
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::InvalidConfiguration(_) => "runtime.invalid_configuration",
            RuntimeError::ChainNotFound(_) => "runtime.chain_not_found",
            RuntimeError::NestedStackOverflow { .. } => "runtime.nested_stack_overflow",
            RuntimeError::InvalidPosition { .. } => "runtime.invalid_position",
            RuntimeError::NoExceptionHandler { .. } => "runtime.no_exception_handler",
            RuntimeError::SequenceFinished => "runtime.sequence_finished",
            RuntimeError::Timeout(_) => "runtime.timeout",
            RuntimeError::Dispatch(_) => "runtime.dispatch",
            RuntimeError::Spawn(_) => "runtime.spawn",
            RuntimeError::Serialization(_) => "runtime.serialization",
            RuntimeError::FileSystem(_) => "runtime.filesystem"
        }
    }
}

/// Convert from anyhow::Error
impl From<anyhow::Error> for RuntimeError {
    fn from(err: anyhow::Error) -> Self {
        RuntimeError::InvalidConfiguration(format!("{:#}", err))
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        RuntimeError::FileSystem(err.to_string())
    }
}

/// Convert from serde_yaml::Error
impl From<serde_yaml::Error> for RuntimeError {
    fn from(err: serde_yaml::Error) -> Self {
        RuntimeError::Serialization(err.to_string())
    }
}

/// Convert from serde_json::Error
impl From<serde_json::Error> for RuntimeError {
    fn from(err: serde_json::Error) -> Self {
        RuntimeError::Serialization(err.to_string())
    }
}

/// Convert from ractor::SpawnErr
impl From<ractor::SpawnErr> for RuntimeError {
    fn from(err: ractor::SpawnErr) -> Self {
        RuntimeError::Spawn(err.to_string())
    }
}
