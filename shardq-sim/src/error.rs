//! Simulator error types

use shardq_compiler::CompileError;
use shardq_core::CoreError;
use thiserror::Error;

/// Errors raised while driving a schedule
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Device state-vector failure (allocation, bad index)
    #[error("device error: {0}")]
    Device(String),

    /// Collective transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// A mode/backend combination the reference driver refuses
    #[error("unsupported execution: {0}")]
    Unsupported(String),
}

/// Type alias for results in shardq-sim
pub type Result<T> = std::result::Result<T, SimError>;
