//! Compiler error types

use shardq_core::CoreError;
use thiserror::Error;

/// Errors raised while compiling a circuit into a schedule
#[derive(Debug, Error)]
pub enum CompileError {
    /// Invalid gate operands or topology parameters
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The pinned qubit set does not fit the group budget
    #[error("required qubit set has {required} members but the group budget is {budget}")]
    RequiredExceedsBudget { required: usize, budget: usize },

    /// A gate's footprint can never fit a group under this partition
    #[error("gate {gate} touches {needed} qubits but only {available} can be local")]
    GateExceedsBudget {
        gate: String,
        needed: usize,
        available: usize,
    },

    /// More global qubits requested than the partition can support
    #[error("partition of {num_qubits} qubits cannot reserve {global_bits} global bits")]
    InvalidPartition {
        num_qubits: usize,
        global_bits: usize,
    },

    /// A gate the selected backend cannot represent
    #[error("gate {name} unsupported by the selected backend: {reason}")]
    UnsupportedGate { name: &'static str, reason: String },

    /// Feature combination the compiler refuses
    #[error("unsupported configuration: {0}")]
    UnsupportedConfig(String),

    /// Schedule encoding failure
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Schedule decoding failure
    #[error("deserialization error: {0}")]
    DeserializationError(String),
}

/// Type alias for results in shardq-compiler
pub type Result<T> = std::result::Result<T, CompileError>;
