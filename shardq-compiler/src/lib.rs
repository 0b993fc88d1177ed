//! Schedule compiler for the shardq distributed state-vector simulator
//!
//! Takes a circuit (an ordered gate list over `N` qubits) and a partition
//! parameter `G` (global qubits straddling devices) and produces a
//! [`Schedule`]: a sequence of passes, each with a fixed global/local
//! qubit partition, the communication plan that enters it, and its gates
//! packed into launch-sized groups for the execution backends.
//!
//! The pipeline:
//!
//! 1. [`SimpleCompiler`] packs the circuit into passes under the
//!    `N − G` local-qubit budget.
//! 2. The move-back step hoists commuting pass tails into the next pass,
//!    so they execute while that pass's exchange is in flight.
//! 3. The scheduler picks each pass's global set to reuse the previous
//!    placement, computes boundary permutations and exchange descriptors,
//!    and re-packs each pass with [`AdvanceCompiler`] under the
//!    [`Evaluator`] cost model.
//!
//! Only one rank compiles; the result broadcasts as the byte format in
//! [`serialize`](crate::serialize) and every rank rebuilds the
//! non-serialized plans locally.
//!
//! # Example
//!
//! ```
//! use shardq_compiler::{CalibratedEvaluator, Compiler};
//! use shardq_core::{CompileConfig, Gate};
//!
//! let gates = vec![Gate::h(0), Gate::cnot(0, 1), Gate::rz(2, 0.5)];
//! let evaluator = CalibratedEvaluator::default();
//! let mut compiler =
//!     Compiler::new(3, 0, gates, CompileConfig::default(), &evaluator).unwrap();
//! let schedule = compiler.run().unwrap();
//! assert_eq!(schedule.num_gates(), 3);
//! ```

pub mod advance;
pub mod chunk;
pub mod error;
pub mod evaluator;
pub mod group;
pub mod one_layer;
pub mod schedule;
pub mod scheduler;
pub mod serialize;
pub mod simple;
pub mod state;

pub use advance::AdvanceCompiler;
pub use chunk::ChunkCompiler;
pub use error::CompileError;
pub use evaluator::{CalibratedEvaluator, Evaluator};
pub use group::{Backend, GateGroup};
pub use one_layer::OneLayerCompiler;
pub use schedule::{LocalGroup, Schedule, TransPlan};
pub use scheduler::Compiler;
pub use simple::SimpleCompiler;
pub use state::State;

/// Type alias for results in shardq-compiler
pub type Result<T> = std::result::Result<T, CompileError>;
