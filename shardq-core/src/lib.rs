//! Core types for the shardq distributed state-vector simulator
//!
//! This crate holds what every other shardq crate agrees on: the immutable
//! gate record, machine-word qubit sets, the cluster topology, and the
//! scheduler tunables.
//!
//! # Quick start
//!
//! ```
//! use shardq_core::{Gate, QubitSet, Topology};
//!
//! let gates = vec![Gate::h(0), Gate::cnot(0, 1)];
//! let touched: QubitSet = gates.iter().map(|g| g.qubit_set()).fold(
//!     QubitSet::EMPTY,
//!     |acc, s| acc | s,
//! );
//! assert_eq!(touched.len(), 2);
//!
//! let topo = Topology::new(1, 4).unwrap();
//! assert_eq!(topo.global_bits(), 2);
//! ```

pub mod config;
pub mod error;
pub mod gate;
pub mod qubit_set;
pub mod topology;

pub use config::{CompileConfig, GpuBackend, Mode};
pub use error::CoreError;
pub use gate::{Gate, GateKind, GateMatrix, GateType};
pub use num_complex::Complex64;
pub use qubit_set::{QubitSet, MAX_QUBITS};
pub use topology::Topology;

/// Type alias for results in shardq-core
pub type Result<T> = std::result::Result<T, CoreError>;
