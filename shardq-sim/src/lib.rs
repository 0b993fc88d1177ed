//! Execution driver for shardq schedules
//!
//! The compiler produces a [`Schedule`](shardq_compiler::Schedule); this
//! crate runs it. The executor only ever talks to collaborators through
//! two contracts — [`ClusterBackend`] for the device fleet and
//! [`Collective`] for rank-level transport — so the same driver serves the
//! production kernels and the host-memory [`CpuCluster`] the tests use.
//!
//! # Example
//!
//! ```
//! use shardq_sim::{Circuit, CpuCluster, LocalCollective};
//! use shardq_compiler::CalibratedEvaluator;
//! use shardq_core::{CompileConfig, Gate, Topology};
//!
//! let mut circuit = Circuit::new(3);
//! circuit.add_gate(Gate::h(0)).unwrap();
//! circuit.add_gate(Gate::cnot(0, 2)).unwrap();
//!
//! let topology = Topology::single();
//! let config = CompileConfig::per_gate_only();
//! let evaluator = CalibratedEvaluator::default();
//! let mut collective = LocalCollective::new();
//! circuit.compile(&topology, &config, &evaluator, &mut collective).unwrap();
//!
//! let mut backend = CpuCluster::new();
//! circuit.run(&mut backend, &topology, &config, true, true).unwrap();
//! let ghz = circuit.amp_at(0b101).unwrap();
//! assert!(ghz.amp.norm() > 0.7);
//! ```

pub mod backend;
pub mod circuit;
pub mod cpu;
pub mod error;
pub mod executor;
pub mod transport;

pub use backend::ClusterBackend;
pub use circuit::{Circuit, ResultItem};
pub use cpu::CpuCluster;
pub use error::SimError;
pub use executor::Executor;
pub use transport::{Collective, LocalCollective};

/// Type alias for results in shardq-sim
pub type Result<T> = std::result::Result<T, SimError>;
