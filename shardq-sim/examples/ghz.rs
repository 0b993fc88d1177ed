//! GHZ state across a simulated four-device cluster
//!
//! Run with `RUST_LOG=info` to see the compile and execution reports.

use shardq_compiler::CalibratedEvaluator;
use shardq_core::{CompileConfig, Gate, Topology};
use shardq_sim::{Circuit, CpuCluster, LocalCollective};

fn main() {
    env_logger::init();

    let num_qubits = 10;
    let mut circuit = Circuit::new(num_qubits);
    circuit.add_gate(Gate::h(0)).unwrap();
    for q in 1..num_qubits {
        circuit.add_gate(Gate::cnot(q - 1, q)).unwrap();
    }

    let topology = Topology::new(1, 4).unwrap();
    let config = CompileConfig::default();
    let evaluator = CalibratedEvaluator::default();
    let mut collective = LocalCollective::new();
    circuit
        .compile(&topology, &config, &evaluator, &mut collective)
        .unwrap();

    let mut backend = CpuCluster::new();
    circuit
        .run(&mut backend, &topology, &config, true, true)
        .unwrap();

    for item in circuit.state_report().unwrap() {
        if item.amp.norm_sqr() > 0.001 {
            println!("{}", item);
        }
    }
}
