//! End-to-end execution against a naive dense oracle
//!
//! Compile a circuit, run it on the host-memory cluster through the full
//! boundary machinery (exchanges, per-group transpositions, global
//! diagonal phases), and demand the amplitudes match a straightforward
//! single-vector simulation of the same gate list.

use approx::assert_relative_eq;
use rand::prelude::*;
use shardq_compiler::CalibratedEvaluator;
use num_complex::Complex64;
use shardq_core::{CompileConfig, Gate, GateKind, GpuBackend, Mode, Topology};
use shardq_sim::{Circuit, CpuCluster, LocalCollective};

const ZERO: Complex64 = Complex64::new(0.0, 0.0);

/// Single-vector oracle: logical order, no partitioning
fn naive_run(num_qubits: usize, gates: &[Gate]) -> Vec<Complex64> {
    let mut vec = vec![ZERO; 1 << num_qubits];
    vec[0] = Complex64::new(1.0, 0.0);
    for gate in gates {
        naive_apply(&mut vec, gate);
    }
    vec
}

fn pair_update(vec: &mut [Complex64], i: usize, j: usize, m: &[[Complex64; 2]; 2]) {
    let (a, b) = (vec[i], vec[j]);
    vec[i] = m[0][0] * a + m[0][1] * b;
    vec[j] = m[1][0] * a + m[1][1] * b;
}

fn naive_apply(vec: &mut [Complex64], gate: &Gate) {
    let m = gate.matrix();
    match gate.kind() {
        GateKind::Single { target } => {
            let tm = 1usize << target;
            for i in 0..vec.len() {
                if i & tm == 0 {
                    pair_update(vec, i, i | tm, m);
                }
            }
        }
        GateKind::Controlled { control, target } => {
            let cm = 1usize << control;
            let tm = 1usize << target;
            for i in 0..vec.len() {
                if i & cm != 0 && i & tm == 0 {
                    pair_update(vec, i, i | tm, m);
                }
            }
        }
        GateKind::TwoQubit { partner, target } => {
            let pm = 1usize << partner;
            let tm = 1usize << target;
            if gate.is_diagonal() {
                for (i, a) in vec.iter_mut().enumerate() {
                    let x = ((i & pm != 0) ^ (i & tm != 0)) as usize;
                    *a *= m[x][x];
                }
            } else {
                for i in 0..vec.len() {
                    if i & tm == 0 {
                        pair_update(vec, i, i ^ (pm | tm), m);
                    }
                }
            }
        }
        GateKind::MultiControlled { controls, target } => {
            let mut cm = 0usize;
            for &c in controls.iter() {
                cm |= 1 << c;
            }
            let tm = 1usize << target;
            for i in 0..vec.len() {
                if i & cm == cm && i & tm == 0 {
                    pair_update(vec, i, i | tm, m);
                }
            }
        }
    }
}

/// Compile + run on the reference cluster, then compare every amplitude
fn assert_matches_oracle(
    num_qubits: usize,
    devices: usize,
    gates: Vec<Gate>,
    config: CompileConfig,
) {
    let oracle = naive_run(num_qubits, &gates);
    let mut circuit = Circuit::with_gates(num_qubits, gates).unwrap();
    let topology = Topology::new(1, devices).unwrap();
    let evaluator = CalibratedEvaluator::default();
    let mut collective = LocalCollective::new();
    circuit
        .compile(&topology, &config, &evaluator, &mut collective)
        .unwrap();
    let mut backend = CpuCluster::new();
    circuit
        .run(&mut backend, &topology, &config, true, true)
        .unwrap();
    for (idx, expect) in oracle.iter().enumerate() {
        let got = circuit.amp_at(idx as u64).unwrap().amp;
        assert_relative_eq!(got.re, expect.re, epsilon = 1e-9);
        assert_relative_eq!(got.im, expect.im, epsilon = 1e-9);
    }
}

fn random_gates(num_qubits: usize, count: usize, seed: u64) -> Vec<Gate> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let q = rng.gen_range(0..num_qubits);
            let r = (q + 1 + rng.gen_range(0..num_qubits - 1)) % num_qubits;
            let s = (q + 1 + rng.gen_range(0..num_qubits - 2)) % num_qubits;
            match rng.gen_range(0..10) {
                0 => Gate::h(q),
                1 => Gate::x(q),
                2 => Gate::rz(q, rng.gen_range(0.0..6.28)),
                3 => Gate::cnot(q, r),
                4 => Gate::cz(q, r),
                5 => Gate::crz(q, r, rng.gen_range(0.0..6.28)),
                6 => Gate::rzz(q, r, rng.gen_range(0.0..6.28)),
                7 => Gate::rxx(q, r, rng.gen_range(0.0..6.28)),
                8 if s != q && s != r => Gate::mc_phase(&[q, r], s, rng.gen_range(0.0..6.28)),
                _ => Gate::u3(
                    q,
                    rng.gen_range(0.0..3.14),
                    rng.gen_range(0.0..6.28),
                    rng.gen_range(0.0..6.28),
                ),
            }
        })
        .collect()
}

#[test]
fn test_ghz_chain_across_four_devices() {
    let gates = vec![
        Gate::h(0),
        Gate::cnot(0, 1),
        Gate::cnot(1, 2),
        Gate::cnot(2, 3),
    ];
    assert_matches_oracle(4, 4, gates, CompileConfig::per_gate_only());
}

#[test]
fn test_random_circuits_single_device() {
    for seed in 0..3 {
        let gates = random_gates(6, 40, seed);
        assert_matches_oracle(6, 1, gates, CompileConfig::per_gate_only());
    }
}

#[test]
fn test_random_circuits_two_devices() {
    for seed in 10..13 {
        let gates = random_gates(6, 40, seed);
        assert_matches_oracle(6, 2, gates.clone(), CompileConfig::per_gate_only());
        let mut cfg = CompileConfig::per_gate_only();
        cfg.enable_overlap = true;
        assert_matches_oracle(6, 2, gates, cfg);
    }
}

#[test]
fn test_random_circuits_four_devices() {
    for seed in 20..23 {
        let gates = random_gates(7, 50, seed);
        let mut cfg = CompileConfig::per_gate_only();
        cfg.enable_overlap = true;
        assert_matches_oracle(7, 4, gates, cfg);
    }
}

#[test]
fn test_mixed_backend_matches_oracle() {
    let gates = random_gates(7, 60, 99);
    let mut config = CompileConfig::default();
    config.backend = GpuBackend::Mixed;
    config.local_qubit_size = 5;
    config.enable_overlap = false;
    assert_matches_oracle(7, 2, gates, config);
}

#[test]
fn test_blas_backend_matches_oracle() {
    let gates = random_gates(6, 30, 123);
    let mut config = CompileConfig::blas_only();
    config.enable_overlap = false;
    assert_matches_oracle(6, 2, gates, config);
}

#[test]
fn test_coalesce_seeding_preserves_semantics() {
    let gates = random_gates(7, 40, 7);
    let mut config = CompileConfig::per_gate_only();
    config.coalesce_global = 3;
    assert_matches_oracle(7, 2, gates, config);
}

#[test]
fn test_chunked_mode_matches_oracle() {
    // the chunked walker tracks non-diagonal targets only, so the circuit
    // sticks to single-qubit and diagonal gates
    let gates = vec![
        Gate::h(0),
        Gate::h(1),
        Gate::rz(5, 0.4),
        Gate::h(5),
        Gate::z(4),
        Gate::h(2),
        Gate::cz(0, 5),
        Gate::h(4),
    ];
    let mut config = CompileConfig::per_gate_only();
    config.mode = Mode::Chunked;
    config.chunk_size = 2;
    assert_matches_oracle(6, 2, gates, config);
}

#[test]
fn test_inplace_exchange_matches_oracle() {
    // in-place boundaries skip the transpose and pin the low qubits into
    // every pass; the amplitudes must land in the same places
    let gates = random_gates(6, 40, 31);
    let mut config = CompileConfig::per_gate_only();
    config.inplace = 1;
    assert_matches_oracle(6, 2, gates, config);
}

#[test]
fn test_flat_backend_matches_oracle() {
    let gates = random_gates(6, 30, 55);
    let mut config = CompileConfig::per_gate_only();
    config.backend = GpuBackend::Baseline;
    assert_matches_oracle(6, 1, gates, config);
}

#[test]
fn test_per_gate_flat_matches_oracle() {
    let gates = random_gates(6, 30, 56);
    let mut config = CompileConfig::per_gate_only();
    config.backend = GpuBackend::PerGateFlat;
    assert_matches_oracle(6, 1, gates, config);
}

#[test]
fn test_density_matrix_double_pass() {
    // one logical qubit as a 2-qubit density matrix: H|0><0|H = |+><+|,
    // every entry 1/2
    let gates = vec![Gate::h(0)];
    let mut circuit = Circuit::with_gates(2, gates).unwrap();
    let topology = Topology::single();
    let mut config = CompileConfig::per_gate_only();
    config.mode = Mode::DensityMatrix;
    let evaluator = CalibratedEvaluator::default();
    let mut collective = LocalCollective::new();
    circuit
        .compile(&topology, &config, &evaluator, &mut collective)
        .unwrap();
    let mut backend = CpuCluster::new();
    circuit
        .run(&mut backend, &topology, &config, true, true)
        .unwrap();
    for idx in 0..4 {
        let amp = circuit.amp_at(idx).unwrap().amp;
        assert_relative_eq!(amp.re, 0.5, epsilon = 1e-12);
        assert_relative_eq!(amp.im, 0.0, epsilon = 1e-12);
    }
}

#[test]
fn test_density_matrix_phase_gate() {
    // S|+><+|S† has off-diagonal entries ∓i/2
    let gates = vec![Gate::h(0), Gate::s(0)];
    let mut circuit = Circuit::with_gates(2, gates).unwrap();
    let topology = Topology::single();
    let mut config = CompileConfig::per_gate_only();
    config.mode = Mode::DensityMatrix;
    let evaluator = CalibratedEvaluator::default();
    let mut collective = LocalCollective::new();
    circuit
        .compile(&topology, &config, &evaluator, &mut collective)
        .unwrap();
    let mut backend = CpuCluster::new();
    circuit
        .run(&mut backend, &topology, &config, true, true)
        .unwrap();
    // diagonal entries stay 1/2
    assert_relative_eq!(circuit.amp_at(0).unwrap().amp.re, 0.5, epsilon = 1e-12);
    assert_relative_eq!(circuit.amp_at(3).unwrap().amp.re, 0.5, epsilon = 1e-12);
    // off-diagonals pick up the S phase
    let off = circuit.amp_at(1).unwrap().amp;
    assert_relative_eq!(off.norm(), 0.5, epsilon = 1e-12);
    assert_relative_eq!(off.re, 0.0, epsilon = 1e-12);
}
