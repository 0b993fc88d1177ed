//! End-to-end scheduler invariants
//!
//! Every schedule, whatever the packing decisions, must cover the input
//! exactly once, respect gate order up to diagonal commutation, keep every
//! pass inside its budget, and survive the wire format bit-for-bit.

use rand::prelude::*;
use shardq_compiler::{CalibratedEvaluator, Compiler, Schedule};
use shardq_core::{CompileConfig, Gate, GpuBackend, QubitSet};

fn compile(
    num_qubits: usize,
    global_bit: usize,
    gates: Vec<Gate>,
    config: CompileConfig,
) -> Schedule {
    let eval = CalibratedEvaluator::default();
    Compiler::new(num_qubits, global_bit, gates, config, &eval)
        .unwrap()
        .run()
        .unwrap()
}

/// Gates in execution order: per pass, hoisted work then full groups
fn flatten(schedule: &Schedule) -> Vec<Gate> {
    schedule.flatten_gates()
}

/// Coverage plus order-up-to-diagonal-commutation
///
/// Maps every executed gate back to an input position (first unused value
/// match), then demands that any same-qubit pair that is not diagonal on
/// both sides keeps its input order.
fn check_coverage_and_order(input: &[Gate], schedule: &Schedule) {
    let flat = flatten(schedule);
    assert_eq!(flat.len(), input.len(), "gate count mismatch");
    let mut used = vec![false; input.len()];
    let mut flat_ids = Vec::with_capacity(flat.len());
    for g in &flat {
        let id = (0..input.len())
            .find(|&i| !used[i] && &input[i] == g)
            .expect("executed gate not found in input");
        used[id] = true;
        flat_ids.push(id);
    }
    assert!(used.iter().all(|&u| u), "input gate never executed");
    for a in 0..flat_ids.len() {
        for b in (a + 1)..flat_ids.len() {
            let (ia, ib) = (flat_ids[a], flat_ids[b]);
            let ga = &input[ia];
            let gb = &input[ib];
            let shared = ga.qubit_set() & gb.qubit_set();
            if !shared.is_empty() && !(ga.is_diagonal() && gb.is_diagonal()) {
                assert!(
                    ia < ib,
                    "order violation: input {} executed after input {}",
                    ia,
                    ib
                );
            }
        }
    }
}

fn check_pass_invariants(schedule: &Schedule, num_qubits: usize, global_bit: usize) {
    let num_local = num_qubits - global_bit;
    for lg in &schedule.local_groups {
        assert_eq!(lg.related_qubits.len(), num_local, "pass local count");
        assert!(lg.state.is_consistent(), "layout/pos inverse broken");
        assert_eq!(lg.state.num_qubits(), num_qubits);
        for gg in lg.full_groups.iter().chain(lg.overlap_groups.iter()) {
            for g in &gg.gates {
                if !g.is_diagonal() {
                    assert!(
                        g.qubit_set().is_subset_of(lg.related_qubits),
                        "non-diagonal gate {:?} outside pass locals {}",
                        g,
                        lg.related_qubits
                    );
                }
            }
        }
    }
    assert!(schedule.final_state.is_consistent());
}

fn check_round_trip(schedule: &Schedule, num_qubits: usize, global_bit: usize) {
    let buf = schedule.serialize();
    let mut back = Schedule::deserialize(&buf, num_qubits).unwrap();
    back.init_plans(num_qubits, global_bit, false);
    assert_eq!(&back, schedule, "round trip changed the schedule");
    assert_eq!(back.serialize(), buf, "re-serialization not byte-stable");
}

#[test]
fn test_all_local_single_pass() {
    let gates = vec![Gate::h(0), Gate::h(1), Gate::cnot(0, 1)];
    let sched = compile(4, 0, gates.clone(), CompileConfig::per_gate_only());
    assert_eq!(sched.local_groups.len(), 1);
    let lg = &sched.local_groups[0];
    assert_eq!(lg.full_groups.len(), 1);
    assert_eq!(
        lg.full_groups[0].related_qubits,
        QubitSet::from_bits(0b0011)
    );
    assert_eq!(lg.state.layout(), &[0, 1, 2, 3]);
    check_coverage_and_order(&gates, &sched);
    check_pass_invariants(&sched, 4, 0);
    check_round_trip(&sched, 4, 0);
}

#[test]
fn test_far_qubits_made_local() {
    let gates = vec![Gate::h(0), Gate::h(3), Gate::cnot(0, 3)];
    let sched = compile(4, 1, gates.clone(), CompileConfig::per_gate_only());
    // some pass has {0, 3} simultaneously local and runs the CX there
    let cx_pass = sched
        .local_groups
        .iter()
        .find(|lg| lg.gates_in_order().any(|g| g.is_control_gate()))
        .expect("CX scheduled nowhere");
    assert!(cx_pass.related_qubits.contains(0) && cx_pass.related_qubits.contains(3));
    check_coverage_and_order(&gates, &sched);
    check_pass_invariants(&sched, 4, 1);
    check_round_trip(&sched, 4, 1);
}

#[test]
fn test_diagonals_ride_in_one_pass() {
    let gates = vec![Gate::rz(0, 0.3), Gate::rz(1, 0.7), Gate::h(0)];
    let sched = compile(3, 0, gates.clone(), CompileConfig::per_gate_only());
    assert_eq!(sched.local_groups.len(), 1);
    assert_eq!(sched.num_gates(), 3);
    check_coverage_and_order(&gates, &sched);
    check_round_trip(&sched, 3, 0);
}

#[test]
fn test_move_back_hoists_commuting_tail() {
    let gates = vec![
        Gate::h(0),
        Gate::h(1),
        Gate::h(2),
        Gate::h(3),
        Gate::cnot(3, 4),
        Gate::h(3),
    ];
    let plain = compile(5, 1, gates.clone(), CompileConfig::per_gate_only());
    let mut cfg = CompileConfig::per_gate_only();
    cfg.enable_overlap = true;
    let overlapped = compile(5, 1, gates.clone(), cfg);

    assert_eq!(plain.num_overlap_gates(), 0);
    check_coverage_and_order(&gates, &plain);
    check_coverage_and_order(&gates, &overlapped);
    check_pass_invariants(&plain, 5, 1);
    check_pass_invariants(&overlapped, 5, 1);
    if overlapped.local_groups.len() > 1 {
        assert!(overlapped.num_overlap_gates() > 0);
        assert!(overlapped.num_full_gates() < plain.num_full_gates());
        // hoisted work fits the tightened budget
        for lg in &overlapped.local_groups {
            for gg in &lg.overlap_groups {
                assert!(gg.related_qubits.len() <= 5 - 2);
            }
        }
    }
    check_round_trip(&overlapped, 5, 1);
}

#[test]
fn test_hundred_single_qubit_gates_one_group() {
    let mut rng = StdRng::seed_from_u64(42);
    let gates: Vec<Gate> = (0..100)
        .map(|_| {
            let q = rng.gen_range(0..10);
            match rng.gen_range(0..4) {
                0 => Gate::h(q),
                1 => Gate::x(q),
                2 => Gate::rz(q, rng.gen_range(0.0..6.28)),
                _ => Gate::ry(q, rng.gen_range(0.0..6.28)),
            }
        })
        .collect();
    let sched = compile(10, 0, gates.clone(), CompileConfig::per_gate_only());
    assert_eq!(sched.local_groups.len(), 1);
    assert_eq!(sched.local_groups[0].full_groups.len(), 1);
    // order inside the single group is exactly the input order
    let flat = flatten(&sched);
    assert_eq!(flat, gates);
    check_round_trip(&sched, 10, 0);
}

#[test]
fn test_randomized_invariants_across_partitions() {
    let mut rng = StdRng::seed_from_u64(7);
    for &global_bit in &[0usize, 1, 2] {
        let num_qubits = 8;
        let gates: Vec<Gate> = (0..60)
            .map(|_| {
                let q = rng.gen_range(0..num_qubits);
                let r = (q + 1 + rng.gen_range(0..num_qubits - 1)) % num_qubits;
                match rng.gen_range(0..7) {
                    0 => Gate::h(q),
                    1 => Gate::rz(q, rng.gen_range(0.0..6.28)),
                    2 => Gate::cnot(q, r),
                    3 => Gate::cz(q, r),
                    4 => Gate::rzz(q, r, rng.gen_range(0.0..6.28)),
                    5 => Gate::rxx(q, r, rng.gen_range(0.0..6.28)),
                    _ => Gate::u3(
                        q,
                        rng.gen_range(0.0..3.14),
                        rng.gen_range(0.0..6.28),
                        rng.gen_range(0.0..6.28),
                    ),
                }
            })
            .collect();
        for config in [CompileConfig::per_gate_only(), {
            let mut c = CompileConfig::per_gate_only();
            c.enable_overlap = true;
            c
        }] {
            let sched = compile(num_qubits, global_bit, gates.clone(), config);
            check_coverage_and_order(&gates, &sched);
            check_pass_invariants(&sched, num_qubits, global_bit);
            check_round_trip(&sched, num_qubits, global_bit);
        }
    }
}

#[test]
fn test_mixed_backend_invariants() {
    let mut rng = StdRng::seed_from_u64(11);
    let num_qubits = 9;
    let gates: Vec<Gate> = (0..80)
        .map(|_| {
            let q = rng.gen_range(0..num_qubits);
            let r = (q + 1 + rng.gen_range(0..num_qubits - 1)) % num_qubits;
            match rng.gen_range(0..3) {
                0 => Gate::h(q),
                1 => Gate::cnot(q, r),
                _ => Gate::rz(q, rng.gen_range(0.0..6.28)),
            }
        })
        .collect();
    let mut config = CompileConfig::default();
    config.backend = GpuBackend::Mixed;
    config.coalesce_global = 0;
    config.local_qubit_size = 5;
    let sched = compile(num_qubits, 1, gates.clone(), config);
    check_coverage_and_order(&gates, &sched);
    check_pass_invariants(&sched, num_qubits, 1);
    check_round_trip(&sched, num_qubits, 1);
}

#[test]
fn test_multi_controlled_gates_schedule() {
    let gates = vec![
        Gate::h(0),
        Gate::mc_phase(&[0, 1], 2, 0.4),
        Gate::mc_u(&[3], 4, *Gate::x(0).matrix()),
        Gate::h(4),
    ];
    let sched = compile(6, 1, gates.clone(), CompileConfig::per_gate_only());
    check_coverage_and_order(&gates, &sched);
    check_pass_invariants(&sched, 6, 1);
    check_round_trip(&sched, 6, 1);
}
