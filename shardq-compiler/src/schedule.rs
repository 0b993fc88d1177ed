//! Local groups and the compiled schedule
//!
//! A [`LocalGroup`] is one execution pass under a fixed global/local qubit
//! partition: the gates packed for it, the [`State`] it starts in, and the
//! communication descriptors that get the amplitudes there. A [`Schedule`]
//! is the ordered list of passes plus the final permutation.
//!
//! Transpose plans are deliberately *not* part of the serialized schedule:
//! every rank (the compiling one included) rebuilds them from the
//! serialized fields with [`Schedule::init_plans`], so no rank can drift
//! from another.

use crate::group::GateGroup;
use crate::state::State;
use shardq_core::{Gate, QubitSet};

/// A per-device local permutation applied before an exchange
///
/// `perm[i]` is the local position whose qubit moves to position `i`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransPlan {
    pub perm: Vec<usize>,
}

/// One execution pass with a fixed global/local partition
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocalGroup {
    /// The local qubits during this pass; always exactly `N − G` bits once
    /// the scheduler has filled the mask
    pub related_qubits: QubitSet,
    /// This pass's packed launches
    pub full_groups: Vec<GateGroup>,
    /// Work hoisted from the previous pass, executed while the exchange
    /// for this pass completes
    pub overlap_groups: Vec<GateGroup>,
    /// Qubit permutation at the start of this pass
    pub state: State,
    /// Chunks each device's buffer splits into for the exchange
    pub a2a_comm_size: u32,
    /// Source device per `(destination, chunk)`, row-major by destination
    pub a2a_comm: Vec<u32>,
    /// Pre-exchange local permutations; rebuilt per rank, never serialized
    pub trans_plans: Vec<TransPlan>,
}

/// Rewire `state` so that `new_globals[j]` lands in global slot `j`
///
/// Every entry of `new_globals` that is already global sits in its own
/// slot (the scheduler's reorder loop guarantees it), so each remaining
/// entry is local and a single swap per slot suffices: the incoming qubit
/// takes the outgoing qubit's local position.
fn boundary_state(state: &State, num_local: usize, new_globals: &[usize]) -> State {
    let mut st = state.clone();
    for (j, &g) in new_globals.iter().enumerate() {
        let slot = num_local + j;
        let p = st.position_of(g);
        if p != slot {
            st.swap_positions(p, slot);
        }
    }
    st
}

/// All-to-all descriptors for a boundary
///
/// `overlap_globals` marks the global slots whose qubit does not move.
/// Each device splits its buffer into one chunk per combination of the
/// moved slots; the source device for `(dst, chunk)` keeps `dst`'s bits on
/// overlap slots and takes `chunk`'s bits on moved slots (ascending slot
/// order).
fn a2a_descriptors(overlap_globals: QubitSet, global_bit: usize) -> (u32, Vec<u32>) {
    let moved_count = global_bit - overlap_globals.len();
    let comm_size = 1u32 << moved_count;
    let num_devices = 1usize << global_bit;
    let mut comm = Vec::with_capacity(num_devices * comm_size as usize);
    for dst in 0..num_devices {
        for chunk in 0..comm_size as usize {
            let mut src = 0usize;
            let mut cbit = 0;
            for j in 0..global_bit {
                let bit = if overlap_globals.contains(j) {
                    dst >> j & 1
                } else {
                    let b = chunk >> cbit & 1;
                    cbit += 1;
                    b
                };
                src |= bit << j;
            }
            comm.push(src as u32);
        }
    }
    (comm_size, comm)
}

/// The pre-exchange local permutation between two pass states
///
/// Outgoing qubits (local in `from`, global in `to`) are gathered into the
/// top local positions in the order of their destination slots; everything
/// else keeps its relative order.
fn boundary_plan(from: &State, to: &State, num_local: usize) -> TransPlan {
    let num_qubits = from.num_qubits();
    let outgoing: Vec<usize> = (num_local..num_qubits)
        .map(|slot| to.qubit_at(slot))
        .filter(|&q| from.position_of(q) < num_local)
        .collect();
    let mut order: Vec<usize> = (0..num_local)
        .map(|p| from.qubit_at(p))
        .filter(|q| !outgoing.contains(q))
        .collect();
    order.extend(outgoing.iter().copied());
    let perm = order.iter().map(|&q| from.position_of(q)).collect();
    TransPlan { perm }
}

impl LocalGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starting state of the first pass: no data moves, the initial
    /// distribution is simply declared to match
    pub fn init_first_group_state(
        &mut self,
        state: State,
        num_qubits: usize,
        new_globals: &[usize],
    ) -> State {
        let num_local = num_qubits - new_globals.len();
        let st = boundary_state(&state, num_local, new_globals);
        self.a2a_comm_size = 0;
        self.a2a_comm.clear();
        self.state = st.clone();
        st
    }

    /// Boundary into a subsequent pass: transpose, then all-to-all
    pub fn init_state(
        &mut self,
        state: State,
        num_qubits: usize,
        new_globals: &[usize],
        overlap_globals: QubitSet,
        moveback_related: QubitSet,
        global_bit: usize,
    ) -> State {
        debug_assert_eq!(new_globals.len(), global_bit);
        let num_local = num_qubits - global_bit;
        let st = boundary_state(&state, num_local, new_globals);
        // hoisted gates run during the exchange; move-back already folded
        // everything they touch into this pass's locals
        debug_assert!(moveback_related.is_subset_of(self.related_qubits));
        let (comm_size, comm) = a2a_descriptors(overlap_globals, global_bit);
        self.a2a_comm_size = comm_size;
        self.a2a_comm = comm;
        self.state = st.clone();
        st
    }

    /// Boundary realized by the in-place exchange alone (no transpose)
    pub fn init_state_inplace(
        &mut self,
        state: State,
        num_qubits: usize,
        new_globals: &[usize],
        overlap_globals: QubitSet,
        global_bit: usize,
    ) -> State {
        let num_local = num_qubits - global_bit;
        let st = boundary_state(&state, num_local, new_globals);
        let (comm_size, comm) = a2a_descriptors(overlap_globals, global_bit);
        self.a2a_comm_size = comm_size;
        self.a2a_comm = comm;
        self.state = st.clone();
        st
    }

    /// Gates of this pass in execution order (hoisted work first)
    pub fn gates_in_order(&self) -> impl Iterator<Item = &Gate> {
        self.overlap_groups
            .iter()
            .chain(self.full_groups.iter())
            .flat_map(|gg| gg.gates.iter())
    }
}

/// A compiled schedule: ordered passes plus the final permutation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schedule {
    pub local_groups: Vec<LocalGroup>,
    pub final_state: State,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total gates across all passes
    pub fn num_gates(&self) -> usize {
        self.num_full_gates() + self.num_overlap_gates()
    }

    pub fn num_full_groups(&self) -> usize {
        self.local_groups.iter().map(|lg| lg.full_groups.len()).sum()
    }

    pub fn num_full_gates(&self) -> usize {
        self.local_groups
            .iter()
            .flat_map(|lg| lg.full_groups.iter())
            .map(|gg| gg.gates.len())
            .sum()
    }

    pub fn num_overlap_gates(&self) -> usize {
        self.local_groups
            .iter()
            .flat_map(|lg| lg.overlap_groups.iter())
            .map(|gg| gg.gates.len())
            .sum()
    }

    /// All gates flattened into execution order, for serial fallbacks
    pub fn flatten_gates(&self) -> Vec<Gate> {
        self.local_groups
            .iter()
            .flat_map(|lg| lg.gates_in_order())
            .cloned()
            .collect()
    }

    /// Rebuild the transpose plans on this rank
    ///
    /// Replays the deterministic per-launch state evolution and derives
    /// each boundary's plan from the states on either side. Called on
    /// every rank after compile or deserialization; a pure function of the
    /// serialized fields.
    pub fn init_plans(&mut self, num_qubits: usize, global_bit: usize, inplace: bool) {
        let num_local = num_qubits - global_bit;
        let mut running: Option<State> = None;
        for lg in &mut self.local_groups {
            lg.trans_plans = match (&running, inplace) {
                (Some(prev), false) => vec![boundary_plan(prev, &lg.state, num_local)],
                _ => Vec::new(),
            };
            let mut st = lg.state.clone();
            for gg in &lg.overlap_groups {
                st = gg.init_state(&st, num_local - global_bit);
            }
            for gg in &lg.full_groups {
                st = gg.init_state(&st, num_local);
            }
            running = Some(st);
        }
    }

    /// Human-readable schedule dump for log inspection
    pub fn dump(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        for (i, lg) in self.local_groups.iter().enumerate() {
            let _ = writeln!(
                out,
                "pass {}: locals {} layout {:?}",
                i,
                lg.related_qubits,
                lg.state.layout()
            );
            for gg in &lg.overlap_groups {
                let _ = writeln!(out, "  overlap {:?} on {}", gg.backend, gg.related_qubits);
                for g in &gg.gates {
                    let _ = writeln!(out, "    {:?}", g);
                }
            }
            for gg in &lg.full_groups {
                let _ = writeln!(out, "  group {:?} on {}", gg.backend, gg.related_qubits);
                for g in &gg.gates {
                    let _ = writeln!(out, "    {:?}", g);
                }
            }
        }
        let _ = writeln!(out, "final layout {:?}", self.final_state.layout());
        out
    }
}
