//! Gate groups: one kernel launch's worth of gates
//!
//! A [`GateGroup`] is an ordered subsequence of the input circuit that a
//! single launch can execute, together with the mask of qubits it touches
//! and the backend it was packed for. Gates keep their input order.

use crate::state::State;
use shardq_core::{Gate, QubitSet};

/// Execution backend a gate group is packed for
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Backend {
    /// Shared-memory kernel launching one stage per gate
    #[default]
    PerGate = 0,
    /// Dense small-matrix multiplication over amplitude chunks
    Blas = 1,
}

impl Backend {
    pub(crate) const fn tag(self) -> u8 {
        self as u8
    }

    pub(crate) const fn from_tag(tag: u8) -> Option<Backend> {
        match tag {
            0 => Some(Backend::PerGate),
            1 => Some(Backend::Blas),
            _ => None,
        }
    }
}

/// An ordered run of gates executed as one launch
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GateGroup {
    /// Gates in original input order
    pub gates: Vec<Gate>,
    /// Union of the qubits the group acts on, per the backend's admission
    /// rule
    pub related_qubits: QubitSet,
    pub backend: Backend,
}

impl GateGroup {
    pub fn new(backend: Backend) -> Self {
        Self {
            gates: Vec::new(),
            related_qubits: QubitSet::EMPTY,
            backend,
        }
    }

    /// The mask after admitting `gate` into a group whose mask is `prev`
    ///
    /// Non-diagonal gates bring all their operands into the mask. Under
    /// global mode a diagonal gate only needs its locally-resident
    /// operands in the mask (intersected with `local_qubits` when a local
    /// set is known, nothing when unrestricted): the rest act as pure
    /// phases from wherever they live.
    pub fn new_related(
        prev: QubitSet,
        gate: &Gate,
        local_qubits: Option<QubitSet>,
        enable_global: bool,
    ) -> QubitSet {
        if enable_global && gate.is_diagonal() {
            return match local_qubits {
                Some(lq) => prev | (gate.qubit_set() & lq),
                None => prev,
            };
        }
        prev | gate.qubit_set()
    }

    /// Append `gate` and grow the mask accordingly
    pub fn add_gate(&mut self, gate: Gate, local_qubits: Option<QubitSet>, enable_global: bool) {
        self.related_qubits =
            Self::new_related(self.related_qubits, &gate, local_qubits, enable_global);
        self.gates.push(gate);
    }

    /// The state after this group's internal transposition
    ///
    /// Per-gate groups run in whatever layout they are handed. BLAS groups
    /// first gather their qubits into the lowest physical positions so the
    /// dense multiply sees a contiguous chunk; `cutt_size` bounds the
    /// local window the transposition may touch, so qubits outside it
    /// (globals, in-flight overlap slots) stay put — phases on those are
    /// the kernel's business. The result is a pure function of the group
    /// and the incoming state, so the executor re-derives it on any rank.
    pub fn init_state(&self, state: &State, cutt_size: usize) -> State {
        match self.backend {
            Backend::PerGate => state.clone(),
            Backend::Blas => {
                let mut st = state.clone();
                let mut targets: Vec<usize> = self
                    .related_qubits
                    .iter()
                    .filter(|&q| state.position_of(q) < cutt_size)
                    .collect();
                targets.sort_by_key(|&q| state.position_of(q));
                for (slot, &q) in targets.iter().enumerate() {
                    let p = st.position_of(q);
                    if p != slot {
                        st.swap_positions(p, slot);
                    }
                }
                st
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_gate_grows_mask() {
        let mut gg = GateGroup::new(Backend::PerGate);
        gg.add_gate(Gate::h(0), None, false);
        gg.add_gate(Gate::cnot(1, 3), None, false);
        assert_eq!(gg.related_qubits, QubitSet::from_iter([0, 1, 3]));
        assert_eq!(gg.gates.len(), 2);
    }

    #[test]
    fn test_global_diagonal_does_not_constrain_mask() {
        let mut gg = GateGroup::new(Backend::PerGate);
        gg.add_gate(Gate::rz(5, 0.7), None, true);
        assert!(gg.related_qubits.is_empty());
    }

    #[test]
    fn test_global_diagonal_local_part_enters_mask() {
        let locals = QubitSet::from_iter([0, 1, 2]);
        let related = GateGroup::new_related(
            QubitSet::EMPTY,
            &Gate::cz(1, 5),
            Some(locals),
            true,
        );
        assert_eq!(related, QubitSet::singleton(1));
    }

    #[test]
    fn test_non_diagonal_always_constrains() {
        let locals = QubitSet::from_iter([0, 1, 2]);
        let related =
            GateGroup::new_related(QubitSet::EMPTY, &Gate::cnot(1, 5), Some(locals), true);
        assert_eq!(related, QubitSet::from_iter([1, 5]));
    }

    #[test]
    fn test_blas_init_state_gathers_low() {
        let mut gg = GateGroup::new(Backend::Blas);
        gg.add_gate(Gate::h(3), None, false);
        gg.add_gate(Gate::cnot(3, 5), None, false);
        let st = gg.init_state(&State::identity(8), 8);
        // qubits {3, 5} gathered into positions 0 and 1
        assert_eq!(st.position_of(3), 0);
        assert_eq!(st.position_of(5), 1);
        assert!(st.is_consistent());
    }

    #[test]
    fn test_per_gate_init_state_is_identity() {
        let mut gg = GateGroup::new(Backend::PerGate);
        gg.add_gate(Gate::h(3), None, true);
        let st0 = State::identity(6);
        assert_eq!(gg.init_state(&st0, 6), st0);
    }
}
