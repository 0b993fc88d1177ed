//! Budget-driven pass packing
//!
//! [`SimpleCompiler`] drains the residual circuit into successive groups,
//! each fitting the local-qubit budget. With a white-list it stops after
//! one group; the move-back optimizer uses that to ask "what single
//! group's worth of gates could run over there instead".

use crate::error::{CompileError, Result};
use crate::group::{Backend, GateGroup};
use crate::one_layer::OneLayerCompiler;
use crate::schedule::LocalGroup;
use shardq_core::{Gate, QubitSet};

/// Word count for the simple compiler's gate batch (2048 gates)
const BATCH_WORDS: usize = 32;

pub struct SimpleCompiler {
    base: OneLayerCompiler<BATCH_WORDS>,
    local_size: usize,
    local_qubits: Option<QubitSet>,
    enable_global: bool,
    white_list: QubitSet,
    required: QubitSet,
}

impl SimpleCompiler {
    /// * `local_size` — qubit budget per group
    /// * `local_qubits` — the set treated as local for diagonal admission
    ///   (`None` for unrestricted)
    /// * `white_list` — when nonempty, pins the admissible qubits and
    ///   limits the run to a single group
    /// * `required` — qubits pre-seeded into every group's mask
    pub fn new(
        num_qubits: usize,
        local_size: usize,
        local_qubits: Option<QubitSet>,
        input_gates: Vec<Gate>,
        enable_global: bool,
        white_list: QubitSet,
        required: QubitSet,
    ) -> Self {
        Self {
            base: OneLayerCompiler::new(num_qubits, input_gates),
            local_size,
            local_qubits,
            enable_global,
            white_list,
            required,
        }
    }

    pub fn run(&mut self) -> Result<LocalGroup> {
        // A white-listed run may legitimately carry an oversized seed: it
        // then selects nothing (or only free-riding diagonals). Standalone
        // runs with an unsatisfiable pin are caller bugs.
        if self.white_list.is_empty() && self.required.len() > self.local_size {
            return Err(CompileError::RequiredExceedsBudget {
                required: self.required.len(),
                budget: self.local_size,
            });
        }
        let num_qubits = self.base.num_qubits();
        let mut lg = LocalGroup::new();

        // Degenerate one-pass case: everything is local, pack it all.
        if self.local_size == num_qubits {
            let mut gg = GateGroup::new(Backend::PerGate);
            for g in self.base.remain_gates() {
                gg.add_gate(g.clone(), self.local_qubits, self.enable_global);
            }
            lg.related_qubits = gg.related_qubits;
            lg.full_groups.push(gg);
            return Ok(lg);
        }

        let mut cnt = 0;
        while self.base.gates_left() {
            let full = if self.white_list.is_empty() {
                QubitSet::EMPTY
            } else {
                self.white_list.complement_within(num_qubits)
            };
            let related = vec![self.required; num_qubits];
            let idx = self.base.get_group_opt(
                full,
                related,
                self.enable_global,
                self.local_size,
                self.local_qubits,
            );
            let mut gg = GateGroup::new(Backend::PerGate);
            for &x in &idx {
                gg.add_gate(
                    self.base.remain_gates()[x].clone(),
                    self.local_qubits,
                    self.enable_global,
                );
            }
            lg.related_qubits |= gg.related_qubits;
            lg.full_groups.push(gg);
            self.base.remove_gates_opt(&idx);
            if !self.white_list.is_empty() {
                break;
            }
            cnt += 1;
            assert!(cnt < 1000, "simple compiler failed to drain the circuit");
        }
        Ok(lg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_single_pass() {
        let gates = vec![Gate::h(0), Gate::h(1), Gate::cnot(0, 1)];
        let mut c = SimpleCompiler::new(
            4,
            4,
            None,
            gates,
            true,
            QubitSet::EMPTY,
            QubitSet::EMPTY,
        );
        let lg = c.run().unwrap();
        assert_eq!(lg.full_groups.len(), 1);
        assert_eq!(lg.full_groups[0].gates.len(), 3);
        assert_eq!(lg.related_qubits, QubitSet::from_iter([0, 1]));
    }

    #[test]
    fn test_drains_into_multiple_groups() {
        // budget 1: each Hadamard needs its own qubit slot, but the greedy
        // cover still packs per-qubit runs together
        let gates = vec![Gate::h(0), Gate::h(1), Gate::h(0)];
        let mut c = SimpleCompiler::new(
            2,
            1,
            None,
            gates,
            false,
            QubitSet::EMPTY,
            QubitSet::EMPTY,
        );
        let lg = c.run().unwrap();
        let total: usize = lg.full_groups.iter().map(|g| g.gates.len()).sum();
        assert_eq!(total, 3);
        assert!(lg.full_groups.len() >= 2);
        for gg in &lg.full_groups {
            assert!(gg.related_qubits.len() <= 1);
        }
    }

    #[test]
    fn test_white_list_stops_after_one_group() {
        let gates = vec![Gate::h(0), Gate::h(1), Gate::h(0), Gate::h(1)];
        let mut c = SimpleCompiler::new(
            2,
            1,
            None,
            gates,
            false,
            QubitSet::singleton(0),
            QubitSet::EMPTY,
        );
        let lg = c.run().unwrap();
        assert_eq!(lg.full_groups.len(), 1);
        // only qubit-0 gates are admissible
        for g in &lg.full_groups[0].gates {
            assert_eq!(g.target_qubit(), 0);
        }
    }

    #[test]
    fn test_required_larger_than_budget_rejected() {
        let mut c = SimpleCompiler::new(
            4,
            1,
            None,
            vec![Gate::h(0)],
            false,
            QubitSet::EMPTY,
            QubitSet::from_iter([1, 2]),
        );
        assert!(matches!(
            c.run(),
            Err(CompileError::RequiredExceedsBudget { .. })
        ));
    }
}
