//! Per-group backend selection
//!
//! [`AdvanceCompiler`] re-packs one pass's gates into launch-sized groups,
//! choosing for each group between the per-gate kernel and the dense BLAS
//! path by predicted cost per gate. Per-gate candidates are seeded with
//! the low layout positions so kernel memory access stays coalesced; BLAS
//! candidates are tried at every matrix size in 4..8 and the cheapest
//! winner takes the group.

use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::group::{Backend, GateGroup};
use crate::one_layer::OneLayerCompiler;
use crate::schedule::LocalGroup;
use crate::state::State;
use log::trace;
use shardq_core::{Gate, GateType, QubitSet};

/// Word count for the advance compiler's gate batch (512 gates)
const BATCH_WORDS: usize = 8;

pub struct AdvanceCompiler<'e> {
    base: OneLayerCompiler<BATCH_WORDS>,
    /// The enclosing pass's local qubit set
    local_qubits: QubitSet,
    /// Qubits the BLAS path may not touch (in flight during overlap)
    blas_forbid: QubitSet,
    enable_global: bool,
    global_bit: usize,
    coalesce_global: usize,
    evaluator: &'e dyn Evaluator,
}

impl<'e> AdvanceCompiler<'e> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        num_qubits: usize,
        local_qubits: QubitSet,
        blas_forbid: QubitSet,
        input_gates: Vec<Gate>,
        enable_global: bool,
        global_bit: usize,
        coalesce_global: usize,
        evaluator: &'e dyn Evaluator,
    ) -> Self {
        Self {
            base: OneLayerCompiler::new(num_qubits, input_gates),
            local_qubits,
            blas_forbid,
            enable_global,
            global_bit,
            coalesce_global,
            evaluator,
        }
    }

    /// Seed every qubit's mask with the lowest layout positions
    fn coalesce_seeds(&self, state: &State) -> Vec<QubitSet> {
        let mut seed = QubitSet::EMPTY;
        for j in 0..self.coalesce_global {
            seed.insert(state.qubit_at(j));
        }
        vec![seed; self.base.num_qubits()]
    }

    fn blas_candidate(&self, mat_size: usize) -> Vec<usize> {
        self.base.get_group_opt(
            self.blas_forbid,
            vec![QubitSet::EMPTY; self.base.num_qubits()],
            false,
            mat_size,
            Some(self.local_qubits | self.blas_forbid),
        )
    }

    /// Pack all remaining gates, mutating `state` through each group's
    /// internal transposition
    pub fn run(
        &mut self,
        state: &mut State,
        use_per_gate: bool,
        use_blas: bool,
        per_gate_size: usize,
        blas_size: usize,
        cutt_size: usize,
    ) -> Result<LocalGroup> {
        assert!(use_per_gate || use_blas);
        let nlq = self.base.num_qubits() - self.global_bit;
        let mut lg = LocalGroup::new();
        let mut cnt = 0;
        while self.base.gates_left() {
            let mut cache_related = QubitSet::EMPTY;
            let (gg_idx, backend) = if use_per_gate && use_blas {
                let related = self.coalesce_seeds(state);
                cache_related = related[0];
                let mut best_idx =
                    self.base
                        .get_group_opt(QubitSet::EMPTY, related, true, per_gate_size, None);
                let mut best_backend = Backend::PerGate;
                let mut best_eff = if best_idx.is_empty() {
                    1e10
                } else {
                    let tys: Vec<GateType> = best_idx
                        .iter()
                        .map(|&x| self.base.remain_gates()[x].gate_type())
                        .collect();
                    self.evaluator.perf_per_gate(nlq, &tys) / best_idx.len() as f64
                };
                for mat_size in 4..8 {
                    let idx = self.blas_candidate(mat_size);
                    if idx.is_empty() {
                        continue;
                    }
                    let eff = self.evaluator.perf_blas(nlq, mat_size) / idx.len() as f64;
                    if eff < best_eff {
                        best_idx = idx;
                        best_backend = Backend::Blas;
                        best_eff = eff;
                    }
                }
                (best_idx, best_backend)
            } else if use_per_gate {
                let related = self.coalesce_seeds(state);
                cache_related = related[0];
                let idx = self.base.get_group_opt(
                    QubitSet::EMPTY,
                    related,
                    self.enable_global,
                    per_gate_size,
                    None,
                );
                (idx, Backend::PerGate)
            } else {
                (self.blas_candidate(blas_size), Backend::Blas)
            };

            let mut gg = GateGroup::new(backend);
            match backend {
                Backend::PerGate => {
                    for &x in &gg_idx {
                        gg.add_gate(
                            self.base.remain_gates()[x].clone(),
                            None,
                            self.enable_global,
                        );
                    }
                    gg.related_qubits |= cache_related;
                }
                Backend::Blas => {
                    for &x in &gg_idx {
                        gg.add_gate(
                            self.base.remain_gates()[x].clone(),
                            Some(self.local_qubits),
                            false,
                        );
                    }
                }
            }
            trace!(
                "packed {:?} group: {} gates on {}",
                backend,
                gg.gates.len(),
                gg.related_qubits
            );
            *state = gg.init_state(state, cutt_size);
            self.base.remove_gates_opt(&gg_idx);
            lg.related_qubits |= gg.related_qubits;
            lg.full_groups.push(gg);
            cnt += 1;
            assert!(cnt < 1000, "advance compiler failed to drain the gate group");
        }
        Ok(lg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Evaluator;

    /// Fixed-cost evaluator: lets a test force either backend
    struct FixedEvaluator {
        per_gate: f64,
        blas: f64,
    }

    impl Evaluator for FixedEvaluator {
        fn perf_per_gate(&self, _nlq: usize, gate_types: &[GateType]) -> f64 {
            self.per_gate * gate_types.len() as f64
        }
        fn perf_blas(&self, _nlq: usize, _mat_size: usize) -> f64 {
            self.blas
        }
    }

    fn sample_gates() -> Vec<Gate> {
        vec![Gate::h(0), Gate::cnot(0, 1), Gate::h(2), Gate::h(1)]
    }

    #[test]
    fn test_cheap_per_gate_wins() {
        let eval = FixedEvaluator {
            per_gate: 1.0,
            blas: 1e9,
        };
        let locals = QubitSet::all_below(6);
        let mut c = AdvanceCompiler::new(
            6,
            locals,
            QubitSet::EMPTY,
            sample_gates(),
            true,
            0,
            0,
            &eval,
        );
        let mut state = State::identity(6);
        let lg = c.run(&mut state, true, true, 6, 7, 6).unwrap();
        for gg in &lg.full_groups {
            assert_eq!(gg.backend, Backend::PerGate);
        }
        assert_eq!(
            lg.full_groups.iter().map(|g| g.gates.len()).sum::<usize>(),
            4
        );
    }

    #[test]
    fn test_cheap_blas_wins() {
        let eval = FixedEvaluator {
            per_gate: 1e9,
            blas: 1.0,
        };
        let locals = QubitSet::all_below(6);
        let mut c = AdvanceCompiler::new(
            6,
            locals,
            QubitSet::EMPTY,
            sample_gates(),
            true,
            0,
            0,
            &eval,
        );
        let mut state = State::identity(6);
        let lg = c.run(&mut state, true, true, 6, 7, 6).unwrap();
        for gg in &lg.full_groups {
            assert_eq!(gg.backend, Backend::Blas);
        }
    }

    #[test]
    fn test_blas_groups_permute_state() {
        let eval = FixedEvaluator {
            per_gate: 1.0,
            blas: 1.0,
        };
        let locals = QubitSet::all_below(6);
        let gates = vec![Gate::h(4), Gate::h(5)];
        let mut c =
            AdvanceCompiler::new(6, locals, QubitSet::EMPTY, gates, false, 0, 0, &eval);
        let mut state = State::identity(6);
        let lg = c.run(&mut state, false, true, 6, 4, 6).unwrap();
        assert!(lg.full_groups.iter().all(|g| g.backend == Backend::Blas));
        // the BLAS transposition gathered {4, 5} into the low positions
        assert!(state.position_of(4) < 2 || state.position_of(5) < 2);
        assert!(state.is_consistent());
    }

    #[test]
    fn test_per_gate_tolerates_global_diagonals() {
        let eval = FixedEvaluator {
            per_gate: 1.0,
            blas: 1e9,
        };
        // qubit 5 is global; the diagonal Rz(5) must still be packed
        let locals = QubitSet::all_below(5);
        let gates = vec![Gate::h(0), Gate::rz(5, 0.3)];
        let mut c = AdvanceCompiler::new(6, locals, QubitSet::EMPTY, gates, true, 1, 0, &eval);
        let mut state = State::identity(6);
        let lg = c.run(&mut state, true, false, 5, 7, 5).unwrap();
        assert_eq!(
            lg.full_groups.iter().map(|g| g.gates.len()).sum::<usize>(),
            2
        );
        // the global diagonal did not enter the mask
        assert!(!lg.related_qubits.contains(5));
    }
}
