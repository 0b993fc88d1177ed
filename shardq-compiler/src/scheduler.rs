//! The schedule compiler
//!
//! [`Compiler`] turns a raw gate list into a [`Schedule`]: pack the
//! circuit into passes under the local-qubit budget, hoist commuting tails
//! across pass boundaries, pick a global/local partition per pass that
//! reuses the previous placement, and re-pack every pass for the execution
//! backends under the cost model.

use crate::advance::AdvanceCompiler;
use crate::chunk::ChunkCompiler;
use crate::error::{CompileError, Result};
use crate::evaluator::Evaluator;
use crate::group::GateGroup;
use crate::schedule::{LocalGroup, Schedule};
use crate::simple::SimpleCompiler;
use crate::state::State;
use log::debug;
use shardq_core::{CompileConfig, Gate, GpuBackend, Mode, QubitSet, MAX_QUBITS};

/// Remove each gate of `to_remove` (by value, first match) from `gates`
fn remove_gates(gates: &mut Vec<Gate>, to_remove: &[Gate]) {
    for r in to_remove {
        if let Some(p) = gates.iter().position(|g| g == r) {
            gates.remove(p);
        }
    }
}

/// Compiles a circuit into a schedule for an `N`-qubit system with `G`
/// global bits
pub struct Compiler<'e> {
    num_qubits: usize,
    global_bit: usize,
    local_size: usize,
    gates: Vec<Gate>,
    config: CompileConfig,
    evaluator: &'e dyn Evaluator,
}

impl<'e> Compiler<'e> {
    pub fn new(
        num_qubits: usize,
        global_bit: usize,
        gates: Vec<Gate>,
        config: CompileConfig,
        evaluator: &'e dyn Evaluator,
    ) -> Result<Self> {
        if num_qubits > MAX_QUBITS {
            return Err(shardq_core::CoreError::TooManyQubits(num_qubits).into());
        }
        if global_bit >= num_qubits {
            return Err(CompileError::InvalidPartition {
                num_qubits,
                global_bits: global_bit,
            });
        }
        config.validate()?;
        if config.enable_overlap && num_qubits < 2 * global_bit {
            return Err(CompileError::InvalidPartition {
                num_qubits,
                global_bits: global_bit,
            });
        }
        if config.mode == Mode::DensityMatrix && config.enable_overlap {
            return Err(CompileError::UnsupportedConfig(
                "overlap groups are not supported in density-matrix mode".into(),
            ));
        }
        let local_size = num_qubits - global_bit;
        let enable_global = config.mode != Mode::Chunked;
        for gate in &gates {
            gate.validate(num_qubits)?;
            let footprint =
                GateGroup::new_related(QubitSet::EMPTY, gate, None, enable_global);
            if footprint.len() > local_size {
                return Err(CompileError::GateExceedsBudget {
                    gate: format!("{:?}", gate),
                    needed: footprint.len(),
                    available: local_size,
                });
            }
        }
        if config.backend.use_blas() && !config.backend.use_per_gate() {
            for gate in &gates {
                if gate.is_mc_gate() && gate.controls().len() + 1 > config.blas_mat_limit {
                    return Err(CompileError::UnsupportedGate {
                        name: gate.name(),
                        reason: format!(
                            "{} controls exceed the BLAS matrix limit {}",
                            gate.controls().len(),
                            config.blas_mat_limit
                        ),
                    });
                }
            }
        }
        Ok(Self {
            num_qubits,
            global_bit,
            local_size,
            gates,
            config,
            evaluator,
        })
    }

    /// Pad every pass's local set with the lowest unused qubits until it
    /// holds exactly `N − G` members: a pass occupies all local slots
    fn fill_locals(&self, lg: &mut LocalGroup) {
        for gg in &mut lg.full_groups {
            assert!(gg.related_qubits.len() <= self.local_size);
            gg.related_qubits = gg.related_qubits.filled_to(self.local_size);
        }
    }

    /// For each adjacent pass pair, find the tail of the earlier pass that
    /// could equivalently run at the head of the later one, and move it
    ///
    /// Works on the reversed gate list: a one-group compile white-listed
    /// to the earlier pass's qubits and seeded with the later pass's
    /// qubits yields exactly the gates whose dependency closure fits over
    /// there. Returns `(gates, related)` per pass id.
    fn move_to_next(&self, lg: &mut LocalGroup) -> Result<Vec<(Vec<Gate>, QubitSet)>> {
        let mut result = Vec::with_capacity(lg.full_groups.len());
        if !self.config.enable_overlap || self.config.mode == Mode::Chunked {
            for _ in 0..lg.full_groups.len() {
                result.push((Vec::new(), QubitSet::EMPTY));
            }
            return Ok(result);
        }
        result.push((Vec::new(), QubitSet::EMPTY));
        for i in 1..lg.full_groups.len() {
            let mut gates = lg.full_groups[i - 1].gates.clone();
            gates.reverse();
            assert!(!lg.full_groups[i - 1].related_qubits.is_empty());
            let back_enable_global = self.config.backend != GpuBackend::Blas;
            let budget = self.num_qubits - 2 * self.global_bit;
            let mut back_compiler = SimpleCompiler::new(
                self.num_qubits,
                budget,
                None,
                gates,
                back_enable_global,
                lg.full_groups[i - 1].related_qubits,
                lg.full_groups[i].related_qubits,
            );
            let to_remove = back_compiler.run()?;
            if to_remove.full_groups.is_empty() {
                result.push((Vec::new(), QubitSet::EMPTY));
                continue;
            }
            assert_eq!(
                to_remove.full_groups.len(),
                1,
                "move-back produced more than one group"
            );
            let mut hoisted = to_remove.full_groups[0].gates.clone();
            hoisted.reverse();
            remove_gates(&mut lg.full_groups[i - 1].gates, &hoisted);
            result.push((hoisted, to_remove.full_groups[0].related_qubits));
            lg.full_groups[i].related_qubits |= to_remove.related_qubits;
        }
        Ok(result)
    }

    pub fn run(&mut self) -> Result<Schedule> {
        if !self.config.backend.is_scheduled() {
            return Ok(Schedule {
                local_groups: Vec::new(),
                final_state: State::identity(self.num_qubits),
            });
        }
        let enable_global = self.config.mode != Mode::Chunked;

        let mut local_group = if self.config.mode == Mode::Chunked {
            ChunkCompiler::new(
                self.num_qubits,
                self.local_size,
                self.config.chunk_size,
                self.gates.clone(),
            )?
            .run()
        } else {
            let inplace_size = self.config.inplace.min(self.local_size.saturating_sub(2));
            let required = QubitSet::from_bits((1u64 << inplace_size) - 1);
            SimpleCompiler::new(
                self.num_qubits,
                self.local_size,
                None,
                self.gates.clone(),
                enable_global,
                QubitSet::EMPTY,
                required,
            )
            .run()?
        };

        let move_back = self.move_to_next(&mut local_group)?;
        self.fill_locals(&mut local_group);
        debug!(
            "packed {} passes over {} gates",
            local_group.full_groups.len(),
            self.gates.len()
        );

        let mut schedule = Schedule::new();
        let mut state = State::identity(self.num_qubits);
        let num_local = self.local_size;
        let (use_per_gate, use_blas) = (
            self.config.backend.use_per_gate(),
            self.config.backend.use_blas(),
        );

        for id in 0..local_group.full_groups.len() {
            let gg_related = local_group.full_groups[id].related_qubits;
            let gg_gates = local_group.full_groups[id].gates.clone();

            let mut new_globals: Vec<usize> = (0..self.num_qubits)
                .filter(|&q| !gg_related.contains(q))
                .collect();
            assert_eq!(new_globals.len(), self.global_bit);

            // Reuse existing global placements: any new global already in
            // a global slot keeps that slot, iterated to a fixed point.
            let mut overlap_globals = QubitSet::EMPTY;
            loop {
                let mut modified = false;
                overlap_globals = QubitSet::EMPTY;
                for i in 0..new_globals.len() {
                    let gp = state.position_of(new_globals[i]);
                    if gp >= num_local {
                        let p = gp - num_local;
                        new_globals.swap(p, i);
                        overlap_globals.insert(p);
                        if p != i {
                            modified = true;
                        }
                    }
                }
                if !modified {
                    break;
                }
            }

            let mut lg = LocalGroup::new();
            lg.related_qubits = gg_related;
            state = if id == 0 {
                lg.init_first_group_state(state, self.num_qubits, &new_globals)
            } else if self.config.inplace > 0 {
                lg.init_state_inplace(
                    state,
                    self.num_qubits,
                    &new_globals,
                    overlap_globals,
                    self.global_bit,
                )
            } else {
                lg.init_state(
                    state,
                    self.num_qubits,
                    &new_globals,
                    overlap_globals,
                    move_back[id].1,
                    self.global_bit,
                )
            };

            let mut overlap_locals = gg_related;
            let mut overlap_blas_forbid = QubitSet::EMPTY;
            if id > 0 {
                let prev_related = local_group.full_groups[id - 1].related_qubits;
                overlap_locals &= prev_related;
                overlap_blas_forbid = gg_related.difference(prev_related);
            }

            let mut overlap_compiler = AdvanceCompiler::new(
                self.num_qubits,
                overlap_locals,
                overlap_blas_forbid,
                move_back[id].0.clone(),
                enable_global,
                self.global_bit,
                self.config.coalesce_global,
                self.evaluator,
            );
            lg.overlap_groups = overlap_compiler
                .run(
                    &mut state,
                    use_per_gate,
                    use_blas,
                    self.config.local_qubit_size,
                    self.config.blas_mat_limit,
                    num_local - self.global_bit,
                )?
                .full_groups;

            let mut full_compiler = AdvanceCompiler::new(
                self.num_qubits,
                gg_related,
                QubitSet::EMPTY,
                gg_gates,
                enable_global,
                self.global_bit,
                self.config.coalesce_global,
                self.evaluator,
            );
            lg.full_groups = full_compiler
                .run(
                    &mut state,
                    use_per_gate,
                    use_blas,
                    self.config.local_qubit_size,
                    self.config.blas_mat_limit,
                    num_local,
                )?
                .full_groups;

            schedule.local_groups.push(lg);
        }
        schedule.final_state = state;
        schedule.init_plans(self.num_qubits, self.global_bit, self.config.inplace > 0);
        debug!(
            "schedule: {} passes, {} launches, {} gates",
            schedule.local_groups.len(),
            schedule.num_full_groups(),
            schedule.num_gates()
        );
        Ok(schedule)
    }
}
