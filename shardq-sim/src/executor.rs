//! Schedule execution
//!
//! [`Executor`] walks a [`Schedule`] against a [`ClusterBackend`]: for
//! each pass, move the amplitudes to the pass's layout, run the hoisted
//! overlap groups (work that a real backend interleaves with the exchange
//! still in flight), then the pass's own launches. Per-group BLAS
//! transpositions are re-derived here with the same pure function the
//! compiler used, so no rank depends on unserialized compile state.

use crate::backend::ClusterBackend;
use crate::error::{Result, SimError};
use shardq_compiler::{Backend, GateGroup, Schedule, State};

pub struct Executor<'a, B: ClusterBackend> {
    backend: &'a mut B,
    schedule: &'a Schedule,
    num_qubits: usize,
    global_bit: usize,
}

impl<'a, B: ClusterBackend> Executor<'a, B> {
    pub fn new(
        backend: &'a mut B,
        schedule: &'a Schedule,
        num_qubits: usize,
        global_bit: usize,
    ) -> Self {
        Self {
            backend,
            schedule,
            num_qubits,
            global_bit,
        }
    }

    fn launch(&mut self, gg: &GateGroup, state: &State, conjugate: bool) -> Result<()> {
        match gg.backend {
            Backend::PerGate => self.backend.launch_per_gate_group(gg, state, conjugate),
            Backend::Blas => self.backend.launch_blas_group(gg, state, conjugate),
        }
    }

    /// Apply one gate group, transposing into its layout first when the
    /// group needs one, and return the state it left behind
    fn run_group(
        &mut self,
        gg: &GateGroup,
        state: State,
        cutt_size: usize,
        conjugate: bool,
    ) -> Result<State> {
        let next = gg.init_state(&state, cutt_size);
        if next != state {
            self.backend.transpose(&state, &next)?;
        }
        self.launch(gg, &next, conjugate)?;
        Ok(next)
    }

    /// Run the whole schedule once; returns the ending state
    pub fn run(&mut self, conjugate: bool) -> Result<State> {
        let num_local = self.num_qubits - self.global_bit;
        let mut current: Option<State> = None;
        for (lg_id, lg) in self.schedule.local_groups.iter().enumerate() {
            if lg_id > 0 {
                let prev = current.take().ok_or_else(|| {
                    SimError::Device("executor lost track of the pass state".into())
                })?;
                self.backend.exchange(&prev, lg)?;
            }
            let mut st = lg.state.clone();
            for gg in &lg.overlap_groups {
                st = self.run_group(gg, st, num_local - self.global_bit, conjugate)?;
            }
            for gg in &lg.full_groups {
                st = self.run_group(gg, st, num_local, conjugate)?;
            }
            current = Some(st);
        }
        let end = current.unwrap_or_else(|| State::identity(self.num_qubits));
        debug_assert!(
            self.schedule.local_groups.is_empty() || end == self.schedule.final_state,
            "executor state diverged from the compiled final state"
        );
        Ok(end)
    }

    /// Density-matrix evolution: the schedule twice, transposing the
    /// row/column halves in between and conjugating the second pass
    pub fn run_density(&mut self) -> Result<State> {
        let end = self.run(false)?;
        self.backend.dm_transpose(&end)?;
        if let Some(first) = self.schedule.local_groups.first() {
            if first.state != end {
                self.backend.exchange(&end, first)?;
            }
        }
        self.run(true)
    }
}
