//! Circuit front-end
//!
//! [`Circuit`] owns the gate list and walks the whole pipeline: compile on
//! rank 0, broadcast the serialized schedule, rebuild plans on every rank,
//! drive the executor, and map logical amplitude indices through the final
//! permutation for result extraction. Timing lines go to the log facade
//! with a stable schema.

use crate::backend::ClusterBackend;
use crate::error::{Result, SimError};
use crate::executor::Executor;
use crate::transport::Collective;
use ahash::AHashMap;
use log::{debug, info};
use num_complex::Complex64;
use shardq_compiler::{Backend, Compiler, Evaluator, GateGroup, Schedule, State};
use shardq_core::{CompileConfig, Gate, GpuBackend, Mode, Topology};
use std::fmt;
use std::time::Instant;

/// One reported amplitude: logical index plus value
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ResultItem {
    pub index: u64,
    pub amp: Complex64,
}

impl fmt::Display for ResultItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.8} {:+.8}i",
            self.index, self.amp.re, self.amp.im
        )
    }
}

/// A circuit and everything produced from it
pub struct Circuit {
    num_qubits: usize,
    gates: Vec<Gate>,
    schedule: Schedule,
    result: Vec<Complex64>,
}

impl Circuit {
    pub fn new(num_qubits: usize) -> Self {
        Self {
            num_qubits,
            gates: Vec::new(),
            schedule: Schedule::new(),
            result: Vec::new(),
        }
    }

    /// Build from a complete gate list, validating operands
    pub fn with_gates(num_qubits: usize, gates: Vec<Gate>) -> Result<Self> {
        let mut circuit = Self::new(num_qubits);
        for gate in gates {
            circuit.add_gate(gate)?;
        }
        Ok(circuit)
    }

    pub fn add_gate(&mut self, gate: Gate) -> Result<()> {
        gate.validate(self.num_qubits)?;
        self.gates.push(gate);
        Ok(())
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    fn gate_histogram(&self) -> AHashMap<&'static str, usize> {
        let mut hist = AHashMap::new();
        for g in &self.gates {
            *hist.entry(g.name()).or_insert(0) += 1;
        }
        hist
    }

    fn master_compile(
        &mut self,
        global_bit: usize,
        config: &CompileConfig,
        evaluator: &dyn Evaluator,
    ) -> Result<()> {
        info!("Total Gates {}", self.gates.len());
        debug!("gate histogram: {:?}", self.gate_histogram());
        if config.backend.is_scheduled() {
            let mut compiler = Compiler::new(
                self.num_qubits,
                global_bit,
                self.gates.clone(),
                config.clone(),
                evaluator,
            )?;
            self.schedule = compiler.run()?;
            info!(
                "Total Groups: {} {} {} {}",
                self.schedule.local_groups.len(),
                self.schedule.num_full_groups(),
                self.schedule.num_full_gates(),
                self.schedule.num_overlap_gates()
            );
        } else {
            self.schedule = Schedule {
                local_groups: Vec::new(),
                final_state: State::identity(self.num_qubits),
            };
        }
        Ok(())
    }

    /// Compile on rank 0 and distribute; every rank ends with an identical
    /// schedule, plans rebuilt locally
    pub fn compile<C: Collective>(
        &mut self,
        topology: &Topology,
        config: &CompileConfig,
        evaluator: &dyn Evaluator,
        collective: &mut C,
    ) -> Result<()> {
        let global_bit = topology.global_bits();
        let start = Instant::now();
        if collective.rank() == 0 {
            self.master_compile(global_bit, config, evaluator)?;
            let mut buf = self.schedule.serialize();
            collective.broadcast(&mut buf, 0)?;
        } else {
            let mut buf = Vec::new();
            collective.broadcast(&mut buf, 0)?;
            self.schedule = Schedule::deserialize(&buf, self.num_qubits)?;
        }
        let mid = Instant::now();
        self.schedule
            .init_plans(self.num_qubits, global_bit, config.inplace > 0);
        let end = Instant::now();
        let d1 = mid.duration_since(start).as_micros();
        let d2 = end.duration_since(mid).as_micros();
        info!("Compile Time: {} us + {} us = {} us", d1, d2, d1 + d2);
        Ok(())
    }

    /// Execute on the backend; returns elapsed microseconds
    pub fn run<B: ClusterBackend>(
        &mut self,
        backend: &mut B,
        topology: &Topology,
        config: &CompileConfig,
        copy_back: bool,
        destroy: bool,
    ) -> Result<u64> {
        let global_bit = topology.global_bits();
        let start = Instant::now();
        match config.backend {
            GpuBackend::Baseline => {
                self.run_flat(backend, global_bit, self.gates.clone())?;
            }
            GpuBackend::PerGateFlat => {
                let gates = self.schedule.flatten_gates();
                self.run_flat(backend, global_bit, gates)?;
            }
            _ => {
                backend.init_state(self.num_qubits, global_bit)?;
                let mut exec =
                    Executor::new(backend, &self.schedule, self.num_qubits, global_bit);
                match config.mode {
                    Mode::DensityMatrix => exec.run_density()?,
                    _ => exec.run(false)?,
                };
            }
        }
        let elapsed = start.elapsed().as_micros() as u64;
        info!("Time Cost: {} us", elapsed);
        if copy_back {
            self.result = backend.copy_back()?;
        }
        if destroy {
            backend.destroy();
        }
        Ok(elapsed)
    }

    /// Serial fallback: every gate applied in input order on one device,
    /// final layout reset to the identity
    fn run_flat<B: ClusterBackend>(
        &mut self,
        backend: &mut B,
        global_bit: usize,
        gates: Vec<Gate>,
    ) -> Result<()> {
        if global_bit != 0 {
            return Err(SimError::Unsupported(
                "flat execution runs on a single device".into(),
            ));
        }
        backend.init_state(self.num_qubits, 0)?;
        let mut gg = GateGroup::new(Backend::PerGate);
        gg.gates = gates;
        backend.launch_per_gate_group(&gg, &State::identity(self.num_qubits), false)?;
        self.schedule.final_state = State::identity(self.num_qubits);
        Ok(())
    }

    /// Physical amplitude index of a logical one, through the final
    /// permutation
    pub fn to_physical_id(&self, idx: u64) -> u64 {
        let pos = self.schedule.final_state.pos();
        let mut id = 0u64;
        for (i, &p) in pos.iter().enumerate() {
            if idx >> i & 1 == 1 {
                id |= 1 << p;
            }
        }
        id
    }

    /// Logical amplitude index of a physical one
    pub fn to_logic_id(&self, idx: u64) -> u64 {
        let pos = self.schedule.final_state.pos();
        let mut id = 0u64;
        for (i, &p) in pos.iter().enumerate() {
            if idx >> p & 1 == 1 {
                id |= 1 << i;
            }
        }
        id
    }

    /// Amplitude of a logical basis state (needs a prior `copy_back` run)
    pub fn amp_at(&self, idx: u64) -> Result<ResultItem> {
        let phys = self.to_physical_id(idx) as usize;
        let amp = self.result.get(phys).copied().ok_or_else(|| {
            SimError::Device("no results: run with copy_back first".into())
        })?;
        Ok(ResultItem { index: idx, amp })
    }

    /// The leading amplitudes plus every amplitude above the reporting
    /// threshold, sorted by logical index
    pub fn state_report(&self) -> Result<Vec<ResultItem>> {
        let total = 1u64 << self.num_qubits;
        let leading = total.min(128);
        let mut items = Vec::new();
        for idx in 0..leading {
            items.push(self.amp_at(idx)?);
        }
        for (phys, &amp) in self.result.iter().enumerate() {
            if amp.norm_sqr() > 0.001 {
                let logical = self.to_logic_id(phys as u64);
                if logical >= leading {
                    items.push(ResultItem {
                        index: logical,
                        amp,
                    });
                }
            }
        }
        items.sort_by_key(|item| item.index);
        Ok(items)
    }
}
