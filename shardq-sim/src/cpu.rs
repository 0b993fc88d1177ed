//! Host-memory reference cluster
//!
//! [`CpuCluster`] emulates the device fleet in host memory: one buffer per
//! device, each holding `2^(N−G)` amplitudes, with the device index
//! supplying the global bits. Kernels are straightforward amplitude loops
//! (parallel over devices); boundary movement is realized as the direct
//! permutation between the two pass states — the semantics the transpose
//! and all-to-all of a real backend must compose to. This is the backend
//! the executor tests run against.

use crate::backend::ClusterBackend;
use crate::error::{Result, SimError};
use num_complex::Complex64;
use rayon::prelude::*;
use shardq_compiler::{GateGroup, LocalGroup, State};
use shardq_core::{Gate, GateKind};

const ZERO: Complex64 = Complex64::new(0.0, 0.0);

pub struct CpuCluster {
    num_qubits: usize,
    global_bit: usize,
    buffers: Vec<Vec<Complex64>>,
}

impl CpuCluster {
    pub fn new() -> Self {
        Self {
            num_qubits: 0,
            global_bit: 0,
            buffers: Vec::new(),
        }
    }

    fn num_local(&self) -> usize {
        self.num_qubits - self.global_bit
    }

    fn check_ready(&self) -> Result<()> {
        if self.buffers.is_empty() {
            return Err(SimError::Device("state vector not initialized".into()));
        }
        Ok(())
    }

    /// Move every amplitude from `from`'s physical placement to `to`'s
    fn permute(&mut self, from: &State, to: &State) {
        let num_local = self.num_local();
        let local_len = 1usize << num_local;
        let mut next = vec![vec![ZERO; local_len]; self.buffers.len()];
        for (dev, buf) in self.buffers.iter().enumerate() {
            for (idx, &amp) in buf.iter().enumerate() {
                let phys_old = (dev << num_local) | idx;
                let mut phys_new = 0usize;
                for p in 0..self.num_qubits {
                    if phys_old >> p & 1 == 1 {
                        let q = from.qubit_at(p);
                        phys_new |= 1 << to.position_of(q);
                    }
                }
                next[phys_new >> num_local][phys_new & (local_len - 1)] = amp;
            }
        }
        self.buffers = next;
    }

    fn apply_group(&mut self, gg: &GateGroup, state: &State, conjugate: bool) -> Result<()> {
        self.check_ready()?;
        let gates: Vec<Gate> = if conjugate {
            gg.gates.iter().map(|g| g.conjugated()).collect()
        } else {
            gg.gates.clone()
        };
        let num_local = self.num_local();
        self.buffers
            .par_iter_mut()
            .enumerate()
            .for_each(|(dev, buf)| {
                for gate in &gates {
                    apply_gate(buf, dev, gate, state, num_local);
                }
            });
        Ok(())
    }
}

impl Default for CpuCluster {
    fn default() -> Self {
        Self::new()
    }
}

/// Physical bit `p` of amplitude `(dev, idx)`
#[inline]
fn bit(dev: usize, idx: usize, p: usize, num_local: usize) -> usize {
    if p < num_local {
        idx >> p & 1
    } else {
        dev >> (p - num_local) & 1
    }
}

fn apply_gate(buf: &mut [Complex64], dev: usize, gate: &Gate, state: &State, num_local: usize) {
    let m = gate.matrix();
    match gate.kind() {
        GateKind::Single { target } => {
            let p = state.position_of(*target);
            if gate.is_diagonal() {
                if p >= num_local {
                    let b = dev >> (p - num_local) & 1;
                    let f = m[b][b];
                    for a in buf.iter_mut() {
                        *a *= f;
                    }
                } else {
                    let mask = 1usize << p;
                    for (i, a) in buf.iter_mut().enumerate() {
                        let b = (i & mask != 0) as usize;
                        *a *= m[b][b];
                    }
                }
            } else {
                let mask = 1usize << p;
                for i in 0..buf.len() {
                    if i & mask == 0 {
                        let j = i | mask;
                        let (a, b) = (buf[i], buf[j]);
                        buf[i] = m[0][0] * a + m[0][1] * b;
                        buf[j] = m[1][0] * a + m[1][1] * b;
                    }
                }
            }
        }
        GateKind::Controlled { control, target } => {
            let pc = state.position_of(*control);
            let pt = state.position_of(*target);
            if gate.is_diagonal() {
                for i in 0..buf.len() {
                    if bit(dev, i, pc, num_local) == 1 {
                        let b = bit(dev, i, pt, num_local);
                        buf[i] *= m[b][b];
                    }
                }
            } else {
                let cm = 1usize << pc;
                let tm = 1usize << pt;
                for i in 0..buf.len() {
                    if i & cm != 0 && i & tm == 0 {
                        let j = i | tm;
                        let (a, b) = (buf[i], buf[j]);
                        buf[i] = m[0][0] * a + m[0][1] * b;
                        buf[j] = m[1][0] * a + m[1][1] * b;
                    }
                }
            }
        }
        GateKind::TwoQubit { partner, target } => {
            let pp = state.position_of(*partner);
            let pt = state.position_of(*target);
            if gate.is_diagonal() {
                // parity phase: equal bits take m00, differing bits m11
                for i in 0..buf.len() {
                    let x = bit(dev, i, pp, num_local) ^ bit(dev, i, pt, num_local);
                    buf[i] *= m[x][x];
                }
            } else {
                // mixes each amplitude with its double-flip partner
                let mask = (1usize << pp) | (1usize << pt);
                let tm = 1usize << pt;
                for i in 0..buf.len() {
                    if i & tm == 0 {
                        let j = i ^ mask;
                        let (a, b) = (buf[i], buf[j]);
                        buf[i] = m[0][0] * a + m[0][1] * b;
                        buf[j] = m[1][0] * a + m[1][1] * b;
                    }
                }
            }
        }
        GateKind::MultiControlled { controls, target } => {
            let pt = state.position_of(*target);
            if gate.is_diagonal() {
                for i in 0..buf.len() {
                    let armed = controls
                        .iter()
                        .all(|&c| bit(dev, i, state.position_of(c), num_local) == 1);
                    if armed {
                        let b = bit(dev, i, pt, num_local);
                        buf[i] *= m[b][b];
                    }
                }
            } else {
                let mut cm = 0usize;
                for &c in controls.iter() {
                    cm |= 1 << state.position_of(c);
                }
                let tm = 1usize << pt;
                for i in 0..buf.len() {
                    if i & cm == cm && i & tm == 0 {
                        let j = i | tm;
                        let (a, b) = (buf[i], buf[j]);
                        buf[i] = m[0][0] * a + m[0][1] * b;
                        buf[j] = m[1][0] * a + m[1][1] * b;
                    }
                }
            }
        }
    }
}

impl ClusterBackend for CpuCluster {
    fn init_state(&mut self, num_qubits: usize, global_bit: usize) -> Result<()> {
        if global_bit >= num_qubits {
            return Err(SimError::Device(format!(
                "{} global bits leave no local qubits of {}",
                global_bit, num_qubits
            )));
        }
        self.num_qubits = num_qubits;
        self.global_bit = global_bit;
        let local_len = 1usize << (num_qubits - global_bit);
        self.buffers = vec![vec![ZERO; local_len]; 1 << global_bit];
        self.buffers[0][0] = Complex64::new(1.0, 0.0);
        Ok(())
    }

    fn launch_per_gate_group(
        &mut self,
        gg: &GateGroup,
        state: &State,
        conjugate: bool,
    ) -> Result<()> {
        self.apply_group(gg, state, conjugate)
    }

    fn launch_blas_group(
        &mut self,
        gg: &GateGroup,
        state: &State,
        conjugate: bool,
    ) -> Result<()> {
        // the dense multiply is gate-by-gate application over the gathered
        // low qubits; amplitude arithmetic is identical on the host
        self.apply_group(gg, state, conjugate)
    }

    fn transpose(&mut self, from: &State, to: &State) -> Result<()> {
        self.check_ready()?;
        let num_local = self.num_local();
        debug_assert!((num_local..self.num_qubits)
            .all(|slot| from.qubit_at(slot) == to.qubit_at(slot)));
        self.permute(from, to);
        Ok(())
    }

    fn exchange(&mut self, from: &State, lg: &LocalGroup) -> Result<()> {
        self.check_ready()?;
        self.permute(from, &lg.state);
        Ok(())
    }

    fn dm_transpose(&mut self, state: &State) -> Result<()> {
        self.check_ready()?;
        if self.num_qubits % 2 != 0 {
            return Err(SimError::Device(
                "density-matrix transpose needs an even qubit count".into(),
            ));
        }
        let half = self.num_qubits / 2;
        let low_mask = (1usize << half) - 1;
        let num_local = self.num_local();
        let local_len = 1usize << num_local;
        let mut next = vec![vec![ZERO; local_len]; self.buffers.len()];
        for (dev, buf) in self.buffers.iter().enumerate() {
            for (idx, &amp) in buf.iter().enumerate() {
                let phys = (dev << num_local) | idx;
                let mut logical = 0usize;
                for p in 0..self.num_qubits {
                    if phys >> p & 1 == 1 {
                        logical |= 1 << state.qubit_at(p);
                    }
                }
                let swapped = (logical >> half) | ((logical & low_mask) << half);
                let mut phys_new = 0usize;
                for q in 0..self.num_qubits {
                    if swapped >> q & 1 == 1 {
                        phys_new |= 1 << state.position_of(q);
                    }
                }
                next[phys_new >> num_local][phys_new & (local_len - 1)] = amp;
            }
        }
        self.buffers = next;
        Ok(())
    }

    fn get_amp(&self, device: usize, local_idx: u64) -> Result<Complex64> {
        self.check_ready()?;
        self.buffers
            .get(device)
            .and_then(|b| b.get(local_idx as usize))
            .copied()
            .ok_or_else(|| {
                SimError::Device(format!("amplitude ({}, {}) out of range", device, local_idx))
            })
    }

    fn copy_back(&self) -> Result<Vec<Complex64>> {
        self.check_ready()?;
        let mut out = Vec::with_capacity(self.buffers.len() * self.buffers[0].len());
        for buf in &self.buffers {
            out.extend_from_slice(buf);
        }
        Ok(out)
    }

    fn destroy(&mut self) {
        self.buffers.clear();
    }

    fn num_devices(&self) -> usize {
        self.buffers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use shardq_compiler::Backend;

    fn group_of(gates: Vec<Gate>) -> GateGroup {
        let mut gg = GateGroup::new(Backend::PerGate);
        for g in gates {
            gg.add_gate(g, None, true);
        }
        gg
    }

    #[test]
    fn test_hadamard_on_single_device() {
        let mut c = CpuCluster::new();
        c.init_state(2, 0).unwrap();
        let st = State::identity(2);
        c.launch_per_gate_group(&group_of(vec![Gate::h(0)]), &st, false)
            .unwrap();
        let v = c.copy_back().unwrap();
        assert_relative_eq!(v[0].re, std::f64::consts::FRAC_1_SQRT_2, epsilon = 1e-12);
        assert_relative_eq!(v[1].re, std::f64::consts::FRAC_1_SQRT_2, epsilon = 1e-12);
        assert_relative_eq!(v[2].norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_global_diagonal_phases_by_device() {
        // 2 qubits, 1 global: qubit 1 lives in the device index
        let mut c = CpuCluster::new();
        c.init_state(2, 1).unwrap();
        let st = State::identity(2);
        c.launch_per_gate_group(&group_of(vec![Gate::h(0)]), &st, false)
            .unwrap();
        // Z on the global qubit phases device 1 only; device 0 holds all
        // the weight and must be untouched
        c.launch_per_gate_group(&group_of(vec![Gate::z(1)]), &st, false)
            .unwrap();
        let a00 = c.get_amp(0, 0).unwrap();
        assert_relative_eq!(a00.re, std::f64::consts::FRAC_1_SQRT_2, epsilon = 1e-12);
        let v = c.copy_back().unwrap();
        assert_relative_eq!(v[2].norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_exchange_relocates_amplitudes() {
        // 3 qubits, 1 global; amplitude sits at |q1=1> and q1 swaps into
        // the global slot
        let mut c = CpuCluster::new();
        c.init_state(3, 1).unwrap();
        let st = State::identity(3);
        c.launch_per_gate_group(&group_of(vec![Gate::x(1)]), &st, false)
            .unwrap();
        // new pass: qubit 1 global, qubit 2 local in its place
        let mut lg = LocalGroup::new();
        lg.state = State::from_layout(vec![0, 2, 1]);
        c.exchange(&st, &lg).unwrap();
        // |q1=1> now lives on device 1 at local index 0
        assert_relative_eq!(c.get_amp(1, 0).unwrap().re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(c.get_amp(0, 2).unwrap().norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rzz_parity_phase() {
        let mut c = CpuCluster::new();
        c.init_state(2, 0).unwrap();
        let st = State::identity(2);
        c.launch_per_gate_group(
            &group_of(vec![Gate::x(0), Gate::rzz(0, 1, std::f64::consts::PI)]),
            &st,
            false,
        )
        .unwrap();
        let v = c.copy_back().unwrap();
        // |01>: bits differ, phase e^{i pi / 2} = i
        assert_relative_eq!(v[1].im, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_conjugated_application() {
        let mut c = CpuCluster::new();
        c.init_state(1, 0).unwrap();
        let st = State::identity(1);
        c.launch_per_gate_group(&group_of(vec![Gate::x(0), Gate::s(0)]), &st, true)
            .unwrap();
        // conj(S) puts -i on |1>
        let v = c.copy_back().unwrap();
        assert_relative_eq!(v[1].im, -1.0, epsilon = 1e-12);
    }
}
