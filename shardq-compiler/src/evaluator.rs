//! Kernel cost prediction
//!
//! The backend chooser needs microsecond estimates for "this group as one
//! per-gate launch" versus "this group as a dense multiply". The
//! [`Evaluator`] trait is that seam; the scheduler takes it by reference
//! so tests can pin costs and calibration can be swapped per machine.

use shardq_core::GateType;

/// Hardware-calibrated throughput predictor
pub trait Evaluator {
    /// Predicted microseconds for one per-gate kernel launch applying
    /// `gate_types` over `2^num_local_qubits` amplitudes
    fn perf_per_gate(&self, num_local_qubits: usize, gate_types: &[GateType]) -> f64;

    /// Predicted microseconds for one dense multiply of a
    /// `2^mat_size`-square matrix over `2^num_local_qubits` amplitudes
    fn perf_blas(&self, num_local_qubits: usize, mat_size: usize) -> f64;
}

/// Analytic cost model with bandwidth/throughput calibration constants
///
/// Per-gate launches are modeled as one amplitude sweep per gate, weighted
/// by gate shape (diagonal gates touch half the data, controlled and
/// multi-controlled shapes pay extra index math). BLAS groups pay a
/// transpose sweep plus the GEMM flops.
#[derive(Clone, Debug)]
pub struct CalibratedEvaluator {
    /// Fixed kernel launch overhead, microseconds
    pub launch_overhead_us: f64,
    /// Effective amplitude-traffic bandwidth, GB/s
    pub memory_bandwidth_gbps: f64,
    /// Effective dense-multiply throughput, TFLOP/s
    pub gemm_tflops: f64,
}

impl Default for CalibratedEvaluator {
    fn default() -> Self {
        Self {
            launch_overhead_us: 5.0,
            memory_bandwidth_gbps: 700.0,
            gemm_tflops: 9.0,
        }
    }
}

impl CalibratedEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Microseconds to stream every amplitude once
    fn sweep_us(&self, num_local_qubits: usize) -> f64 {
        let bytes = (1u64 << num_local_qubits) as f64 * 16.0;
        bytes / (self.memory_bandwidth_gbps * 1e3)
    }

    fn gate_weight(ty: GateType) -> f64 {
        let shape = match ty {
            GateType::Cnot
            | GateType::Cy
            | GateType::Cz
            | GateType::Crx
            | GateType::Cry
            | GateType::Crz
            | GateType::Cu1 => 1.1,
            GateType::Rzz | GateType::Rxx => 1.3,
            GateType::McPhase | GateType::Mcu => 1.6,
            _ => 1.0,
        };
        if ty.is_diagonal() {
            shape * 0.5
        } else {
            shape
        }
    }
}

impl Evaluator for CalibratedEvaluator {
    fn perf_per_gate(&self, num_local_qubits: usize, gate_types: &[GateType]) -> f64 {
        let sweep = self.sweep_us(num_local_qubits);
        let work: f64 = gate_types.iter().map(|&ty| Self::gate_weight(ty)).sum();
        self.launch_overhead_us + work * sweep
    }

    fn perf_blas(&self, num_local_qubits: usize, mat_size: usize) -> f64 {
        let amps = (1u64 << num_local_qubits) as f64;
        let flops = 8.0 * amps * (1u64 << mat_size) as f64;
        let gemm_us = flops / (self.gemm_tflops * 1e6);
        2.0 * self.launch_overhead_us + self.sweep_us(num_local_qubits) + gemm_us
    }
}
