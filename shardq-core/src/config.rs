//! Scheduler tunables
//!
//! Every knob the scheduler honors, as one plain runtime value threaded
//! through compilation instead of a pile of build flags.

use crate::{CoreError, Result};

/// Simulation mode
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Mode {
    /// Plain state-vector evolution
    #[default]
    StateVector,
    /// Density-matrix evolution: the schedule runs twice with a transpose
    /// between the passes
    DensityMatrix,
    /// Chunked execution: a block of low-order qubits stays resident and
    /// one high qubit at a time is swapped through
    Chunked,
}

/// Which execution backends the compiler may schedule for
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum GpuBackend {
    /// No schedule: gates applied one by one on a single device
    Baseline,
    /// Per-gate shared-memory kernels only
    PerGate,
    /// Compile normally, then flatten the schedule and run it serially
    PerGateFlat,
    /// Dense small-matrix multiplication only
    Blas,
    /// Both backends, chosen per gate group by the cost model
    #[default]
    Mixed,
    /// BLAS with host-staged matrices
    BlasHost,
}

impl GpuBackend {
    /// Whether the per-gate backend participates in group selection
    pub const fn use_per_gate(self) -> bool {
        matches!(
            self,
            GpuBackend::PerGate | GpuBackend::PerGateFlat | GpuBackend::Mixed
        )
    }

    /// Whether the BLAS backend participates in group selection
    pub const fn use_blas(self) -> bool {
        matches!(
            self,
            GpuBackend::Blas | GpuBackend::Mixed | GpuBackend::BlasHost
        )
    }

    /// Whether compilation produces a schedule at all
    pub const fn is_scheduled(self) -> bool {
        !matches!(self, GpuBackend::Baseline)
    }
}

/// Scheduler tunables
///
/// Defaults match the calibration the kernels were tuned for; tests
/// usually override `coalesce_global` and the backend.
#[derive(Clone, Debug)]
pub struct CompileConfig {
    pub mode: Mode,
    pub backend: GpuBackend,

    /// Qubit budget of one per-gate kernel launch (shared-memory tile
    /// size). At most 10.
    pub local_qubit_size: usize,

    /// Largest BLAS matrix exponent considered: matrices up to
    /// `2^blas_mat_limit` square
    pub blas_mat_limit: usize,

    /// Number of low layout positions seeded into every per-gate group so
    /// kernel memory access stays coalesced
    pub coalesce_global: usize,

    /// In-place exchange depth: 0 disables; `k` pins the lowest `2^k - 1`
    /// qubit indices into every pass and skips the boundary transpose
    pub inplace: usize,

    /// Hoist commuting tail gates of each pass into the next pass
    pub enable_overlap: bool,

    /// Resident low-qubit block size for [`Mode::Chunked`]
    pub chunk_size: usize,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            mode: Mode::StateVector,
            backend: GpuBackend::Mixed,
            local_qubit_size: 10,
            blas_mat_limit: 7,
            coalesce_global: 3,
            inplace: 0,
            enable_overlap: true,
            chunk_size: 20,
        }
    }
}

impl CompileConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-gate kernels only, no move-back. The configuration the
    /// scheduler tests use as a deterministic baseline.
    pub fn per_gate_only() -> Self {
        Self {
            backend: GpuBackend::PerGate,
            enable_overlap: false,
            coalesce_global: 0,
            ..Default::default()
        }
    }

    /// BLAS-only scheduling
    pub fn blas_only() -> Self {
        Self {
            backend: GpuBackend::Blas,
            ..Default::default()
        }
    }

    pub fn with_backend(mut self, backend: GpuBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_overlap(mut self, enable: bool) -> Self {
        self.enable_overlap = enable;
        self
    }

    /// Check parameter ranges that do not depend on the circuit
    pub fn validate(&self) -> Result<()> {
        if self.local_qubit_size == 0 || self.local_qubit_size > 10 {
            return Err(CoreError::InvalidConfig(format!(
                "local_qubit_size must be in 1..=10, got {}",
                self.local_qubit_size
            )));
        }
        if self.blas_mat_limit < 4 {
            return Err(CoreError::InvalidConfig(format!(
                "blas_mat_limit must be at least 4, got {}",
                self.blas_mat_limit
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        assert!(CompileConfig::default().validate().is_ok());
    }

    #[test]
    fn test_local_qubit_size_range() {
        let mut cfg = CompileConfig::default();
        cfg.local_qubit_size = 11;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_backend_participation() {
        assert!(GpuBackend::Mixed.use_per_gate() && GpuBackend::Mixed.use_blas());
        assert!(!GpuBackend::Blas.use_per_gate());
        assert!(!GpuBackend::PerGate.use_blas());
        assert!(!GpuBackend::Baseline.is_scheduled());
    }
}
