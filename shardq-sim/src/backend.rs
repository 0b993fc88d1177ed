//! The device-side collaborator contract
//!
//! Everything the executor needs from a cluster of devices, as one trait:
//! state-vector lifetime, the two kernel families, permutation movement,
//! and amplitude access. The schedule compiler knows nothing of this; the
//! executor drives any implementation against a [`Schedule`]'s states and
//! descriptors.
//!
//! [`Schedule`]: shardq_compiler::Schedule

use crate::error::Result;
use num_complex::Complex64;
use shardq_compiler::{GateGroup, LocalGroup, State};

/// A cluster of devices holding one partitioned state vector
///
/// Amplitude `i` of device `d` holds the amplitude whose physical index is
/// `(d << num_local) | i`; the mapping from logical indices goes through
/// the current [`State`].
pub trait ClusterBackend {
    /// Allocate the partitioned state vector as `|0…0⟩`
    fn init_state(&mut self, num_qubits: usize, global_bit: usize) -> Result<()>;

    /// Apply a per-gate group under `state`'s layout
    ///
    /// `conjugate` applies the element-wise conjugated payloads (the
    /// second density-matrix pass).
    fn launch_per_gate_group(
        &mut self,
        gg: &GateGroup,
        state: &State,
        conjugate: bool,
    ) -> Result<()>;

    /// Apply a BLAS group under `state`'s layout (its qubits already
    /// gathered into the low positions)
    fn launch_blas_group(&mut self, gg: &GateGroup, state: &State, conjugate: bool)
        -> Result<()>;

    /// Local permutation within each device: `from` and `to` agree on
    /// every global slot
    fn transpose(&mut self, from: &State, to: &State) -> Result<()>;

    /// Boundary movement into pass `lg`: transpose plus the all-to-all
    /// described by `lg`'s descriptors
    fn exchange(&mut self, from: &State, lg: &LocalGroup) -> Result<()>;

    /// Swap the row and column qubit halves of a density matrix laid out
    /// as a `2n`-qubit state vector
    fn dm_transpose(&mut self, state: &State) -> Result<()>;

    /// One amplitude by device and local index
    fn get_amp(&self, device: usize, local_idx: u64) -> Result<Complex64>;

    /// The full state vector in physical order (device-major)
    fn copy_back(&self) -> Result<Vec<Complex64>>;

    /// Release device memory
    fn destroy(&mut self);

    fn num_devices(&self) -> usize;
}
