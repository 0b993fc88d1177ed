//! The collective-transport collaborator contract
//!
//! Compile-time cross-rank interaction is exactly one broadcast of the
//! serialized schedule; result extraction gathers per-rank buffers. The
//! amplitude all-to-all is device-side and lives on the
//! [`ClusterBackend`](crate::backend::ClusterBackend).

use crate::error::Result;

/// Rank-level collectives
pub trait Collective {
    /// Rank of this process
    fn rank(&self) -> usize;

    fn num_ranks(&self) -> usize;

    /// Broadcast `buf` from `root` to every rank. On non-root ranks the
    /// buffer is replaced with the root's bytes.
    fn broadcast(&mut self, buf: &mut Vec<u8>, root: usize) -> Result<()>;

    /// Gather every rank's buffer, in rank order
    fn gather(&mut self, local: &[u8]) -> Result<Vec<Vec<u8>>>;

    fn barrier(&mut self);
}

/// Single-rank transport: every collective is a no-op
#[derive(Debug, Default)]
pub struct LocalCollective;

impl LocalCollective {
    pub fn new() -> Self {
        Self
    }
}

impl Collective for LocalCollective {
    fn rank(&self) -> usize {
        0
    }

    fn num_ranks(&self) -> usize {
        1
    }

    fn broadcast(&mut self, _buf: &mut Vec<u8>, _root: usize) -> Result<()> {
        Ok(())
    }

    fn gather(&mut self, local: &[u8]) -> Result<Vec<Vec<u8>>> {
        Ok(vec![local.to_vec()])
    }

    fn barrier(&mut self) {}
}
