//! Chunked pass packing
//!
//! [`ChunkCompiler`] schedules for the chunked execution mode: a block of
//! `chunk_size` low-order qubits is always resident, and exactly one high
//! local qubit is swapped out per pass. The compiler walks the circuit
//! linearly; a non-diagonal gate whose target is not resident closes the
//! current pass and swaps the target in for an evictable local qubit —
//! preferring the highest-numbered local above the chunk that no pending
//! gate still needs.

use crate::error::{CompileError, Result};
use crate::group::{Backend, GateGroup};
use crate::schedule::LocalGroup;
use shardq_core::{Gate, QubitSet};
use std::collections::BTreeSet;

pub struct ChunkCompiler {
    num_qubits: usize,
    local_size: usize,
    chunk_size: usize,
    remain_gates: Vec<Gate>,
}

impl ChunkCompiler {
    pub fn new(
        num_qubits: usize,
        local_size: usize,
        chunk_size: usize,
        input_gates: Vec<Gate>,
    ) -> Result<Self> {
        // at least one local qubit above the chunk must exist to evict
        if chunk_size + 1 >= local_size {
            return Err(CompileError::UnsupportedConfig(format!(
                "chunk size {} leaves no evictable local below the budget {}",
                chunk_size, local_size
            )));
        }
        Ok(Self {
            num_qubits,
            local_size,
            chunk_size,
            remain_gates: input_gates,
        })
    }

    pub fn run(&mut self) -> LocalGroup {
        let mut locals: BTreeSet<usize> = (0..self.local_size).collect();
        let mut lg = LocalGroup::new();
        let mut cur = GateGroup::new(Backend::PerGate);
        for i in 0..self.remain_gates.len() {
            let gate = self.remain_gates[i].clone();
            if gate.is_diagonal() || locals.contains(&gate.target_qubit()) {
                cur.add_gate(gate, None, true);
                continue;
            }
            // close the pass: it occupied exactly the current local set
            let resident: QubitSet = locals.iter().copied().collect();
            cur.related_qubits = resident;
            lg.related_qubits |= resident;
            lg.full_groups.push(std::mem::take(&mut cur));

            let target = gate.target_qubit();
            cur.add_gate(gate, None, true);

            // evictable locals above the chunk, minus anything the
            // lookahead still needs
            let mut cur_locals: BTreeSet<usize> = locals
                .range(self.chunk_size + 1..)
                .copied()
                .collect();
            for j in (i + 1)..self.remain_gates.len() {
                if cur_locals.len() <= 1 {
                    break;
                }
                if !self.remain_gates[j].is_diagonal() {
                    cur_locals.remove(&self.remain_gates[j].target_qubit());
                }
            }
            let to_move = *cur_locals
                .iter()
                .next_back()
                .expect("chunked eviction found no candidate");
            locals.remove(&to_move);
            locals.insert(target);
        }
        let resident: QubitSet = locals.iter().copied().collect();
        cur.related_qubits = resident;
        lg.related_qubits |= resident;
        lg.full_groups.push(cur);
        lg
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resident_gates_stay_in_one_pass() {
        let gates = vec![Gate::h(0), Gate::h(1), Gate::rz(7, 0.1)];
        let mut c = ChunkCompiler::new(8, 4, 2, gates).unwrap();
        let lg = c.run();
        assert_eq!(lg.full_groups.len(), 1);
        assert_eq!(lg.full_groups[0].gates.len(), 3);
        assert_eq!(lg.full_groups[0].related_qubits, QubitSet::all_below(4));
    }

    #[test]
    fn test_out_of_set_target_opens_new_pass() {
        // H(6) is non-diagonal with a non-resident target: pass closes,
        // qubit 6 swaps in for the highest evictable local (3)
        let gates = vec![Gate::h(0), Gate::h(6), Gate::h(6)];
        let mut c = ChunkCompiler::new(8, 4, 2, gates).unwrap();
        let lg = c.run();
        assert_eq!(lg.full_groups.len(), 2);
        assert_eq!(lg.full_groups[0].gates.len(), 1);
        assert_eq!(lg.full_groups[1].gates.len(), 2);
        let second = lg.full_groups[1].related_qubits;
        assert!(second.contains(6));
        assert!(!second.contains(3));
    }

    #[test]
    fn test_lookahead_protects_needed_local() {
        // locals {0..5}, chunk 2: evictables {3, 4, 5}. The lookahead sees
        // H(5) and H(4) pending, so qubit 3 is the eviction victim even
        // though 5 is the highest.
        let gates = vec![Gate::h(7), Gate::h(5), Gate::h(4)];
        let mut c = ChunkCompiler::new(8, 6, 2, gates).unwrap();
        let lg = c.run();
        assert_eq!(lg.full_groups.len(), 2);
        let second = lg.full_groups[1].related_qubits;
        assert!(second.contains(7));
        assert!(!second.contains(3));
        assert!(second.contains(4) && second.contains(5));
    }

    #[test]
    fn test_chunk_must_leave_evictable_room() {
        assert!(ChunkCompiler::new(8, 4, 3, vec![]).is_err());
        assert!(ChunkCompiler::new(8, 4, 2, vec![]).is_ok());
    }
}
