//! Single-layer gate selection
//!
//! [`OneLayerCompiler`] extracts one group's worth of gates from the
//! residual circuit: the largest prefix-respecting subset whose combined
//! qubit footprint fits a budget. Candidate bookkeeping lives in
//! fixed-width bitsets over a bounded batch of gate ids, so the inner loop
//! is word-parallel OR/AND all the way down.

use crate::group::GateGroup;
use shardq_core::{Gate, GateKind, QubitSet};
use std::collections::BTreeSet;

/// Fixed-width bitset over candidate gate ids
///
/// `W` is the word count; the batch holds up to `64 * W` gates.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct GateBitset<const W: usize> {
    words: [u64; W],
}

impl<const W: usize> GateBitset<W> {
    pub(crate) const CAPACITY: usize = 64 * W;

    pub(crate) fn new() -> Self {
        Self { words: [0; W] }
    }

    #[inline]
    pub(crate) fn set(&mut self, i: usize) {
        self.words[i / 64] |= 1 << (i % 64);
    }

    #[inline]
    pub(crate) fn test(&self, i: usize) -> bool {
        self.words[i / 64] >> (i % 64) & 1 == 1
    }

    #[inline]
    pub(crate) fn or_assign(&mut self, other: &Self) {
        for (w, o) in self.words.iter_mut().zip(other.words.iter()) {
            *w |= o;
        }
    }

    /// `self &= !other`
    #[inline]
    pub(crate) fn and_not_assign(&mut self, other: &Self) {
        for (w, o) in self.words.iter_mut().zip(other.words.iter()) {
            *w &= !o;
        }
    }

    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[inline]
    pub(crate) fn any(&self) -> bool {
        self.words.iter().any(|&w| w != 0)
    }
}

/// Extracts budget-fitting gate groups from a residual gate list
///
/// Gate identity is the index into the input list; `remain` tracks the
/// not-yet-emitted indices in input order.
pub struct OneLayerCompiler<const W: usize> {
    num_qubits: usize,
    remain_gates: Vec<Gate>,
    remain: BTreeSet<usize>,
}

impl<const W: usize> OneLayerCompiler<W> {
    pub fn new(num_qubits: usize, input_gates: Vec<Gate>) -> Self {
        let remain = (0..input_gates.len()).collect();
        Self {
            num_qubits,
            remain_gates: input_gates,
            remain,
        }
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    pub fn remain_gates(&self) -> &[Gate] {
        &self.remain_gates
    }

    pub fn gates_left(&self) -> bool {
        !self.remain_gates.is_empty()
    }

    /// Drop emitted gates from the residual set
    pub fn remove_gates_opt(&mut self, remove: &[usize]) {
        for x in remove {
            self.remain.remove(x);
        }
        if self.remain.is_empty() {
            self.remain_gates.clear();
        }
    }

    /// Select one group's worth of gate indices
    ///
    /// * `full` — qubits forbidden from entering the group
    /// * `related` — per-qubit seed masks: what each qubit would bring with
    ///   it into the group
    /// * `local_size` — the mask budget, in bits
    /// * `local_qubits` — the set treated as local for diagonal admission
    ///   (`None` for unrestricted)
    ///
    /// Returns indices into the input gate list, in input order.
    pub fn get_group_opt(
        &self,
        mut full: QubitSet,
        mut related: Vec<QubitSet>,
        enable_global: bool,
        local_size: usize,
        local_qubits: Option<QubitSet>,
    ) -> Vec<usize> {
        debug_assert_eq!(related.len(), self.num_qubits);
        let all_qubits = QubitSet::all_below(self.num_qubits);

        let gate_ids: Vec<usize> = self
            .remain
            .iter()
            .copied()
            .take(GateBitset::<W>::CAPACITY)
            .collect();
        let gate_num = gate_ids.len();

        let mut cur: Vec<GateBitset<W>> = vec![GateBitset::new(); self.num_qubits];
        let mut selected: GateBitset<W> = GateBitset::new();

        // Pass A: greedy dependency closure per qubit. A rejected gate
        // blocks its operands for everything after it.
        for id in 0..gate_num {
            if id % 100 == 0 && full == all_qubits {
                break;
            }
            let gate = &self.remain_gates[gate_ids[id]];
            match gate.kind() {
                GateKind::MultiControlled { controls, target } => {
                    let t = *target;
                    if (full & gate.control_mask()).is_empty() && !full.contains(t) {
                        let mut new_related = related[t];
                        for &q in controls.iter() {
                            new_related |= related[q];
                        }
                        new_related =
                            GateGroup::new_related(new_related, gate, local_qubits, enable_global);
                        if new_related.len() <= local_size {
                            let mut new_cur = cur[t].clone();
                            for &q in controls.iter() {
                                new_cur.or_assign(&cur[q]);
                            }
                            new_cur.set(id);
                            for &q in controls.iter() {
                                cur[q] = new_cur.clone();
                            }
                            cur[t] = new_cur;
                            related[t] = new_related;
                            continue;
                        }
                    }
                    full.insert(t);
                    for &q in controls.iter() {
                        full.insert(q);
                    }
                }
                GateKind::TwoQubit { partner, target } => {
                    let (t1, t2) = (*partner, *target);
                    if !full.contains(t1) && !full.contains(t2) {
                        let new_related = GateGroup::new_related(
                            related[t1] | related[t2],
                            gate,
                            local_qubits,
                            enable_global,
                        );
                        if new_related.len() <= local_size {
                            let mut new_cur = cur[t1].clone();
                            new_cur.or_assign(&cur[t2]);
                            new_cur.set(id);
                            cur[t1] = new_cur.clone();
                            cur[t2] = new_cur;
                            related[t1] = new_related;
                            related[t2] = new_related;
                            continue;
                        }
                    }
                    full.insert(t1);
                    full.insert(t2);
                }
                GateKind::Controlled { control, target } => {
                    let (c, t) = (*control, *target);
                    if !full.contains(c) && !full.contains(t) {
                        let new_related = GateGroup::new_related(
                            related[c] | related[t],
                            gate,
                            local_qubits,
                            enable_global,
                        );
                        if new_related.len() <= local_size {
                            let mut new_cur = cur[c].clone();
                            new_cur.or_assign(&cur[t]);
                            new_cur.set(id);
                            cur[c] = new_cur.clone();
                            cur[t] = new_cur;
                            related[c] = new_related;
                            related[t] = new_related;
                            continue;
                        }
                    }
                    full.insert(c);
                    full.insert(t);
                }
                GateKind::Single { target } => {
                    let t = *target;
                    if !full.contains(t) {
                        let new_related = GateGroup::new_related(
                            related[t],
                            gate,
                            local_qubits,
                            enable_global,
                        );
                        if new_related.len() <= local_size {
                            cur[t].set(id);
                            related[t] = new_related;
                        } else {
                            full.insert(t);
                        }
                    }
                }
            }
        }

        // Pass B: maximal cover. Repeatedly take the qubit with the most
        // accumulated gates whose mask still fits; absorb subset qubits
        // for free, strip shared gates from the rest. Ties go to the
        // lowest qubit index.
        let mut blocked = vec![false; self.num_qubits];
        let mut selected_related = QubitSet::EMPTY;
        loop {
            let mut mx = 0;
            let mut pick = None;
            for i in 0..self.num_qubits {
                if blocked[i] {
                    continue;
                }
                let count_i = cur[i].count();
                if count_i > mx {
                    if (selected_related | related[i]).len() <= local_size {
                        mx = count_i;
                        pick = Some(i);
                    } else {
                        blocked[i] = true;
                    }
                }
            }
            let Some(id) = pick else { break };
            selected.or_assign(&cur[id]);
            selected_related |= related[id];
            blocked[id] = true;
            for i in 0..self.num_qubits {
                if !blocked[i] && cur[i].any() {
                    if related[i].is_subset_of(selected_related) {
                        selected.or_assign(&cur[i]);
                        blocked[i] = true;
                    } else {
                        let shared = cur[id].clone();
                        cur[i].and_not_assign(&shared);
                    }
                }
            }
        }

        if !enable_global {
            return (0..gate_num)
                .filter(|&id| selected.test(id))
                .map(|id| gate_ids[id])
                .collect();
        }

        // Pass C: diagonal mop-up. Unchosen diagonal gates whose operands
        // are still untouched ride along as global phases; everything else
        // blocks its operands.
        let mut blocked = vec![false; self.num_qubits];
        let mut cnt = 0;
        for id in 0..gate_num {
            cnt += 1;
            if cnt % 100 == 0 && blocked.iter().all(|&b| b) {
                break;
            }
            if selected.test(id) {
                continue;
            }
            let g = &self.remain_gates[gate_ids[id]];
            if g.is_diagonal() {
                match g.kind() {
                    GateKind::MultiControlled { controls, target } => {
                        let avail = !blocked[*target] && controls.iter().all(|&q| !blocked[q]);
                        if avail {
                            selected.set(id);
                        } else {
                            blocked[*target] = true;
                            for &q in controls.iter() {
                                blocked[q] = true;
                            }
                        }
                    }
                    GateKind::TwoQubit { partner, target } => {
                        if !blocked[*partner] && !blocked[*target] {
                            selected.set(id);
                        } else {
                            blocked[*partner] = true;
                            blocked[*target] = true;
                        }
                    }
                    GateKind::Controlled { control, target } => {
                        if !blocked[*control] && !blocked[*target] {
                            selected.set(id);
                        } else {
                            blocked[*control] = true;
                            blocked[*target] = true;
                        }
                    }
                    GateKind::Single { target } => {
                        if !blocked[*target] {
                            selected.set(id);
                        }
                    }
                }
            } else {
                match g.kind() {
                    GateKind::MultiControlled { controls, target } => {
                        for &q in controls.iter() {
                            blocked[q] = true;
                        }
                        blocked[*target] = true;
                    }
                    GateKind::TwoQubit { partner, target } => {
                        blocked[*partner] = true;
                        blocked[*target] = true;
                    }
                    GateKind::Controlled { control, target } => {
                        blocked[*control] = true;
                        blocked[*target] = true;
                    }
                    GateKind::Single { target } => {
                        blocked[*target] = true;
                    }
                }
            }
        }

        (0..gate_num)
            .filter(|&id| selected.test(id))
            .map(|id| gate_ids[id])
            .collect()
    }
}
