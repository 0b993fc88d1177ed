//! Binary schedule format
//!
//! The compiling rank serializes its [`Schedule`] into a self-describing
//! little-endian byte stream and broadcasts it; every other rank
//! reconstructs the schedule from the buffer instead of re-running the
//! compiler. Transpose plans are not part of the stream — all ranks
//! rebuild them with [`Schedule::init_plans`] so nobody can diverge.
//!
//! Layout: `u32` payload size, then the payload:
//! `u32` pass count; per pass the related mask (`u64`), the layout
//! (`u32` × N), the exchange descriptors, and the full/overlap groups
//! with gate counts. Per gate: type tag, target, control, encode field
//! (two-qubit partner or multi-control mask), length-prefixed control
//! list, and the 2×2 complex payload as eight `f64`.

use crate::error::{CompileError, Result};
use crate::group::{Backend, GateGroup};
use crate::schedule::{LocalGroup, Schedule};
use crate::state::State;
use num_complex::Complex64;
use shardq_core::{Gate, GateKind, GateMatrix, GateType, QubitSet};
use smallvec::SmallVec;

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn put_i8(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    cur: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, cur: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.cur + n > self.buf.len() {
            return Err(CompileError::DeserializationError(format!(
                "unexpected end of buffer at offset {}",
                self.cur
            )));
        }
        let s = &self.buf[self.cur..self.cur + n];
        self.cur += n;
        Ok(s)
    }

    fn take_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn take_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    fn take_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn take_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn take_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn take_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }
}

fn write_gate(w: &mut Writer, gate: &Gate) {
    w.put_u8(gate.gate_type().tag());
    w.put_i8(gate.target_qubit() as i8);
    let control: i8 = match gate.kind() {
        GateKind::Controlled { control, .. } => *control as i8,
        GateKind::MultiControlled { .. } => -2,
        _ => -1,
    };
    w.put_i8(control);
    let encode: i64 = match gate.kind() {
        GateKind::TwoQubit { partner, .. } => *partner as i64,
        GateKind::MultiControlled { .. } => gate.control_mask().bits() as i64,
        _ => 0,
    };
    w.put_i64(encode);
    let controls = gate.controls();
    w.put_u8(controls.len() as u8);
    for &q in controls {
        w.put_i8(q as i8);
    }
    for row in gate.matrix() {
        for entry in row {
            w.put_f64(entry.re);
            w.put_f64(entry.im);
        }
    }
}

fn read_gate(r: &mut Reader<'_>) -> Result<Gate> {
    let tag = r.take_u8()?;
    let ty = GateType::from_tag(tag).ok_or_else(|| {
        CompileError::DeserializationError(format!("unknown gate type tag {}", tag))
    })?;
    let target = r.take_i8()?;
    if target < 0 {
        return Err(CompileError::DeserializationError(format!(
            "negative target qubit {}",
            target
        )));
    }
    let target = target as usize;
    let control = r.take_i8()?;
    let encode = r.take_i64()?;
    let num_controls = r.take_u8()? as usize;
    let mut controls: SmallVec<[usize; 4]> = SmallVec::new();
    for _ in 0..num_controls {
        let q = r.take_i8()?;
        if q < 0 {
            return Err(CompileError::DeserializationError(format!(
                "negative control qubit {}",
                q
            )));
        }
        controls.push(q as usize);
    }
    let mut mat: GateMatrix = [[Complex64::new(0.0, 0.0); 2]; 2];
    for row in &mut mat {
        for entry in row.iter_mut() {
            let re = r.take_f64()?;
            let im = r.take_f64()?;
            *entry = Complex64::new(re, im);
        }
    }
    let kind = match ty {
        GateType::Cnot
        | GateType::Cy
        | GateType::Cz
        | GateType::Crx
        | GateType::Cry
        | GateType::Crz
        | GateType::Cu1 => {
            if control < 0 {
                return Err(CompileError::DeserializationError(
                    "controlled gate without a control qubit".into(),
                ));
            }
            GateKind::Controlled {
                control: control as usize,
                target,
            }
        }
        GateType::Rzz | GateType::Rxx => GateKind::TwoQubit {
            partner: encode as usize,
            target,
        },
        GateType::McPhase | GateType::Mcu => GateKind::MultiControlled { controls, target },
        _ => GateKind::Single { target },
    };
    Ok(Gate::from_parts(ty, kind, mat))
}

fn write_gate_group(w: &mut Writer, gg: &GateGroup) {
    w.put_u64(gg.related_qubits.bits());
    w.put_u8(gg.backend.tag());
    w.put_u32(gg.gates.len() as u32);
    for gate in &gg.gates {
        write_gate(w, gate);
    }
}

fn read_gate_group(r: &mut Reader<'_>) -> Result<GateGroup> {
    let related = QubitSet::from_bits(r.take_u64()?);
    let backend_tag = r.take_u8()?;
    let backend = Backend::from_tag(backend_tag).ok_or_else(|| {
        CompileError::DeserializationError(format!("unknown backend tag {}", backend_tag))
    })?;
    let num_gates = r.take_u32()? as usize;
    let mut gg = GateGroup::new(backend);
    gg.related_qubits = related;
    for _ in 0..num_gates {
        gg.gates.push(read_gate(r)?);
    }
    Ok(gg)
}

fn write_state(w: &mut Writer, state: &State) {
    for &q in state.layout() {
        w.put_u32(q as u32);
    }
}

fn read_state(r: &mut Reader<'_>, num_qubits: usize) -> Result<State> {
    let mut layout = Vec::with_capacity(num_qubits);
    for _ in 0..num_qubits {
        layout.push(r.take_u32()? as usize);
    }
    let valid = {
        let mut seen = vec![false; num_qubits];
        layout.iter().all(|&q| {
            q < num_qubits && !std::mem::replace(&mut seen[q], true)
        })
    };
    if !valid {
        return Err(CompileError::DeserializationError(format!(
            "layout is not a permutation: {:?}",
            layout
        )));
    }
    Ok(State::from_layout(layout))
}

impl Schedule {
    /// Encode into a length-prefixed byte buffer for broadcast
    pub fn serialize(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(self.local_groups.len() as u32);
        for lg in &self.local_groups {
            w.put_u64(lg.related_qubits.bits());
            write_state(&mut w, &lg.state);
            w.put_u32(lg.a2a_comm_size);
            w.put_u32(lg.a2a_comm.len() as u32);
            for &c in &lg.a2a_comm {
                w.put_u32(c);
            }
            w.put_u32(lg.full_groups.len() as u32);
            for gg in &lg.full_groups {
                write_gate_group(&mut w, gg);
            }
            w.put_u32(lg.overlap_groups.len() as u32);
            for gg in &lg.overlap_groups {
                write_gate_group(&mut w, gg);
            }
        }
        write_state(&mut w, &self.final_state);

        let payload = w.buf;
        let mut out = Vec::with_capacity(payload.len() + 4);
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&payload);
        out
    }

    /// Decode a broadcast buffer. `num_qubits` is shared configuration on
    /// every rank, not part of the stream. Transpose plans are left empty;
    /// call [`Schedule::init_plans`] afterwards.
    pub fn deserialize(buf: &[u8], num_qubits: usize) -> Result<Schedule> {
        let mut r = Reader::new(buf);
        let payload_len = r.take_u32()? as usize;
        if payload_len + 4 > buf.len() {
            return Err(CompileError::DeserializationError(format!(
                "buffer of {} bytes cannot hold declared payload of {}",
                buf.len(),
                payload_len
            )));
        }
        let num_groups = r.take_u32()? as usize;
        let mut schedule = Schedule::new();
        for _ in 0..num_groups {
            let mut lg = LocalGroup::new();
            lg.related_qubits = QubitSet::from_bits(r.take_u64()?);
            lg.state = read_state(&mut r, num_qubits)?;
            lg.a2a_comm_size = r.take_u32()?;
            let comm_len = r.take_u32()? as usize;
            lg.a2a_comm = (0..comm_len)
                .map(|_| r.take_u32())
                .collect::<Result<_>>()?;
            let num_full = r.take_u32()? as usize;
            for _ in 0..num_full {
                lg.full_groups.push(read_gate_group(&mut r)?);
            }
            let num_overlap = r.take_u32()? as usize;
            for _ in 0..num_overlap {
                lg.overlap_groups.push(read_gate_group(&mut r)?);
            }
            schedule.local_groups.push(lg);
        }
        schedule.final_state = read_state(&mut r, num_qubits)?;
        Ok(schedule)
    }
}
