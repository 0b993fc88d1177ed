//! Quantum gate records
//!
//! Gates are immutable after construction and carry exactly what the
//! scheduler needs: a type tag, the operand qubits, and a 2×2 complex
//! payload. The scheduler treats the payload as opaque; it only inspects
//! the type tag (for diagonality) and the operand shape.
//!
//! Operand shape follows a four-way partition: plain single-qubit gates,
//! singly-controlled gates, symmetric two-qubit gates (whose action is a
//! 2×2 matrix over an amplitude pairing), and multi-controlled gates.

use crate::{QubitSet, Result};
use num_complex::Complex64;
use smallvec::SmallVec;
use std::f64::consts::FRAC_1_SQRT_2;
use std::fmt;

/// 2×2 complex payload carried by every gate
pub type GateMatrix = [[Complex64; 2]; 2];

/// Gate type tag
///
/// The numeric values are the wire encoding of the schedule format and must
/// stay stable.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GateType {
    Cnot = 0,
    Cy = 1,
    Cz = 2,
    Crx = 3,
    Cry = 4,
    Crz = 5,
    Cu1 = 6,
    U1 = 7,
    U2 = 8,
    U3 = 9,
    H = 10,
    X = 11,
    Y = 12,
    Z = 13,
    S = 14,
    Sdg = 15,
    T = 16,
    Tdg = 17,
    Rx = 18,
    Ry = 19,
    Rz = 20,
    Id = 21,
    Rzz = 22,
    Rxx = 23,
    McPhase = 24,
    Mcu = 25,
}

impl GateType {
    /// Whether gates of this type are diagonal in the computational basis
    ///
    /// Diagonal gates commute with each other and act as a pure phase on
    /// operand qubits that are not locally resident.
    pub const fn is_diagonal(self) -> bool {
        matches!(
            self,
            GateType::Cz
                | GateType::Crz
                | GateType::Cu1
                | GateType::U1
                | GateType::Z
                | GateType::S
                | GateType::Sdg
                | GateType::T
                | GateType::Tdg
                | GateType::Rz
                | GateType::Id
                | GateType::Rzz
                | GateType::McPhase
        )
    }

    /// Stable display name
    pub const fn name(self) -> &'static str {
        match self {
            GateType::Cnot => "CX",
            GateType::Cy => "CY",
            GateType::Cz => "CZ",
            GateType::Crx => "CRX",
            GateType::Cry => "CRY",
            GateType::Crz => "CRZ",
            GateType::Cu1 => "CU1",
            GateType::U1 => "U1",
            GateType::U2 => "U2",
            GateType::U3 => "U3",
            GateType::H => "H",
            GateType::X => "X",
            GateType::Y => "Y",
            GateType::Z => "Z",
            GateType::S => "S",
            GateType::Sdg => "SDG",
            GateType::T => "T",
            GateType::Tdg => "TDG",
            GateType::Rx => "RX",
            GateType::Ry => "RY",
            GateType::Rz => "RZ",
            GateType::Id => "ID",
            GateType::Rzz => "RZZ",
            GateType::Rxx => "RXX",
            GateType::McPhase => "MCP",
            GateType::Mcu => "MCU",
        }
    }

    /// Wire tag
    #[inline]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Decode a wire tag
    pub const fn from_tag(tag: u8) -> Option<GateType> {
        Some(match tag {
            0 => GateType::Cnot,
            1 => GateType::Cy,
            2 => GateType::Cz,
            3 => GateType::Crx,
            4 => GateType::Cry,
            5 => GateType::Crz,
            6 => GateType::Cu1,
            7 => GateType::U1,
            8 => GateType::U2,
            9 => GateType::U3,
            10 => GateType::H,
            11 => GateType::X,
            12 => GateType::Y,
            13 => GateType::Z,
            14 => GateType::S,
            15 => GateType::Sdg,
            16 => GateType::T,
            17 => GateType::Tdg,
            18 => GateType::Rx,
            19 => GateType::Ry,
            20 => GateType::Rz,
            21 => GateType::Id,
            22 => GateType::Rzz,
            23 => GateType::Rxx,
            24 => GateType::McPhase,
            25 => GateType::Mcu,
            _ => return None,
        })
    }
}

/// Operand shape of a gate
#[derive(Clone, Debug, PartialEq)]
pub enum GateKind {
    /// One target qubit
    Single { target: usize },
    /// One control, one target
    Controlled { control: usize, target: usize },
    /// Two symmetric operands; the 2×2 payload acts on the amplitude
    /// pairing defined by the gate type (parity for RZZ, double-flip for
    /// RXX)
    TwoQubit { partner: usize, target: usize },
    /// An ordered control list and one target
    MultiControlled {
        controls: SmallVec<[usize; 4]>,
        target: usize,
    },
}

/// An immutable gate record
///
/// # Example
/// ```
/// use shardq_core::Gate;
///
/// let cx = Gate::cnot(0, 1);
/// assert!(cx.is_control_gate());
/// assert_eq!(cx.target_qubit(), 1);
/// assert_eq!(cx.qubit_set().len(), 2);
/// ```
#[derive(Clone, PartialEq)]
pub struct Gate {
    ty: GateType,
    kind: GateKind,
    mat: GateMatrix,
}

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

fn diag(a: Complex64, b: Complex64) -> GateMatrix {
    [[a, ZERO], [ZERO, b]]
}

impl Gate {
    fn new(ty: GateType, kind: GateKind, mat: GateMatrix) -> Self {
        Self { ty, kind, mat }
    }

    // -- single-qubit constructors ------------------------------------

    pub fn h(target: usize) -> Self {
        let s = c(FRAC_1_SQRT_2, 0.0);
        Self::new(
            GateType::H,
            GateKind::Single { target },
            [[s, s], [s, -s]],
        )
    }

    pub fn x(target: usize) -> Self {
        Self::new(
            GateType::X,
            GateKind::Single { target },
            [[ZERO, ONE], [ONE, ZERO]],
        )
    }

    pub fn y(target: usize) -> Self {
        Self::new(
            GateType::Y,
            GateKind::Single { target },
            [[ZERO, c(0.0, -1.0)], [c(0.0, 1.0), ZERO]],
        )
    }

    pub fn z(target: usize) -> Self {
        Self::new(GateType::Z, GateKind::Single { target }, diag(ONE, -ONE))
    }

    pub fn s(target: usize) -> Self {
        Self::new(
            GateType::S,
            GateKind::Single { target },
            diag(ONE, c(0.0, 1.0)),
        )
    }

    pub fn sdg(target: usize) -> Self {
        Self::new(
            GateType::Sdg,
            GateKind::Single { target },
            diag(ONE, c(0.0, -1.0)),
        )
    }

    pub fn t(target: usize) -> Self {
        Self::new(
            GateType::T,
            GateKind::Single { target },
            diag(ONE, c(FRAC_1_SQRT_2, FRAC_1_SQRT_2)),
        )
    }

    pub fn tdg(target: usize) -> Self {
        Self::new(
            GateType::Tdg,
            GateKind::Single { target },
            diag(ONE, c(FRAC_1_SQRT_2, -FRAC_1_SQRT_2)),
        )
    }

    pub fn rx(target: usize, theta: f64) -> Self {
        let (sin, cos) = (theta / 2.0).sin_cos();
        Self::new(
            GateType::Rx,
            GateKind::Single { target },
            [[c(cos, 0.0), c(0.0, -sin)], [c(0.0, -sin), c(cos, 0.0)]],
        )
    }

    pub fn ry(target: usize, theta: f64) -> Self {
        let (sin, cos) = (theta / 2.0).sin_cos();
        Self::new(
            GateType::Ry,
            GateKind::Single { target },
            [[c(cos, 0.0), c(-sin, 0.0)], [c(sin, 0.0), c(cos, 0.0)]],
        )
    }

    pub fn rz(target: usize, theta: f64) -> Self {
        Self::new(
            GateType::Rz,
            GateKind::Single { target },
            diag(
                Complex64::from_polar(1.0, -theta / 2.0),
                Complex64::from_polar(1.0, theta / 2.0),
            ),
        )
    }

    pub fn u1(target: usize, lambda: f64) -> Self {
        Self::new(
            GateType::U1,
            GateKind::Single { target },
            diag(ONE, Complex64::from_polar(1.0, lambda)),
        )
    }

    pub fn u2(target: usize, phi: f64, lambda: f64) -> Self {
        let s = FRAC_1_SQRT_2;
        Self::new(
            GateType::U2,
            GateKind::Single { target },
            [
                [c(s, 0.0), -Complex64::from_polar(s, lambda)],
                [
                    Complex64::from_polar(s, phi),
                    Complex64::from_polar(s, phi + lambda),
                ],
            ],
        )
    }

    pub fn u3(target: usize, theta: f64, phi: f64, lambda: f64) -> Self {
        let (sin, cos) = (theta / 2.0).sin_cos();
        Self::new(
            GateType::U3,
            GateKind::Single { target },
            [
                [c(cos, 0.0), -Complex64::from_polar(sin, lambda)],
                [
                    Complex64::from_polar(sin, phi),
                    Complex64::from_polar(cos, phi + lambda),
                ],
            ],
        )
    }

    pub fn id(target: usize) -> Self {
        Self::new(GateType::Id, GateKind::Single { target }, diag(ONE, ONE))
    }

    // -- controlled constructors --------------------------------------

    pub fn cnot(control: usize, target: usize) -> Self {
        Self::new(
            GateType::Cnot,
            GateKind::Controlled { control, target },
            [[ZERO, ONE], [ONE, ZERO]],
        )
    }

    pub fn cy(control: usize, target: usize) -> Self {
        Self::new(
            GateType::Cy,
            GateKind::Controlled { control, target },
            [[ZERO, c(0.0, -1.0)], [c(0.0, 1.0), ZERO]],
        )
    }

    pub fn cz(control: usize, target: usize) -> Self {
        Self::new(
            GateType::Cz,
            GateKind::Controlled { control, target },
            diag(ONE, -ONE),
        )
    }

    pub fn crx(control: usize, target: usize, theta: f64) -> Self {
        let mat = Self::rx(target, theta).mat;
        Self::new(GateType::Crx, GateKind::Controlled { control, target }, mat)
    }

    pub fn cry(control: usize, target: usize, theta: f64) -> Self {
        let mat = Self::ry(target, theta).mat;
        Self::new(GateType::Cry, GateKind::Controlled { control, target }, mat)
    }

    pub fn crz(control: usize, target: usize, theta: f64) -> Self {
        let mat = Self::rz(target, theta).mat;
        Self::new(GateType::Crz, GateKind::Controlled { control, target }, mat)
    }

    pub fn cu1(control: usize, target: usize, lambda: f64) -> Self {
        let mat = Self::u1(target, lambda).mat;
        Self::new(GateType::Cu1, GateKind::Controlled { control, target }, mat)
    }

    // -- two-qubit constructors ---------------------------------------

    /// ZZ rotation: a phase of `exp(∓iθ/2)` on equal / differing operand
    /// bits. Diagonal, so it tolerates global operands.
    pub fn rzz(partner: usize, target: usize, theta: f64) -> Self {
        Self::new(
            GateType::Rzz,
            GateKind::TwoQubit { partner, target },
            diag(
                Complex64::from_polar(1.0, -theta / 2.0),
                Complex64::from_polar(1.0, theta / 2.0),
            ),
        )
    }

    /// XX rotation: mixes each amplitude with the one reached by flipping
    /// both operand bits.
    pub fn rxx(partner: usize, target: usize, theta: f64) -> Self {
        let (sin, cos) = (theta / 2.0).sin_cos();
        Self::new(
            GateType::Rxx,
            GateKind::TwoQubit { partner, target },
            [[c(cos, 0.0), c(0.0, -sin)], [c(0.0, -sin), c(cos, 0.0)]],
        )
    }

    // -- multi-controlled constructors --------------------------------

    /// Multi-controlled phase: `diag(1, e^{iλ})` on the target when every
    /// control is 1
    pub fn mc_phase(controls: &[usize], target: usize, lambda: f64) -> Self {
        Self::new(
            GateType::McPhase,
            GateKind::MultiControlled {
                controls: SmallVec::from_slice(controls),
                target,
            },
            diag(ONE, Complex64::from_polar(1.0, lambda)),
        )
    }

    /// Multi-controlled single-qubit unitary
    pub fn mc_u(controls: &[usize], target: usize, mat: GateMatrix) -> Self {
        Self::new(
            GateType::Mcu,
            GateKind::MultiControlled {
                controls: SmallVec::from_slice(controls),
                target,
            },
            mat,
        )
    }

    /// Rebuild a gate from its wire fields. Used by schedule
    /// deserialization; trusts the caller for operand validity.
    pub fn from_parts(ty: GateType, kind: GateKind, mat: GateMatrix) -> Self {
        Self::new(ty, kind, mat)
    }

    // -- accessors ----------------------------------------------------

    #[inline]
    pub fn gate_type(&self) -> GateType {
        self.ty
    }

    #[inline]
    pub fn kind(&self) -> &GateKind {
        &self.kind
    }

    #[inline]
    pub fn matrix(&self) -> &GateMatrix {
        &self.mat
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.ty.name()
    }

    /// The target qubit (every gate shape has exactly one)
    pub fn target_qubit(&self) -> usize {
        match &self.kind {
            GateKind::Single { target }
            | GateKind::Controlled { target, .. }
            | GateKind::TwoQubit { target, .. }
            | GateKind::MultiControlled { target, .. } => *target,
        }
    }

    /// The single control qubit, for [`GateKind::Controlled`] gates
    pub fn control_qubit(&self) -> Option<usize> {
        match &self.kind {
            GateKind::Controlled { control, .. } => Some(*control),
            _ => None,
        }
    }

    /// The second operand of a two-qubit gate
    pub fn partner_qubit(&self) -> Option<usize> {
        match &self.kind {
            GateKind::TwoQubit { partner, .. } => Some(*partner),
            _ => None,
        }
    }

    /// Control list of a multi-controlled gate (empty otherwise)
    pub fn controls(&self) -> &[usize] {
        match &self.kind {
            GateKind::MultiControlled { controls, .. } => controls,
            _ => &[],
        }
    }

    /// Control qubits of a multi-controlled gate as a set
    pub fn control_mask(&self) -> QubitSet {
        self.controls().iter().copied().collect()
    }

    // -- predicates ---------------------------------------------------

    #[inline]
    pub fn is_diagonal(&self) -> bool {
        self.ty.is_diagonal()
    }

    #[inline]
    pub fn is_control_gate(&self) -> bool {
        matches!(self.kind, GateKind::Controlled { .. })
    }

    #[inline]
    pub fn is_two_qubit_gate(&self) -> bool {
        matches!(self.kind, GateKind::TwoQubit { .. })
    }

    #[inline]
    pub fn is_mc_gate(&self) -> bool {
        matches!(self.kind, GateKind::MultiControlled { .. })
    }

    /// All operand qubits, target last
    pub fn qubits(&self) -> SmallVec<[usize; 4]> {
        let mut v = SmallVec::new();
        match &self.kind {
            GateKind::Single { target } => v.push(*target),
            GateKind::Controlled { control, target } => {
                v.push(*control);
                v.push(*target);
            }
            GateKind::TwoQubit { partner, target } => {
                v.push(*partner);
                v.push(*target);
            }
            GateKind::MultiControlled { controls, target } => {
                v.extend(controls.iter().copied());
                v.push(*target);
            }
        }
        v
    }

    /// Operand qubits as a set
    pub fn qubit_set(&self) -> QubitSet {
        self.qubits().into_iter().collect()
    }

    /// Check that all operands are distinct and below `num_qubits`
    pub fn validate(&self, num_qubits: usize) -> Result<()> {
        let qs = self.qubits();
        for (i, &q) in qs.iter().enumerate() {
            if q >= num_qubits {
                return Err(crate::CoreError::QubitOutOfRange { qubit: q, num_qubits });
            }
            if qs[..i].contains(&q) {
                return Err(crate::CoreError::DuplicateQubit(q));
            }
        }
        Ok(())
    }

    /// The same gate with a conjugated payload. Used for the second pass
    /// of density-matrix execution.
    pub fn conjugated(&self) -> Gate {
        let m = &self.mat;
        Self::new(
            self.ty,
            self.kind.clone(),
            [
                [m[0][0].conj(), m[0][1].conj()],
                [m[1][0].conj(), m[1][1].conj()],
            ],
        )
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name())?;
        for (i, q) in self.qubits().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "q{}", q)?;
        }
        write!(f, ")")
    }
}
