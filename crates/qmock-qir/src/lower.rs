//! Lowering of a function body to a kernel of basic blocks.

use std::fmt;

use crate::error::{ParseError, ParseResult};
use crate::module::{Function, InstructionKind, Operand};

/// Prefix of quantum instruction set intrinsics.
const QIS_PREFIX: &str = "__quantum__qis__";

/// Prefix of runtime intrinsics (output recording, initialization).
const RT_PREFIX: &str = "__quantum__rt__";

/// Runtime spelling of the result read used by older emitters.
const RT_READ_RESULT: &str = "__quantum__rt__read_result";

/// Gates the kernel interpreter understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Gate {
    /// Hadamard gate.
    H,
    /// Pauli-X gate.
    X,
    /// Pauli-Y gate.
    Y,
    /// Pauli-Z gate.
    Z,
    /// S gate (sqrt(Z)).
    S,
    /// S-dagger gate.
    Sdg,
    /// T gate.
    T,
    /// T-dagger gate.
    Tdg,
    /// Rotation around X.
    Rx(f64),
    /// Rotation around Y.
    Ry(f64),
    /// Rotation around Z.
    Rz(f64),
    /// Phase gate.
    P(f64),
    /// U(θ, φ, λ).
    U(f64, f64, f64),
    /// Controlled-X.
    CX,
    /// Controlled-Y.
    CY,
    /// Controlled-Z.
    CZ,
    /// SWAP.
    Swap,
    /// Toffoli.
    CCX,
}

impl Gate {
    /// Number of qubits the gate acts on.
    pub fn num_qubits(&self) -> usize {
        match self {
            Gate::CX | Gate::CY | Gate::CZ | Gate::Swap => 2,
            Gate::CCX => 3,
            _ => 1,
        }
    }

    /// Number of angle parameters.
    fn num_params(&self) -> usize {
        match self {
            Gate::Rx(_) | Gate::Ry(_) | Gate::Rz(_) | Gate::P(_) => 1,
            Gate::U(..) => 3,
            _ => 0,
        }
    }

    /// The inverse gate.
    pub fn adjoint(self) -> Gate {
        match self {
            Gate::S => Gate::Sdg,
            Gate::Sdg => Gate::S,
            Gate::T => Gate::Tdg,
            Gate::Tdg => Gate::T,
            Gate::Rx(t) => Gate::Rx(-t),
            Gate::Ry(t) => Gate::Ry(-t),
            Gate::Rz(t) => Gate::Rz(-t),
            Gate::P(t) => Gate::P(-t),
            Gate::U(theta, phi, lambda) => Gate::U(-theta, -lambda, -phi),
            other => other,
        }
    }

    fn with_params(self, params: &[f64]) -> Gate {
        match (self, params) {
            (Gate::Rx(_), [t]) => Gate::Rx(*t),
            (Gate::Ry(_), [t]) => Gate::Ry(*t),
            (Gate::Rz(_), [t]) => Gate::Rz(*t),
            (Gate::P(_), [t]) => Gate::P(*t),
            (Gate::U(..), [a, b, c]) => Gate::U(*a, *b, *c),
            (gate, _) => gate,
        }
    }

    fn from_intrinsic(name: &str) -> Option<Gate> {
        let gate = match name {
            "h" => Gate::H,
            "x" => Gate::X,
            "y" => Gate::Y,
            "z" => Gate::Z,
            "s" => Gate::S,
            "t" => Gate::T,
            "rx" => Gate::Rx(0.0),
            "ry" => Gate::Ry(0.0),
            "rz" => Gate::Rz(0.0),
            "r1" => Gate::P(0.0),
            "u3" => Gate::U(0.0, 0.0, 0.0),
            "cnot" | "cx" => Gate::CX,
            "cy" => Gate::CY,
            "cz" => Gate::CZ,
            "swap" => Gate::Swap,
            "ccx" => Gate::CCX,
            _ => return None,
        };
        Some(gate)
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gate::H => write!(f, "h"),
            Gate::X => write!(f, "x"),
            Gate::Y => write!(f, "y"),
            Gate::Z => write!(f, "z"),
            Gate::S => write!(f, "s"),
            Gate::Sdg => write!(f, "sdg"),
            Gate::T => write!(f, "t"),
            Gate::Tdg => write!(f, "tdg"),
            Gate::Rx(t) => write!(f, "rx({t})"),
            Gate::Ry(t) => write!(f, "ry({t})"),
            Gate::Rz(t) => write!(f, "rz({t})"),
            Gate::P(t) => write!(f, "p({t})"),
            Gate::U(a, b, c) => write!(f, "u({a}, {b}, {c})"),
            Gate::CX => write!(f, "cx"),
            Gate::CY => write!(f, "cy"),
            Gate::CZ => write!(f, "cz"),
            Gate::Swap => write!(f, "swap"),
            Gate::CCX => write!(f, "ccx"),
        }
    }
}

/// A single kernel operation on static qubit addresses.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Unitary gate.
    Gate { gate: Gate, qubits: Vec<u64> },
    /// Measure `qubit` in the Z basis into `result`.
    Measure { qubit: u64, result: u64 },
    /// Reset `qubit` to |0⟩.
    Reset { qubit: u64 },
    /// Load the bit recorded in `result` into the SSA value `dest`.
    ReadResult { result: u64, dest: String },
}

impl Operation {
    /// Qubits touched by the operation.
    pub fn qubits(&self) -> &[u64] {
        match self {
            Operation::Gate { qubits, .. } => qubits,
            Operation::Measure { qubit, .. } | Operation::Reset { qubit } => {
                std::slice::from_ref(qubit)
            }
            Operation::ReadResult { .. } => &[],
        }
    }
}

/// Condition of a two-way branch.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Const(bool),
    /// SSA value produced by a [`Operation::ReadResult`].
    Value(String),
}

/// How control leaves a block. Targets are block indices.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Return,
    Jump(usize),
    Branch {
        condition: Condition,
        if_true: usize,
        if_false: usize,
    },
}

/// A basic block.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Source label; empty for an unlabeled entry block.
    pub label: String,
    pub operations: Vec<Operation>,
    pub terminator: Terminator,
}

/// A lowered kernel ready for interpretation. Execution starts at block 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    pub name: String,
    pub blocks: Vec<Block>,
}

impl Kernel {
    /// All operations in block order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.blocks.iter().flat_map(|b| b.operations.iter())
    }

    /// Check whether block order is execution order: every block returns or
    /// jumps to the block after it.
    pub fn is_straight_line(&self) -> bool {
        self.blocks
            .iter()
            .enumerate()
            .all(|(i, block)| match block.terminator {
                Terminator::Return => true,
                Terminator::Jump(next) => next == i + 1,
                Terminator::Branch { .. } => false,
            })
    }

    /// Highest qubit address used, if any.
    pub fn max_qubit(&self) -> Option<u64> {
        self.operations()
            .flat_map(|op| op.qubits().iter().copied())
            .max()
    }

    /// Qubit count implied by the addresses used.
    pub fn inferred_qubits(&self) -> u32 {
        self.max_qubit()
            .map_or(0, |q| u32::try_from(q + 1).unwrap_or(u32::MAX))
    }

    /// Check whether the kernel contains any measurement.
    pub fn has_measurements(&self) -> bool {
        self.operations()
            .any(|op| matches!(op, Operation::Measure { .. }))
    }

    /// Check whether every measurement is terminal: no qubit is touched
    /// again after being measured, in block order.
    pub fn measurements_are_terminal(&self) -> bool {
        let mut measured = Vec::new();
        for op in self.operations() {
            if op.qubits().iter().any(|q| measured.contains(q)) {
                return false;
            }
            if let Operation::Measure { qubit, .. } = op {
                measured.push(*qubit);
            }
        }
        true
    }
}

/// Terminator with targets still named by label.
enum PendingTerminator {
    Return,
    Jump(String),
    Branch {
        condition: Condition,
        if_true: String,
        if_false: String,
    },
}

struct PendingBlock {
    label: String,
    operations: Vec<Operation>,
    /// Terminator and the line it was written on.
    terminator: Option<(usize, PendingTerminator)>,
}

impl PendingBlock {
    fn new(label: String) -> Self {
        Self {
            label,
            operations: Vec::new(),
            terminator: None,
        }
    }
}

/// Lower a function body to a kernel of basic blocks.
///
/// A block without a terminator falls through to the next one.
pub fn lower(function: &Function) -> ParseResult<Kernel> {
    let body = function
        .body
        .as_ref()
        .ok_or_else(|| ParseError::NoBody(function.name.clone()))?;

    let mut blocks = vec![PendingBlock::new(String::new())];

    for instruction in body {
        let unsupported = || ParseError::UnsupportedInstruction {
            line: instruction.line,
            text: instruction.text.clone(),
        };

        if let InstructionKind::Label(label) = &instruction.kind {
            // A label on the first line names the entry block.
            let names_entry = matches!(
                blocks.as_slice(),
                [entry] if entry.label.is_empty()
                    && entry.operations.is_empty()
                    && entry.terminator.is_none()
            );
            if names_entry {
                blocks[0].label = label.clone();
            } else {
                blocks.push(PendingBlock::new(label.clone()));
            }
            continue;
        }

        // Code after a terminator opens an unnamed block.
        if blocks.last().is_some_and(|b| b.terminator.is_some()) {
            blocks.push(PendingBlock::new(String::new()));
        }
        let last = blocks.len() - 1;
        let block = &mut blocks[last];

        match &instruction.kind {
            InstructionKind::Label(_) => {}
            InstructionKind::Ret => {
                block.terminator = Some((instruction.line, PendingTerminator::Return));
            }
            InstructionKind::Branch(target) => {
                let jump = PendingTerminator::Jump(target.clone());
                block.terminator = Some((instruction.line, jump));
            }
            InstructionKind::CondBranch {
                condition,
                if_true,
                if_false,
            } => {
                let condition = match condition {
                    Operand::Bool(b) => Condition::Const(*b),
                    Operand::Int(v) => Condition::Const(*v != 0),
                    Operand::Local(name) => Condition::Value(name.clone()),
                    _ => return Err(unsupported()),
                };
                block.terminator = Some((
                    instruction.line,
                    PendingTerminator::Branch {
                        condition,
                        if_true: if_true.clone(),
                        if_false: if_false.clone(),
                    },
                ));
            }
            InstructionKind::Call { dest, callee, args } => {
                let Some(intrinsic) = callee
                    .strip_prefix(QIS_PREFIX)
                    .or_else(|| (callee == RT_READ_RESULT).then_some("read_result__body"))
                else {
                    if callee.starts_with(RT_PREFIX) {
                        continue;
                    }
                    return Err(unsupported());
                };
                let ops = lower_intrinsic(callee, intrinsic, args, dest.as_deref()).map_err(
                    |e| match e {
                        ParseError::UnknownIntrinsic { name, .. } => ParseError::UnknownIntrinsic {
                            line: instruction.line,
                            name,
                        },
                        other => other,
                    },
                )?;
                block.operations.extend(ops);
            }
            InstructionKind::Other => return Err(unsupported()),
        }
    }

    resolve(function, blocks)
}

/// Replace label targets with block indices.
fn resolve(function: &Function, pending: Vec<PendingBlock>) -> ParseResult<Kernel> {
    let index_of = |line: usize, label: &str| {
        pending
            .iter()
            .position(|b| !b.label.is_empty() && b.label == label)
            .ok_or_else(|| ParseError::UnknownLabel {
                line,
                label: label.to_string(),
            })
    };

    let mut blocks = Vec::with_capacity(pending.len());
    for (i, block) in pending.iter().enumerate() {
        let terminator = match &block.terminator {
            Some((_, PendingTerminator::Return)) => Terminator::Return,
            Some((line, PendingTerminator::Jump(target))) => {
                Terminator::Jump(index_of(*line, target)?)
            }
            Some((
                line,
                PendingTerminator::Branch {
                    condition,
                    if_true,
                    if_false,
                },
            )) => Terminator::Branch {
                condition: condition.clone(),
                if_true: index_of(*line, if_true)?,
                if_false: index_of(*line, if_false)?,
            },
            None if i + 1 < pending.len() => Terminator::Jump(i + 1),
            None => Terminator::Return,
        };
        blocks.push(Block {
            label: block.label.clone(),
            operations: block.operations.clone(),
            terminator,
        });
    }

    Ok(Kernel {
        name: function.name.clone(),
        blocks,
    })
}

fn lower_intrinsic(
    callee: &str,
    intrinsic: &str,
    args: &[Operand],
    dest: Option<&str>,
) -> ParseResult<Vec<Operation>> {
    let unknown = || ParseError::UnknownIntrinsic {
        line: 0,
        name: callee.to_string(),
    };

    let (base, adjoint) = if let Some(base) = intrinsic.strip_suffix("__body") {
        (base, false)
    } else if let Some(base) = intrinsic.strip_suffix("__adj") {
        (base, true)
    } else {
        return Err(unknown());
    };

    let op = match (base, adjoint) {
        ("mz" | "m", false) => {
            check_arity(callee, args, 2)?;
            Operation::Measure {
                qubit: address(callee, args, 0)?,
                result: address(callee, args, 1)?,
            }
        }
        ("mresetz", false) => {
            check_arity(callee, args, 2)?;
            let qubit = address(callee, args, 0)?;
            let result = address(callee, args, 1)?;
            return Ok(vec![
                Operation::Measure { qubit, result },
                Operation::Reset { qubit },
            ]);
        }
        ("reset", false) => {
            check_arity(callee, args, 1)?;
            Operation::Reset {
                qubit: address(callee, args, 0)?,
            }
        }
        ("read_result", false) => {
            check_arity(callee, args, 1)?;
            let result = address(callee, args, 0)?;
            // Nothing can observe an unnamed read.
            let Some(dest) = dest else {
                return Ok(Vec::new());
            };
            Operation::ReadResult {
                result,
                dest: dest.to_string(),
            }
        }
        _ => {
            let gate = Gate::from_intrinsic(base).ok_or_else(unknown)?;
            let num_params = gate.num_params();
            check_arity(callee, args, num_params + gate.num_qubits())?;

            let params = (0..num_params)
                .map(|i| angle(callee, args, i))
                .collect::<ParseResult<Vec<_>>>()?;
            let qubits = (num_params..args.len())
                .map(|i| address(callee, args, i))
                .collect::<ParseResult<Vec<_>>>()?;

            let gate = gate.with_params(&params);
            let gate = if adjoint { gate.adjoint() } else { gate };
            Operation::Gate { gate, qubits }
        }
    };
    Ok(vec![op])
}

fn check_arity(name: &str, args: &[Operand], expected: usize) -> ParseResult<()> {
    if args.len() != expected {
        return Err(ParseError::WrongOperandCount {
            name: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn address(name: &str, args: &[Operand], index: usize) -> ParseResult<u64> {
    args[index]
        .as_address()
        .ok_or_else(|| ParseError::InvalidOperand {
            name: name.to_string(),
            index,
            expected: "static address",
        })
}

fn angle(name: &str, args: &[Operand], index: usize) -> ParseResult<f64> {
    match &args[index] {
        Operand::Float(v) => Ok(*v),
        #[allow(clippy::cast_precision_loss)]
        Operand::Int(v) => Ok(*v as f64),
        _ => Err(ParseError::InvalidOperand {
            name: name.to_string(),
            index,
            expected: "constant angle",
        }),
    }
}
