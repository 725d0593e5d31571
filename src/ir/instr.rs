//! Instruction records: the opcode closed set and the tagged-record shape.

use super::{Literal, Type};
use serde::{Deserialize, Serialize};

/// The closed opcode set the passes are written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Opcode {
    Const,
    Id,
    Add,
    Sub,
    Mul,
    Div,
    #[serde(rename = "mod")]
    Mod,
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
    Jmp,
    Br,
    Ret,
    Phi,
    Alloc,
    Load,
    Store,
    #[serde(rename = "ptradd")]
    PtrAdd,
    Nop,
    Call,
    Print,
}

impl Opcode {
    /// Terminators end a basic block.
    pub fn is_terminator(self) -> bool {
        matches!(self, Opcode::Jmp | Opcode::Br | Opcode::Ret)
    }

    /// Ops that carry a `labels` field (branch targets).
    pub fn carries_labels(self) -> bool {
        matches!(self, Opcode::Jmp | Opcode::Br | Opcode::Phi)
    }

    /// Ops whose effect isn't captured purely by their `dest` — DCE must
    /// never remove these even when `dest` looks unused.
    pub fn has_side_effects(self) -> bool {
        matches!(
            self,
            Opcode::Call | Opcode::Print | Opcode::Store | Opcode::Load | Opcode::Ret
        )
    }

    /// Arithmetic/comparison ops LICM and constant folding reason about.
    pub fn is_pure_value_op(self) -> bool {
        matches!(
            self,
            Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::Mod
                | Opcode::Eq
                | Opcode::Lt
                | Opcode::Gt
                | Opcode::Le
                | Opcode::Ge
        )
    }
}

/// The non-label instruction payload: every recognized field, all but
/// `op` optional. Matches the wire record's flat shape via `#[serde(flatten)]`-free
/// field layout — every field lives directly on this struct, so a JSON
/// object with `op` plus any subset of `dest`/`type`/`args`/`labels`/`value`
/// round-trips without extra nesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpInstr {
    pub op: Opcode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<Type>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Literal>,
}

impl OpInstr {
    pub fn new(op: Opcode) -> Self {
        OpInstr {
            op,
            dest: None,
            ty: None,
            args: Vec::new(),
            labels: Vec::new(),
            value: None,
        }
    }

    pub fn with_dest(mut self, dest: impl Into<String>, ty: Type) -> Self {
        self.dest = Some(dest.into());
        self.ty = Some(ty);
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_value(mut self, value: Literal) -> Self {
        self.value = Some(value);
        self
    }
}

/// A record in a function's flat instruction stream: either a label
/// introducing a new basic block, or an operation. `label` and `op` are
/// mutually exclusive on the wire, hence the untagged enum rather than a
/// single struct with both fields optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Instr {
    Label { label: String },
    Op(OpInstr),
}

impl Instr {
    pub fn label(name: impl Into<String>) -> Self {
        Instr::Label { label: name.into() }
    }

    pub fn op(op: OpInstr) -> Self {
        Instr::Op(op)
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            Instr::Label { label } => Some(label),
            Instr::Op(_) => None,
        }
    }

    pub fn as_op(&self) -> Option<&OpInstr> {
        match self {
            Instr::Op(o) => Some(o),
            Instr::Label { .. } => None,
        }
    }

    pub fn as_op_mut(&mut self) -> Option<&mut OpInstr> {
        match self {
            Instr::Op(o) => Some(o),
            Instr::Label { .. } => None,
        }
    }

    pub fn dest(&self) -> Option<&str> {
        self.as_op().and_then(|o| o.dest.as_deref())
    }

    pub fn args(&self) -> &[String] {
        self.as_op().map(|o| o.args.as_slice()).unwrap_or(&[])
    }

    pub fn is_nop(&self) -> bool {
        matches!(self.as_op(), Some(o) if o.op == Opcode::Nop)
    }

    pub fn nop() -> Self {
        Instr::Op(OpInstr::new(Opcode::Nop))
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self.as_op(), Some(o) if o.op.is_terminator())
    }
}
