//! Typed data model for programs, functions, and instructions.
//!
//! Mirrors the JSON IR at the wire boundary (`serde` round-trips every
//! type verbatim) while giving the passes an exhaustive-match-friendly
//! shape internally, per the "instruction as tagged record" design note:
//! the untyped JSON record is a tagged sum keyed on the presence of `op`
//! vs `label`, with shared fields factored into the op variant's payload.

pub mod instr;

pub use instr::{Instr, OpInstr, Opcode};

use serde::{Deserialize, Serialize};

/// IR type. `Other` is an escape hatch for type strings no pass needs to
/// interpret; passes that must inspect a type (phi insertion, const
/// folding's destination type) only ever construct `Int`/`Bool`/`Ptr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Type {
    Ptr { ptr: Box<Type> },
    Simple(String),
}

impl Type {
    pub fn int() -> Self {
        Type::Simple("int".to_string())
    }

    pub fn bool() -> Self {
        Type::Simple("bool".to_string())
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Type::Simple(s) if s == "int")
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Simple(s) if s == "bool")
    }
}

/// Literal payload of a `const` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Int(i64),
    Bool(bool),
}

impl Literal {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Literal::Int(v) => Some(*v),
            Literal::Bool(_) => None,
        }
    }
}

/// A formal argument to a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arg {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

/// A function: a name, formal arguments, an optional return type, and a
/// flat instruction sequence (label records interleaved with ops) as it
/// appears on the wire, before CFG construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Arg>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ret_type: Option<Type>,
    pub instrs: Vec<Instr>,
}

/// A whole program: an ordered sequence of functions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub functions: Vec<Function>,
}
