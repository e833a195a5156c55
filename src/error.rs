use std::{error::Error, fmt};

use crate::opcode::OpCode;

pub type CompileResult<T> = Result<T, CompileError>;

/// Failures raised while declaring an interface or compiling it into a type table. Any of them
/// aborts the compilation in progress; no partial table is produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompileError {
    /// A primitive, typedef, or tag name that nothing defines.
    UnknownType(String),
    /// A cell payload that does not fit the 24 bits left next to the opcode.
    EncodingOverflow { op: Option<OpCode>, value: usize },
    /// A type that cannot cross the call boundary by value, such as a struct holding a
    /// bit-field.
    UnsupportedByValue { ty: String, function: String },
    /// Two definitions share a struct/union/enum tag.
    DuplicateTag(String),
    /// Two global declarations share a name.
    DuplicateName(String),
    InvalidBitField { ty: String, width: u16 },
    /// A slot that layout reserved but no emitter filled.
    UnfilledSlot(usize),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UnknownType(name) => write!(f, "unknown type '{name}'"),
            CompileError::EncodingOverflow { op, value } => match op {
                Some(op) => write!(f, "argument {value} of {} exceeds the payload width", op.name()),
                None => write!(f, "length {value} exceeds the cell width"),
            },
            CompileError::UnsupportedByValue { ty, function } => write!(
                f,
                "'{ty}' cannot be passed or returned by value in '{function}'"
            ),
            CompileError::DuplicateTag(tag) => write!(f, "'{tag}' is defined more than once"),
            CompileError::DuplicateName(name) => write!(f, "'{name}' is declared more than once"),
            CompileError::InvalidBitField { ty, width } => {
                write!(f, "invalid bit-field of width {width} on '{ty}'")
            }
            CompileError::UnfilledSlot(index) => write!(f, "type table slot {index} was never filled"),
        }
    }
}

impl Error for CompileError {}
