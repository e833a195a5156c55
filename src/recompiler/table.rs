//! The immutable output of a compilation: opcode cells plus the side tables that give them
//! names.

use std::fmt;

use ahash::AHashMap;
use bitflags::bitflags;
use sha2::{Digest, Sha256};

use crate::opcode::{CffiOp, OpCode, Primitive};

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct StructFlags: u8 {
        const UNION = 0b0001;
        /// Declared without a body; no fields are known.
        const OPAQUE = 0b0010;
        /// Declared with `...;`; the native layout may carry more fields.
        const PARTIAL = 0b0100;
        /// At least one field is a bit-field.
        const HAS_BITFIELD = 0b1000;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlobalKind {
    Function { arity: usize, variadic: bool },
    Variable,
    Constant,
    Macro,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobalEntry {
    pub name: String,
    pub kind: GlobalKind,
    /// Cell of the declared type; macros have none.
    pub type_index: Option<u32>,
}

impl GlobalEntry {
    /// Entry-point cell for functions, chosen by how the arguments are passed.
    pub fn entry_op(&self) -> Option<CffiOp> {
        let GlobalKind::Function { arity, variadic } = self.kind else {
            return None;
        };
        let op = match (arity, variadic) {
            (0, false) => OpCode::CallNoArgs,
            (1, false) => OpCode::CallOneArg,
            _ => OpCode::CallVarargs,
        };
        let index = self.type_index?;
        CffiOp::new(op, index as usize).ok()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldEntry {
    pub name: String,
    pub type_index: u32,
    pub bit_width: Option<u16>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructUnionEntry {
    pub name: String,
    pub type_index: u32,
    pub flags: StructFlags,
    pub fields: Vec<FieldEntry>,
}

impl StructUnionEntry {
    pub fn is_union(&self) -> bool {
        self.flags.contains(StructFlags::UNION)
    }

    pub fn is_opaque(&self) -> bool {
        self.flags.contains(StructFlags::OPAQUE)
    }

    pub fn c_name(&self) -> String {
        let keyword = if self.is_union() { "union" } else { "struct" };
        format!("{keyword} {}", self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumEntry {
    pub name: String,
    pub type_index: u32,
    pub underlying: Primitive,
    pub enumerators: Vec<(String, i64)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypedefEntry {
    pub name: String,
    pub type_index: u32,
}

/// A length cell waiting for the native build to report the real count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnresolvedLength {
    pub cell: u32,
    /// `name` for a global, `struct tag.field` for a field.
    pub owner: String,
}

#[derive(Clone, Debug, Default)]
pub struct CompiledTable {
    pub(crate) cells: Vec<CffiOp>,
    pub(crate) names: AHashMap<String, u32>,
    pub(crate) globals: Vec<GlobalEntry>,
    pub(crate) struct_unions: Vec<StructUnionEntry>,
    pub(crate) enums: Vec<EnumEntry>,
    pub(crate) typedefs: Vec<TypedefEntry>,
    pub(crate) unresolved: Vec<UnresolvedLength>,
}

impl CompiledTable {
    pub fn cells(&self) -> &[CffiOp] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Encoded cells, ready to embed as an integer array literal.
    pub fn words(&self) -> Vec<u32> {
        self.cells.iter().map(|cell| cell.as_word()).collect()
    }

    /// Start index of a global, typedef, or tag (`struct foo_s`, `enum e`).
    pub fn index_of(&self, name: &str) -> Option<u32> {
        self.names.get(name).copied()
    }

    pub fn globals(&self) -> &[GlobalEntry] {
        &self.globals
    }

    pub fn global(&self, name: &str) -> Option<&GlobalEntry> {
        self.globals
            .binary_search_by(|entry| entry.name.as_str().cmp(name))
            .ok()
            .map(|pos| &self.globals[pos])
    }

    pub fn struct_unions(&self) -> &[StructUnionEntry] {
        &self.struct_unions
    }

    pub fn struct_union(&self, c_name: &str) -> Option<&StructUnionEntry> {
        self.struct_unions.iter().find(|entry| entry.c_name() == c_name)
    }

    pub fn enums(&self) -> &[EnumEntry] {
        &self.enums
    }

    pub fn typedefs(&self) -> &[TypedefEntry] {
        &self.typedefs
    }

    pub fn unresolved_lengths(&self) -> &[UnresolvedLength] {
        &self.unresolved
    }

    /// SHA-256 over the encoded cells and global names, hex encoded. Two tables with the same
    /// fingerprint embed identically.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for word in self.words() {
            hasher.update(word.to_le_bytes());
        }
        for entry in &self.globals {
            hasher.update(entry.name.as_bytes());
            hasher.update([0u8]);
        }
        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }
}

impl fmt::Display for CompiledTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cell in &self.cells {
            write!(f, "{cell}")?;
        }
        Ok(())
    }
}
