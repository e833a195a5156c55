//! Defines the canonical type records stored inside the type arena.

use smallvec::SmallVec;

use crate::opcode::Primitive;

use super::arena::{EnumId, StringId, StructId, TypeId};

/// Element count of an array type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArrayLength {
    Fixed(usize),
    /// `T x[]`
    Open,
    /// `T x[...]`, filled in by native verification. The serial keeps every occurrence distinct.
    Unresolved(u32),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub result: TypeId,
    pub args: SmallVec<[TypeId; 4]>,
    pub variadic: bool,
}

impl FunctionType {
    pub fn new(result: TypeId) -> Self {
        Self {
            result,
            args: SmallVec::new(),
            variadic: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BitFieldType {
    pub base: TypeId,
    pub width: u16,
}

/// All supported type shapes. Struct, union, and enum nodes refer to their tag record so two
/// distinct tags never compare equal, whatever their contents.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeRecord {
    Primitive(Primitive),
    Pointer(TypeId),
    Array { item: TypeId, length: ArrayLength },
    StructUnion(StructId),
    Enum(EnumId),
    /// Typedef declared with an unknown underlying type.
    Opaque(StringId),
    Function(FunctionType),
    BitField(BitFieldType),
}

impl TypeRecord {
    pub fn as_function(&self) -> Option<&FunctionType> {
        if let TypeRecord::Function(value) = self {
            Some(value)
        } else {
            None
        }
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        if let TypeRecord::Primitive(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, TypeRecord::Function(_))
    }
}

/// Describes a contiguous slice of fields stored inside the arena side table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemberSpan {
    start: u32,
    len: u32,
}

impl MemberSpan {
    pub fn empty() -> Self {
        Self { start: 0, len: 0 }
    }

    pub fn new(start: usize, len: usize) -> Self {
        Self {
            start: start as u32,
            len: len as u32,
        }
    }

    pub fn start(&self) -> usize {
        self.start as usize
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldRecord {
    pub name_id: StringId,
    pub ty: TypeId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateKind {
    Struct,
    Union,
}

impl AggregateKind {
    pub fn keyword(self) -> &'static str {
        match self {
            AggregateKind::Struct => "struct",
            AggregateKind::Union => "union",
        }
    }
}

/// How much is known about a tag so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagState {
    /// Mentioned through `struct foo` but never declared.
    Referenced,
    /// `struct foo;`
    Opaque,
    Defined,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructRecord {
    pub name_id: StringId,
    pub kind: AggregateKind,
    pub state: TagState,
    pub fields: MemberSpan,
    /// Declared with a trailing `...;`, so the real layout may hold more fields.
    pub partial: bool,
}

impl StructRecord {
    pub fn new(name_id: StringId, kind: AggregateKind) -> Self {
        Self {
            name_id,
            kind,
            state: TagState::Referenced,
            fields: MemberSpan::empty(),
            partial: false,
        }
    }

    pub fn is_union(&self) -> bool {
        matches!(self.kind, AggregateKind::Union)
    }

    pub fn is_opaque(&self) -> bool {
        !matches!(self.state, TagState::Defined)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumVariant {
    pub label: StringId,
    pub value: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumRecord {
    pub name_id: StringId,
    pub underlying: Primitive,
    pub defined: bool,
    pub variants: SmallVec<[EnumVariant; 4]>,
}

impl EnumRecord {
    pub fn new(name_id: StringId) -> Self {
        Self {
            name_id,
            underlying: Primitive::INT,
            defined: false,
            variants: SmallVec::new(),
        }
    }
}
