//! Entry point for the `cdef` subsystem: the in-memory model of declared C types and the
//! declaration list a collector builds from it.

pub mod arena;
pub mod builder;
pub mod fmt;
pub mod interface;
pub mod record;

pub use arena::{EnumId, StringId, StructId, TypeArena, TypeId};
pub use builder::{AggregateBuilder, EnumBuilder, FunctionBuilder, TypeBuilder};
pub use fmt::{TypeFormatter, c_name, describe_type};
pub use interface::{Declaration, Interface};
pub use record::{
    AggregateKind, ArrayLength, BitFieldType, EnumRecord, EnumVariant, FieldRecord,
    FunctionType, MemberSpan, StructRecord, TagState, TypeRecord,
};
