//! Entry point for the `recompiler` subsystem: the type-table compiler and its output.

pub mod collect;
pub mod decode;
pub mod table;

pub use collect::{Recompiler, collect_type_table};
pub use decode::TableReader;
pub use table::{
    CompiledTable, EnumEntry, FieldEntry, GlobalEntry, GlobalKind, StructFlags, StructUnionEntry,
    TypedefEntry, UnresolvedLength,
};
