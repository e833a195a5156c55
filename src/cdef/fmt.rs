//! Canonical C spelling of arena types. The spelling doubles as the sort key that fixes the
//! layout order of a compiled table, so it must stay stable.

use std::fmt;

use super::arena::{TypeArena, TypeId};
use super::record::{ArrayLength, TypeRecord};

/// Placeholder for where a declarator name would go while spellings are nested.
pub(crate) const MARKER: char = '&';

pub(crate) fn pointer_marker(target: &TypeRecord) -> &'static str {
    match target {
        TypeRecord::Function(_) => "*&",
        TypeRecord::Array { .. } => "(*&)",
        _ => " *&",
    }
}

pub(crate) fn array_marker(length: ArrayLength) -> String {
    match length {
        ArrayLength::Fixed(count) => format!("&[{count}]"),
        ArrayLength::Open => "&[]".to_owned(),
        ArrayLength::Unresolved(_) => "&[...]".to_owned(),
    }
}

pub(crate) fn function_marker(args: &[String], variadic: bool) -> String {
    let mut parts: Vec<&str> = args.iter().map(String::as_str).collect();
    if variadic {
        parts.push("...");
    }
    if parts.is_empty() {
        parts.push("void");
    }
    format!("(&)({})", parts.join(", "))
}

fn spelling_with_marker(arena: &TypeArena, id: TypeId) -> String {
    match arena.get(id) {
        TypeRecord::Primitive(primitive) => format!("{}&", primitive.name()),
        TypeRecord::StructUnion(sid) => {
            let record = arena.structure(*sid);
            format!(
                "{} {}&",
                record.kind.keyword(),
                arena.resolve_string(record.name_id)
            )
        }
        TypeRecord::Enum(eid) => {
            let record = arena.enumeration(*eid);
            format!("enum {}&", arena.resolve_string(record.name_id))
        }
        TypeRecord::Opaque(name_id) => format!("{}&", arena.resolve_string(*name_id)),
        TypeRecord::Pointer(target) => {
            let inner = spelling_with_marker(arena, *target);
            inner.replacen(MARKER, pointer_marker(arena.get(*target)), 1)
        }
        TypeRecord::Array { item, length } => {
            let inner = spelling_with_marker(arena, *item);
            inner.replacen(MARKER, &array_marker(*length), 1)
        }
        TypeRecord::Function(function) => {
            let args: Vec<String> = function.args.iter().map(|arg| c_name(arena, *arg)).collect();
            let inner = spelling_with_marker(arena, function.result);
            inner.replacen(MARKER, &function_marker(&args, function.variadic), 1)
        }
        TypeRecord::BitField(bitfield) => {
            format!("{}:{}", spelling_with_marker(arena, bitfield.base), bitfield.width)
        }
    }
}

/// Spells a type the way a C declaration without a declarator name would, e.g. `int(*)(long)`.
pub fn c_name(arena: &TypeArena, id: TypeId) -> String {
    spelling_with_marker(arena, id).replacen(MARKER, "", 1)
}

pub struct TypeFormatter<'a> {
    arena: &'a TypeArena,
    id: TypeId,
}

impl<'a> TypeFormatter<'a> {
    pub fn new(arena: &'a TypeArena, id: TypeId) -> Self {
        Self { arena, id }
    }
}

impl<'a> fmt::Display for TypeFormatter<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&c_name(self.arena, self.id))
    }
}

pub fn describe_type(arena: &TypeArena, id: TypeId) -> TypeFormatter<'_> {
    TypeFormatter::new(arena, id)
}
