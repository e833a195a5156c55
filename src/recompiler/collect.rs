//! Turns the declarations of an [`Interface`] into a flat, deduplicated opcode table.
//!
//! Compilation runs in three passes over every reachable type, ordered by canonical C
//! spelling:
//!
//! 1. each function type claims a FUNCTION slot, one slot per argument, and a FUNCTION_END
//!    slot; an argument type that has no slot yet takes ownership of its argument slot,
//! 2. every other type without a slot claims one, plus a trailing length cell for arrays and
//!    bit-fields,
//! 3. every type fills its own slot, and functions fill the argument slots they do not own
//!    with either a repeated PRIMITIVE cell or a NOOP pointing at the owner.

use std::iter;

use ahash::{AHashMap, AHashSet};
use tracing::{debug, trace};

use crate::cdef::{
    Declaration, EnumId, Interface, StructId, TypeArena, TypeId, TypeRecord, c_name,
    record::{ArrayLength, FunctionType, TagState},
};
use crate::error::{CompileError, CompileResult};
use crate::opcode::{CffiOp, OpCode};

use super::table::{
    CompiledTable, EnumEntry, FieldEntry, GlobalEntry, GlobalKind, StructFlags, StructUnionEntry,
    TypedefEntry, UnresolvedLength,
};

/// Compiles one interface with a fresh context.
pub fn collect_type_table(interface: &Interface) -> CompileResult<CompiledTable> {
    Recompiler::new(interface).collect_type_table()
}

fn to_index(value: usize) -> CompileResult<u32> {
    u32::try_from(value).map_err(|_| CompileError::EncodingOverflow { op: None, value })
}

/// Compilation state for a single interface. Nothing in it is shared, so separate interfaces
/// can compile on separate threads.
pub struct Recompiler<'a> {
    interface: &'a Interface,
    arena: &'a TypeArena,
    collected: AHashSet<TypeId>,
    reachable: Vec<TypeId>,
    slots: AHashMap<TypeId, usize>,
    cells: Vec<Option<CffiOp>>,
    struct_positions: AHashMap<StructId, usize>,
    enum_positions: AHashMap<EnumId, usize>,
    typedef_positions: AHashMap<&'a str, usize>,
    unresolved_cells: AHashMap<TypeId, u32>,
}

impl<'a> Recompiler<'a> {
    pub fn new(interface: &'a Interface) -> Self {
        Self {
            interface,
            arena: interface.arena(),
            collected: AHashSet::new(),
            reachable: Vec::new(),
            slots: AHashMap::new(),
            cells: Vec::new(),
            struct_positions: AHashMap::new(),
            enum_positions: AHashMap::new(),
            typedef_positions: AHashMap::new(),
            unresolved_cells: AHashMap::new(),
        }
    }

    pub fn collect_type_table(mut self) -> CompileResult<CompiledTable> {
        let declarations = self.interface.declarations();
        for ty in declarations.iter().filter_map(Declaration::ty) {
            self.collect(ty);
        }
        self.check_tags()?;
        self.check_by_value()?;

        let ordered = self.walk_order();
        self.assign_positions(&ordered);
        self.layout_functions(&ordered);
        self.layout_others(&ordered);
        for id in &ordered {
            self.emit(*id)?;
        }

        let cells = std::mem::take(&mut self.cells)
            .into_iter()
            .enumerate()
            .map(|(index, cell)| cell.ok_or(CompileError::UnfilledSlot(index)))
            .collect::<CompileResult<Vec<_>>>()?;

        let mut table = CompiledTable {
            cells,
            ..CompiledTable::default()
        };
        table.struct_unions = self.struct_entries(&ordered)?;
        table.enums = self.enum_entries(&ordered)?;
        table.typedefs = self.typedef_entries()?;
        self.register_globals(&mut table)?;
        table.unresolved = self.unresolved_owners();

        debug!(
            target: "recompiler",
            declarations = declarations.len(),
            types = ordered.len(),
            cells = table.len(),
            struct_unions = table.struct_unions.len(),
            unresolved = table.unresolved.len(),
            "type table collected"
        );
        Ok(table)
    }

    fn collect(&mut self, id: TypeId) {
        if !self.collected.insert(id) {
            return;
        }
        self.reachable.push(id);
        let arena = self.arena;
        match arena.get(id) {
            TypeRecord::Primitive(_) | TypeRecord::Enum(_) | TypeRecord::Opaque(_) => {}
            TypeRecord::Pointer(target) => self.collect(*target),
            TypeRecord::Array { item, .. } => self.collect(*item),
            TypeRecord::BitField(bitfield) => self.collect(bitfield.base),
            TypeRecord::Function(function) => {
                for arg in &function.args {
                    self.collect(*arg);
                }
                self.collect(function.result);
            }
            TypeRecord::StructUnion(sid) => {
                let record = arena.structure(*sid);
                for field in arena.members(record.fields) {
                    self.collect(field.ty);
                }
            }
        }
    }

    /// Every tag reached must at least have been declared.
    fn check_tags(&self) -> CompileResult<()> {
        for id in &self.reachable {
            let undeclared = match self.arena.get(*id) {
                TypeRecord::StructUnion(sid) => {
                    self.arena.structure(*sid).state == TagState::Referenced
                }
                TypeRecord::Enum(eid) => !self.arena.enumeration(*eid).defined,
                _ => false,
            };
            if undeclared {
                return Err(CompileError::UnknownType(c_name(self.arena, *id)));
            }
        }
        Ok(())
    }

    /// Rejects parameters and results that cannot cross the call boundary by value.
    fn check_by_value(&self) -> CompileResult<()> {
        for id in &self.reachable {
            let Some(function) = self.arena.get(*id).as_function() else {
                continue;
            };
            let result = iter::once((function.result, true));
            for (ty, is_result) in result.chain(function.args.iter().map(|arg| (*arg, false))) {
                let rejected = match self.arena.get(ty) {
                    TypeRecord::BitField(_) => true,
                    TypeRecord::Array { .. } => is_result,
                    TypeRecord::StructUnion(_) => self.holds_bitfield(ty, &mut AHashSet::new()),
                    _ => false,
                };
                if rejected {
                    return Err(CompileError::UnsupportedByValue {
                        ty: c_name(self.arena, ty),
                        function: c_name(self.arena, *id),
                    });
                }
            }
        }
        Ok(())
    }

    fn holds_bitfield(&self, ty: TypeId, visiting: &mut AHashSet<TypeId>) -> bool {
        match self.arena.get(ty) {
            TypeRecord::BitField(_) => true,
            TypeRecord::Array { item, .. } => self.holds_bitfield(*item, visiting),
            TypeRecord::StructUnion(sid) => {
                if !visiting.insert(ty) {
                    return false;
                }
                let record = self.arena.structure(*sid);
                self.arena
                    .members(record.fields)
                    .iter()
                    .any(|field| self.holds_bitfield(field.ty, visiting))
            }
            _ => false,
        }
    }

    /// Canonical spelling first, arena creation order for the `[...]` arrays that share one.
    fn walk_order(&self) -> Vec<TypeId> {
        let mut keyed: Vec<(String, TypeId)> = self
            .reachable
            .iter()
            .map(|id| (c_name(self.arena, *id), *id))
            .collect();
        keyed.sort();
        keyed.into_iter().map(|(_, id)| id).collect()
    }

    fn assign_positions(&mut self, ordered: &[TypeId]) {
        for id in ordered {
            match self.arena.get(*id) {
                TypeRecord::StructUnion(sid) => {
                    let next = self.struct_positions.len();
                    self.struct_positions.insert(*sid, next);
                }
                TypeRecord::Enum(eid) => {
                    let next = self.enum_positions.len();
                    self.enum_positions.insert(*eid, next);
                }
                _ => {}
            }
        }
        let mut names: Vec<&'a str> = self
            .interface
            .declarations()
            .iter()
            .filter_map(|decl| match decl {
                Declaration::Typedef { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        names.sort_unstable();
        for (position, name) in names.into_iter().enumerate() {
            self.typedef_positions.insert(name, position);
        }
    }

    fn reserve(&mut self, count: usize) -> usize {
        let start = self.cells.len();
        self.cells.resize(start + count, None);
        start
    }

    fn layout_functions(&mut self, ordered: &[TypeId]) {
        let arena = self.arena;
        for id in ordered {
            let Some(function) = arena.get(*id).as_function() else {
                continue;
            };
            let start = self.reserve(1);
            self.slots.insert(*id, start);
            for arg in &function.args {
                let position = self.reserve(1);
                self.slots.entry(*arg).or_insert(position);
            }
            self.reserve(1);
            trace!(
                target: "recompiler",
                function = %c_name(arena, *id),
                start,
                "function slots reserved"
            );
        }
    }

    fn layout_others(&mut self, ordered: &[TypeId]) {
        for id in ordered {
            if self.slots.contains_key(id) {
                continue;
            }
            let width = match self.arena.get(*id) {
                TypeRecord::Array {
                    length: ArrayLength::Fixed(_) | ArrayLength::Unresolved(_),
                    ..
                }
                | TypeRecord::BitField(_) => 2,
                _ => 1,
            };
            let start = self.reserve(width);
            self.slots.insert(*id, start);
        }
    }

    fn slot(&self, id: TypeId) -> CompileResult<usize> {
        self.slots
            .get(&id)
            .copied()
            .ok_or_else(|| CompileError::UnknownType(c_name(self.arena, id)))
    }

    fn set(&mut self, index: usize, op: OpCode, arg: usize) -> CompileResult<()> {
        self.cells[index] = Some(CffiOp::new(op, arg)?);
        Ok(())
    }

    fn emit(&mut self, id: TypeId) -> CompileResult<()> {
        let index = self.slot(id)?;
        let arena = self.arena;
        match arena.get(id) {
            TypeRecord::Primitive(primitive) => {
                self.set(index, OpCode::Primitive, primitive.index() as usize)?
            }
            TypeRecord::Pointer(target) => self.set(index, OpCode::Pointer, self.slot(*target)?)?,
            TypeRecord::Array { item, length } => {
                let item = self.slot(*item)?;
                match length {
                    ArrayLength::Fixed(count) => {
                        self.set(index, OpCode::Array, item)?;
                        self.cells[index + 1] = Some(CffiOp::length(*count)?);
                    }
                    ArrayLength::Unresolved(_) => {
                        self.set(index, OpCode::Array, item)?;
                        self.cells[index + 1] = Some(CffiOp::unresolved_length());
                        self.unresolved_cells.insert(id, to_index(index + 1)?);
                    }
                    ArrayLength::Open => self.set(index, OpCode::OpenArray, item)?,
                }
            }
            TypeRecord::StructUnion(sid) => {
                let position = self
                    .struct_positions
                    .get(sid)
                    .copied()
                    .ok_or(CompileError::UnfilledSlot(index))?;
                self.set(index, OpCode::StructUnion, position)?
            }
            TypeRecord::Enum(eid) => {
                let position = self
                    .enum_positions
                    .get(eid)
                    .copied()
                    .ok_or(CompileError::UnfilledSlot(index))?;
                self.set(index, OpCode::Enum, position)?
            }
            TypeRecord::Opaque(name_id) => {
                let name = arena.resolve_string(*name_id);
                let position = self
                    .typedef_positions
                    .get(name)
                    .copied()
                    .ok_or_else(|| CompileError::UnknownType(name.to_owned()))?;
                self.set(index, OpCode::Typename, position)?
            }
            TypeRecord::BitField(bitfield) => {
                self.set(index, OpCode::BitField, self.slot(bitfield.base)?)?;
                self.cells[index + 1] = Some(CffiOp::length(bitfield.width as usize)?);
            }
            TypeRecord::Function(function) => self.emit_function(index, function)?,
        }
        Ok(())
    }

    fn emit_function(&mut self, index: usize, function: &FunctionType) -> CompileResult<()> {
        self.set(index, OpCode::Function, self.slot(function.result)?)?;
        let mut position = index + 1;
        for arg in &function.args {
            let owner = self.slot(*arg)?;
            if owner != position {
                match self.arena.get(*arg) {
                    TypeRecord::Primitive(primitive) => {
                        self.set(position, OpCode::Primitive, primitive.index() as usize)?
                    }
                    _ => self.set(position, OpCode::Noop, owner)?,
                }
            }
            position += 1;
        }
        self.set(position, OpCode::FunctionEnd, function.variadic as usize)
    }

    fn struct_entries(&self, ordered: &[TypeId]) -> CompileResult<Vec<StructUnionEntry>> {
        let mut entries = Vec::with_capacity(self.struct_positions.len());
        for id in ordered {
            let TypeRecord::StructUnion(sid) = self.arena.get(*id) else {
                continue;
            };
            let record = self.arena.structure(*sid);
            let mut flags = StructFlags::empty();
            flags.set(StructFlags::UNION, record.is_union());
            flags.set(StructFlags::OPAQUE, record.is_opaque());
            flags.set(StructFlags::PARTIAL, record.partial);
            let mut fields = Vec::with_capacity(record.fields.len());
            for field in self.arena.members(record.fields) {
                let bit_width = match self.arena.get(field.ty) {
                    TypeRecord::BitField(bitfield) => Some(bitfield.width),
                    _ => None,
                };
                if bit_width.is_some() {
                    flags.insert(StructFlags::HAS_BITFIELD);
                }
                fields.push(FieldEntry {
                    name: self.arena.resolve_string(field.name_id).to_owned(),
                    type_index: to_index(self.slot(field.ty)?)?,
                    bit_width,
                });
            }
            entries.push(StructUnionEntry {
                name: self.arena.resolve_string(record.name_id).to_owned(),
                type_index: to_index(self.slot(*id)?)?,
                flags,
                fields,
            });
        }
        Ok(entries)
    }

    fn enum_entries(&self, ordered: &[TypeId]) -> CompileResult<Vec<EnumEntry>> {
        let mut entries = Vec::with_capacity(self.enum_positions.len());
        for id in ordered {
            let TypeRecord::Enum(eid) = self.arena.get(*id) else {
                continue;
            };
            let record = self.arena.enumeration(*eid);
            entries.push(EnumEntry {
                name: self.arena.resolve_string(record.name_id).to_owned(),
                type_index: to_index(self.slot(*id)?)?,
                underlying: record.underlying,
                enumerators: record
                    .variants
                    .iter()
                    .map(|variant| {
                        (self.arena.resolve_string(variant.label).to_owned(), variant.value)
                    })
                    .collect(),
            });
        }
        Ok(entries)
    }

    fn typedef_entries(&self) -> CompileResult<Vec<TypedefEntry>> {
        let mut entries = Vec::new();
        for decl in self.interface.declarations() {
            if let Declaration::Typedef { name, ty } = decl {
                entries.push(TypedefEntry {
                    name: name.clone(),
                    type_index: to_index(self.slot(*ty)?)?,
                });
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn register_globals(&self, table: &mut CompiledTable) -> CompileResult<()> {
        for decl in self.interface.declarations() {
            let (name, kind) = match decl {
                Declaration::Function { name, ty } => {
                    let function = self.arena.get(*ty).as_function();
                    let kind = GlobalKind::Function {
                        arity: function.map_or(0, |f| f.args.len()),
                        variadic: function.is_some_and(|f| f.variadic),
                    };
                    (name.clone(), Some(kind))
                }
                Declaration::Variable { name, .. } => (name.clone(), Some(GlobalKind::Variable)),
                Declaration::Constant { name, .. } => (name.clone(), Some(GlobalKind::Constant)),
                Declaration::Macro { name } => (name.clone(), Some(GlobalKind::Macro)),
                Declaration::Typedef { name, .. } => (name.clone(), None),
                Declaration::Tag(ty) => (c_name(self.arena, *ty), None),
            };
            let type_index = match decl.ty() {
                Some(ty) => Some(to_index(self.slot(ty)?)?),
                None => None,
            };
            if let Some(index) = type_index {
                table.names.insert(name.clone(), index);
            }
            if let Some(kind) = kind {
                table.globals.push(GlobalEntry {
                    name,
                    kind,
                    type_index,
                });
            }
        }
        table.globals.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(())
    }

    fn unresolved_owners(&self) -> Vec<UnresolvedLength> {
        let mut owners = Vec::new();
        let mut seen = AHashSet::new();
        let mut claim = |ty: TypeId, owner: String| {
            if let Some(cell) = self.unresolved_cells.get(&ty) {
                if seen.insert(*cell) {
                    owners.push(UnresolvedLength { cell: *cell, owner });
                }
            }
        };
        for decl in self.interface.declarations() {
            match decl {
                Declaration::Variable { name, ty } | Declaration::Constant { name, ty } => {
                    claim(*ty, name.clone())
                }
                Declaration::Tag(ty) => {
                    if let TypeRecord::StructUnion(sid) = self.arena.get(*ty) {
                        let record = self.arena.structure(*sid);
                        for field in self.arena.members(record.fields) {
                            let owner = format!(
                                "{}.{}",
                                c_name(self.arena, *ty),
                                self.arena.resolve_string(field.name_id)
                            );
                            claim(field.ty, owner);
                        }
                    }
                }
                _ => {}
            }
        }
        if owners.len() != self.unresolved_cells.len() {
            // `[...]` arrays reached only through pointers or nested types are named by cell.
            let mut orphans: Vec<(u32, TypeId)> = self
                .unresolved_cells
                .iter()
                .filter(|(_, cell)| !seen.contains(*cell))
                .map(|(ty, cell)| (*cell, *ty))
                .collect();
            orphans.sort();
            for (cell, ty) in orphans {
                owners.push(UnresolvedLength {
                    cell,
                    owner: format!("{}@{cell}", c_name(self.arena, ty)),
                });
            }
        }
        owners.sort_by_key(|entry| entry.cell);
        owners
    }
}
