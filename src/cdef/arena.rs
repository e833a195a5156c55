//! Stores hash-consed type records plus the tag and typedef registries of one interface.
//!
//! Children are referenced by [`TypeId`], never owned, so self-referencing structs need no
//! special casing.

use std::num::NonZeroU32;

use ahash::AHashMap;

use crate::error::{CompileError, CompileResult};

use super::record::{
    AggregateKind, EnumRecord, FieldRecord, MemberSpan, StructRecord, TypeRecord,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(NonZeroU32);

impl TypeId {
    pub fn from_index(index: usize) -> Self {
        let raw = NonZeroU32::new((index as u32) + 1).expect("index overflow");
        Self(raw)
    }

    pub fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StringId(NonZeroU32);

impl StringId {
    fn from_index(index: usize) -> Self {
        let raw = NonZeroU32::new((index as u32) + 1).expect("string index overflow");
        Self(raw)
    }

    pub fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StructId(u32);

impl StructId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EnumId(u32);

impl EnumId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Default, Debug)]
struct StringPool {
    values: Vec<String>,
    lookup: AHashMap<String, StringId>,
}

impl StringPool {
    fn intern<S: AsRef<str>>(&mut self, value: S) -> StringId {
        let value_ref = value.as_ref();
        if let Some(id) = self.lookup.get(value_ref) {
            return *id;
        }
        let owned = value_ref.to_owned();
        let id = StringId::from_index(self.values.len());
        self.values.push(owned.clone());
        self.lookup.insert(owned, id);
        id
    }

    fn lookup(&self, value: &str) -> Option<StringId> {
        self.lookup.get(value).copied()
    }

    fn resolve(&self, id: StringId) -> &str {
        &self.values[id.index()]
    }
}

#[derive(Default, Debug)]
pub struct TypeArena {
    records: Vec<TypeRecord>,
    dedup: AHashMap<TypeRecord, TypeId>,
    members: Vec<FieldRecord>,
    structs: Vec<StructRecord>,
    struct_tags: AHashMap<StringId, StructId>,
    enums: Vec<EnumRecord>,
    enum_tags: AHashMap<StringId, EnumId>,
    typedefs: AHashMap<StringId, TypeId>,
    strings: StringPool,
    next_unresolved: u32,
}

impl TypeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing id for a structurally equal record, or stores a new one.
    pub fn intern(&mut self, record: TypeRecord) -> TypeId {
        if let Some(id) = self.dedup.get(&record) {
            return *id;
        }
        let id = TypeId::from_index(self.records.len());
        self.records.push(record.clone());
        self.dedup.insert(record, id);
        id
    }

    pub fn get(&self, id: TypeId) -> &TypeRecord {
        &self.records[id.index()]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn alloc_members<I>(&mut self, members: I) -> MemberSpan
    where
        I: IntoIterator<Item = FieldRecord>,
    {
        let start = self.members.len();
        self.members.extend(members);
        MemberSpan::new(start, self.members.len() - start)
    }

    pub fn members(&self, span: MemberSpan) -> &[FieldRecord] {
        let start = span.start();
        let end = start + span.len();
        &self.members[start..end]
    }

    pub fn intern_string<S: AsRef<str>>(&mut self, value: S) -> StringId {
        self.strings.intern(value)
    }

    pub fn resolve_string(&self, id: StringId) -> &str {
        self.strings.resolve(id)
    }

    /// Finds or creates the record behind a struct/union tag. Struct, union and enum tags
    /// share one namespace, so reusing a tag with another keyword is rejected.
    pub fn struct_tag(&mut self, name: &str, kind: AggregateKind) -> CompileResult<StructId> {
        let name_id = self.intern_string(name);
        if self.enum_tags.contains_key(&name_id) {
            return Err(CompileError::DuplicateTag(format!("{} {name}", kind.keyword())));
        }
        if let Some(id) = self.struct_tags.get(&name_id) {
            let existing = &self.structs[id.index()];
            if existing.kind != kind {
                return Err(CompileError::DuplicateTag(format!("{} {name}", kind.keyword())));
            }
            return Ok(*id);
        }
        let id = StructId(self.structs.len() as u32);
        self.structs.push(StructRecord::new(name_id, kind));
        self.struct_tags.insert(name_id, id);
        Ok(id)
    }

    pub fn structure(&self, id: StructId) -> &StructRecord {
        &self.structs[id.index()]
    }

    pub fn structure_mut(&mut self, id: StructId) -> &mut StructRecord {
        &mut self.structs[id.index()]
    }

    pub fn enum_tag(&mut self, name: &str) -> CompileResult<EnumId> {
        let name_id = self.intern_string(name);
        if self.struct_tags.contains_key(&name_id) {
            return Err(CompileError::DuplicateTag(format!("enum {name}")));
        }
        if let Some(id) = self.enum_tags.get(&name_id) {
            return Ok(*id);
        }
        let id = EnumId(self.enums.len() as u32);
        self.enums.push(EnumRecord::new(name_id));
        self.enum_tags.insert(name_id, id);
        Ok(id)
    }

    pub fn enumeration(&self, id: EnumId) -> &EnumRecord {
        &self.enums[id.index()]
    }

    pub fn enumeration_mut(&mut self, id: EnumId) -> &mut EnumRecord {
        &mut self.enums[id.index()]
    }

    pub fn register_typedef(&mut self, name: &str, target: TypeId) {
        let name_id = self.intern_string(name);
        self.typedefs.insert(name_id, target);
    }

    pub fn typedef(&self, name: &str) -> Option<TypeId> {
        let name_id = self.strings.lookup(name)?;
        self.typedefs.get(&name_id).copied()
    }

    pub(crate) fn next_unresolved_serial(&mut self) -> u32 {
        let serial = self.next_unresolved;
        self.next_unresolved += 1;
        serial
    }
}
