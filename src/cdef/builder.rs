//! Fluent construction helpers used by a declaration collector to populate the arena.

use smallvec::SmallVec;

use crate::error::{CompileError, CompileResult};
use crate::opcode::Primitive;

use super::arena::{EnumId, StringId, StructId, TypeArena, TypeId};
use super::record::{
    AggregateKind, ArrayLength, BitFieldType, EnumVariant, FieldRecord, FunctionType, TagState,
    TypeRecord,
};

pub struct TypeBuilder<'arena> {
    arena: &'arena mut TypeArena,
}

impl<'arena> TypeBuilder<'arena> {
    pub fn new(arena: &'arena mut TypeArena) -> Self {
        Self { arena }
    }

    pub fn intern<S: AsRef<str>>(&mut self, name: S) -> StringId {
        self.arena.intern_string(name)
    }

    pub fn primitive(&mut self, name: &str) -> CompileResult<TypeId> {
        let primitive =
            Primitive::from_name(name).ok_or_else(|| CompileError::UnknownType(name.to_owned()))?;
        Ok(self.declare_primitive(primitive))
    }

    pub fn declare_primitive(&mut self, primitive: Primitive) -> TypeId {
        self.arena.intern(TypeRecord::Primitive(primitive))
    }

    pub fn void(&mut self) -> TypeId {
        self.declare_primitive(Primitive::VOID)
    }

    pub fn pointer(&mut self, target: TypeId) -> TypeId {
        self.arena.intern(TypeRecord::Pointer(target))
    }

    pub fn array(&mut self, item: TypeId, count: usize) -> TypeId {
        self.array_with(item, ArrayLength::Fixed(count))
    }

    pub fn open_array(&mut self, item: TypeId) -> TypeId {
        self.array_with(item, ArrayLength::Open)
    }

    /// `T[...]`: every call yields a fresh type so each occurrence gets its own length.
    pub fn unresolved_array(&mut self, item: TypeId) -> TypeId {
        let serial = self.arena.next_unresolved_serial();
        self.array_with(item, ArrayLength::Unresolved(serial))
    }

    fn array_with(&mut self, item: TypeId, length: ArrayLength) -> TypeId {
        self.arena.intern(TypeRecord::Array { item, length })
    }

    pub fn bitfield(&mut self, base: TypeId, width: u16) -> CompileResult<TypeId> {
        let integral = self
            .arena
            .get(base)
            .as_primitive()
            .is_some_and(Primitive::is_integer);
        if width == 0 || !integral {
            return Err(CompileError::InvalidBitField {
                ty: super::fmt::c_name(self.arena, base),
                width,
            });
        }
        Ok(self.arena.intern(TypeRecord::BitField(BitFieldType { base, width })))
    }

    /// References `struct name`, creating an incomplete tag if nothing declared it yet.
    pub fn struct_tag(&mut self, name: &str) -> CompileResult<TypeId> {
        self.tag(name, AggregateKind::Struct)
    }

    pub fn union_tag(&mut self, name: &str) -> CompileResult<TypeId> {
        self.tag(name, AggregateKind::Union)
    }

    fn tag(&mut self, name: &str, kind: AggregateKind) -> CompileResult<TypeId> {
        let id = self.arena.struct_tag(name, kind)?;
        Ok(self.arena.intern(TypeRecord::StructUnion(id)))
    }

    pub fn enum_tag(&mut self, name: &str) -> CompileResult<TypeId> {
        let id = self.arena.enum_tag(name)?;
        Ok(self.arena.intern(TypeRecord::Enum(id)))
    }

    /// Resolves a typedef name to the type it stands for.
    pub fn named(&mut self, name: &str) -> CompileResult<TypeId> {
        self.arena
            .typedef(name)
            .ok_or_else(|| CompileError::UnknownType(name.to_owned()))
    }

    pub fn opaque(&mut self, name: &str) -> TypeId {
        let name_id = self.intern(name);
        self.arena.intern(TypeRecord::Opaque(name_id))
    }

    pub fn function(&mut self, result: TypeId) -> FunctionBuilder<'_, 'arena> {
        FunctionBuilder::new(self, result)
    }

    /// Declares `struct name;` without fields.
    pub fn opaque_struct(&mut self, name: &str) -> CompileResult<TypeId> {
        self.opaque_tag(name, AggregateKind::Struct)
    }

    pub fn opaque_union(&mut self, name: &str) -> CompileResult<TypeId> {
        self.opaque_tag(name, AggregateKind::Union)
    }

    fn opaque_tag(&mut self, name: &str, kind: AggregateKind) -> CompileResult<TypeId> {
        let id = self.arena.struct_tag(name, kind)?;
        let record = self.arena.structure_mut(id);
        if record.state == TagState::Referenced {
            record.state = TagState::Opaque;
        }
        Ok(self.arena.intern(TypeRecord::StructUnion(id)))
    }

    pub fn structure(&mut self, name: &str) -> AggregateBuilder<'_, 'arena> {
        AggregateBuilder::new(self, name, AggregateKind::Struct)
    }

    pub fn union(&mut self, name: &str) -> AggregateBuilder<'_, 'arena> {
        AggregateBuilder::new(self, name, AggregateKind::Union)
    }

    pub fn enumeration(&mut self, name: &str) -> EnumBuilder<'_, 'arena> {
        EnumBuilder::new(self, name)
    }

    pub fn arena(&self) -> &TypeArena {
        self.arena
    }
}

pub struct FunctionBuilder<'builder, 'arena> {
    builder: &'builder mut TypeBuilder<'arena>,
    ty: FunctionType,
}

impl<'builder, 'arena> FunctionBuilder<'builder, 'arena> {
    /// A function result decays to a function pointer. Array results are left for the
    /// compiler to reject.
    fn new(builder: &'builder mut TypeBuilder<'arena>, result: TypeId) -> Self {
        let result = if matches!(builder.arena.get(result), TypeRecord::Function(_)) {
            builder.pointer(result)
        } else {
            result
        };
        Self {
            builder,
            ty: FunctionType::new(result),
        }
    }

    /// Appends a parameter. Array parameters decay to element pointers and function
    /// parameters to function pointers, as in C.
    pub fn arg(mut self, ty: TypeId) -> Self {
        let pointee = match self.builder.arena.get(ty) {
            TypeRecord::Array { item, .. } => Some(*item),
            TypeRecord::Function(_) => Some(ty),
            _ => None,
        };
        let decayed = pointee.map_or(ty, |target| self.builder.pointer(target));
        self.ty.args.push(decayed);
        self
    }

    pub fn args<I: IntoIterator<Item = TypeId>>(self, args: I) -> Self {
        args.into_iter().fold(self, |builder, ty| builder.arg(ty))
    }

    pub fn variadic(mut self) -> Self {
        self.ty.variadic = true;
        self
    }

    pub fn finish(self) -> TypeId {
        self.builder.arena.intern(TypeRecord::Function(self.ty))
    }
}

pub struct AggregateBuilder<'builder, 'arena> {
    builder: &'builder mut TypeBuilder<'arena>,
    name: String,
    kind: AggregateKind,
    fields: SmallVec<[FieldRecord; 8]>,
    partial: bool,
}

impl<'builder, 'arena> AggregateBuilder<'builder, 'arena> {
    fn new(builder: &'builder mut TypeBuilder<'arena>, name: &str, kind: AggregateKind) -> Self {
        Self {
            builder,
            name: name.to_owned(),
            kind,
            fields: SmallVec::new(),
            partial: false,
        }
    }

    pub fn field(mut self, name: impl AsRef<str>, ty: TypeId) -> Self {
        let name_id = self.builder.intern(name);
        self.fields.push(FieldRecord { name_id, ty });
        self
    }

    /// Marks the declaration as ending in `...;`.
    pub fn partial(mut self) -> Self {
        self.partial = true;
        self
    }

    /// Attaches the fields to the tag. A tag may be referenced or declared opaque beforehand,
    /// but only defined once.
    pub fn finish(self) -> CompileResult<TypeId> {
        let arena = &mut *self.builder.arena;
        let id: StructId = arena.struct_tag(&self.name, self.kind)?;
        if arena.structure(id).state == TagState::Defined {
            return Err(CompileError::DuplicateTag(format!(
                "{} {}",
                self.kind.keyword(),
                self.name
            )));
        }
        let span = arena.alloc_members(self.fields);
        let record = arena.structure_mut(id);
        record.fields = span;
        record.partial = self.partial;
        record.state = TagState::Defined;
        Ok(arena.intern(TypeRecord::StructUnion(id)))
    }
}

pub struct EnumBuilder<'builder, 'arena> {
    builder: &'builder mut TypeBuilder<'arena>,
    name: String,
    underlying: Primitive,
    variants: SmallVec<[EnumVariant; 4]>,
}

impl<'builder, 'arena> EnumBuilder<'builder, 'arena> {
    fn new(builder: &'builder mut TypeBuilder<'arena>, name: &str) -> Self {
        Self {
            builder,
            name: name.to_owned(),
            underlying: Primitive::INT,
            variants: SmallVec::new(),
        }
    }

    pub fn underlying(mut self, primitive: Primitive) -> Self {
        self.underlying = primitive;
        self
    }

    pub fn variant(mut self, label: impl AsRef<str>, value: i64) -> Self {
        let label = self.builder.intern(label);
        self.variants.push(EnumVariant { label, value });
        self
    }

    pub fn finish(self) -> CompileResult<TypeId> {
        let arena = &mut *self.builder.arena;
        let id: EnumId = arena.enum_tag(&self.name)?;
        let record = arena.enumeration_mut(id);
        if record.defined {
            return Err(CompileError::DuplicateTag(format!("enum {}", self.name)));
        }
        record.defined = true;
        record.underlying = self.underlying;
        record.variants = self.variants;
        Ok(arena.intern(TypeRecord::Enum(id)))
    }
}
