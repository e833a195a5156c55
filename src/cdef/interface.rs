//! Ordered top-level declarations of one foreign interface, as handed over by a declaration
//! collector.

use ahash::AHashSet;

use crate::error::{CompileError, CompileResult};

use super::arena::{TypeArena, TypeId};
use super::builder::TypeBuilder;
use super::record::TypeRecord;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Declaration {
    Function { name: String, ty: TypeId },
    Variable { name: String, ty: TypeId },
    /// `static const T NAME;`
    Constant { name: String, ty: TypeId },
    /// `#define NAME ...`, an integer whose value only the native build knows.
    Macro { name: String },
    /// A struct, union, or enum declared at top level, with or without a body.
    Tag(TypeId),
    Typedef { name: String, ty: TypeId },
}

impl Declaration {
    pub fn name(&self) -> Option<&str> {
        match self {
            Declaration::Function { name, .. }
            | Declaration::Variable { name, .. }
            | Declaration::Constant { name, .. }
            | Declaration::Macro { name }
            | Declaration::Typedef { name, .. } => Some(name.as_str()),
            Declaration::Tag(_) => None,
        }
    }

    pub fn ty(&self) -> Option<TypeId> {
        match self {
            Declaration::Function { ty, .. }
            | Declaration::Variable { ty, .. }
            | Declaration::Constant { ty, .. }
            | Declaration::Typedef { ty, .. }
            | Declaration::Tag(ty) => Some(*ty),
            Declaration::Macro { .. } => None,
        }
    }
}

/// One arena plus the declarations that use it. Each interface compiles independently.
#[derive(Default)]
pub struct Interface {
    types: TypeArena,
    declarations: Vec<Declaration>,
    names: AHashSet<String>,
    tags: AHashSet<TypeId>,
}

impl Interface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn types(&mut self) -> TypeBuilder<'_> {
        TypeBuilder::new(&mut self.types)
    }

    pub fn arena(&self) -> &TypeArena {
        &self.types
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    fn claim_name(&mut self, name: &str) -> CompileResult<()> {
        if !self.names.insert(name.to_owned()) {
            return Err(CompileError::DuplicateName(name.to_owned()));
        }
        Ok(())
    }

    /// Declares a function. A type that is not a function (e.g. a function pointer) declares a
    /// variable instead.
    pub fn declare_function(&mut self, name: &str, ty: TypeId) -> CompileResult<()> {
        if !self.types.get(ty).is_function() {
            return self.declare_variable(name, ty);
        }
        self.claim_name(name)?;
        self.declarations.push(Declaration::Function {
            name: name.to_owned(),
            ty,
        });
        Ok(())
    }

    pub fn declare_variable(&mut self, name: &str, ty: TypeId) -> CompileResult<()> {
        self.claim_name(name)?;
        self.declarations.push(Declaration::Variable {
            name: name.to_owned(),
            ty,
        });
        Ok(())
    }

    pub fn declare_constant(&mut self, name: &str, ty: TypeId) -> CompileResult<()> {
        self.claim_name(name)?;
        self.declarations.push(Declaration::Constant {
            name: name.to_owned(),
            ty,
        });
        Ok(())
    }

    pub fn declare_macro(&mut self, name: &str) -> CompileResult<()> {
        self.claim_name(name)?;
        self.declarations.push(Declaration::Macro {
            name: name.to_owned(),
        });
        Ok(())
    }

    /// Records a top-level struct, union, or enum. Declaring the same tag twice is harmless; the
    /// builder already rejected conflicting definitions.
    pub fn declare_tag(&mut self, ty: TypeId) -> CompileResult<()> {
        match self.types.get(ty) {
            TypeRecord::StructUnion(_) | TypeRecord::Enum(_) => {}
            _ => {
                return Err(CompileError::UnknownType(
                    super::fmt::c_name(&self.types, ty),
                ));
            }
        }
        if self.tags.insert(ty) {
            self.declarations.push(Declaration::Tag(ty));
        }
        Ok(())
    }

    pub fn declare_typedef(&mut self, name: &str, ty: TypeId) -> CompileResult<()> {
        self.claim_name(name)?;
        self.types.register_typedef(name, ty);
        self.declarations.push(Declaration::Typedef {
            name: name.to_owned(),
            ty,
        });
        Ok(())
    }

    /// `typedef ... name;`: a type known only by name.
    pub fn declare_opaque_typedef(&mut self, name: &str) -> CompileResult<TypeId> {
        let ty = self.types().opaque(name);
        self.declare_typedef(name, ty)?;
        Ok(ty)
    }
}
