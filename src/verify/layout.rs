//! Native layout facts reported by a toolchain, and the checked view built from them.

use ahash::{AHashMap, AHashSet};
use tracing::debug;

use crate::opcode::{CffiOp, OpCode};
use crate::recompiler::{CompiledTable, FieldEntry, GlobalKind};

use super::error::{VerifyError, VerifyResult};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StructLayout {
    pub size: usize,
    pub alignment: usize,
    /// Offsets of the fields that are not bit-fields, in declaration order.
    pub offsets: Vec<usize>,
}

impl StructLayout {
    pub fn new(size: usize, alignment: usize, offsets: impl IntoIterator<Item = usize>) -> Self {
        Self {
            size,
            alignment,
            offsets: offsets.into_iter().collect(),
        }
    }
}

/// What a native build learned about the emitted source. Structs are keyed by their C
/// spelling (`struct foo_s`), lengths by the owner recorded in the table.
#[derive(Clone, Debug, Default)]
pub struct LayoutReport {
    pub structs: AHashMap<String, StructLayout>,
    pub lengths: AHashMap<String, usize>,
    pub symbols: AHashSet<String>,
}

impl LayoutReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_struct(mut self, c_name: impl Into<String>, layout: StructLayout) -> Self {
        self.structs.insert(c_name.into(), layout);
        self
    }

    pub fn with_length(mut self, owner: impl Into<String>, count: usize) -> Self {
        self.lengths.insert(owner.into(), count);
        self
    }

    pub fn with_symbol(mut self, name: impl Into<String>) -> Self {
        self.symbols.insert(name.into());
        self
    }

    pub fn with_symbols<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbols.extend(names.into_iter().map(Into::into));
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct VerifiedStruct {
    size: usize,
    alignment: usize,
    offsets: AHashMap<String, usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ResolvedLength {
    cell: u32,
    owner: String,
    count: u32,
}

/// A table's layout after it has been checked against a native build.
#[derive(Clone, Debug, Default)]
pub struct VerifiedLayout {
    structs: AHashMap<String, VerifiedStruct>,
    lengths: Vec<ResolvedLength>,
}

impl VerifiedLayout {
    pub fn check(table: &CompiledTable, report: &LayoutReport) -> VerifyResult<Self> {
        let mut layout = Self::default();

        for entry in table.struct_unions() {
            if entry.is_opaque() {
                continue;
            }
            let item = entry.c_name();
            let Some(native) = report.structs.get(&item) else {
                return Err(VerifyError::LayoutMismatch {
                    item,
                    details: "not reported by the native build".into(),
                });
            };
            let fields: Vec<&FieldEntry> = entry
                .fields
                .iter()
                .filter(|field| field.bit_width.is_none())
                .collect();
            if native.offsets.len() != fields.len() {
                return Err(VerifyError::LayoutMismatch {
                    item,
                    details: format!(
                        "{} field offsets reported for {} declared fields",
                        native.offsets.len(),
                        fields.len()
                    ),
                });
            }
            let mut offsets = AHashMap::with_capacity(fields.len());
            for (field, offset) in fields.into_iter().zip(native.offsets.iter().copied()) {
                let outside = if is_zero_sized(table, field) {
                    offset > native.size
                } else {
                    offset >= native.size
                };
                if outside {
                    return Err(VerifyError::LayoutMismatch {
                        item,
                        details: format!(
                            "field '{}' at offset {offset} lies outside {} bytes",
                            field.name, native.size
                        ),
                    });
                }
                offsets.insert(field.name.clone(), offset);
            }
            layout.structs.insert(
                item,
                VerifiedStruct {
                    size: native.size,
                    alignment: native.alignment,
                    offsets,
                },
            );
        }

        for global in table.globals() {
            let linked = matches!(global.kind, GlobalKind::Function { .. } | GlobalKind::Variable);
            if linked && !report.symbols.contains(&global.name) {
                return Err(VerifyError::LinkFailure {
                    symbol: global.name.clone(),
                });
            }
        }

        for unresolved in table.unresolved_lengths() {
            let Some(count) = report.lengths.get(&unresolved.owner) else {
                return Err(VerifyError::LayoutMismatch {
                    item: unresolved.owner.clone(),
                    details: "array length was not reported".into(),
                });
            };
            let cell = CffiOp::length(*count)?;
            layout.lengths.push(ResolvedLength {
                cell: unresolved.cell,
                owner: unresolved.owner.clone(),
                count: cell.arg(),
            });
        }

        debug!(
            target: "verify",
            structs = layout.structs.len(),
            lengths = layout.lengths.len(),
            "native layout checked"
        );
        Ok(layout)
    }

    fn structure(&self, c_name: &str) -> VerifyResult<&VerifiedStruct> {
        self.structs
            .get(c_name)
            .ok_or_else(|| VerifyError::Missing(c_name.to_owned()))
    }

    pub fn sizeof(&self, c_name: &str) -> VerifyResult<usize> {
        Ok(self.structure(c_name)?.size)
    }

    pub fn alignof(&self, c_name: &str) -> VerifyResult<usize> {
        Ok(self.structure(c_name)?.alignment)
    }

    pub fn offsetof(&self, c_name: &str, field: &str) -> VerifyResult<usize> {
        self.structure(c_name)?
            .offsets
            .get(field)
            .copied()
            .ok_or_else(|| VerifyError::Missing(format!("{c_name}.{field}")))
    }

    /// Resolved count of a `[...]` array, by owner.
    pub fn length_of(&self, owner: &str) -> VerifyResult<usize> {
        self.lengths
            .iter()
            .find(|length| length.owner == owner)
            .map(|length| length.count as usize)
            .ok_or_else(|| VerifyError::Missing(owner.to_owned()))
    }

    /// Encoded cells of `table` with every unknown-length marker replaced by its native count.
    pub fn patched_words(&self, table: &CompiledTable) -> Vec<u32> {
        let mut words = table.words();
        for length in &self.lengths {
            if let Some(word) = words.get_mut(length.cell as usize) {
                *word = length.count;
            }
        }
        words
    }
}

/// `T x[]` and `T x[0]` occupy no storage, so they may sit at the very end of a struct.
fn is_zero_sized(table: &CompiledTable, field: &FieldEntry) -> bool {
    let index = field.type_index as usize;
    let cells = table.cells();
    match cells.get(index).and_then(|cell| cell.op()) {
        Some(OpCode::OpenArray) => true,
        Some(OpCode::Array) => cells.get(index + 1).is_some_and(|length| length.arg() == 0),
        _ => false,
    }
}
