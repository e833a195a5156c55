//! Linear reader over a compiled table, recovering the C spelling of any slot. This is the view
//! a runtime marshaling layer has: nothing but cells and side tables.

use crate::cdef::fmt::{MARKER, array_marker, function_marker};
use crate::cdef::record::ArrayLength;
use crate::opcode::{CffiOp, OpCode, Primitive};

use super::table::CompiledTable;

pub struct TableReader<'a> {
    table: &'a CompiledTable,
}

impl<'a> TableReader<'a> {
    pub fn new(table: &'a CompiledTable) -> Self {
        Self { table }
    }

    fn cell(&self, index: usize) -> Option<CffiOp> {
        self.table.cells().get(index).copied()
    }

    /// Spelling of the type starting at `index`, or `None` for a malformed table.
    pub fn type_name(&self, index: u32) -> Option<String> {
        let spelled = self.spelling_with_marker(index as usize, 0)?;
        Some(spelled.replacen(MARKER, "", 1))
    }

    /// Argument slots of the function at `index`, with NOOP cells followed to their owners.
    pub fn function_args(&self, index: u32) -> Option<(Vec<u32>, bool)> {
        let index = index as usize;
        if self.cell(index)?.op()? != OpCode::Function {
            return None;
        }
        let mut args = Vec::new();
        let mut position = index + 1;
        loop {
            let cell = self.cell(position)?;
            match cell.op()? {
                OpCode::FunctionEnd => return Some((args, cell.arg() != 0)),
                OpCode::Noop => args.push(cell.arg()),
                _ => args.push(position as u32),
            }
            position += 1;
        }
    }

    fn spelling_with_marker(&self, index: usize, depth: usize) -> Option<String> {
        // Only pointers to tags can cycle, and tags are spelled by name, so depth stays small
        // on well-formed tables.
        if depth > self.table.len() {
            return None;
        }
        let cell = self.cell(index)?;
        let arg = cell.arg() as usize;
        let spelled = match cell.op()? {
            OpCode::Primitive => {
                let primitive = Primitive::from_index(u8::try_from(cell.arg()).ok()?)?;
                format!("{}&", primitive.name())
            }
            OpCode::Noop => self.spelling_with_marker(arg, depth + 1)?,
            OpCode::Pointer => {
                let inner = self.spelling_with_marker(arg, depth + 1)?;
                let replacement = match self.cell(arg)?.op()? {
                    OpCode::Function => "*&",
                    OpCode::Array | OpCode::OpenArray => "(*&)",
                    _ => " *&",
                };
                inner.replacen(MARKER, replacement, 1)
            }
            OpCode::Array | OpCode::OpenArray => {
                let length = if cell.op()? == OpCode::OpenArray {
                    ArrayLength::Open
                } else {
                    let length_cell = self.cell(index + 1)?;
                    if length_cell.is_unresolved_length() {
                        ArrayLength::Unresolved(0)
                    } else {
                        ArrayLength::Fixed(length_cell.arg() as usize)
                    }
                };
                let inner = self.spelling_with_marker(arg, depth + 1)?;
                inner.replacen(MARKER, &array_marker(length), 1)
            }
            OpCode::StructUnion => format!("{}&", self.table.struct_unions().get(arg)?.c_name()),
            OpCode::Enum => format!("enum {}&", self.table.enums().get(arg)?.name),
            OpCode::Typename => format!("{}&", self.table.typedefs().get(arg)?.name),
            OpCode::BitField => {
                let width = self.cell(index + 1)?.arg();
                format!("{}:{width}", self.spelling_with_marker(arg, depth + 1)?)
            }
            OpCode::Function => {
                let (slots, variadic) = self.function_args(index as u32)?;
                let args = slots
                    .into_iter()
                    .map(|slot| self.type_name(slot))
                    .collect::<Option<Vec<_>>>()?;
                let inner = self.spelling_with_marker(arg, depth + 1)?;
                inner.replacen(MARKER, &function_marker(&args, variadic), 1)
            }
            OpCode::FunctionEnd
            | OpCode::CallVarargs
            | OpCode::CallNoArgs
            | OpCode::CallOneArg => return None,
        };
        Some(spelled)
    }
}
