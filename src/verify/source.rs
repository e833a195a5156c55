//! Renders the C translation unit that embeds a compiled table and probes the native layout
//! of everything the table cannot know on its own.

use std::fmt::Write as _;

use crate::opcode::{CffiOp, OpCode};
use crate::recompiler::{CompiledTable, GlobalKind};

const OP_MACRO: &str = "_TYPETAB_OP";

pub struct SourceEmitter<'a> {
    table: &'a CompiledTable,
    module: &'a str,
    preamble: &'a str,
}

impl<'a> SourceEmitter<'a> {
    pub fn new(table: &'a CompiledTable, module: &'a str) -> Self {
        Self {
            table,
            module,
            preamble: "",
        }
    }

    /// Source inserted verbatim before the generated code, typically `#include` lines.
    pub fn preamble(mut self, preamble: &'a str) -> Self {
        self.preamble = preamble;
        self
    }

    pub fn types_symbol(&self) -> String {
        format!("{}_types", self.module)
    }

    pub fn emit(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_all(&mut out);
        out
    }

    fn write_all(&self, out: &mut String) -> std::fmt::Result {
        self.write_header(out)?;
        self.write_types(out)?;
        self.write_struct_probes(out)?;
        self.write_length_probes(out)?;
        self.write_globals(out)
    }

    fn write_header(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "/* {} type table, typetab {} */", self.module, crate::VERSION)?;
        writeln!(out, "#include <stddef.h>")?;
        writeln!(out)?;
        if !self.preamble.is_empty() {
            writeln!(out, "{}", self.preamble.trim_end())?;
            writeln!(out)?;
        }
        writeln!(
            out,
            "#define {OP_MACRO}(opcode, arg) ((unsigned int)(opcode) | ((unsigned int)(arg) << 8))"
        )?;
        for op in OpCode::ALL {
            writeln!(out, "#define {} {}", op.c_identifier(), op.code())?;
        }
        writeln!(out)
    }

    fn write_types(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "static const unsigned int {}[] = {{", self.types_symbol())?;
        if self.table.is_empty() {
            writeln!(out, "    0 /* empty */")?;
        }
        for (index, cell) in self.table.cells().iter().enumerate() {
            writeln!(out, "/* {index:>4} */ {}, /* {cell} */", cell_literal(*cell))?;
        }
        writeln!(out, "}};")?;
        writeln!(out)
    }

    fn write_struct_probes(&self, out: &mut String) -> std::fmt::Result {
        for (position, entry) in self.table.struct_unions().iter().enumerate() {
            if entry.is_opaque() {
                continue;
            }
            let name = entry.c_name();
            writeln!(out, "static const size_t {}_layout_{position}[] = {{", self.module)?;
            writeln!(out, "    sizeof({name}),")?;
            writeln!(out, "    offsetof(struct {{ char pad; {name} item; }}, item),")?;
            for field in entry.fields.iter().filter(|field| field.bit_width.is_none()) {
                writeln!(out, "    offsetof({name}, {}),", field.name)?;
            }
            writeln!(out, "}};")?;
        }
        Ok(())
    }

    fn write_length_probes(&self, out: &mut String) -> std::fmt::Result {
        let unresolved = self.table.unresolved_lengths();
        if unresolved.is_empty() {
            return Ok(());
        }
        writeln!(out, "static const size_t {}_lengths[] = {{", self.module)?;
        for length in unresolved {
            match length_probe(&length.owner) {
                Some(probe) => writeln!(out, "    {probe}, /* cell {} */", length.cell)?,
                None => writeln!(
                    out,
                    "    0, /* cell {}: {} is not addressable */",
                    length.cell, length.owner
                )?,
            }
        }
        writeln!(out, "}};")
    }

    fn write_globals(&self, out: &mut String) -> std::fmt::Result {
        let (macros, linked): (Vec<_>, Vec<_>) = self
            .table
            .globals()
            .iter()
            .partition(|global| global.kind == GlobalKind::Macro);
        if !linked.is_empty() {
            writeln!(out, "static void *const {}_symbols[] = {{", self.module)?;
            for global in linked {
                writeln!(out, "    (void *)&{},", global.name)?;
            }
            writeln!(out, "}};")?;
        }
        if !macros.is_empty() {
            writeln!(out, "static const long long {}_macros[] = {{", self.module)?;
            for global in macros {
                writeln!(out, "    (long long)({}),", global.name)?;
            }
            writeln!(out, "}};")?;
        }
        Ok(())
    }
}

fn cell_literal(cell: CffiOp) -> String {
    match cell.op() {
        Some(op) => format!("{OP_MACRO}({}, {})", op.c_identifier(), cell.arg()),
        None if cell.is_unresolved_length() => format!("0x{:08X}u", cell.arg()),
        None => cell.arg().to_string(),
    }
}

/// `sizeof(x) / sizeof(x[0])` for a global, or through a null pointer for a field owner of
/// the form `struct tag.field`. Arrays named only by cell have no expression.
fn length_probe(owner: &str) -> Option<String> {
    if owner.contains('@') {
        return None;
    }
    let expr = match owner.rsplit_once('.') {
        Some((aggregate, field)) => format!("((({aggregate} *)0)->{field})"),
        None => owner.to_owned(),
    };
    Some(format!("sizeof({expr}) / sizeof({expr}[0])"))
}
