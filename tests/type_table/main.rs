//! Public-API scenarios for compiling declaration sets into type tables.

mod declarations;
mod properties;
mod scenarios;

use typetab::{CompiledTable, Interface, collect_type_table};

pub(crate) fn compiled(ffi: &Interface) -> CompiledTable {
    collect_type_table(ffi).expect("declarations compile")
}

pub(crate) fn rendered(ffi: &Interface) -> String {
    compiled(ffi).to_string()
}
