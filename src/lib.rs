//! Compiles C interface declarations into a flat, index-linked opcode table and supplies the
//! boundary types used to verify that table against a native build.

pub mod cdef;
pub mod error;
pub mod logging;
pub mod opcode;
pub mod recompiler;
pub mod verify;

pub use cdef::{Interface, TypeArena, TypeBuilder, TypeId};
pub use error::{CompileError, CompileResult};
pub use logging::{LogOptions, init_logging};
pub use opcode::{CffiOp, OpCode, Primitive};
pub use recompiler::{CompiledTable, Recompiler, collect_type_table};
pub use verify::{VerifiedLayout, VerifyDriver, VerifyError};

/// Package version baked in at build time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
