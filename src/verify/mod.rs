//! Entry point for the `verify` subsystem: checking a compiled table against a native build.
//! Compiling and linking C stays behind [`NativeToolchain`]; this module emits the source a
//! toolchain builds and validates the layout facts it reports.

pub mod driver;
pub mod error;
pub mod layout;
pub mod source;

pub use driver::{BuildRequest, NativeToolchain, TMPDIR_VAR, VerifyConfig, VerifyDriver};
pub use error::{VerifyError, VerifyResult};
pub use layout::{LayoutReport, StructLayout, VerifiedLayout};
pub use source::SourceEmitter;
