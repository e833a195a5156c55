use std::{error::Error, fmt, io};

use crate::error::CompileError;

pub type VerifyResult<T> = Result<T, VerifyError>;

/// Failures raised while checking a compiled table against a native build.
#[derive(Debug)]
pub enum VerifyError {
    Io(io::Error),
    /// The native toolchain refused to build or link the emitted source.
    Toolchain(String),
    /// The native layout disagrees with the declared one.
    LayoutMismatch { item: String, details: String },
    /// A declared function or variable is not provided by the native build.
    LinkFailure { symbol: String },
    /// A layout query for something that was never verified, such as an opaque struct.
    Missing(String),
    /// A reported value could not be written back into the table.
    Compile(CompileError),
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyError::Io(err) => write!(f, "i/o error during verification: {err}"),
            VerifyError::Toolchain(message) => write!(f, "native build failed: {message}"),
            VerifyError::LayoutMismatch { item, details } => {
                write!(f, "layout of '{item}' does not match the native build: {details}")
            }
            VerifyError::LinkFailure { symbol } => {
                write!(f, "symbol '{symbol}' is not provided by the native build")
            }
            VerifyError::Missing(item) => write!(f, "'{item}' has no verified layout"),
            VerifyError::Compile(err) => write!(f, "{err}"),
        }
    }
}

impl Error for VerifyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            VerifyError::Io(err) => Some(err),
            VerifyError::Compile(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for VerifyError {
    fn from(value: io::Error) -> Self {
        VerifyError::Io(value)
    }
}

impl From<CompileError> for VerifyError {
    fn from(value: CompileError) -> Self {
        VerifyError::Compile(value)
    }
}
