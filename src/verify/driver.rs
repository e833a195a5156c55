//! Drives one verification round: emit the C source, hand it to a native toolchain, and
//! check what comes back.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::recompiler::CompiledTable;

use super::error::VerifyResult;
use super::layout::{LayoutReport, VerifiedLayout};
use super::source::SourceEmitter;

pub const TMPDIR_VAR: &str = "TYPETAB_TMPDIR";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyConfig {
    /// Where generated sources are written.
    pub tmpdir: PathBuf,
    /// Prepended to the fingerprint to form the module name; must start a C identifier.
    pub module_prefix: String,
    pub keep_sources: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            tmpdir: env::temp_dir().join("__typetab_cache"),
            module_prefix: "_typetab_".into(),
            keep_sources: true,
        }
    }
}

impl VerifyConfig {
    /// Defaults, with the output directory taken from `TYPETAB_TMPDIR` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = env::var_os(TMPDIR_VAR).filter(|dir| !dir.is_empty()) {
            config.tmpdir = PathBuf::from(dir);
        }
        config
    }

    pub fn with_tmpdir(mut self, tmpdir: impl Into<PathBuf>) -> Self {
        self.tmpdir = tmpdir.into();
        self
    }

    /// Stable name for a table and preamble pair. Equal inputs reuse the same module.
    pub fn module_name(&self, table: &CompiledTable, preamble: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(table.fingerprint().as_bytes());
        hasher.update(preamble.as_bytes());
        let digest = hasher.finalize();
        let suffix: String = digest[..8].iter().map(|byte| format!("{byte:02x}")).collect();
        format!("{}{suffix}", self.module_prefix)
    }
}

/// Everything a toolchain needs to build one module.
pub struct BuildRequest<'a> {
    pub module_name: &'a str,
    pub source_path: &'a Path,
    pub source: &'a str,
    pub table: &'a CompiledTable,
}

/// A native compiler and linker. Implementations build the emitted source, read back the probe
/// arrays, and report which declared symbols resolved.
pub trait NativeToolchain {
    fn build(&mut self, request: &BuildRequest<'_>) -> VerifyResult<LayoutReport>;
}

pub struct VerifyDriver<T> {
    toolchain: T,
    config: VerifyConfig,
    preamble: String,
}

impl<T: NativeToolchain> VerifyDriver<T> {
    pub fn new(toolchain: T) -> Self {
        Self::with_config(toolchain, VerifyConfig::from_env())
    }

    pub fn with_config(toolchain: T, config: VerifyConfig) -> Self {
        Self {
            toolchain,
            config,
            preamble: String::new(),
        }
    }

    pub fn preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    pub fn config(&self) -> &VerifyConfig {
        &self.config
    }

    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    pub fn source_path(&self, module_name: &str) -> PathBuf {
        self.config.tmpdir.join(format!("{module_name}.c"))
    }

    pub fn verify(&mut self, table: &CompiledTable) -> VerifyResult<VerifiedLayout> {
        let module_name = self.config.module_name(table, &self.preamble);
        let source = SourceEmitter::new(table, &module_name)
            .preamble(&self.preamble)
            .emit();
        let source_path = self.source_path(&module_name);

        fs::create_dir_all(&self.config.tmpdir)?;
        let cached = fs::read_to_string(&source_path).is_ok_and(|existing| existing == source);
        if !cached {
            fs::write(&source_path, &source)?;
        }
        info!(
            target: "verify",
            module = %module_name,
            path = %source_path.display(),
            cached,
            "verification source ready"
        );

        let request = BuildRequest {
            module_name: &module_name,
            source_path: &source_path,
            source: &source,
            table,
        };
        let built = self.toolchain.build(&request);
        if !self.config.keep_sources {
            if let Err(err) = fs::remove_file(&source_path) {
                warn!(target: "verify", path = %source_path.display(), error = %err, "could not remove source");
            }
        }

        let layout = VerifiedLayout::check(table, &built?)?;
        info!(target: "verify", module = %module_name, "native layout verified");
        Ok(layout)
    }
}
