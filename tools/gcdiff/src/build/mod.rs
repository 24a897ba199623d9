//! Variant builder.
//!
//! Builds one executable per memory-management configuration from a staged
//! compiled artifact. Both builds of a test case receive the same
//! [`StagedSource`]; only the configuration switch differs between them.
//!
//! The C toolchain sees the configuration as two preprocessor switches:
//!
//! ```text
//! cc -std=c11 -DMAX_ALLOC_SIZE=<budget> [-DDISABLE_GC] program.c runtime.c gc.c -o <variant>
//! ```

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use crate::compile::{exit_suffix, stderr_suffix, StagedSource};

/// Preprocessor constant holding the allocation budget in bytes.
pub const MAX_ALLOC_DEFINE: &str = "MAX_ALLOC_SIZE";

/// Preprocessor switch selecting the non-collecting allocator.
pub const DISABLE_GC_DEFINE: &str = "DISABLE_GC";

/// Which side of the experiment a variant is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariantRole {
    /// Collector enabled: the implementation under test.
    Collecting,
    /// Collector disabled: presumed-correct ground truth.
    Baseline,
}

impl VariantRole {
    pub const ALL: [VariantRole; 2] = [VariantRole::Collecting, VariantRole::Baseline];

    /// File name of this role's executable inside a scratch directory.
    pub fn artifact_name(self) -> &'static str {
        match self {
            VariantRole::Collecting => "variant_gc.out",
            VariantRole::Baseline => "variant_no_gc.out",
        }
    }
}

impl fmt::Display for VariantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantRole::Collecting => f.write_str("gc"),
            VariantRole::Baseline => f.write_str("no-gc"),
        }
    }
}

/// Memory-management configuration of one variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VariantConfig {
    pub role: VariantRole,
    pub heap_budget_bytes: u64,
}

impl VariantConfig {
    pub fn collecting(heap_budget_bytes: u64) -> Self {
        VariantConfig {
            role: VariantRole::Collecting,
            heap_budget_bytes,
        }
    }

    pub fn baseline(heap_budget_bytes: u64) -> Self {
        VariantConfig {
            role: VariantRole::Baseline,
            heap_budget_bytes,
        }
    }

    pub fn collection_enabled(self) -> bool {
        self.role == VariantRole::Collecting
    }
}

/// An executable built from a staged artifact under one configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variant {
    executable: PathBuf,
    config: VariantConfig,
    source_fingerprint: u64,
}

impl Variant {
    pub fn new(executable: PathBuf, config: VariantConfig, source: &StagedSource) -> Self {
        Variant {
            executable,
            config,
            source_fingerprint: source.fingerprint(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn config(&self) -> VariantConfig {
        self.config
    }

    pub fn role(&self) -> VariantRole {
        self.config.role
    }

    pub fn collection_enabled(&self) -> bool {
        self.config.collection_enabled()
    }

    pub fn heap_budget_bytes(&self) -> u64 {
        self.config.heap_budget_bytes
    }

    /// Fingerprint of the generated code this variant was built from.
    pub fn source_fingerprint(&self) -> u64 {
        self.source_fingerprint
    }
}

/// Errors from building a variant. Any of these aborts the test case.
#[derive(Debug, Clone, Error)]
pub enum BuildError {
    #[error("C compiler '{program}' not found: {message}")]
    ToolchainNotFound { program: String, message: String },
    #[error(
        "building with '{program}' failed{}{}\n\nCommand: {command}",
        exit_suffix(.exit_code),
        stderr_suffix("Toolchain", .stderr)
    )]
    Failed {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
        command: String,
    },
    #[error("invalid variant configuration: {message}")]
    InvalidConfig { message: String },
    #[error("I/O error during build: {message}")]
    Io { message: String },
}

/// Turns a staged artifact into an executable variant.
pub trait Builder: Send + Sync {
    /// Build `source` under `config`, writing the executable to `output`.
    fn build(
        &self,
        source: &StagedSource,
        config: VariantConfig,
        output: &Path,
    ) -> Result<Variant, BuildError>;
}

/// Builds variants with a GCC-compatible C compiler.
#[derive(Clone, Debug)]
pub struct CcBuilder {
    program: OsString,
    c_standard: String,
    support_sources: Vec<PathBuf>,
    include_dirs: Vec<PathBuf>,
    extra_args: Vec<String>,
}

impl Default for CcBuilder {
    fn default() -> Self {
        CcBuilder::new("gcc")
    }
}

impl CcBuilder {
    pub fn new(program: impl Into<OsString>) -> Self {
        CcBuilder {
            program: program.into(),
            c_standard: "c11".to_string(),
            support_sources: Vec::new(),
            include_dirs: Vec::new(),
            extra_args: Vec::new(),
        }
    }

    /// Add the runtime and collector sources found in `dir`
    /// (`runtime.c` and `gc.c`), and put `dir` on the include path.
    #[must_use]
    pub fn with_runtime_dir(mut self, dir: &Path) -> Self {
        self.support_sources.push(dir.join("runtime.c"));
        self.support_sources.push(dir.join("gc.c"));
        self.include_dirs.push(dir.to_path_buf());
        self
    }

    #[must_use]
    pub fn with_support_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.support_sources.push(path.into());
        self
    }

    #[must_use]
    pub fn with_c_standard(mut self, standard: impl Into<String>) -> Self {
        self.c_standard = standard.into();
        self
    }

    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    pub fn support_sources(&self) -> &[PathBuf] {
        &self.support_sources
    }

    /// Construct the toolchain invocation for one variant.
    ///
    /// For a fixed `source` and `output` directory, the two roles produce
    /// argument lists that differ only in `-DDISABLE_GC` and the output path.
    pub fn command(&self, source: &Path, config: VariantConfig, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(format!("-std={}", self.c_standard));
        for dir in &self.include_dirs {
            cmd.arg("-I").arg(dir);
        }
        cmd.arg(format!("-D{MAX_ALLOC_DEFINE}={}", config.heap_budget_bytes));
        if !config.collection_enabled() {
            cmd.arg(format!("-D{DISABLE_GC_DEFINE}"));
        }
        cmd.arg(source);
        cmd.args(&self.support_sources);
        cmd.args(&self.extra_args);
        cmd.arg("-o").arg(output);
        cmd
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

impl Builder for CcBuilder {
    fn build(
        &self,
        source: &StagedSource,
        config: VariantConfig,
        output: &Path,
    ) -> Result<Variant, BuildError> {
        if config.heap_budget_bytes == 0 {
            return Err(BuildError::InvalidConfig {
                message: "heap budget must be at least one byte".to_string(),
            });
        }

        let mut cmd = self.command(source.path(), config, output);
        tracing::debug!(role = %config.role, command = ?cmd, "building variant");

        let result = cmd.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BuildError::ToolchainNotFound {
                    program: self.program_name(),
                    message: e.to_string(),
                }
            } else {
                BuildError::Io {
                    message: e.to_string(),
                }
            }
        })?;

        if !result.status.success() {
            return Err(BuildError::Failed {
                program: self.program_name(),
                exit_code: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
                command: format!("{cmd:?}"),
            });
        }

        Ok(Variant::new(output.to_path_buf(), config, source))
    }
}
