//! Test doubles for the compiler and builder ports.
//!
//! These let the whole pipeline run without a Stella compiler or a C
//! toolchain: generated "code" is a POSIX shell script body, and building a
//! variant writes that body behind a prelude exporting the configuration.
//!
//! ```text
//! #!/bin/sh
//! GC_ENABLED=1          # 0 for the baseline
//! MAX_ALLOC_SIZE=1600
//! <generated code>
//! ```

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::build::{BuildError, Builder, Variant, VariantConfig};
use crate::compile::{CompileError, Compiler, GeneratedCode, StagedSource};

/// Compiler that ignores its input and returns a fixed result.
#[derive(Clone, Debug)]
pub struct StaticCompiler {
    result: Result<GeneratedCode, CompileError>,
}

impl StaticCompiler {
    pub fn emitting(code: &str) -> Self {
        StaticCompiler {
            result: Ok(GeneratedCode::new(code)),
        }
    }

    pub fn failing(error: CompileError) -> Self {
        StaticCompiler { result: Err(error) }
    }
}

impl Compiler for StaticCompiler {
    fn compile(&self, _source: &str) -> Result<GeneratedCode, CompileError> {
        self.result.clone()
    }
}

/// Compiler that passes source through unchanged, so each test case's
/// source file is its own generated code.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityCompiler;

impl Compiler for IdentityCompiler {
    fn compile(&self, source: &str) -> Result<GeneratedCode, CompileError> {
        Ok(GeneratedCode::new(source))
    }
}

/// One recorded call to [`ScriptBuilder::build`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildRecord {
    pub source: PathBuf,
    pub source_fingerprint: u64,
    pub config: VariantConfig,
    pub output: PathBuf,
}

/// Builder that turns staged shell script bodies into executable variants.
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    records: Mutex<Vec<BuildRecord>>,
    fail_baseline: Option<BuildError>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        ScriptBuilder::default()
    }

    /// A builder whose baseline build always fails with `error`.
    pub fn failing_baseline(error: BuildError) -> Self {
        ScriptBuilder {
            records: Mutex::new(Vec::new()),
            fail_baseline: Some(error),
        }
    }

    /// Every build performed so far, in call order.
    pub fn records(&self) -> Vec<BuildRecord> {
        self.records.lock().clone()
    }
}

impl Builder for ScriptBuilder {
    fn build(
        &self,
        source: &StagedSource,
        config: VariantConfig,
        output: &Path,
    ) -> Result<Variant, BuildError> {
        self.records.lock().push(BuildRecord {
            source: source.path().to_path_buf(),
            source_fingerprint: source.fingerprint(),
            config,
            output: output.to_path_buf(),
        });

        if !config.collection_enabled() {
            if let Some(error) = &self.fail_baseline {
                return Err(error.clone());
            }
        }

        let body = std::fs::read_to_string(source.path()).map_err(|e| BuildError::Io {
            message: e.to_string(),
        })?;
        let script = format!(
            "GC_ENABLED={}\nMAX_ALLOC_SIZE={}\n{body}",
            u8::from(config.collection_enabled()),
            config.heap_budget_bytes,
        );
        write_script(output, &script).map_err(|e| BuildError::Io {
            message: e.to_string(),
        })?;
        Ok(Variant::new(output.to_path_buf(), config, source))
    }
}

/// Write an executable `#!/bin/sh` script with the given body.
#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o755)
        .open(path)?;
    file.write_all(b"#!/bin/sh\n")?;
    file.write_all(body.as_bytes())?;
    file.sync_all()
}

#[cfg(not(unix))]
pub fn write_script(path: &Path, body: &str) -> std::io::Result<()> {
    std::fs::write(path, format!("#!/bin/sh\n{body}"))
}
