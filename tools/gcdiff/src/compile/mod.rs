//! Compiler port.
//!
//! Turns test program source into generated C. The compiler is an opaque
//! external service: source goes in on stdin, generated code comes out on
//! stdout, and the exit status plus output emptiness are the only signals.

use std::collections::hash_map::DefaultHasher;
use std::ffi::OsString;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

/// Default compile service: the Stella compiler image.
pub const DEFAULT_COMPILER_COMMAND: &str = "docker run -i fizruk/stella compile";

/// Errors from the compile step. Any of these aborts the test case.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    #[error("cannot read source '{}': {message}", .path.display())]
    SourceUnreadable { path: PathBuf, message: String },
    #[error("compiler '{program}' not found: {message}")]
    CompilerNotFound { program: String, message: String },
    #[error("compiler '{program}' failed{}{}", exit_suffix(.exit_code), stderr_suffix("Compiler", .stderr))]
    Failed {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("compiler '{program}' produced no output")]
    EmptyOutput { program: String },
    #[error("compiler '{program}' produced output that is not UTF-8 text")]
    NotText { program: String },
    #[error("I/O error while compiling with '{program}': {message}")]
    Io { program: String, message: String },
}

pub(crate) fn exit_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" (exit code {c})")).unwrap_or_default()
}

pub(crate) fn stderr_suffix(tool: &str, stderr: &str) -> String {
    if stderr.trim().is_empty() {
        String::new()
    } else {
        format!("\n\n{tool} stderr:\n{}", stderr.trim_end())
    }
}

/// Generated target code, treated as opaque text.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GeneratedCode(String);

impl GeneratedCode {
    pub fn new(code: impl Into<String>) -> Self {
        GeneratedCode(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Content hash identifying this exact code.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.0.hash(&mut hasher);
        hasher.finish()
    }
}

/// Generated code for one test case, produced once per run.
#[derive(Clone, Debug)]
pub struct CompiledArtifact {
    code: GeneratedCode,
    origin: String,
}

/// A compiled artifact written to disk, shared by both variant builds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagedSource {
    path: PathBuf,
    fingerprint: u64,
}

impl StagedSource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

impl CompiledArtifact {
    pub fn new(origin: impl Into<String>, code: GeneratedCode) -> Self {
        CompiledArtifact {
            code,
            origin: origin.into(),
        }
    }

    pub fn code(&self) -> &GeneratedCode {
        &self.code
    }

    /// Name of the test case this artifact was compiled from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Write the generated code to `path`, consuming the artifact.
    pub fn stage(self, path: &Path) -> std::io::Result<StagedSource> {
        std::fs::write(path, self.code.as_str())?;
        Ok(StagedSource {
            path: path.to_path_buf(),
            fingerprint: self.code.fingerprint(),
        })
    }
}

/// Source-to-generated-code translation.
pub trait Compiler: Send + Sync {
    fn compile(&self, source: &str) -> Result<GeneratedCode, CompileError>;
}

/// A compiler reached by spawning an external command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalCompiler {
    program: OsString,
    args: Vec<OsString>,
}

impl ExternalCompiler {
    pub fn new<I, S>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        ExternalCompiler {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a whitespace-separated command line. Returns `None` when empty.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let program = words.next()?;
        Some(ExternalCompiler::new(program, words))
    }

    /// The Stella compiler running in its Docker image.
    pub fn stella_docker() -> Self {
        ExternalCompiler::new("docker", ["run", "-i", "fizruk/stella", "compile"])
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

impl Compiler for ExternalCompiler {
    fn compile(&self, source: &str) -> Result<GeneratedCode, CompileError> {
        let program = self.program_name();
        tracing::debug!(program = %program, args = ?self.args, "invoking compiler");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CompileError::CompilerNotFound {
                        program: program.clone(),
                        message: e.to_string(),
                    }
                } else {
                    CompileError::Io {
                        program: program.clone(),
                        message: e.to_string(),
                    }
                }
            })?;

        // Feed stdin from a separate thread so a chatty compiler cannot
        // deadlock against a full stdout pipe. Dropping stdin closes it.
        let stdin = child.stdin.take();
        let payload = source.as_bytes().to_vec();
        let writer = std::thread::spawn(move || {
            if let Some(mut stdin) = stdin {
                // The compiler may exit without draining its input.
                let _ = stdin.write_all(&payload);
            }
        });

        let output = child.wait_with_output().map_err(|e| CompileError::Io {
            program: program.clone(),
            message: e.to_string(),
        })?;
        let _ = writer.join();

        if !output.status.success() {
            return Err(CompileError::Failed {
                program,
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Err(CompileError::EmptyOutput { program });
        }

        let code =
            String::from_utf8(output.stdout).map_err(|_| CompileError::NotText { program })?;
        tracing::debug!(bytes = code.len(), "compiler produced generated code");
        Ok(GeneratedCode(code))
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
