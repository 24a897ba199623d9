//! Outcome types: per input, per test case, and per run.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::build::{BuildError, VariantRole};
use crate::check::CaseStage;
use crate::compile::CompileError;
use crate::fixture::Input;

/// Why a test case stopped before any input could run.
#[derive(Debug, Clone, Error)]
pub enum CaseAbort {
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("build error ({role} variant): {source}")]
    Build {
        role: VariantRole,
        #[source]
        source: BuildError,
    },
}

impl CaseAbort {
    pub fn kind(&self) -> &'static str {
        match self {
            CaseAbort::Compile(_) => "CompileError",
            CaseAbort::Build { .. } => "BuildError",
        }
    }
}

/// A variant that did not run to normal completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionError {
    /// Killed after exceeding its deadline.
    Timeout { deadline: Duration },
    /// Exited with a non-zero status.
    NonZeroExit {
        exit_code: i32,
        signal: Option<i32>,
        /// Last lines of stderr, for diagnosis.
        stderr_tail: String,
    },
    /// Could not be started or driven.
    Launch { message: String },
}

impl ExecutionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionError::Timeout { .. } => "Timeout",
            ExecutionError::NonZeroExit { .. } => "NonZeroExit",
            ExecutionError::Launch { .. } => "Launch",
        }
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::Timeout { deadline } => {
                write!(f, "timed out after {deadline:.2?}")
            }
            ExecutionError::NonZeroExit {
                exit_code, signal, ..
            } => {
                write!(f, "exited with code {exit_code}")?;
                if let Some(signal) = signal {
                    write!(f, " (signal {signal})")?;
                }
                Ok(())
            }
            ExecutionError::Launch { message } => write!(f, "failed to run: {message}"),
        }
    }
}

/// One variant's execution failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionFailure {
    pub role: VariantRole,
    pub error: ExecutionError,
}

/// The oracle's decision for one input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Both variants succeeded with identical stdout.
    Pass,
    /// At least one variant crashed, hung, or failed to start.
    ExecutionError(Vec<ExecutionFailure>),
    /// Both variants succeeded but printed different bytes.
    EquivalenceViolation {
        baseline: Vec<u8>,
        collecting: Vec<u8>,
    },
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    /// Failure kind label, `None` for a pass.
    pub fn failure_kind(&self) -> Option<&'static str> {
        match self {
            Verdict::Pass => None,
            Verdict::ExecutionError(_) => Some("ExecutionError"),
            Verdict::EquivalenceViolation { .. } => Some("EquivalenceViolation"),
        }
    }
}

/// Result of checking one input of one test case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EquivalenceOutcome {
    pub case: String,
    pub input: Input,
    pub verdict: Verdict,
    pub duration: Duration,
}

impl EquivalenceOutcome {
    pub fn passed(&self) -> bool {
        self.verdict.is_pass()
    }
}

/// Everything learned about one test case.
#[derive(Clone, Debug)]
pub struct CaseReport {
    pub name: String,
    /// Last pipeline stage reached.
    pub stage: CaseStage,
    pub abort: Option<CaseAbort>,
    /// One outcome per declared input, in declaration order.
    pub outcomes: Vec<EquivalenceOutcome>,
    pub duration: Duration,
}

impl CaseReport {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_some()
    }

    pub fn has_failures(&self) -> bool {
        self.is_aborted() || self.failed() > 0
    }

    /// Failing outcomes, in input order.
    pub fn failures(&self) -> impl Iterator<Item = &EquivalenceOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }
}

/// Summary of a whole harness run.
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    pub cases: Vec<CaseReport>,
    /// Inputs that passed, across all cases.
    pub passed: usize,
    /// Inputs that failed, across all cases.
    pub failed: usize,
    /// Cases stopped by a compile or build error.
    pub aborted: usize,
    pub duration: Duration,
}

impl RunSummary {
    pub fn new() -> Self {
        RunSummary::default()
    }

    pub fn add_case(&mut self, report: CaseReport) {
        self.passed += report.passed();
        self.failed += report.failed();
        if report.is_aborted() {
            self.aborted += 1;
        }
        self.cases.push(report);
    }

    /// Total inputs evaluated.
    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.aborted > 0
    }

    /// 0 = all pass, 1 = any failure or aborted case, 2 = nothing ran.
    pub fn exit_code(&self) -> i32 {
        if self.cases.is_empty() {
            2
        } else {
            i32::from(self.has_failures())
        }
    }
}

#[cfg(test)]
mod tests;
