//! Equivalence checker.
//!
//! Drives one test case through the pipeline:
//!
//! ```text
//! Unbuilt ──► Compiled ──► BothVariantsBuilt ──► Running(0) ─ … ─► Running(n-1) ──► Reported
//!    │            │
//!    └────────────┴──► Aborted   (CompileError / BuildError)
//! ```
//!
//! The generated code is staged to a single file and both variants are
//! built from that file. Every declared input is evaluated even after an
//! earlier one fails.

use std::time::{Duration, Instant};

use crate::build::{BuildError, Builder, Variant, VariantConfig, VariantRole};
use crate::compile::{CompileError, CompiledArtifact, Compiler};
use crate::config::DeadlinePolicy;
use crate::fixture::{Input, TestCase};
use crate::process::{self, ExecutionResult, RunError};
use crate::result::{
    CaseAbort, CaseReport, EquivalenceOutcome, ExecutionError, ExecutionFailure, Verdict,
};
use crate::scratch::Scratch;

/// Lines of stderr kept in a `NonZeroExit` report.
const STDERR_TAIL_LINES: usize = 10;

/// Pipeline position of a test case.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaseStage {
    Unbuilt,
    Compiled,
    BothVariantsBuilt,
    /// Executing the input at this index.
    Running(usize),
    Reported,
    Aborted,
}

impl CaseStage {
    /// Whether moving from `self` to `next` follows the pipeline.
    pub fn can_advance_to(self, next: CaseStage) -> bool {
        matches!(
            (self, next),
            (CaseStage::Unbuilt, CaseStage::Compiled)
                | (CaseStage::Compiled, CaseStage::BothVariantsBuilt)
                | (CaseStage::BothVariantsBuilt, CaseStage::Running(0) | CaseStage::Reported)
                | (CaseStage::Unbuilt | CaseStage::Compiled, CaseStage::Aborted)
        ) || matches!((self, next), (CaseStage::Running(i), CaseStage::Running(j)) if j == i + 1)
            || matches!((self, next), (CaseStage::Running(_), CaseStage::Reported))
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CaseStage::Reported | CaseStage::Aborted)
    }
}

/// Tracks a case through the pipeline and logs each transition.
struct StageTracker<'a> {
    case: &'a str,
    stage: CaseStage,
}

impl<'a> StageTracker<'a> {
    fn new(case: &'a str) -> Self {
        StageTracker {
            case,
            stage: CaseStage::Unbuilt,
        }
    }

    fn advance(&mut self, next: CaseStage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "invalid stage transition {:?} -> {next:?}",
            self.stage
        );
        tracing::debug!(case = self.case, from = ?self.stage, to = ?next, "stage");
        self.stage = next;
    }
}

/// The two executables of one test case, built from the same source.
pub struct VariantPair {
    pub collecting: Variant,
    pub baseline: Variant,
    scratch: Scratch,
}

impl VariantPair {
    pub fn get(&self, role: VariantRole) -> &Variant {
        match role {
            VariantRole::Collecting => &self.collecting,
            VariantRole::Baseline => &self.baseline,
        }
    }

    /// Remove the scratch directory holding both variants.
    pub fn finish(self) {
        self.scratch.finish();
    }
}

/// Runs test cases through compile, build, execute and compare.
pub struct EquivalenceChecker<C, B> {
    compiler: C,
    builder: B,
    deadlines: DeadlinePolicy,
    scratch_root: Option<std::path::PathBuf>,
    keep_artifacts: bool,
}

impl<C: Compiler, B: Builder> EquivalenceChecker<C, B> {
    pub fn new(compiler: C, builder: B) -> Self {
        EquivalenceChecker {
            compiler,
            builder,
            deadlines: DeadlinePolicy::default(),
            scratch_root: None,
            keep_artifacts: false,
        }
    }

    #[must_use]
    pub fn with_deadlines(mut self, deadlines: DeadlinePolicy) -> Self {
        self.deadlines = deadlines;
        self
    }

    #[must_use]
    pub fn with_scratch_root(mut self, root: impl Into<std::path::PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    #[must_use]
    pub fn keep_artifacts(mut self, keep: bool) -> Self {
        self.keep_artifacts = keep;
        self
    }

    pub fn deadlines(&self) -> DeadlinePolicy {
        self.deadlines
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    /// Check every declared input of `case`.
    pub fn check(&self, case: &TestCase) -> CaseReport {
        let _span = tracing::info_span!("case", name = case.name()).entered();
        let start = Instant::now();
        let mut stage = StageTracker::new(case.name());

        let pair = match self.prepare(case, &mut stage) {
            Ok(pair) => pair,
            Err(abort) => {
                stage.advance(CaseStage::Aborted);
                tracing::info!(kind = abort.kind(), "test case aborted: {abort}");
                return CaseReport {
                    name: case.name().to_string(),
                    stage: stage.stage,
                    abort: Some(abort),
                    outcomes: Vec::new(),
                    duration: start.elapsed(),
                };
            }
        };

        let mut outcomes = Vec::with_capacity(case.inputs().len());
        for (index, &input) in case.inputs().iter().enumerate() {
            stage.advance(CaseStage::Running(index));
            outcomes.push(self.check_input(case.name(), &pair, input));
        }
        stage.advance(CaseStage::Reported);
        pair.finish();

        let report = CaseReport {
            name: case.name().to_string(),
            stage: stage.stage,
            abort: None,
            outcomes,
            duration: start.elapsed(),
        };
        tracing::info!(
            passed = report.passed(),
            failed = report.failed(),
            "test case finished"
        );
        report
    }

    /// Compile once, stage the artifact, and build both variants from it.
    pub fn build_variants(&self, case: &TestCase) -> Result<VariantPair, CaseAbort> {
        let mut stage = StageTracker::new(case.name());
        self.prepare(case, &mut stage)
    }

    fn prepare(&self, case: &TestCase, stage: &mut StageTracker<'_>) -> Result<VariantPair, CaseAbort> {
        let source = case.read_source().map_err(|e| CompileError::SourceUnreadable {
            path: case.source().to_path_buf(),
            message: e.to_string(),
        })?;
        let artifact = CompiledArtifact::new(case.name(), self.compiler.compile(&source)?);
        stage.advance(CaseStage::Compiled);

        let scratch = Scratch::create(self.scratch_root.as_deref(), case.name(), self.keep_artifacts)
            .map_err(|e| CaseAbort::Build {
                role: VariantRole::Collecting,
                source: BuildError::Io {
                    message: format!("cannot create scratch directory: {e}"),
                },
            })?;
        let staged = artifact
            .stage(&scratch.source_path())
            .map_err(|e| CaseAbort::Build {
                role: VariantRole::Collecting,
                source: BuildError::Io {
                    message: format!("cannot stage generated code: {e}"),
                },
            })?;

        let budget = case.heap_budget_bytes();
        let build = |config: VariantConfig| {
            let _span = tracing::debug_span!("build", role = %config.role).entered();
            self.builder
                .build(&staged, config, &scratch.variant_path(config.role))
                .map_err(|source| CaseAbort::Build {
                    role: config.role,
                    source,
                })
        };
        let collecting = build(VariantConfig::collecting(budget))?;
        let baseline = build(VariantConfig::baseline(budget))?;
        debug_assert_eq!(collecting.source_fingerprint(), baseline.source_fingerprint());
        stage.advance(CaseStage::BothVariantsBuilt);

        Ok(VariantPair {
            collecting,
            baseline,
            scratch,
        })
    }

    /// Run one input against both variants and judge the results.
    pub fn check_input(&self, case: &str, pair: &VariantPair, input: Input) -> EquivalenceOutcome {
        let _span = tracing::debug_span!("input", %input).entered();
        let start = Instant::now();

        // Baseline first: it is the reference the collector is held to.
        let baseline = process::execute(
            &pair.baseline,
            input,
            self.deadlines.for_role(VariantRole::Baseline),
        );
        let collecting = process::execute(
            &pair.collecting,
            input,
            self.deadlines.for_role(VariantRole::Collecting),
        );

        let verdict = judge(&collecting, &baseline, &self.deadlines);
        if let Some(kind) = verdict.failure_kind() {
            tracing::info!(case, %input, kind, "input failed");
        }
        EquivalenceOutcome {
            case: case.to_string(),
            input,
            verdict,
            duration: start.elapsed(),
        }
    }
}

/// Apply the equivalence oracle to one pair of executions.
///
/// Any execution failure takes precedence over output comparison; both
/// sides' failures are reported. Otherwise stdout must match byte for byte.
pub fn judge(
    collecting: &Result<ExecutionResult, RunError>,
    baseline: &Result<ExecutionResult, RunError>,
    deadlines: &DeadlinePolicy,
) -> Verdict {
    let failures: Vec<ExecutionFailure> = [
        (VariantRole::Collecting, collecting),
        (VariantRole::Baseline, baseline),
    ]
    .into_iter()
    .filter_map(|(role, result)| {
        execution_error(result, deadlines.for_role(role))
            .map(|error| ExecutionFailure { role, error })
    })
    .collect();

    let (Ok(gc), Ok(no_gc)) = (collecting, baseline) else {
        return Verdict::ExecutionError(failures);
    };
    if !failures.is_empty() {
        return Verdict::ExecutionError(failures);
    }

    if gc.stdout == no_gc.stdout {
        Verdict::Pass
    } else {
        Verdict::EquivalenceViolation {
            baseline: no_gc.stdout.clone(),
            collecting: gc.stdout.clone(),
        }
    }
}

fn execution_error(
    result: &Result<ExecutionResult, RunError>,
    deadline: Option<Duration>,
) -> Option<ExecutionError> {
    match result {
        Err(e) => Some(ExecutionError::Launch {
            message: e.to_string(),
        }),
        Ok(run) if run.timed_out => Some(ExecutionError::Timeout {
            deadline: deadline.unwrap_or(run.elapsed),
        }),
        Ok(run) if run.exit_code != 0 => Some(ExecutionError::NonZeroExit {
            exit_code: run.exit_code,
            signal: run.signal,
            stderr_tail: stderr_tail(&run.stderr),
        }),
        Ok(_) => None,
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
