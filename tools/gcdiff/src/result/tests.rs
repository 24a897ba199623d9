use super::*;
use pretty_assertions::assert_eq;

fn outcome(input: u64, verdict: Verdict) -> EquivalenceOutcome {
    EquivalenceOutcome {
        case: "fib".to_string(),
        input: Input::new(input),
        verdict,
        duration: Duration::from_millis(2),
    }
}

fn violation() -> Verdict {
    Verdict::EquivalenceViolation {
        baseline: b"55\n".to_vec(),
        collecting: b"56\n".to_vec(),
    }
}

fn reported(name: &str, outcomes: Vec<EquivalenceOutcome>) -> CaseReport {
    CaseReport {
        name: name.to_string(),
        stage: CaseStage::Reported,
        abort: None,
        outcomes,
        duration: Duration::from_millis(5),
    }
}

fn aborted(name: &str) -> CaseReport {
    CaseReport {
        name: name.to_string(),
        stage: CaseStage::Aborted,
        abort: Some(CaseAbort::Compile(CompileError::EmptyOutput {
            program: "stella".to_string(),
        })),
        outcomes: Vec::new(),
        duration: Duration::from_millis(1),
    }
}

#[test]
fn test_verdict_kinds() {
    assert!(Verdict::Pass.is_pass());
    assert_eq!(Verdict::Pass.failure_kind(), None);
    assert_eq!(violation().failure_kind(), Some("EquivalenceViolation"));
    assert_eq!(
        Verdict::ExecutionError(Vec::new()).failure_kind(),
        Some("ExecutionError")
    );
}

#[test]
fn test_execution_error_display() {
    let crash = ExecutionError::NonZeroExit {
        exit_code: 139,
        signal: Some(11),
        stderr_tail: String::new(),
    };
    assert_eq!(crash.to_string(), "exited with code 139 (signal 11)");
    assert_eq!(crash.kind(), "NonZeroExit");

    let hang = ExecutionError::Timeout {
        deadline: Duration::from_secs(3),
    };
    assert_eq!(hang.to_string(), "timed out after 3.00s");
}

#[test]
fn test_case_abort_kinds() {
    assert_eq!(aborted("x").abort.map(|a| a.kind()), Some("CompileError"));
    let build = CaseAbort::Build {
        role: VariantRole::Baseline,
        source: BuildError::InvalidConfig {
            message: "heap budget must be positive".to_string(),
        },
    };
    assert_eq!(build.kind(), "BuildError");
    assert_eq!(
        build.to_string(),
        "build error (no-gc variant): invalid variant configuration: heap budget must be positive"
    );
}

#[test]
fn test_case_report_counts() {
    let report = reported(
        "fib",
        vec![
            outcome(1, Verdict::Pass),
            outcome(10, violation()),
            outcome(20, Verdict::Pass),
        ],
    );
    assert_eq!(report.passed(), 2);
    assert_eq!(report.failed(), 1);
    assert!(report.has_failures());
    assert!(!report.is_aborted());
    let failing: Vec<u64> = report.failures().map(|o| o.input.value()).collect();
    assert_eq!(failing, vec![10]);
}

#[test]
fn test_summary_accumulates_cases() {
    let mut summary = RunSummary::new();
    summary.add_case(reported("id", vec![outcome(1, Verdict::Pass)]));
    summary.add_case(reported(
        "fib",
        vec![outcome(1, Verdict::Pass), outcome(10, violation())],
    ));
    summary.add_case(aborted("factorial"));

    assert_eq!(summary.passed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.aborted, 1);
    assert_eq!(summary.total(), 3);
    assert_eq!(summary.cases.len(), 3);
}

#[test]
fn test_summary_exit_codes() {
    assert_eq!(RunSummary::new().exit_code(), 2);

    let mut clean = RunSummary::new();
    clean.add_case(reported("id", vec![outcome(1, Verdict::Pass)]));
    assert_eq!(clean.exit_code(), 0);

    let mut failing = RunSummary::new();
    failing.add_case(reported("fib", vec![outcome(10, violation())]));
    assert_eq!(failing.exit_code(), 1);

    // An aborted case fails the run even though no input failed.
    let mut aborting = RunSummary::new();
    aborting.add_case(reported("id", vec![outcome(1, Verdict::Pass)]));
    aborting.add_case(aborted("broken"));
    assert_eq!(aborting.failed, 0);
    assert_eq!(aborting.exit_code(), 1);
}
