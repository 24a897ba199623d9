//! Human-readable run report.

use std::io::{self, Write};

use crate::result::{CaseReport, EquivalenceOutcome, ExecutionError, RunSummary, Verdict};

/// Write per-case results and the run summary to `out`.
///
/// Passing inputs are listed only when `verbose`. Every failure names its
/// case, input and kind; a violation shows both outputs byte for byte.
pub fn write_summary(out: &mut impl Write, summary: &RunSummary, verbose: bool) -> io::Result<()> {
    for case in &summary.cases {
        write_case(out, case, verbose)?;
    }

    writeln!(out)?;
    writeln!(out, "Test Summary:")?;
    writeln!(
        out,
        "  {} passed, {} failed, {} aborted ({} inputs in {} cases)",
        summary.passed,
        summary.failed,
        summary.aborted,
        summary.total(),
        summary.cases.len()
    )?;
    writeln!(out, "  Completed in {:.2?}", summary.duration)?;

    writeln!(out)?;
    if summary.has_failures() {
        writeln!(out, "FAILED")
    } else if summary.cases.is_empty() {
        writeln!(out, "NO TESTS FOUND")
    } else {
        writeln!(out, "OK")
    }
}

fn write_case(out: &mut impl Write, case: &CaseReport, verbose: bool) -> io::Result<()> {
    if !verbose && !case.has_failures() {
        return Ok(());
    }
    writeln!(out, "\n{}", case.name)?;

    if let Some(abort) = &case.abort {
        writeln!(out, "  ABORT: {} - {abort}", abort.kind())?;
        return Ok(());
    }

    for outcome in &case.outcomes {
        if outcome.passed() {
            if verbose {
                writeln!(
                    out,
                    "  PASS: input {} ({:.2?})",
                    outcome.input, outcome.duration
                )?;
            }
        } else {
            write_failure(out, outcome)?;
        }
    }
    Ok(())
}

fn write_failure(out: &mut impl Write, outcome: &EquivalenceOutcome) -> io::Result<()> {
    let kind = outcome.verdict.failure_kind().unwrap_or("Unknown");
    writeln!(out, "  FAIL: {} input {} - {kind}", outcome.case, outcome.input)?;

    match &outcome.verdict {
        Verdict::Pass => {}
        Verdict::EquivalenceViolation {
            baseline,
            collecting,
        } => {
            writeln!(out, "    no-gc stdout: b\"{}\"", baseline.escape_ascii())?;
            writeln!(out, "    gc stdout:    b\"{}\"", collecting.escape_ascii())?;
        }
        Verdict::ExecutionError(failures) => {
            for failure in failures {
                writeln!(
                    out,
                    "    {}: {} - {}",
                    failure.role,
                    failure.error.kind(),
                    failure.error
                )?;
                if let ExecutionError::NonZeroExit { stderr_tail, .. } = &failure.error {
                    for line in stderr_tail.lines() {
                        writeln!(out, "      | {line}")?;
                    }
                }
            }
        }
    }
    Ok(())
}
