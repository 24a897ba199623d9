//! Harness driver.
//!
//! Runs every selected test case through an [`EquivalenceChecker`] and
//! collects the reports into a [`RunSummary`]. Cases are independent, so
//! they run on a scoped rayon pool unless parallelism is turned off.

use std::time::Instant;

use rayon::prelude::*;

use crate::build::{Builder, CcBuilder};
use crate::check::EquivalenceChecker;
use crate::compile::{Compiler, ExternalCompiler};
use crate::config::HarnessConfig;
use crate::fixture::{Registry, TestCase};
use crate::result::{CaseReport, RunSummary};

pub struct Harness<C, B> {
    checker: EquivalenceChecker<C, B>,
    filter: Option<String>,
    parallel: bool,
}

impl Harness<ExternalCompiler, CcBuilder> {
    /// Harness wired to the configured external toolchain.
    pub fn from_config(config: &HarnessConfig) -> Self {
        let mut checker = EquivalenceChecker::new(
            config.toolchain.compiler(),
            config.toolchain.builder(),
        )
        .with_deadlines(config.deadlines)
        .keep_artifacts(config.keep_artifacts);
        if let Some(root) = &config.scratch_root {
            checker = checker.with_scratch_root(root);
        }
        Harness {
            checker,
            filter: config.filter.clone(),
            parallel: config.parallel,
        }
    }
}

impl<C: Compiler, B: Builder> Harness<C, B> {
    pub fn new(checker: EquivalenceChecker<C, B>) -> Self {
        Harness {
            checker,
            filter: None,
            parallel: true,
        }
    }

    /// Only run cases whose name contains `filter`.
    #[must_use]
    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn checker(&self) -> &EquivalenceChecker<C, B> {
        &self.checker
    }

    /// Check every selected case. Reports keep registration order.
    pub fn run(&self, registry: &Registry) -> RunSummary {
        let start = Instant::now();
        let cases = registry.select(self.filter.as_deref());
        tracing::info!(
            selected = cases.len(),
            registered = registry.len(),
            parallel = self.parallel,
            "running test cases"
        );

        let reports = if self.parallel && cases.len() > 1 {
            self.run_parallel(&cases)
        } else {
            self.run_sequential(&cases)
        };

        let mut summary = RunSummary::new();
        for report in reports {
            summary.add_case(report);
        }
        summary.duration = start.elapsed();
        summary
    }

    fn run_sequential(&self, cases: &[&TestCase]) -> Vec<CaseReport> {
        cases.iter().map(|case| self.checker.check(case)).collect()
    }

    /// Run cases on a scoped pool that is torn down before returning.
    fn run_parallel(&self, cases: &[&TestCase]) -> Vec<CaseReport> {
        let checker = &self.checker;
        rayon::ThreadPoolBuilder::new()
            .build_scoped(rayon::ThreadBuilder::run, |pool| {
                pool.install(|| {
                    cases
                        .par_iter()
                        .map(|case| checker.check(case))
                        .collect::<Vec<_>>()
                })
            })
            .unwrap_or_else(|e| {
                tracing::warn!("failed to create thread pool ({e}), running sequentially");
                self.run_sequential(cases)
            })
    }
}
