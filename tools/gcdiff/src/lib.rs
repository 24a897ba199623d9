//! gcdiff - differential testing for garbage collectors
//!
//! A collector is correct when a program prints exactly the same bytes with
//! and without it. This crate drives that experiment for every registered
//! test program.
//!
//! # Architecture
//!
//! ```text
//! Registry ──► TestCase
//!                 │
//!                 ▼
//!          Compiler::compile() ──► CompiledArtifact (staged once per case)
//!                 │
//!        ┌────────┴────────┐
//!        ▼                 ▼
//!  Builder::build()   Builder::build()
//!   (collecting)        (baseline)
//!        │                 │
//!        └────────┬────────┘
//!                 ▼
//!     process::execute() ×2 per input
//!                 │
//!                 ▼
//!        judge() ──► EquivalenceOutcome ──► CaseReport ──► RunSummary
//! ```
//!
//! Both variants are always built from the same staged source file. The
//! memory-management switch is the only difference between their builds.

pub mod build;
pub mod check;
pub mod compile;
pub mod config;
pub mod fixture;
pub mod process;
pub mod report;
pub mod result;
pub mod runner;
pub mod scratch;
pub mod testing;

pub use build::{BuildError, Builder, CcBuilder, Variant, VariantConfig, VariantRole};
pub use check::{judge, CaseStage, EquivalenceChecker, VariantPair};
pub use compile::{CompileError, CompiledArtifact, Compiler, ExternalCompiler, GeneratedCode};
pub use config::{DeadlinePolicy, HarnessConfig, ToolchainConfig};
pub use fixture::{Input, Registry, TestCase, DEFAULT_HEAP_BUDGET_BYTES};
pub use process::{execute, ExecutionResult, RunError};
pub use result::{
    CaseAbort, CaseReport, EquivalenceOutcome, ExecutionError, ExecutionFailure, RunSummary,
    Verdict,
};
pub use runner::Harness;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for diagnostic output.
///
/// Safe to call multiple times. Nothing is installed unless `RUST_LOG` is
/// set, e.g. `RUST_LOG=gcdiff=debug` to see every spawned command.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_tree::HierarchicalLayer::new(2)
                        .with_targets(true)
                        .with_bracketed_fields(true),
                )
                .init();
        }
    });
}
