//! Harness configuration.
//!
//! Toolchain locations come from the environment; everything else from
//! command-line flags (see `main.rs`). Defaults reproduce the stock setup:
//! Stella via Docker, `gcc`, and support sources under `./stella`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::build::{CcBuilder, VariantRole};
use crate::compile::ExternalCompiler;

/// Deadline for the collecting variant: a broken collector may hang or loop.
pub const DEFAULT_COLLECTING_DEADLINE: Duration = Duration::from_secs(3);

/// Safety deadline for the baseline, far above anything a healthy run needs.
pub const DEFAULT_BASELINE_DEADLINE: Duration = Duration::from_secs(60);

pub const ENV_COMPILER: &str = "GCDIFF_COMPILER";
pub const ENV_CC: &str = "GCDIFF_CC";
pub const ENV_RUNTIME_DIR: &str = "GCDIFF_RUNTIME_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid duration '{value}': expected e.g. `3`, `3s`, `500ms` or `none`")]
    InvalidDuration { value: String },
    #[error("{var} is set but empty")]
    EmptyCommand { var: &'static str },
}

/// How long each variant may run before it is killed.
///
/// The collecting variant is always bounded. The baseline gets a much
/// larger safety deadline by default; `None` trusts it to terminate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeadlinePolicy {
    pub collecting: Duration,
    pub baseline: Option<Duration>,
}

impl Default for DeadlinePolicy {
    fn default() -> Self {
        DeadlinePolicy {
            collecting: DEFAULT_COLLECTING_DEADLINE,
            baseline: Some(DEFAULT_BASELINE_DEADLINE),
        }
    }
}

impl DeadlinePolicy {
    /// Bounded collector, unbounded baseline.
    pub fn trusting_baseline(collecting: Duration) -> Self {
        DeadlinePolicy {
            collecting,
            baseline: None,
        }
    }

    pub fn for_role(&self, role: VariantRole) -> Option<Duration> {
        match role {
            VariantRole::Collecting => Some(self.collecting),
            VariantRole::Baseline => self.baseline,
        }
    }
}

/// Parse a deadline flag value. `none` disables the deadline.
///
/// Bare numbers are seconds; `ms` and `s` suffixes are accepted.
pub fn parse_deadline(value: &str) -> Result<Option<Duration>, ConfigError> {
    let invalid = || ConfigError::InvalidDuration {
        value: value.to_string(),
    };
    let value = value.trim();
    if value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let (digits, unit_ms) = if let Some(ms) = value.strip_suffix("ms") {
        (ms, true)
    } else if let Some(s) = value.strip_suffix('s') {
        (s, false)
    } else {
        (value, false)
    };
    let amount = digits.trim().parse::<u64>().map_err(|_| invalid())?;
    Ok(Some(if unit_ms {
        Duration::from_millis(amount)
    } else {
        Duration::from_secs(amount)
    }))
}

/// External tools the harness shells out to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolchainConfig {
    /// Compile service command line.
    pub compiler: ExternalCompiler,
    /// C compiler used to build variants.
    pub cc: String,
    pub c_standard: String,
    /// Directory holding `runtime.c` and `gc.c`.
    pub runtime_dir: PathBuf,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        ToolchainConfig {
            compiler: ExternalCompiler::stella_docker(),
            cc: "gcc".to_string(),
            c_standard: "c11".to_string(),
            runtime_dir: PathBuf::from("stella"),
        }
    }
}

impl ToolchainConfig {
    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read overrides through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = ToolchainConfig::default();

        if let Some(line) = lookup(ENV_COMPILER) {
            config.compiler = ExternalCompiler::from_command_line(&line)
                .ok_or(ConfigError::EmptyCommand { var: ENV_COMPILER })?;
        }
        if let Some(cc) = lookup(ENV_CC) {
            if cc.trim().is_empty() {
                return Err(ConfigError::EmptyCommand { var: ENV_CC });
            }
            config.cc = cc.trim().to_string();
        }
        if let Some(dir) = lookup(ENV_RUNTIME_DIR) {
            config.runtime_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    /// The configured compile service.
    pub fn compiler(&self) -> ExternalCompiler {
        self.compiler.clone()
    }

    /// The configured variant builder with runtime and collector sources attached.
    pub fn builder(&self) -> CcBuilder {
        CcBuilder::new(&self.cc)
            .with_c_standard(&self.c_standard)
            .with_runtime_dir(&self.runtime_dir)
    }
}

/// Settings for one harness run.
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    /// Directory holding `<name>.st` test programs.
    pub fixture_root: PathBuf,
    /// Where per-case scratch directories are created (system temp dir if `None`).
    pub scratch_root: Option<PathBuf>,
    /// Only run cases whose name contains this substring.
    pub filter: Option<String>,
    pub verbose: bool,
    /// Run test cases concurrently.
    pub parallel: bool,
    /// Leave scratch directories on disk after each case.
    pub keep_artifacts: bool,
    pub deadlines: DeadlinePolicy,
    pub toolchain: ToolchainConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            fixture_root: PathBuf::from("testdata"),
            scratch_root: None,
            filter: None,
            verbose: false,
            parallel: true,
            keep_artifacts: false,
            deadlines: DeadlinePolicy::default(),
            toolchain: ToolchainConfig::default(),
        }
    }
}

impl HarnessConfig {
    pub fn fixture_root(&self) -> &Path {
        &self.fixture_root
    }
}
