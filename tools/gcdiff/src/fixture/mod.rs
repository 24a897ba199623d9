//! Test case registry.
//!
//! A test case names a source program under the fixture root
//! (`<root>/<name>.st`) together with the inputs it is exercised on and an
//! optional heap budget override.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Allocation budget compiled into a variant when a test case does not override it.
pub const DEFAULT_HEAP_BUDGET_BYTES: u64 = 16 * 100;

/// File extension of test program sources.
pub const SOURCE_EXTENSION: &str = "st";

/// One input value fed to a variant on stdin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Input(u64);

impl Input {
    pub const fn new(value: u64) -> Self {
        Input(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// Canonical textual encoding written to the variant's stdin.
    pub fn encode(self) -> String {
        self.0.to_string()
    }
}

impl From<u64> for Input {
    fn from(value: u64) -> Self {
        Input(value)
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised while declaring test cases.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixtureError {
    #[error("test case '{name}' is registered twice")]
    Duplicate { name: String },
    #[error("test case '{name}' declares no inputs")]
    NoInputs { name: String },
    #[error("invalid test case spec '{spec}': {message}")]
    InvalidSpec { spec: String, message: String },
}

/// A named test program and the inputs it is checked against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCase {
    name: String,
    source: PathBuf,
    inputs: Vec<Input>,
    heap_budget_bytes: Option<u64>,
}

impl TestCase {
    /// Create a test case whose source lives at an explicit path.
    pub fn new(
        name: impl Into<String>,
        source: impl Into<PathBuf>,
        inputs: impl IntoIterator<Item = u64>,
    ) -> Self {
        TestCase {
            name: name.into(),
            source: source.into(),
            inputs: inputs.into_iter().map(Input::new).collect(),
            heap_budget_bytes: None,
        }
    }

    /// Create a test case resolved by convention to `<root>/<name>.st`.
    pub fn at_root(root: &Path, name: &str, inputs: impl IntoIterator<Item = u64>) -> Self {
        let source = root.join(format!("{name}.{SOURCE_EXTENSION}"));
        TestCase::new(name, source, inputs)
    }

    /// Override the allocation budget compiled into both variants.
    #[must_use]
    pub fn with_heap_budget(mut self, bytes: u64) -> Self {
        self.heap_budget_bytes = Some(bytes);
        self
    }

    /// Parse a command-line case spec: `name:1,2,3` or `name:1,2,3@16384`.
    pub fn parse_spec(root: &Path, spec: &str) -> Result<Self, FixtureError> {
        let invalid = |message: &str| FixtureError::InvalidSpec {
            spec: spec.to_string(),
            message: message.to_string(),
        };

        let (name, rest) = spec
            .split_once(':')
            .ok_or_else(|| invalid("expected `name:inputs`"))?;
        if name.is_empty() {
            return Err(invalid("empty test case name"));
        }

        let (inputs, budget) = match rest.split_once('@') {
            Some((inputs, budget)) => {
                let bytes = budget
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| invalid("heap budget must be a non-negative integer"))?;
                (inputs, Some(bytes))
            }
            None => (rest, None),
        };

        let values = inputs
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<u64>().map_err(|_| invalid("inputs must be integers")))
            .collect::<Result<Vec<_>, _>>()?;
        if values.is_empty() {
            return Err(FixtureError::NoInputs {
                name: name.to_string(),
            });
        }

        let case = TestCase::at_root(root, name, values);
        Ok(match budget {
            Some(bytes) => case.with_heap_budget(bytes),
            None => case,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    /// Effective allocation budget for both variants.
    pub fn heap_budget_bytes(&self) -> u64 {
        self.heap_budget_bytes.unwrap_or(DEFAULT_HEAP_BUDGET_BYTES)
    }

    pub fn heap_budget_override(&self) -> Option<u64> {
        self.heap_budget_bytes
    }

    /// Read the program source text.
    pub fn read_source(&self) -> std::io::Result<String> {
        std::fs::read_to_string(&self.source)
    }
}

/// Ordered collection of test cases with unique names.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    cases: Vec<TestCase>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// The stock cases: recursive Fibonacci, identity over many small
    /// allocations, and factorial under a constrained heap.
    pub fn standard(root: &Path) -> Self {
        let cases = vec![
            TestCase::at_root(root, "fib", [1, 10]),
            TestCase::at_root(root, "id", [1, 10, 30, 150]),
            TestCase::at_root(root, "factorial", [1, 2, 3, 5]).with_heap_budget(16 * 1024),
        ];
        Registry { cases }
    }

    pub fn register(&mut self, case: TestCase) -> Result<(), FixtureError> {
        if case.inputs.is_empty() {
            return Err(FixtureError::NoInputs { name: case.name });
        }
        if self.get(case.name()).is_some() {
            return Err(FixtureError::Duplicate { name: case.name });
        }
        self.cases.push(case);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TestCase> {
        self.cases.iter().find(|c| c.name == name)
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// Cases whose name contains `filter` (all cases when `None`), in registration order.
    pub fn select(&self, filter: Option<&str>) -> Vec<&TestCase> {
        self.cases
            .iter()
            .filter(|c| filter.map_or(true, |f| c.name.contains(f)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
