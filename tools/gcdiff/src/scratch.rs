//! Per-test-case scratch directories.
//!
//! Every case run gets a fresh directory holding its generated source and
//! both variants, so concurrent cases never share a path and a previous
//! run's binaries are never picked up.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::build::VariantRole;

/// File name of the staged generated code.
pub const STAGED_SOURCE_NAME: &str = "program.c";

pub struct Scratch {
    dir: TempDir,
    keep: bool,
}

impl Scratch {
    /// Create a fresh directory for `case_name` under `root` (system temp dir if `None`).
    pub fn create(root: Option<&Path>, case_name: &str, keep: bool) -> std::io::Result<Self> {
        let prefix = format!("gcdiff-{}-", sanitize(case_name));
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).keep(keep);
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(Scratch { dir, keep })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn source_path(&self) -> PathBuf {
        self.dir.path().join(STAGED_SOURCE_NAME)
    }

    pub fn variant_path(&self, role: VariantRole) -> PathBuf {
        self.dir.path().join(role.artifact_name())
    }

    /// Remove the directory, or leave it in place when artifacts are kept.
    pub fn finish(self) {
        if self.keep {
            tracing::info!(path = %self.dir.path().display(), "keeping artifacts");
            return;
        }
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!(path = %path.display(), "failed to remove scratch directory: {e}");
        }
    }
}

/// Restrict a case name to characters safe in a file name.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("fib"), "fib");
        assert_eq!(sanitize("a/b c.st"), "a_b_c_st");
    }

    #[test]
    fn test_paths_are_unique_per_role() {
        let root = tempdir().unwrap();
        let scratch = Scratch::create(Some(root.path()), "fib", false).unwrap();
        assert!(scratch.path().starts_with(root.path()));
        assert_ne!(
            scratch.variant_path(VariantRole::Collecting),
            scratch.variant_path(VariantRole::Baseline)
        );
        assert_eq!(scratch.source_path().parent(), Some(scratch.path()));
    }

    #[test]
    fn test_same_case_gets_distinct_directories() {
        let root = tempdir().unwrap();
        let a = Scratch::create(Some(root.path()), "fib", false).unwrap();
        let b = Scratch::create(Some(root.path()), "fib", false).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_finish_removes_directory() {
        let root = tempdir().unwrap();
        let scratch = Scratch::create(Some(root.path()), "fib", false).unwrap();
        std::fs::write(scratch.source_path(), "code").unwrap();
        let path = scratch.path().to_path_buf();
        scratch.finish();
        assert!(!path.exists());
    }

    #[test]
    fn test_finish_keeps_directory_on_request() {
        let root = tempdir().unwrap();
        let scratch = Scratch::create(Some(root.path()), "fib", true).unwrap();
        let path = scratch.path().to_path_buf();
        scratch.finish();
        assert!(path.exists());
    }
}
