//! SQL Lint/Fix
//!
//! Syntactic validation is delegated to an external linter. The pipeline only
//! sees the `SqlLinter` trait; `Sqlfluff` shells out to the sqlfluff CLI.

use crate::config::LinterConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::process::Output;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, error, warn};

/// Outcome of a lint pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LintVerdict {
    pub passed: bool,
    pub diagnostics: Vec<String>,
}

impl LintVerdict {
    pub fn pass() -> Self {
        Self {
            passed: true,
            diagnostics: Vec::new(),
        }
    }

    pub fn fail(diagnostics: Vec<String>) -> Self {
        Self {
            passed: false,
            diagnostics,
        }
    }
}

/// Result of a fix-then-lint check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedSql {
    pub verdict: LintVerdict,
    /// Text the scratch file held after the fix pass; the input itself when
    /// the fix pass could not run.
    pub scratch_sql: String,
}

#[async_trait]
pub trait SqlLinter: Send + Sync {
    /// Auto-fix formatting and return the rewritten SQL.
    async fn fix(&self, sql: &str) -> Result<String>;

    /// Lint without modifying.
    async fn lint(&self, sql: &str) -> Result<LintVerdict>;

    /// Fix, then lint the fixed text. Tool failures count as a failed lint and
    /// are logged, never returned.
    async fn check(&self, sql: &str) -> CheckedSql {
        let scratch_sql = match self.fix(sql).await {
            Ok(fixed) => fixed,
            Err(e) => {
                error!("Error running SQL fixer: {}", e);
                return CheckedSql {
                    verdict: LintVerdict::fail(vec![e.to_string()]),
                    scratch_sql: sql.to_string(),
                };
            }
        };

        let verdict = match self.lint(&scratch_sql).await {
            Ok(verdict) => verdict,
            Err(e) => {
                error!("Error running SQL linter: {}", e);
                LintVerdict::fail(vec![e.to_string()])
            }
        };

        if !verdict.passed && !verdict.diagnostics.is_empty() {
            warn!(
                "Errors found in the SQL query:\n{}",
                verdict.diagnostics.join("\n")
            );
        }

        CheckedSql {
            verdict,
            scratch_sql,
        }
    }
}

/// sqlfluff CLI wrapper. Each call works on its own temporary `.sql` file,
/// removed when the call returns.
#[derive(Debug, Clone, Default)]
pub struct Sqlfluff {
    config: LinterConfig,
}

impl Sqlfluff {
    pub fn new(config: LinterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LinterConfig {
        &self.config
    }

    fn scratch_file(&self, sql: &str) -> Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("sqlpilot-")
            .suffix(".sql")
            .tempfile()?;
        file.write_all(sql.as_bytes())?;
        file.flush()?;
        Ok(file)
    }

    async fn run(&self, subcommand: &str, path: &Path) -> Result<Output> {
        debug!(
            "Running {} {} {:?} --dialect {}",
            self.config.binary, subcommand, path, self.config.dialect
        );
        Command::new(&self.config.binary)
            .arg(subcommand)
            .arg(path)
            .arg("--dialect")
            .arg(&self.config.dialect)
            .output()
            .await
            .map_err(|e| {
                Error::Lint(format!(
                    "failed to run '{} {}': {}",
                    self.config.binary, subcommand, e
                ))
            })
    }
}

#[async_trait]
impl SqlLinter for Sqlfluff {
    async fn fix(&self, sql: &str) -> Result<String> {
        let scratch = self.scratch_file(sql)?;
        // Exit status is ignored: sqlfluff exits non-zero whenever violations
        // remain that it could not fix.
        let output = self.run("fix", scratch.path()).await?;
        debug!("sqlfluff fix exited with {}", output.status);
        Ok(tokio::fs::read_to_string(scratch.path()).await?)
    }

    async fn lint(&self, sql: &str) -> Result<LintVerdict> {
        let scratch = self.scratch_file(sql)?;
        let output = self.run("lint", scratch.path()).await?;

        if output.status.success() {
            return Ok(LintVerdict::pass());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(LintVerdict::fail(error_lines(&stderr)))
    }
}

/// Lines mentioning "error" in any case.
pub fn error_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| line.to_lowercase().contains("error"))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_lines_case_insensitive() {
        let stderr = "== [q.sql] FAIL\nL:   1 | P:   1 | PRS | Line 1: ERROR parsing\nWARNING: deprecated\nParse error here";
        assert_eq!(
            error_lines(stderr),
            vec![
                "L:   1 | P:   1 | PRS | Line 1: ERROR parsing".to_string(),
                "Parse error here".to_string()
            ]
        );
        assert!(error_lines("All Finished!").is_empty());
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_failed_check() {
        let linter = Sqlfluff::new(LinterConfig {
            binary: "sqlpilot-definitely-not-installed".to_string(),
            ..LinterConfig::default()
        });

        assert!(matches!(linter.lint("SELECT 1").await, Err(Error::Lint(_))));

        let checked = linter.check("SELECT 1").await;
        assert!(!checked.verdict.passed);
        assert_eq!(checked.scratch_sql, "SELECT 1");
    }

    #[test]
    fn test_scratch_files_are_distinct_and_released() {
        let linter = Sqlfluff::default();
        let a = linter.scratch_file("SELECT 1").unwrap();
        let b = linter.scratch_file("SELECT 2").unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(std::fs::read_to_string(a.path()).unwrap(), "SELECT 1");

        let path = a.path().to_path_buf();
        drop(a);
        assert!(!path.exists());
    }
}
