use async_trait::async_trait;
use sqlpilot::batch::{load_questions, BatchRunner};
use sqlpilot::ddl::DdlDocument;
use sqlpilot::linter::{LintVerdict, SqlLinter};
use sqlpilot::llm::CompletionService;
use sqlpilot::pipeline::{Text2SqlPipeline, NO_MATCH_MESSAGE};
use sqlpilot::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Answers by keyword so the batch order does not matter. Keywords must not
/// appear in the DDL, which is part of every prompt.
struct KeywordLlm;

#[async_trait]
impl CompletionService for KeywordLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if prompt.contains("hired after 2020") {
            Ok("SELECT * FROM employees WHERE hire_date > '2020-01-01'\n".to_string())
        } else if prompt.contains("Verify if this SQL query") {
            Ok("SELECT name FROM departments".to_string())
        } else if prompt.contains("Name all departments") {
            Ok("select name form departments".to_string())
        } else if prompt.contains("timeout") {
            Err(Error::Llm("LLM API call failed: operation timed out".to_string()))
        } else {
            Ok("error".to_string())
        }
    }
}

/// Passes anything that does not contain the typo "form".
struct TypoLinter {
    calls: AtomicUsize,
}

#[async_trait]
impl SqlLinter for TypoLinter {
    async fn fix(&self, sql: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(sql.trim().to_string())
    }

    async fn lint(&self, sql: &str) -> Result<LintVerdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if sql.contains(" form ") {
            Ok(LintVerdict::fail(vec!["PRS: parse error near 'form'".to_string()]))
        } else {
            Ok(LintVerdict::pass())
        }
    }
}

fn build_pipeline() -> (Text2SqlPipeline, Arc<TypoLinter>) {
    let linter = Arc::new(TypoLinter {
        calls: AtomicUsize::new(0),
    });
    let ddl = DdlDocument::from_text(
        "CREATE TABLE employees (id INT, hire_date DATE);\nCREATE TABLE departments (id INT, name TEXT);",
    );
    let pipeline = Text2SqlPipeline::new(Arc::new(KeywordLlm), linter.clone(), ddl).unwrap();
    (pipeline, linter)
}

#[tokio::test]
async fn test_employees_example_passes_through_unchanged() {
    let (pipeline, _) = build_pipeline();
    let sql = pipeline
        .text_to_sql("List all employees hired after 2020")
        .await
        .unwrap();
    assert_eq!(sql, "SELECT * FROM employees WHERE hire_date > '2020-01-01'");
}

#[tokio::test]
async fn test_no_match_never_reaches_linter() {
    let (pipeline, linter) = build_pipeline();
    let sql = pipeline.text_to_sql("What is the capital of France?").await.unwrap();
    assert_eq!(sql, NO_MATCH_MESSAGE);
    assert_eq!(linter.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_batch_writes_one_row_per_question() {
    let (pipeline, _) = build_pipeline();
    let questions = vec![
        "List all employees hired after 2020",
        "What is the capital of France?",
        "Name all departments",
        "This one will hit a timeout",
    ];

    let mut buffer = Vec::new();
    let summary = BatchRunner::new(&pipeline)
        .run(&questions, &mut buffer)
        .await
        .unwrap();

    assert_eq!(summary.rows_written, questions.len());
    assert_eq!(summary.lint_clean, 1);
    assert_eq!(summary.no_match, 1);
    assert_eq!(summary.corrected, 1);
    assert_eq!(summary.failed, 1);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .from_reader(buffer.as_slice());
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.iter().collect::<Vec<_>>(), vec!["Text Query", "Generated SQL Query"]);

    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), questions.len());
    assert_eq!(&rows[0][0], "List all employees hired after 2020");
    assert_eq!(&rows[0][1], "SELECT * FROM employees WHERE hire_date > '2020-01-01'");
    assert_eq!(&rows[1][1], NO_MATCH_MESSAGE);
    // the correction re-fixes the first candidate, not the verification answer
    assert_eq!(&rows[2][1], "select name form departments");
    assert!(rows[3][1].starts_with("Error: LLM error"));
}

#[tokio::test]
async fn test_batch_file_is_overwritten() {
    let (pipeline, _) = build_pipeline();
    let dir = tempfile::tempdir().unwrap();
    let questions_path = dir.path().join("questions.txt");
    let output = dir.path().join("out.csv");
    std::fs::write(&questions_path, "List all employees hired after 2020\n\n").unwrap();
    std::fs::write(&output, "stale;content\nmore;stale\nrows;here\n").unwrap();

    let questions = load_questions(&questions_path).unwrap();
    BatchRunner::new(&pipeline)
        .run_to_path(&questions, &output)
        .await
        .unwrap();

    let written = std::fs::read_to_string(&output).unwrap();
    assert_eq!(
        written,
        "Text Query;Generated SQL Query\nList all employees hired after 2020;SELECT * FROM employees WHERE hire_date > '2020-01-01'\n"
    );
}

#[test]
fn test_missing_ddl_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(DdlDocument::load(dir.path().join("database.sql")).is_err());
}
