//! Batch Runner
//!
//! Runs the pipeline over a list of questions and writes one `;`-delimited row
//! per question. A failing question never stops the batch.

use crate::error::Result;
use crate::pipeline::{PipelineState, Text2SqlPipeline};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

pub const DELIMITER: u8 = b';';
pub const HEADER: [&str; 2] = ["Text Query", "Generated SQL Query"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub rows_written: usize,
    pub no_match: usize,
    pub lint_clean: usize,
    pub corrected: usize,
    pub failed: usize,
}

pub struct BatchRunner<'a> {
    pipeline: &'a Text2SqlPipeline,
}

impl<'a> BatchRunner<'a> {
    pub fn new(pipeline: &'a Text2SqlPipeline) -> Self {
        Self { pipeline }
    }

    /// Create (or truncate) `path` and write the batch to it.
    pub async fn run_to_path<S: AsRef<str>>(
        &self,
        questions: &[S],
        path: impl AsRef<Path>,
    ) -> Result<BatchSummary> {
        let file = std::fs::File::create(path.as_ref())?;
        info!("Writing {} results to {:?}", questions.len(), path.as_ref());
        self.run(questions, file).await
    }

    pub async fn run<S: AsRef<str>, W: Write>(
        &self,
        questions: &[S],
        writer: W,
    ) -> Result<BatchSummary> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(DELIMITER)
            .from_writer(writer);
        csv_writer.write_record(HEADER)?;

        let mut summary = BatchSummary::default();
        for (i, question) in questions.iter().enumerate() {
            let question = question.as_ref();
            info!("Question {}/{}: {}", i + 1, questions.len(), question);

            let generated = match self.pipeline.run(question).await {
                Ok(outcome) => {
                    match outcome.terminal_state() {
                        PipelineState::Invalid => summary.no_match += 1,
                        PipelineState::Corrected => summary.corrected += 1,
                        _ => summary.lint_clean += 1,
                    }
                    outcome.sql
                }
                Err(e) => {
                    warn!("Question {} failed: {}", i + 1, e);
                    summary.failed += 1;
                    format!("Error: {}", e)
                }
            };

            csv_writer.write_record([question, generated.as_str()])?;
            summary.rows_written += 1;
        }

        csv_writer.flush()?;
        info!(
            "Batch finished: {} rows ({} clean, {} corrected, {} no match, {} failed)",
            summary.rows_written,
            summary.lint_clean,
            summary.corrected,
            summary.no_match,
            summary.failed
        );
        Ok(summary)
    }
}

/// One question per non-blank line.
pub fn load_questions(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
