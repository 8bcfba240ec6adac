use crate::config::CorrectionInput;
use crate::ddl::DdlDocument;
use crate::error::Result;
use crate::linter::SqlLinter;
use crate::llm::{CompletionService, PromptChain};
use crate::prompts::{PromptTemplate, DDL_STATEMENTS, SQL_QUERY, USER_QUESTION};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::semantic_check::is_sql_query_valid;

pub const NO_MATCH_MESSAGE: &str = "The query does not match any existing tables. Please check the table names or columns and try again.";

/// States a single question moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Generated,
    /// Model signalled no schema match; terminal.
    Invalid,
    Valid,
    /// Lint passed on the first candidate; terminal.
    SyntaxOk,
    SyntaxBad,
    /// One correction round ran; terminal.
    Corrected,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Invalid | PipelineState::SyntaxOk | PipelineState::Corrected
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub run_id: String,
    pub question: String,
    /// Final SQL, or `NO_MATCH_MESSAGE`.
    pub sql: String,
    pub states: Vec<PipelineState>,
    /// Lint diagnostics from the first candidate, if it failed.
    pub diagnostics: Vec<String>,
    /// The correction fix pass failed and the first candidate was returned.
    pub used_fallback: bool,
}

impl PipelineOutcome {
    pub fn terminal_state(&self) -> PipelineState {
        self.states.last().copied().unwrap_or(PipelineState::Generated)
    }
}

pub struct Text2SqlPipeline {
    generation: PromptChain,
    verification: PromptChain,
    linter: Arc<dyn SqlLinter>,
    ddl: DdlDocument,
    correction_input: CorrectionInput,
}

impl Text2SqlPipeline {
    pub fn new(
        llm: Arc<dyn CompletionService>,
        linter: Arc<dyn SqlLinter>,
        ddl: DdlDocument,
    ) -> Result<Self> {
        Ok(Self {
            generation: PromptChain::new(PromptTemplate::generation()?, Arc::clone(&llm)),
            verification: PromptChain::new(PromptTemplate::verification()?, llm),
            linter,
            ddl,
            correction_input: CorrectionInput::default(),
        })
    }

    pub fn with_correction_input(mut self, correction_input: CorrectionInput) -> Self {
        self.correction_input = correction_input;
        self
    }

    pub fn ddl(&self) -> &DdlDocument {
        &self.ddl
    }

    /// Convenience wrapper returning only the final text.
    pub async fn text_to_sql(&self, question: &str) -> Result<String> {
        Ok(self.run(question).await?.sql)
    }

    pub async fn run(&self, question: &str) -> Result<PipelineOutcome> {
        let run_id = Uuid::new_v4().to_string();
        let ddl = self.ddl.statements();
        info!("[{}] Generating SQL for: {}", run_id, question);

        let vars = HashMap::from([(USER_QUESTION, question), (DDL_STATEMENTS, ddl)]);
        let candidate = self.generation.invoke(&vars).await?;
        let mut outcome = PipelineOutcome {
            run_id,
            question: question.to_string(),
            sql: candidate.clone(),
            states: vec![PipelineState::Generated],
            diagnostics: Vec::new(),
            used_fallback: false,
        };

        if !is_sql_query_valid(&candidate) {
            info!("[{}] Candidate does not match the schema", outcome.run_id);
            outcome.states.push(PipelineState::Invalid);
            outcome.sql = NO_MATCH_MESSAGE.to_string();
            return Ok(outcome);
        }
        outcome.states.push(PipelineState::Valid);

        let checked = self.linter.check(&candidate).await;
        if checked.verdict.passed {
            info!("[{}] Lint passed", outcome.run_id);
            outcome.states.push(PipelineState::SyntaxOk);
            return Ok(outcome);
        }
        outcome.states.push(PipelineState::SyntaxBad);
        outcome.diagnostics = checked.verdict.diagnostics;

        info!("[{}] Lint failed, asking the model to verify", outcome.run_id);
        let vars = HashMap::from([
            (USER_QUESTION, question),
            (SQL_QUERY, candidate.as_str()),
            (DDL_STATEMENTS, ddl),
        ]);
        let verified = self.verification.invoke(&vars).await?;
        debug!("[{}] Verification answer: {}", outcome.run_id, verified);

        let to_fix = match self.correction_input {
            CorrectionInput::Scratch => checked.scratch_sql,
            CorrectionInput::Verified => verified,
        };

        match self.linter.fix(&to_fix).await {
            Ok(fixed) => outcome.sql = fixed,
            Err(e) => {
                error!(
                    "[{}] Error running SQL fixer during correction: {}",
                    outcome.run_id, e
                );
                outcome.used_fallback = true;
            }
        }
        outcome.states.push(PipelineState::Corrected);

        Ok(outcome)
    }
}
