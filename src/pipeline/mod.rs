//! Generate-then-Verify Pipeline
//!
//! Turns a question into SQL: one generation completion, a crude semantic
//! gate, a lint/fix pass, and at most one correction round.

pub mod orchestrator;
pub mod semantic_check;


pub use orchestrator::{PipelineOutcome, PipelineState, Text2SqlPipeline, NO_MATCH_MESSAGE};
pub use semantic_check::is_sql_query_valid;
