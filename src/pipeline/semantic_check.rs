//! Semantic gate
//!
//! The generation prompt asks the model to answer with the word `error` when
//! the question does not fit the schema. Any candidate containing that word,
//! in any case and anywhere, is treated as a mismatch. This misfires on valid
//! queries that mention an `error_code` column or an `'error'` literal; that
//! behaviour is kept.

/// `false` when the candidate contains "error" in any case.
pub fn is_sql_query_valid(candidate: &str) -> bool {
    !candidate.to_lowercase().contains("error")
}
