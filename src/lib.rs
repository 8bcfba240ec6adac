pub mod batch;
pub mod config;
pub mod ddl;
pub mod error;
pub mod linter;
pub mod llm;
pub mod pipeline;
pub mod prompts;

pub use error::{Error, Result};
