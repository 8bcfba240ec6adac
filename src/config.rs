//! Runtime configuration
//!
//! Values come from the environment (optionally seeded by a `.env` file) and
//! can be overridden by CLI flags.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SQLFLUFF_BIN: &str = "sqlfluff";
pub const DEFAULT_DIALECT: &str = "ansi";
pub const DEFAULT_DDL_PATH: &str = "database.sql";
pub const DEFAULT_OUTPUT_PATH: &str = "generated_queries.csv";

/// Which HTTP endpoint the completion service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiStyle {
    /// `/chat/completions`, prompt sent as a single user message
    Chat,
    /// `/completions`, prompt sent raw (suits chat-formatted templates)
    Completions,
}

impl FromStr for ApiStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "chat" => Ok(ApiStyle::Chat),
            "completions" | "completion" => Ok(ApiStyle::Completions),
            other => Err(Error::Config(format!(
                "Unknown API style '{}', expected 'chat' or 'completions'",
                other
            ))),
        }
    }
}

/// Which text the correction step feeds to the final fix pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionInput {
    /// Re-fix what the validator's scratch file held (the fixed first candidate).
    /// The verification completion is computed but not used.
    #[default]
    Scratch,
    /// Re-fix the verification completion.
    Verified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub api_style: ApiStyle,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Request timeout in seconds; `None` waits forever.
    pub timeout_secs: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_style: ApiStyle::Chat,
            temperature: 0.1,
            max_tokens: 500,
            timeout_secs: None,
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            model: std::env::var("OPENAI_MODEL").unwrap_or(defaults.model),
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            api_style: std::env::var("OPENAI_API_STYLE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.api_style),
            ..defaults
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config(
                "No API key configured (pass --api-key or set OPENAI_API_KEY)".to_string(),
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("Base URL must not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinterConfig {
    pub binary: String,
    pub dialect: String,
}

impl Default for LinterConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_SQLFLUFF_BIN.to_string(),
            dialect: DEFAULT_DIALECT.to_string(),
        }
    }
}

impl LinterConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            binary: std::env::var("SQLFLUFF_BIN").unwrap_or(defaults.binary),
            dialect: std::env::var("SQLFLUFF_DIALECT").unwrap_or(defaults.dialect),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub ddl_path: PathBuf,
    pub correction_input: CorrectionInput,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ddl_path: PathBuf::from(DEFAULT_DDL_PATH),
            correction_input: CorrectionInput::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_style_parsing() {
        assert_eq!("chat".parse::<ApiStyle>().unwrap(), ApiStyle::Chat);
        assert_eq!(" Completions ".parse::<ApiStyle>().unwrap(), ApiStyle::Completions);
        assert!("stream".parse::<ApiStyle>().is_err());
    }

    #[test]
    fn test_defaults() {
        let linter = LinterConfig::default();
        assert_eq!(linter.binary, "sqlfluff");
        assert_eq!(linter.dialect, "ansi");

        let pipeline = PipelineConfig::default();
        assert_eq!(pipeline.ddl_path, PathBuf::from("database.sql"));
        assert_eq!(pipeline.correction_input, CorrectionInput::Scratch);
    }

    #[test]
    fn test_llm_config_requires_api_key() {
        let config = LlmConfig::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = LlmConfig {
            api_key: "sk-test".to_string(),
            ..LlmConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
