use crate::config::{ApiStyle, LlmConfig};
use crate::error::{Error, Result};
use crate::prompts::PromptTemplate;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Text-in/text-out language model call.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// OpenAI-compatible completion client.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build()?;
        Ok(Self { http, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn request(&self, prompt: &str) -> (String, serde_json::Value) {
        let base = self.config.base_url.trim_end_matches('/');
        let mut body = match self.config.api_style {
            ApiStyle::Chat => serde_json::json!({
                "model": self.config.model,
                "messages": [
                    {"role": "user", "content": prompt}
                ],
                "temperature": self.config.temperature,
            }),
            ApiStyle::Completions => serde_json::json!({
                "model": self.config.model,
                "prompt": prompt,
                "temperature": self.config.temperature,
            }),
        };

        // Newer chat models reject max_tokens in favour of max_completion_tokens
        let token_field = if self.config.api_style == ApiStyle::Chat
            && (self.config.model.starts_with("gpt-4") || self.config.model.starts_with("gpt-5"))
        {
            "max_completion_tokens"
        } else {
            "max_tokens"
        };
        body[token_field] = serde_json::json!(self.config.max_tokens);

        let url = match self.config.api_style {
            ApiStyle::Chat => format!("{}/chat/completions", base),
            ApiStyle::Completions => format!("{}/completions", base),
        };
        (url, body)
    }
}

#[async_trait]
impl CompletionService for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let (url, body) = self.request(prompt);
        debug!("POST {} (model {}, {} prompt bytes)", url, self.config.model, prompt.len());

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Llm(format!("LLM API error ({}): {}", status, error_text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("Failed to parse LLM response: {}", e)))?;

        extract_completion(self.config.api_style, &response_json)
    }
}

/// Pull the completion text out of a response body.
pub fn extract_completion(style: ApiStyle, response: &serde_json::Value) -> Result<String> {
    if let Some(error) = response.get("error") {
        return Err(Error::Llm(format!("LLM API error: {}", error)));
    }

    let choices = response
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| Error::Llm(format!("No choices array in LLM response: {}", response)))?;

    let first = choices
        .first()
        .ok_or_else(|| Error::Llm("Empty choices array in LLM response".to_string()))?;

    match first.get("finish_reason").and_then(|r| r.as_str()) {
        Some("length") => warn!("LLM response was truncated due to length limit"),
        Some("content_filter") => {
            return Err(Error::Llm(
                "LLM response was filtered by content policy".to_string(),
            ))
        }
        _ => {}
    }

    let content = match style {
        ApiStyle::Chat => first["message"]["content"].as_str(),
        ApiStyle::Completions => first["text"].as_str(),
    }
    .ok_or_else(|| Error::Llm(format!("No content in LLM response: {}", first)))?;

    if content.is_empty() {
        return Err(Error::Llm("Empty content in LLM response".to_string()));
    }

    Ok(content.to_string())
}

/// A prompt template bound to a completion service.
#[derive(Clone)]
pub struct PromptChain {
    prompt: PromptTemplate,
    llm: Arc<dyn CompletionService>,
}

impl PromptChain {
    pub fn new(prompt: PromptTemplate, llm: Arc<dyn CompletionService>) -> Self {
        Self { prompt, llm }
    }

    /// Render the prompt with `vars`, complete it, and trim the answer.
    pub async fn invoke(&self, vars: &HashMap<&str, &str>) -> Result<String> {
        let rendered = self.prompt.render(vars)?;
        let raw = self.llm.complete(&rendered).await?;
        Ok(raw.trim().to_string())
    }
}
