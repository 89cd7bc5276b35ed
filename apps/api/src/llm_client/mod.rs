//! LLM Client: the single point of entry for all model calls in Hireflow.
//!
//! ARCHITECTURAL RULE: No pipeline may call a model vendor directly.
//! All LLM interactions go through an [`LlmProvider`], and structured
//! output always passes through [`call_structured`] so it is coerced,
//! validated and logged the same way everywhere.
use std::time::Instant;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::info;

use crate::errors::AiError;
use crate::pipeline::call_log::{CallLogEntry, ExecutionLogger};
use crate::pipeline::coercion::coerce;
use crate::pipeline::schema::{Schema, ValidationIssue};

pub mod anthropic;
pub mod prompts;

pub use anthropic::AnthropicClient;

pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// One model configuration for one pipeline endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointConfig {
    /// Logical endpoint name; groups calls in the execution log.
    pub id: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl EndpointConfig {
    pub fn new(id: &str, model: &str) -> Self {
        Self {
            id: id.to_string(),
            model: model.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.3,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextResponse {
    pub content: String,
    /// Model that actually served the request.
    pub model: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonResponse {
    pub data: Value,
    pub model: String,
}

/// Typed, schema-conformant model output.
#[derive(Debug, Clone, PartialEq)]
pub struct Structured<T> {
    pub data: T,
    pub model: String,
    pub coerced: bool,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn call_text(
        &self,
        endpoint: &EndpointConfig,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<TextResponse, AiError>;

    /// Asks for JSON matching `schema` and parses the reply. The result is
    /// raw JSON; validation happens in [`call_structured`].
    async fn call_json(
        &self,
        endpoint: &EndpointConfig,
        schema: &Schema,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<JsonResponse, AiError> {
        let system = prompts::structured_system_prompt(system, schema);
        let response = self.call_text(endpoint, prompt, Some(&system)).await?;
        let data = parse_json_body(&response.content)?;
        Ok(JsonResponse {
            data,
            model: response.model,
        })
    }
}

/// One structured call: JSON → coercion → typed value. Every attempt is
/// recorded in the execution logger, successful or not.
pub async fn call_structured<T: DeserializeOwned>(
    llm: &dyn LlmProvider,
    endpoint: &EndpointConfig,
    schema: &Schema,
    prompt: &str,
    system: Option<&str>,
    logger: &ExecutionLogger,
) -> Result<Structured<T>, AiError> {
    let started = Instant::now();
    let outcome = structured_attempt::<T>(llm, endpoint, schema, prompt, system).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    match &outcome {
        Ok(structured) => logger.log(CallLogEntry::success(
            &endpoint.id,
            &structured.model,
            duration_ms,
            structured.coerced,
        )),
        Err(err) => logger.log(CallLogEntry::failure(
            &endpoint.id,
            &endpoint.model,
            duration_ms,
            err.to_string(),
        )),
    }
    outcome
}

async fn structured_attempt<T: DeserializeOwned>(
    llm: &dyn LlmProvider,
    endpoint: &EndpointConfig,
    schema: &Schema,
    prompt: &str,
    system: Option<&str>,
) -> Result<Structured<T>, AiError> {
    let response = llm.call_json(endpoint, schema, prompt, system).await?;
    let coercion = coerce(&response.data, schema);

    let Some(data) = coercion.data else {
        return Err(AiError::Validation {
            message: format!(
                "{} output failed its schema: {}",
                endpoint.id,
                summarize_issues(&coercion.issues)
            ),
            issues: coercion.issues,
        });
    };

    if coercion.coerced {
        info!(endpoint = %endpoint.id, model = %response.model, "Coerced near-valid model output");
    }

    let data = serde_json::from_value::<T>(data).map_err(|e| {
        AiError::validation(format!("{} output does not match its type: {e}", endpoint.id))
    })?;

    Ok(Structured {
        data,
        model: response.model,
        coerced: coercion.coerced,
    })
}

fn summarize_issues(issues: &[ValidationIssue]) -> String {
    const SHOWN: usize = 3;
    let mut summary = issues
        .iter()
        .take(SHOWN)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    if issues.len() > SHOWN {
        summary.push_str(&format!(" (+{} more)", issues.len() - SHOWN));
    }
    summary
}

/// Parses a model reply as JSON, tolerating code fences and prose around a
/// single top-level object.
pub fn parse_json_body(text: &str) -> Result<Value, AiError> {
    let text = strip_json_fences(text);
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            let embedded = text
                .find('{')
                .zip(text.rfind('}'))
                .filter(|(start, end)| start < end)
                .and_then(|(start, end)| serde_json::from_str(&text[start..=end]).ok());
            embedded.ok_or_else(|| {
                AiError::validation(format!("Model output is not valid JSON: {first_err}"))
            })
        }
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
