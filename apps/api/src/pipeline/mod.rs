//! Pipeline engine shared by every content type.
//!
//! A [`PipelineContext`] is built once at startup and handed to each
//! pipeline; it owns the client handles, the execution logger and the
//! retry/escalation policy, so pipelines hold no global state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AiError;
use crate::llm_client::anthropic::{DEFAULT_FALLBACK_MODEL, DEFAULT_PRIMARY_MODEL};
use crate::llm_client::{call_structured, EndpointConfig, LlmProvider, Structured};
use crate::search::SearchProvider;

pub mod call_log;
pub mod coercion;
pub mod retry;
pub mod sanitize;
pub mod schema;
pub mod tracer;

#[cfg(test)]
pub mod testing;

use call_log::ExecutionLogger;
use retry::{with_model_escalation, with_retry, RetryOptions};
use schema::Schema;

/// Static per-endpoint call settings; the model comes from the roster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndpointSpec {
    pub id: &'static str,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl EndpointSpec {
    pub const fn new(id: &'static str, max_tokens: u32, temperature: f32) -> Self {
        Self {
            id,
            max_tokens,
            temperature,
        }
    }

    pub fn config(&self, model: &str) -> EndpointConfig {
        EndpointConfig::new(self.id, model)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoster {
    pub primary: String,
    pub fallback: String,
}

impl Default for ModelRoster {
    fn default() -> Self {
        Self {
            primary: DEFAULT_PRIMARY_MODEL.to_string(),
            fallback: DEFAULT_FALLBACK_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResearchSettings {
    /// Sources kept for extraction after scoring.
    pub top_n: usize,
    /// Raw results considered for scoring.
    pub max_candidates: usize,
    pub results_per_query: u32,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            top_n: 15,
            max_candidates: 30,
            results_per_query: 5,
        }
    }
}

pub struct PipelineContext {
    pub llm: Arc<dyn LlmProvider>,
    pub search: Arc<dyn SearchProvider>,
    pub logger: Arc<ExecutionLogger>,
    pub models: ModelRoster,
    pub retry: RetryOptions,
    pub research: ResearchSettings,
}

impl PipelineContext {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        search: Arc<dyn SearchProvider>,
        logger: Arc<ExecutionLogger>,
    ) -> Self {
        Self {
            llm,
            search,
            logger,
            models: ModelRoster::default(),
            retry: RetryOptions::default(),
            research: ResearchSettings::default(),
        }
    }

    pub fn with_models(mut self, models: ModelRoster) -> Self {
        self.models = models;
        self
    }

    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_research(mut self, research: ResearchSettings) -> Self {
        self.research = research;
        self
    }

    /// One schema-validated model call with retry-then-escalate:
    /// transient failures are retried on the primary model, then the whole
    /// retry loop runs once more on the fallback model.
    pub async fn generate<T: DeserializeOwned>(
        &self,
        spec: &EndpointSpec,
        schema: &Schema,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<Structured<T>, AiError> {
        let primary = spec.config(&self.models.primary);
        let fallback = spec.config(&self.models.fallback);
        with_model_escalation(
            |endpoint| async move {
                with_retry(
                    || {
                        call_structured::<T>(
                            self.llm.as_ref(),
                            &endpoint,
                            schema,
                            prompt,
                            system,
                            &self.logger,
                        )
                    },
                    self.retry,
                )
                .await
            },
            primary,
            fallback,
        )
        .await
    }
}

/// Metadata stamped on every successful pipeline result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputMetadata {
    pub model_used: String,
    pub prompt_version: String,
    pub generated_at: DateTime<Utc>,
    pub trace_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl OutputMetadata {
    pub fn new(model_used: &str, prompt_version: &str, trace_id: Uuid) -> Self {
        Self {
            model_used: model_used.to_string(),
            prompt_version: prompt_version.to_string(),
            generated_at: Utc::now(),
            trace_id,
            source_count: None,
            confidence: None,
        }
    }

    pub fn with_research(mut self, source_count: usize, confidence: f64) -> Self {
        self.source_count = Some(source_count);
        self.confidence = Some(confidence);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput<T> {
    pub data: T,
    pub metadata: OutputMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    use testing::{test_context, FakeSearch, ScriptedLlm};

    #[derive(Debug, Deserialize)]
    struct Title {
        title: String,
    }

    fn title_schema() -> Schema {
        Schema::object().field("title", Schema::string().min_len(1))
    }

    const SPEC: EndpointSpec = EndpointSpec::new("job_description", 1024, 0.2);

    #[test]
    fn test_endpoint_spec_config() {
        let config = SPEC.config("m");
        assert_eq!(config.id, "job_description");
        assert_eq!(config.model, "m");
        assert_eq!(config.max_tokens, 1024);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_retries_then_escalates() {
        let llm = Arc::new(ScriptedLlm::new(|endpoint, _| {
            if endpoint.model == "primary" {
                Err(AiError::Timeout("slow".into()))
            } else {
                Ok(json!({"title": "Staff Engineer"}))
            }
        }));
        let ctx = test_context(llm.clone(), Arc::new(FakeSearch::empty()))
            .with_retry(RetryOptions {
                max_retries: 2,
                ..RetryOptions::default()
            });

        let result = ctx
            .generate::<Title>(&SPEC, &title_schema(), "p", None)
            .await
            .unwrap();

        assert_eq!(result.data.title, "Staff Engineer");
        assert_eq!(result.model, "fallback");
        let models: Vec<String> = llm.calls().into_iter().map(|c| c.model).collect();
        assert_eq!(models, vec!["primary", "primary", "primary", "fallback"]);
        assert_eq!(ctx.logger.stats().failures, 3);
    }

    #[tokio::test]
    async fn test_generate_validation_failure_escalates_without_retry() {
        let llm = Arc::new(ScriptedLlm::new(|_, _| Ok(json!({"title": ""}))));
        let ctx = test_context(llm.clone(), Arc::new(FakeSearch::empty()));

        let err = ctx
            .generate::<Title>(&SPEC, &title_schema(), "p", None)
            .await
            .unwrap_err();

        assert!(matches!(err, AiError::Validation { .. }));
        assert_eq!(llm.calls().len(), 2);
    }

    #[test]
    fn test_metadata_omits_research_fields_when_absent() {
        let metadata = OutputMetadata::new("m", "jd-v1", Uuid::nil());
        let rendered = serde_json::to_value(&metadata).unwrap();
        assert!(rendered.get("source_count").is_none());
        assert_eq!(rendered["prompt_version"], "jd-v1");

        let research = metadata.with_research(12, 0.7);
        assert_eq!(research.source_count, Some(12));
    }
}
