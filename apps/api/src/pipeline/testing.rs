//! In-process fakes of the model and search providers for pipeline tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::call_log::ExecutionLogger;
use super::retry::RetryOptions;
use super::{ModelRoster, PipelineContext};
use crate::errors::AiError;
use crate::llm_client::{EndpointConfig, LlmProvider, TextResponse};
use crate::search::{PostingCount, SearchProvider, SearchResult};

type LlmResponder = dyn Fn(&EndpointConfig, &str) -> Result<Value, AiError> + Send + Sync;
type SearchResponder = dyn Fn(&str) -> Result<Vec<SearchResult>, AiError> + Send + Sync;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub endpoint: String,
    pub model: String,
    pub prompt: String,
}

/// Answers every call through a closure and records what it was asked.
/// Replies are serialized to text so the JSON parsing path runs too.
pub struct ScriptedLlm {
    responder: Box<LlmResponder>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedLlm {
    pub fn new(
        responder: impl Fn(&EndpointConfig, &str) -> Result<Value, AiError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.endpoint == endpoint)
            .count()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn call_text(
        &self,
        endpoint: &EndpointConfig,
        prompt: &str,
        _system: Option<&str>,
    ) -> Result<TextResponse, AiError> {
        self.calls.lock().unwrap().push(RecordedCall {
            endpoint: endpoint.id.clone(),
            model: endpoint.model.clone(),
            prompt: prompt.to_string(),
        });
        let value = (self.responder)(endpoint, prompt)?;
        Ok(TextResponse {
            content: value.to_string(),
            model: endpoint.model.clone(),
        })
    }
}

pub struct FakeSearch {
    responder: Box<SearchResponder>,
    count: Result<PostingCount, AiError>,
    queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn new(
        responder: impl Fn(&str) -> Result<Vec<SearchResult>, AiError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            count: Ok(PostingCount {
                count: 0,
                domains: Vec::new(),
                saturated: false,
            }),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Every query succeeds with no results.
    pub fn empty() -> Self {
        Self::new(|_| Ok(Vec::new()))
    }

    pub fn with_count(mut self, count: Result<PostingCount, AiError>) -> Self {
        self.count = count;
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    async fn search(&self, query: &str, _max_results: u32) -> Result<Vec<SearchResult>, AiError> {
        self.queries.lock().unwrap().push(query.to_string());
        (self.responder)(query)
    }

    async fn count_job_postings(
        &self,
        _role: &str,
        _location: Option<&str>,
    ) -> Result<PostingCount, AiError> {
        self.count.clone()
    }
}

pub fn search_result(url: &str, score: f64) -> SearchResult {
    SearchResult {
        url: url.to_string(),
        title: format!("Title for {url}"),
        content: format!("Content from {url}"),
        score,
        published_date: None,
    }
}

/// Context with `primary`/`fallback` model names and no retries.
pub fn test_context(
    llm: Arc<dyn LlmProvider>,
    search: Arc<dyn SearchProvider>,
) -> PipelineContext {
    PipelineContext::new(llm, search, Arc::new(ExecutionLogger::new()))
        .with_models(ModelRoster {
            primary: "primary".into(),
            fallback: "fallback".into(),
        })
        .with_retry(RetryOptions::none())
}
