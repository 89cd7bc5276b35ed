//! Execution Tracer: per-invocation record of every pipeline step.
//!
//! Each stage opens one step with [`PipelineTracer::step`] and closes it with
//! exactly one of `ok` / `ok_with_warnings` / `fail`. The handle is consumed
//! on completion; a handle dropped without completing is recorded as failed.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::AiError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceStep {
    pub step: String,
    pub input: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineTrace {
    pub id: Uuid,
    pub pipeline: String,
    pub started_at: DateTime<Utc>,
    pub steps: Vec<TraceStep>,
    /// True when no step recorded an error.
    pub ok: bool,
}

impl PipelineTrace {
    pub fn warning_count(&self) -> usize {
        self.steps.iter().map(|s| s.warnings.len()).sum()
    }

    pub fn step(&self, name: &str) -> Option<&TraceStep> {
        self.steps.iter().find(|s| s.step == name)
    }
}

pub struct PipelineTracer {
    id: Uuid,
    pipeline: String,
    started_at: DateTime<Utc>,
    started: Instant,
    steps: Mutex<Vec<TraceStep>>,
}

impl PipelineTracer {
    pub fn new(pipeline: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline: pipeline.to_string(),
            started_at: Utc::now(),
            started: Instant::now(),
            steps: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Opens a step. Steps keep the order in which they were opened, even
    /// when concurrent stages complete out of order.
    pub fn step(&self, name: &str, input: Value) -> StepHandle<'_> {
        let mut steps = self.steps.lock().unwrap_or_else(PoisonError::into_inner);
        steps.push(TraceStep {
            step: name.to_string(),
            input,
            output: None,
            warnings: Vec::new(),
            error: None,
            duration_ms: None,
        });
        StepHandle {
            tracer: self,
            index: steps.len() - 1,
            started: Instant::now(),
            completed: false,
        }
    }

    pub fn dump(&self) -> PipelineTrace {
        let steps = self
            .steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let ok = steps.iter().all(|s| s.error.is_none());
        PipelineTrace {
            id: self.id,
            pipeline: self.pipeline.clone(),
            started_at: self.started_at,
            steps,
            ok,
        }
    }

    /// Emits one summary line (failed / warned / clean) and returns the trace.
    pub fn finish(&self) -> PipelineTrace {
        let trace = self.dump();
        let duration_ms = self.started.elapsed().as_millis() as u64;
        let warnings = trace.warning_count();

        if let Some(failed) = trace.steps.iter().find(|s| s.error.is_some()) {
            error!(
                pipeline = %trace.pipeline,
                trace_id = %trace.id,
                steps = trace.steps.len(),
                duration_ms,
                failed_step = %failed.step,
                error = failed.error.as_deref().unwrap_or_default(),
                "Pipeline failed"
            );
        } else if warnings > 0 {
            warn!(
                pipeline = %trace.pipeline,
                trace_id = %trace.id,
                steps = trace.steps.len(),
                duration_ms,
                warnings,
                "Pipeline completed with warnings"
            );
        } else {
            info!(
                pipeline = %trace.pipeline,
                trace_id = %trace.id,
                steps = trace.steps.len(),
                duration_ms,
                "Pipeline completed"
            );
        }
        trace
    }

    fn complete(
        &self,
        index: usize,
        started: Instant,
        output: Option<Value>,
        warnings: Vec<String>,
        error: Option<String>,
    ) {
        let mut steps = self.steps.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(step) = steps.get_mut(index) {
            step.output = output;
            step.warnings = warnings;
            step.error = error;
            step.duration_ms = Some(started.elapsed().as_millis() as u64);
        }
    }
}

/// An open step. Completing it consumes the handle.
pub struct StepHandle<'a> {
    tracer: &'a PipelineTracer,
    index: usize,
    started: Instant,
    completed: bool,
}

impl StepHandle<'_> {
    pub fn ok(self, output: Value) {
        self.ok_with_warnings(output, Vec::new());
    }

    pub fn ok_with_warnings(mut self, output: Value, warnings: Vec<String>) {
        self.completed = true;
        self.tracer
            .complete(self.index, self.started, Some(output), warnings, None);
    }

    pub fn fail(mut self, error: impl fmt::Display) {
        self.completed = true;
        self.tracer
            .complete(self.index, self.started, None, Vec::new(), Some(error.to_string()));
    }

    /// Closes the step from `result`, summarizing a success with `summarize`,
    /// and hands the result back so the stage can propagate it with `?`.
    pub fn record<T>(
        self,
        result: Result<T, AiError>,
        summarize: impl FnOnce(&T) -> Value,
    ) -> Result<T, AiError> {
        match &result {
            Ok(value) => self.ok(summarize(value)),
            Err(err) => self.fail(err),
        }
        result
    }
}

impl Drop for StepHandle<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.tracer.complete(
                self.index,
                self.started,
                None,
                Vec::new(),
                Some("step abandoned before completion".to_string()),
            );
        }
    }
}
