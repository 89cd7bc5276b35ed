//! Execution logger: the most recent model calls across all pipelines.
//!
//! Owned by the composition root and injected through `PipelineContext`.
//! Feeds the `/health` endpoint; nothing reads it for correctness.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Pipeline endpoint that issued the call (e.g. `job_description`).
    pub endpoint: String,
    pub model: String,
    pub duration_ms: u64,
    pub success: bool,
    pub coerced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CallLogEntry {
    pub fn success(endpoint: &str, model: &str, duration_ms: u64, coerced: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            duration_ms,
            success: true,
            coerced,
            error: None,
        }
    }

    pub fn failure(endpoint: &str, model: &str, duration_ms: u64, error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
            ..Self::success(endpoint, model, duration_ms, false)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EndpointStats {
    pub calls: usize,
    pub failures: usize,
    pub coerced: usize,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallStats {
    pub total_calls: usize,
    pub failures: usize,
    pub coerced: usize,
    pub avg_latency_ms: f64,
    pub by_endpoint: BTreeMap<String, EndpointStats>,
}

/// Bounded FIFO ring buffer of [`CallLogEntry`].
pub struct ExecutionLogger {
    capacity: usize,
    entries: Mutex<VecDeque<CallLogEntry>>,
}

impl ExecutionLogger {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn log(&self, entry: CallLogEntry) {
        debug!(
            endpoint = %entry.endpoint,
            model = %entry.model,
            duration_ms = entry.duration_ms,
            success = entry.success,
            coerced = entry.coerced,
            "LLM call logged"
        );
        let mut entries = self.lock();
        while entries.len() >= self.capacity.max(1) {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Entries oldest first.
    pub fn recent(&self) -> Vec<CallLogEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn stats(&self) -> CallStats {
        let entries = self.lock();
        let mut stats = CallStats {
            total_calls: entries.len(),
            ..CallStats::default()
        };
        let mut total_latency = 0u64;
        let mut endpoint_latency: BTreeMap<&str, u64> = BTreeMap::new();

        for entry in entries.iter() {
            total_latency += entry.duration_ms;
            if !entry.success {
                stats.failures += 1;
            }
            if entry.coerced {
                stats.coerced += 1;
            }

            let endpoint = stats.by_endpoint.entry(entry.endpoint.clone()).or_default();
            endpoint.calls += 1;
            if !entry.success {
                endpoint.failures += 1;
            }
            if entry.coerced {
                endpoint.coerced += 1;
            }
            *endpoint_latency.entry(entry.endpoint.as_str()).or_default() += entry.duration_ms;
        }

        stats.avg_latency_ms = average(total_latency, stats.total_calls);
        for (name, endpoint) in stats.by_endpoint.iter_mut() {
            let latency = endpoint_latency.get(name.as_str()).copied().unwrap_or(0);
            endpoint.avg_latency_ms = average(latency, endpoint.calls);
        }
        stats
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<CallLogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ExecutionLogger {
    fn default() -> Self {
        Self::new()
    }
}

fn average(total: u64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}
