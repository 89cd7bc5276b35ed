use std::sync::Arc;

use crate::cache::CacheStore;
use crate::pipeline::PipelineContext;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<PipelineContext>,
    /// Market research result cache. Redis when `REDIS_URL` is set.
    pub cache: Arc<dyn CacheStore>,
}
