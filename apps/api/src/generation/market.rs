//! Market research entry point: quick or deep phase, behind the result cache.

use serde_json::json;
use tracing::{info, warn};

use crate::cache::{CachePhase, CacheStore};
use crate::errors::AiError;
use crate::llm_client::prompts::fill_template;
use crate::pipeline::tracer::PipelineTracer;
use crate::pipeline::{EndpointSpec, OutputMetadata, PipelineContext, PipelineOutput};
use crate::research::orchestrator::{render_context, run_deep_research};
use crate::research::types::{
    market_analysis_schema, MarketAnalysis, MarketReport, MarketResearchRequest,
    PostingCountSource,
};

use super::prompts::{QUICK_MARKET_PROMPT_TEMPLATE, QUICK_MARKET_PROMPT_VERSION, QUICK_MARKET_SYSTEM};

pub const QUICK_MARKET_ENDPOINT: EndpointSpec = EndpointSpec::new("market_research.quick", 4096, 0.3);

/// Model-knowledge answers never claim more than this.
pub const QUICK_CONFIDENCE_CAP: f64 = 0.6;

/// Single-call market analysis from model knowledge, no web evidence.
pub async fn run_quick_research(
    ctx: &PipelineContext,
    request: &MarketResearchRequest,
) -> Result<PipelineOutput<MarketReport>, AiError> {
    let tracer = PipelineTracer::new("market_research.quick");

    let prompt = fill_template(
        QUICK_MARKET_PROMPT_TEMPLATE,
        &[("context", &render_context(request))],
    );
    tracer
        .step("build_prompt", json!({ "role": request.role, "market_focus": request.market_focus() }))
        .ok(json!({ "chars": prompt.chars().count(), "prompt_version": QUICK_MARKET_PROMPT_VERSION }));

    let result = tracer
        .step("generate", json!({ "endpoint": QUICK_MARKET_ENDPOINT.id }))
        .record(
            ctx.generate::<MarketAnalysis>(
                &QUICK_MARKET_ENDPOINT,
                &market_analysis_schema(),
                &prompt,
                Some(QUICK_MARKET_SYSTEM),
            )
            .await,
            |s| json!({ "model": s.model, "coerced": s.coerced, "confidence": s.data.confidence }),
        );
    tracer.finish();
    let structured = result?;

    let mut analysis = structured.data;
    let mut warnings = Vec::new();
    if analysis.confidence > QUICK_CONFIDENCE_CAP {
        warnings.push(format!(
            "confidence capped at {QUICK_CONFIDENCE_CAP}: model knowledge only"
        ));
        analysis.confidence = QUICK_CONFIDENCE_CAP;
    }
    let confidence = analysis.confidence;
    let posting_count = analysis.estimated_posting_count.map(|c| c.round() as u32);

    Ok(PipelineOutput {
        data: MarketReport {
            phase: CachePhase::Quick,
            market_focus: request.market_focus(),
            analysis,
            posting_count,
            posting_count_source: PostingCountSource::Estimated,
            job_board_domains: Vec::new(),
            sources: Vec::new(),
            warnings,
        },
        metadata: OutputMetadata::new(&structured.model, QUICK_MARKET_PROMPT_VERSION, tracer.id())
            .with_research(0, confidence),
    })
}

/// Serves `phase` from `cache` when possible, otherwise runs it and stores
/// the result. Cache failures are logged and never fail the request.
pub async fn research_market(
    ctx: &PipelineContext,
    cache: &dyn CacheStore,
    phase: CachePhase,
    request: &MarketResearchRequest,
) -> Result<PipelineOutput<MarketReport>, AiError> {
    let key = match request.cache_key() {
        Ok(key) => Some(key),
        Err(e) => {
            warn!(error = %e, "could not derive market research cache key");
            None
        }
    };

    if let Some(key) = &key {
        match cache.get(phase, key).await {
            Ok(Some(value)) => match serde_json::from_value::<PipelineOutput<MarketReport>>(value) {
                Ok(cached) => {
                    info!(phase = phase.as_str(), key = %key, "market research served from cache");
                    return Ok(cached);
                }
                Err(e) => warn!(error = %e, key = %key, "discarding unreadable cache entry"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "cache read failed"),
        }
    }

    let output = match phase {
        CachePhase::Quick => run_quick_research(ctx, request).await?,
        CachePhase::Deep => run_deep_research(ctx, request).await?,
    };

    if let Some(key) = &key {
        let stored = match serde_json::to_value(&output) {
            Ok(value) => cache.put(phase, key, &value).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = stored {
            warn!(error = %e, key = %key, "cache write failed");
        }
    }
    Ok(output)
}
