//! Deep market research.
//!
//! Flow: generate_queries → (web_search → score_sources → extract_sources)
//!       alongside verified_count → synthesize → assemble.
//!
//! Every stage opens one tracer step. Fan-out points collect each task as an
//! explicit `Result`; one failed query or extraction never aborts its
//! siblings. Degraded paths (partial search, no extractions, no verified
//! count) are recorded as warnings and still produce a report.

use std::collections::{HashMap, HashSet};

use futures::future::join_all;
use serde_json::json;
use tracing::{info, warn};

use crate::cache::CachePhase;
use crate::errors::AiError;
use crate::llm_client::prompts::fill_template;
use crate::llm_client::Structured;
use crate::pipeline::retry::with_retry;
use crate::pipeline::sanitize::{sanitize, wrap_optional, wrap_user_content};
use crate::pipeline::tracer::PipelineTracer;
use crate::pipeline::{EndpointSpec, OutputMetadata, PipelineContext, PipelineOutput};
use crate::search::{PostingCount, SearchResult};

use super::prompts::{
    DEEP_PROMPT_VERSION, EXTRACTION_PROMPT_TEMPLATE, QUERY_PROMPT_TEMPLATE, RESEARCH_SYSTEM,
    SCORING_PROMPT_TEMPLATE, SYNTHESIS_PROMPT_TEMPLATE,
};
use super::sources::{apply_scores, dedup_by_url, rank_candidates, render_candidates, select_top};
use super::types::{
    extraction_schema, market_analysis_schema, query_plan_schema, source_scores_schema,
    Extraction, MarketAnalysis, MarketReport, MarketResearchRequest, PostingCountSource,
    QueryPlan, ResearchSource, ScoredSource, SourceExtraction, SourceScores, MAX_QUERIES,
    MIN_QUERIES,
};

pub const QUERY_ENDPOINT: EndpointSpec = EndpointSpec::new("research.queries", 1024, 0.7);
pub const SCORING_ENDPOINT: EndpointSpec = EndpointSpec::new("research.scoring", 4096, 0.0);
pub const EXTRACTION_ENDPOINT: EndpointSpec = EndpointSpec::new("research.extraction", 2048, 0.0);
pub const SYNTHESIS_ENDPOINT: EndpointSpec = EndpointSpec::new("research.synthesis", 4096, 0.3);

/// Confidence ceiling when synthesis ran without any extracted evidence.
pub const NO_EVIDENCE_CONFIDENCE_CAP: f64 = 0.4;

/// Page content passed to one extraction call.
const SOURCE_CONTENT_CHARS: usize = 6_000;

/// Output of stages 2–4.
#[derive(Debug, Default)]
struct Evidence {
    selected: Vec<ScoredSource>,
    extractions: Vec<SourceExtraction>,
    warnings: Vec<String>,
}

/// Runs the full pipeline under a fresh tracer.
pub async fn run_deep_research(
    ctx: &PipelineContext,
    request: &MarketResearchRequest,
) -> Result<PipelineOutput<MarketReport>, AiError> {
    let tracer = PipelineTracer::new("market_research.deep");
    let result = research(ctx, request, &tracer).await;
    tracer.finish();
    result
}

pub(crate) async fn research(
    ctx: &PipelineContext,
    request: &MarketResearchRequest,
    tracer: &PipelineTracer,
) -> Result<PipelineOutput<MarketReport>, AiError> {
    let context = render_context(request);

    // Stage 1: query generation
    let (queries, query_warnings) = generate_queries(ctx, &context, tracer).await?;

    // Stages 2–4 run alongside the verified count (stage 5)
    let (evidence, verified) = tokio::join!(
        gather_evidence(ctx, &context, &queries, tracer),
        verified_count(ctx, request, tracer),
    );
    let mut evidence = evidence?;
    evidence.warnings.splice(0..0, query_warnings);

    // Stage 6: synthesis and assembly
    let synthesis = synthesize(ctx, &context, &evidence, tracer).await?;
    Ok(assemble(request, synthesis, evidence, verified, tracer))
}

/// Request context shared by every research prompt; user text is wrapped.
pub(crate) fn render_context(request: &MarketResearchRequest) -> String {
    [
        wrap_user_content("role", request.role.trim()),
        wrap_optional("level", request.level()),
        wrap_optional("industry", request.industry()),
        wrap_optional("location", request.location()),
        format!("Research focus: {}", request.market_focus().as_str()),
    ]
    .join("\n")
}

// ────────────────────────────────────────────────────────────────────────────
// Stage 1
// ────────────────────────────────────────────────────────────────────────────

/// Distinct queries plus a warning when repeats left fewer than the minimum.
async fn generate_queries(
    ctx: &PipelineContext,
    context: &str,
    tracer: &PipelineTracer,
) -> Result<(Vec<String>, Vec<String>), AiError> {
    let step = tracer.step(
        "generate_queries",
        json!({ "min": MIN_QUERIES, "max": MAX_QUERIES }),
    );
    let prompt = fill_template(
        QUERY_PROMPT_TEMPLATE,
        &[
            ("min_queries", &MIN_QUERIES.to_string()),
            ("max_queries", &MAX_QUERIES.to_string()),
            ("context", context),
        ],
    );

    let planned = match ctx
        .generate::<QueryPlan>(&QUERY_ENDPOINT, &query_plan_schema(), &prompt, Some(RESEARCH_SYSTEM))
        .await
    {
        Ok(plan) => plan.data.queries,
        Err(e) => {
            step.fail(&e);
            return Err(e);
        }
    };

    let generated = planned.len();
    let queries = distinct_queries(planned);
    if queries.is_empty() {
        let err = AiError::Search("query generation produced no usable queries".into());
        step.fail(&err);
        return Err(err);
    }

    let mut warnings = Vec::new();
    if queries.len() < MIN_QUERIES {
        warn!(
            distinct = queries.len(),
            generated,
            "Fewer distinct search queries than the minimum"
        );
        warnings.push(format!(
            "only {} distinct search queries after removing repeats (minimum {MIN_QUERIES})",
            queries.len()
        ));
    }
    step.ok_with_warnings(json!({ "queries": queries }), warnings.clone());
    Ok((queries, warnings))
}

/// Trims queries and drops case-insensitive repeats, keeping first order.
fn distinct_queries(queries: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty() && seen.insert(q.to_lowercase()))
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Stages 2–4
// ────────────────────────────────────────────────────────────────────────────

async fn gather_evidence(
    ctx: &PipelineContext,
    context: &str,
    queries: &[String],
    tracer: &PipelineTracer,
) -> Result<Evidence, AiError> {
    let (results, mut warnings) = web_search(ctx, queries, tracer).await?;

    if results.is_empty() {
        let note = "no search results; synthesis falls back to model knowledge".to_string();
        tracer
            .step("score_sources", json!({ "candidates": 0 }))
            .ok(json!({ "skipped": "no search results" }));
        tracer
            .step("extract_sources", json!({ "selected": 0 }))
            .ok_with_warnings(json!({ "extracted": 0 }), vec![note.clone()]);
        warnings.push(note);
        return Ok(Evidence {
            warnings,
            ..Evidence::default()
        });
    }

    let candidates = rank_candidates(results, ctx.research.max_candidates);
    let (scored, scoring_warnings) = score_sources(ctx, context, &candidates, tracer).await?;
    warnings.extend(scoring_warnings);

    let mut evidence = extract_sources(ctx, context, &candidates, scored, tracer).await;
    warnings.append(&mut evidence.warnings);
    evidence.warnings = warnings;
    Ok(evidence)
}

/// Stage 2. Fails only when every query failed.
async fn web_search(
    ctx: &PipelineContext,
    queries: &[String],
    tracer: &PipelineTracer,
) -> Result<(Vec<SearchResult>, Vec<String>), AiError> {
    let step = tracer.step("web_search", json!({ "queries": queries }));
    let per_query = ctx.research.results_per_query;

    let outcomes = join_all(
        queries
            .iter()
            .map(|query| with_retry(|| ctx.search.search(query, per_query), ctx.retry)),
    )
    .await;

    let mut batches = Vec::new();
    let mut failures = Vec::new();
    for (query, outcome) in queries.iter().zip(outcomes) {
        match outcome {
            Ok(batch) => batches.push(batch),
            Err(e) => {
                warn!(query = %query, kind = %e.kind(), "Search query failed: {e}");
                failures.push(format!("search query '{query}' failed: {e}"));
            }
        }
    }

    if batches.is_empty() {
        let err = AiError::Search(format!("all {} search queries failed", queries.len()));
        step.fail(&err);
        return Err(err);
    }

    let succeeded = batches.len();
    let results = dedup_by_url(batches);
    info!(
        succeeded,
        failed = failures.len(),
        results = results.len(),
        "Web search fan-out complete"
    );
    step.ok_with_warnings(
        json!({
            "results": results.len(),
            "succeeded_queries": succeeded,
            "failed_queries": failures.len(),
        }),
        failures.clone(),
    );
    Ok((results, failures))
}

/// Stage 3. One model call scores every candidate.
async fn score_sources(
    ctx: &PipelineContext,
    context: &str,
    candidates: &[SearchResult],
    tracer: &PipelineTracer,
) -> Result<(Vec<ScoredSource>, Vec<String>), AiError> {
    let step = tracer.step("score_sources", json!({ "candidates": candidates.len() }));
    let prompt = fill_template(
        SCORING_PROMPT_TEMPLATE,
        &[
            ("context", context),
            (
                "candidates",
                &wrap_user_content("search_results", &render_candidates(candidates)),
            ),
        ],
    );

    let scores = match ctx
        .generate::<SourceScores>(
            &SCORING_ENDPOINT,
            &source_scores_schema(ctx.research.max_candidates),
            &prompt,
            Some(RESEARCH_SYSTEM),
        )
        .await
    {
        Ok(scores) => scores.data.scores,
        Err(e) => {
            step.fail(&e);
            return Err(e);
        }
    };

    let outcome = apply_scores(candidates, &scores);
    let mut warnings = Vec::new();
    if outcome.unscored > 0 {
        warnings.push(format!(
            "{} of {} candidates were not scored and were dropped",
            outcome.unscored,
            candidates.len()
        ));
    }
    if outcome.discarded > 0 {
        warnings.push(format!(
            "{} scores referenced invalid, unknown or repeated candidates",
            outcome.discarded
        ));
    }
    step.ok_with_warnings(
        json!({ "scored": outcome.scored.len(), "unscored": outcome.unscored }),
        warnings.clone(),
    );
    Ok((outcome.scored, warnings))
}

/// Stage 4. Never fails; failed extractions become warnings.
async fn extract_sources(
    ctx: &PipelineContext,
    context: &str,
    candidates: &[SearchResult],
    scored: Vec<ScoredSource>,
    tracer: &PipelineTracer,
) -> Evidence {
    let selected = select_top(scored, ctx.research.top_n);
    let step = tracer.step(
        "extract_sources",
        json!({ "selected": selected.len(), "top_n": ctx.research.top_n }),
    );

    let pages: HashMap<&str, &SearchResult> =
        candidates.iter().map(|c| (c.url.as_str(), c)).collect();
    let schema = extraction_schema();

    let outcomes = join_all(selected.iter().map(|source| {
        let page = pages
            .get(source.url.as_str())
            .map(|c| c.content.as_str())
            .unwrap_or_default();
        let prompt = extraction_prompt(context, source, page);
        let schema = &schema;
        async move {
            ctx.generate::<Extraction>(&EXTRACTION_ENDPOINT, schema, &prompt, Some(RESEARCH_SYSTEM))
                .await
        }
    }))
    .await;

    let mut extractions = Vec::new();
    let mut warnings = Vec::new();
    for (source, outcome) in selected.iter().zip(outcomes) {
        match outcome {
            Ok(extracted) => extractions.push(SourceExtraction {
                url: source.url.clone(),
                title: source.title.clone(),
                extraction: extracted.data,
            }),
            Err(e) => {
                warn!(url = %source.url, kind = %e.kind(), "Source extraction failed: {e}");
                warnings.push(format!("extraction failed for {}: {e}", source.url));
            }
        }
    }

    let failed = warnings.len();
    if extractions.is_empty() {
        warnings.push("no extractions; synthesis falls back to model knowledge".to_string());
    }
    step.ok_with_warnings(
        json!({ "extracted": extractions.len(), "failed": failed }),
        warnings.clone(),
    );

    Evidence {
        selected,
        extractions,
        warnings,
    }
}

fn extraction_prompt(context: &str, source: &ScoredSource, page: &str) -> String {
    let page: String = page.chars().take(SOURCE_CONTENT_CHARS).collect();
    let body = format!("Title: {}\nURL: {}\n\n{}", source.title, source.url, page.trim());
    fill_template(
        EXTRACTION_PROMPT_TEMPLATE,
        &[("context", context), ("source", &wrap_user_content("source", &body))],
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Stage 5
// ────────────────────────────────────────────────────────────────────────────

/// Job-board posting count. A failure only costs the override.
async fn verified_count(
    ctx: &PipelineContext,
    request: &MarketResearchRequest,
    tracer: &PipelineTracer,
) -> Option<PostingCount> {
    let role = sanitize(request.role.trim());
    let location = request.location().map(sanitize);
    let step = tracer.step(
        "verified_count",
        json!({ "role": role, "location": location }),
    );

    match with_retry(
        || ctx.search.count_job_postings(&role, location.as_deref()),
        ctx.retry,
    )
    .await
    {
        Ok(count) => {
            step.ok(json!({ "count": count.count, "domains": count.domains }));
            Some(count)
        }
        Err(e) => {
            warn!(kind = %e.kind(), "Verified posting count unavailable: {e}");
            step.ok_with_warnings(
                json!({ "count": null }),
                vec![format!("verified count unavailable, keeping the estimate: {e}")],
            );
            None
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stage 6
// ────────────────────────────────────────────────────────────────────────────

async fn synthesize(
    ctx: &PipelineContext,
    context: &str,
    evidence: &Evidence,
    tracer: &PipelineTracer,
) -> Result<Structured<MarketAnalysis>, AiError> {
    let step = tracer.step(
        "synthesize",
        json!({ "extractions": evidence.extractions.len() }),
    );
    let extractions = serde_json::to_string_pretty(&evidence.extractions)
        .unwrap_or_else(|_| "[]".to_string());
    let prompt = fill_template(
        SYNTHESIS_PROMPT_TEMPLATE,
        &[
            ("context", context),
            ("source_count", &evidence.extractions.len().to_string()),
            ("extractions", &wrap_user_content("extractions", &extractions)),
        ],
    );

    let result = ctx
        .generate::<MarketAnalysis>(
            &SYNTHESIS_ENDPOINT,
            &market_analysis_schema(),
            &prompt,
            Some(RESEARCH_SYSTEM),
        )
        .await;
    step.record(result, |s| {
        json!({ "model": s.model, "coerced": s.coerced, "confidence": s.data.confidence })
    })
}

fn assemble(
    request: &MarketResearchRequest,
    synthesis: Structured<MarketAnalysis>,
    evidence: Evidence,
    verified: Option<PostingCount>,
    tracer: &PipelineTracer,
) -> PipelineOutput<MarketReport> {
    let step = tracer.step(
        "assemble",
        json!({ "verified_count": verified.as_ref().map(|v| v.count) }),
    );
    let mut analysis = synthesis.data;
    let mut warnings = evidence.warnings;

    if evidence.extractions.is_empty() && analysis.confidence > NO_EVIDENCE_CONFIDENCE_CAP {
        warnings.push(format!(
            "confidence capped at {NO_EVIDENCE_CONFIDENCE_CAP}: no extracted evidence"
        ));
        analysis.confidence = NO_EVIDENCE_CONFIDENCE_CAP;
    }

    let estimate = analysis.estimated_posting_count;
    let (posting_count, posting_count_source, job_board_domains) = match verified {
        // a saturated count is only a floor; a larger estimate is more informative
        Some(verified)
            if verified.saturated && estimate.is_some_and(|e| e > f64::from(verified.count)) =>
        {
            warn!(
                verified = verified.count,
                estimate = ?estimate,
                "Verified posting count saturated; keeping the larger estimate"
            );
            warnings.push(format!(
                "verified count hit the job-board page limit ({}+); keeping the larger estimate",
                verified.count
            ));
            (
                estimate.map(|c| c.round() as u32),
                PostingCountSource::Estimated,
                verified.domains,
            )
        }
        Some(verified) => {
            if verified.saturated {
                warnings.push(format!(
                    "verified count hit the job-board page limit; {} is a lower bound",
                    verified.count
                ));
            }
            analysis.estimated_posting_count = None;
            (Some(verified.count), PostingCountSource::Verified, verified.domains)
        }
        None => (
            estimate.map(|c| c.round() as u32),
            PostingCountSource::Estimated,
            Vec::new(),
        ),
    };

    let extracted: HashSet<&str> = evidence
        .extractions
        .iter()
        .map(|e| e.url.as_str())
        .collect();
    let sources: Vec<ResearchSource> = evidence
        .selected
        .iter()
        .map(|s| ResearchSource {
            url: s.url.clone(),
            title: s.title.clone(),
            overall: s.overall,
            extracted: extracted.contains(s.url.as_str()),
        })
        .collect();

    let source_count = evidence.extractions.len();
    let confidence = analysis.confidence;
    step.ok(json!({
        "posting_count": posting_count,
        "posting_count_source": posting_count_source,
        "discarded_estimate": estimate
            .filter(|_| posting_count_source == PostingCountSource::Verified),
        "source_count": source_count,
        "confidence": confidence,
    }));

    PipelineOutput {
        data: MarketReport {
            phase: CachePhase::Deep,
            market_focus: request.market_focus(),
            analysis,
            posting_count,
            posting_count_source,
            job_board_domains,
            sources,
            warnings,
        },
        metadata: OutputMetadata::new(&synthesis.model, DEEP_PROMPT_VERSION, tracer.id())
            .with_research(source_count, confidence),
    }
}
