//! Axum route handlers for the generation API.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::cache::CachePhase;
use crate::errors::AppError;
use crate::pipeline::call_log::CallLogEntry;
use crate::pipeline::PipelineOutput;
use crate::research::types::{MarketReport, MarketResearchRequest};
use crate::state::AppState;

use super::candidate_profile::{generate_candidate_profile, CandidateProfile, CandidateProfileRequest};
use super::coverage::{analyze_coverage, CoverageAnalysis, InterviewCoverageRequest};
use super::feedback::{synthesize_feedback, FeedbackSynthesis, FeedbackSynthesisRequest};
use super::interview::{generate_interview_plan, InterviewPlan, InterviewPlanRequest};
use super::job_description::{generate_job_description, JobDescription, JobDescriptionRequest};
use super::market::research_market;
use super::strategy::{generate_hiring_strategy, HiringStrategy, HiringStrategyRequest};

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MarketResearchBody {
    #[serde(default = "default_phase")]
    pub phase: CachePhase,
    #[serde(flatten)]
    pub request: MarketResearchRequest,
}

fn default_phase() -> CachePhase {
    CachePhase::Quick
}

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/job-descriptions
pub async fn handle_job_description(
    State(state): State<AppState>,
    Json(request): Json<JobDescriptionRequest>,
) -> Result<Json<PipelineOutput<JobDescription>>, AppError> {
    require_text("role", &request.role)?;

    let output = generate_job_description(&state.ctx, &request).await?;
    Ok(Json(output))
}

/// POST /api/v1/interview-plans
pub async fn handle_interview_plan(
    State(state): State<AppState>,
    Json(request): Json<InterviewPlanRequest>,
) -> Result<Json<PipelineOutput<InterviewPlan>>, AppError> {
    require_text("role", &request.role)?;
    if request.stage_count == Some(0) {
        return Err(AppError::Validation("stage_count must be at least 1".to_string()));
    }

    let output = generate_interview_plan(&state.ctx, &request).await?;
    Ok(Json(output))
}

/// POST /api/v1/hiring-strategies
pub async fn handle_hiring_strategy(
    State(state): State<AppState>,
    Json(request): Json<HiringStrategyRequest>,
) -> Result<Json<PipelineOutput<HiringStrategy>>, AppError> {
    require_text("role", &request.role)?;

    let output = generate_hiring_strategy(&state.ctx, &request).await?;
    Ok(Json(output))
}

/// POST /api/v1/feedback-syntheses
///
/// Every feedback entry needs an interviewer and non-empty notes.
pub async fn handle_feedback_synthesis(
    State(state): State<AppState>,
    Json(request): Json<FeedbackSynthesisRequest>,
) -> Result<Json<PipelineOutput<FeedbackSynthesis>>, AppError> {
    require_text("role", &request.role)?;
    if request.feedback.is_empty() {
        return Err(AppError::Validation("feedback cannot be empty".to_string()));
    }
    for (i, entry) in request.feedback.iter().enumerate() {
        require_text(&format!("feedback[{i}].interviewer"), &entry.interviewer)?;
        require_text(&format!("feedback[{i}].notes"), &entry.notes)?;
    }

    let output = synthesize_feedback(&state.ctx, &request).await?;
    Ok(Json(output))
}

/// POST /api/v1/interview-coverage
pub async fn handle_interview_coverage(
    State(state): State<AppState>,
    Json(request): Json<InterviewCoverageRequest>,
) -> Result<Json<PipelineOutput<CoverageAnalysis>>, AppError> {
    require_text("role", &request.role)?;
    if request.competencies.iter().all(|c| c.trim().is_empty()) {
        return Err(AppError::Validation("competencies cannot be empty".to_string()));
    }
    if request.stages.is_empty() {
        return Err(AppError::Validation("stages cannot be empty".to_string()));
    }

    let output = analyze_coverage(&state.ctx, &request).await?;
    Ok(Json(output))
}

/// POST /api/v1/candidate-profiles
pub async fn handle_candidate_profile(
    State(state): State<AppState>,
    Json(request): Json<CandidateProfileRequest>,
) -> Result<Json<PipelineOutput<CandidateProfile>>, AppError> {
    require_text("role", &request.role)?;

    let output = generate_candidate_profile(&state.ctx, &request).await?;
    Ok(Json(output))
}

/// POST /api/v1/market-research
///
/// `phase` selects quick (model knowledge) or deep (web research); results
/// are cached per phase for 30 days.
pub async fn handle_market_research(
    State(state): State<AppState>,
    Json(body): Json<MarketResearchBody>,
) -> Result<Json<PipelineOutput<MarketReport>>, AppError> {
    require_text("role", &body.request.role)?;

    let output =
        research_market(&state.ctx, state.cache.as_ref(), body.phase, &body.request).await?;
    Ok(Json(output))
}

/// GET /api/v1/diagnostics/calls
///
/// Most recent model calls, oldest first.
pub async fn handle_recent_calls(State(state): State<AppState>) -> Json<Vec<CallLogEntry>> {
    Json(state.ctx.logger.recent())
}
