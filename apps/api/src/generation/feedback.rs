//! Feedback synthesis pipeline: many interviewers' notes, one recommendation.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::AiError;
use crate::llm_client::prompts::fill_template;
use crate::pipeline::sanitize::{sanitize, wrap_optional, wrap_user_content};
use crate::pipeline::schema::Schema;
use crate::pipeline::{EndpointSpec, PipelineContext, PipelineOutput};

use super::prompts::{
    FEEDBACK_SYNTHESIS_PROMPT_TEMPLATE, FEEDBACK_SYNTHESIS_PROMPT_VERSION,
    FEEDBACK_SYNTHESIS_SYSTEM,
};
use super::{run_single_call, PipelineDef};

pub const FEEDBACK_SYNTHESIS: PipelineDef = PipelineDef {
    name: "feedback_synthesis",
    endpoint: EndpointSpec::new("feedback_synthesis", 3072, 0.2),
    prompt_version: FEEDBACK_SYNTHESIS_PROMPT_VERSION,
    system: FEEDBACK_SYNTHESIS_SYSTEM,
};

#[derive(Debug, Clone, Deserialize)]
pub struct InterviewerFeedback {
    pub interviewer: String,
    #[serde(default)]
    pub stage: Option<String>,
    pub notes: String,
    /// Interviewer's own score on a 1–4 scale, when the loop collects one.
    #[serde(default)]
    pub rating: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackSynthesisRequest {
    pub role: String,
    #[serde(default)]
    pub candidate_name: Option<String>,
    pub feedback: Vec<InterviewerFeedback>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongHire,
    Hire,
    NoHire,
    StrongNoHire,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSynthesis {
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    pub recommendation: Recommendation,
    pub confidence: f64,
}

pub fn feedback_synthesis_schema() -> Schema {
    Schema::object()
        .field(
            "summary",
            Schema::string().min_len(20).max_len(1500).strip_boilerplate(),
        )
        .optional("strengths", Schema::array(Schema::string().min_len(3)).max_len(8))
        .optional("concerns", Schema::array(Schema::string().min_len(3)).max_len(8))
        .field(
            "recommendation",
            Schema::enumeration(&["strong_hire", "hire", "no_hire", "strong_no_hire"]),
        )
        .field("confidence", Schema::number().range(0.0, 1.0))
}

/// One block per interviewer, in submission order.
fn render_feedback(feedback: &[InterviewerFeedback]) -> String {
    let blocks: Vec<String> = feedback
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let mut header = format!("Interviewer {}: {}", i + 1, sanitize(f.interviewer.trim()));
            if let Some(stage) = f.stage.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                header.push_str(&format!(" ({})", sanitize(stage)));
            }
            if let Some(rating) = f.rating {
                header.push_str(&format!(", rating {rating}/4"));
            }
            format!("{header}\n{}", sanitize(f.notes.trim()))
        })
        .collect();
    wrap_user_content("interview_feedback", &blocks.join("\n\n"))
}

pub async fn synthesize_feedback(
    ctx: &PipelineContext,
    request: &FeedbackSynthesisRequest,
) -> Result<PipelineOutput<FeedbackSynthesis>, AiError> {
    let prompt = fill_template(
        FEEDBACK_SYNTHESIS_PROMPT_TEMPLATE,
        &[
            ("role", &wrap_user_content("role", request.role.trim())),
            ("candidate", &wrap_optional("candidate", request.candidate_name.as_deref())),
            ("feedback", &render_feedback(&request.feedback)),
        ],
    );

    let input = json!({
        "role": request.role,
        "feedback_count": request.feedback.len(),
    });
    run_single_call(ctx, &FEEDBACK_SYNTHESIS, &feedback_synthesis_schema(), input, prompt).await
}
