//! Interview plan pipeline: the stages of an interview loop.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::AiError;
use crate::llm_client::prompts::fill_template;
use crate::pipeline::sanitize::{wrap_optional, wrap_user_content};
use crate::pipeline::schema::Schema;
use crate::pipeline::{EndpointSpec, PipelineContext, PipelineOutput};

use super::prompts::{
    INTERVIEW_PLAN_PROMPT_TEMPLATE, INTERVIEW_PLAN_PROMPT_VERSION, INTERVIEW_PLAN_SYSTEM,
};
use super::{run_single_call, wrap_list, PipelineDef};

pub const INTERVIEW_PLAN: PipelineDef = PipelineDef {
    name: "interview_plan",
    endpoint: EndpointSpec::new("interview_plan", 4096, 0.4),
    prompt_version: INTERVIEW_PLAN_PROMPT_VERSION,
    system: INTERVIEW_PLAN_SYSTEM,
};

pub const MAX_STAGES: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct InterviewPlanRequest {
    pub role: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub competencies: Vec<String>,
    /// Desired number of stages; the model chooses when absent.
    #[serde(default)]
    pub stage_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewStage {
    pub name: String,
    pub duration_minutes: u32,
    pub focus_areas: Vec<String>,
    pub interviewer_role: String,
    pub sample_questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewPlan {
    pub stages: Vec<InterviewStage>,
}

pub fn interview_plan_schema() -> Schema {
    let stage = Schema::object()
        .field("name", Schema::string().min_len(2).max_len(80))
        .field("duration_minutes", Schema::number().range(15.0, 240.0))
        .field(
            "focus_areas",
            Schema::array(Schema::string().min_len(2)).min_len(1).max_len(6),
        )
        .field("interviewer_role", Schema::string().min_len(2).max_len(80))
        .field(
            "sample_questions",
            Schema::array(Schema::string().min_len(5)).min_len(1).max_len(8),
        );
    Schema::object().field("stages", Schema::array(stage).min_len(1).max_len(MAX_STAGES))
}

pub async fn generate_interview_plan(
    ctx: &PipelineContext,
    request: &InterviewPlanRequest,
) -> Result<PipelineOutput<InterviewPlan>, AiError> {
    let stage_count = match request.stage_count {
        Some(n) => format!("exactly {} stages", n.clamp(1, MAX_STAGES)),
        None => format!("between 3 and {MAX_STAGES} stages"),
    };
    let prompt = fill_template(
        INTERVIEW_PLAN_PROMPT_TEMPLATE,
        &[
            ("role", &wrap_user_content("role", request.role.trim())),
            ("level", &wrap_optional("level", request.level.as_deref())),
            ("stage_count", &stage_count),
            ("competencies", &wrap_list("competencies", &request.competencies)),
        ],
    );

    let input = json!({
        "role": request.role,
        "competencies": request.competencies.len(),
        "stage_count": request.stage_count,
    });
    run_single_call(ctx, &INTERVIEW_PLAN, &interview_plan_schema(), input, prompt).await
}
