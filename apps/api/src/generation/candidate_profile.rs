//! Candidate profile pipeline: the ideal-candidate description recruiters
//! source against.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::AiError;
use crate::llm_client::prompts::fill_template;
use crate::pipeline::sanitize::{wrap_optional, wrap_user_content};
use crate::pipeline::schema::Schema;
use crate::pipeline::{EndpointSpec, PipelineContext, PipelineOutput};

use super::prompts::{
    CANDIDATE_PROFILE_PROMPT_TEMPLATE, CANDIDATE_PROFILE_PROMPT_VERSION, CANDIDATE_PROFILE_SYSTEM,
};
use super::{run_single_call, PipelineDef};

pub const CANDIDATE_PROFILE: PipelineDef = PipelineDef {
    name: "candidate_profile",
    endpoint: EndpointSpec::new("candidate_profile", 3072, 0.4),
    prompt_version: CANDIDATE_PROFILE_PROMPT_VERSION,
    system: CANDIDATE_PROFILE_SYSTEM,
};

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateProfileRequest {
    pub role: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub job_description: Option<String>,
    #[serde(default)]
    pub team_context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearsRange {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub headline: String,
    pub must_have_skills: Vec<String>,
    #[serde(default)]
    pub preferred_skills: Vec<String>,
    pub experience_years: YearsRange,
    #[serde(default)]
    pub backgrounds: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
}

pub fn candidate_profile_schema() -> Schema {
    let skill = || Schema::string().min_len(1).max_len(120);
    Schema::object()
        .field(
            "headline",
            Schema::string().min_len(10).max_len(200).strip_boilerplate(),
        )
        .field("must_have_skills", Schema::array(skill()).min_len(3).max_len(10))
        .optional("preferred_skills", Schema::array(skill()).max_len(8))
        .field(
            "experience_years",
            Schema::object()
                .field("min", Schema::number().range(0.0, 40.0))
                .field("max", Schema::number().range(0.0, 40.0)),
        )
        .optional("backgrounds", Schema::array(skill()).max_len(6))
        .optional("red_flags", Schema::array(skill()).max_len(6))
}

pub async fn generate_candidate_profile(
    ctx: &PipelineContext,
    request: &CandidateProfileRequest,
) -> Result<PipelineOutput<CandidateProfile>, AiError> {
    let prompt = fill_template(
        CANDIDATE_PROFILE_PROMPT_TEMPLATE,
        &[
            ("role", &wrap_user_content("role", request.role.trim())),
            ("level", &wrap_optional("level", request.level.as_deref())),
            ("team_context", &wrap_optional("team_context", request.team_context.as_deref())),
            (
                "job_description",
                &wrap_optional("job_description", request.job_description.as_deref()),
            ),
        ],
    );

    let input = json!({
        "role": request.role,
        "level": request.level,
        "has_job_description": request.job_description.is_some(),
    });
    let mut output: PipelineOutput<CandidateProfile> =
        run_single_call(ctx, &CANDIDATE_PROFILE, &candidate_profile_schema(), input, prompt).await?;

    // bounds are per-field; order the pair here
    let years = &mut output.data.experience_years;
    if years.min > years.max {
        std::mem::swap(&mut years.min, &mut years.max);
    }
    Ok(output)
}
