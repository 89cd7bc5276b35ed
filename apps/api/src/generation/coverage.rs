//! Interview coverage pipeline: audits an interview loop against the
//! competencies a role requires.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::AiError;
use crate::llm_client::prompts::fill_template;
use crate::pipeline::sanitize::{sanitize, wrap_user_content};
use crate::pipeline::schema::Schema;
use crate::pipeline::{EndpointSpec, PipelineContext, PipelineOutput};

use super::prompts::{
    INTERVIEW_COVERAGE_PROMPT_TEMPLATE, INTERVIEW_COVERAGE_PROMPT_VERSION,
    INTERVIEW_COVERAGE_SYSTEM,
};
use super::{run_single_call, wrap_list, PipelineDef};

pub const INTERVIEW_COVERAGE: PipelineDef = PipelineDef {
    name: "interview_coverage",
    endpoint: EndpointSpec::new("interview_coverage", 3072, 0.1),
    prompt_version: INTERVIEW_COVERAGE_PROMPT_VERSION,
    system: INTERVIEW_COVERAGE_SYSTEM,
};

const MAX_COMPETENCIES: usize = 20;

#[derive(Debug, Clone, Deserialize)]
pub struct StageOutline {
    pub name: String,
    #[serde(default)]
    pub focus_areas: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterviewCoverageRequest {
    pub role: String,
    pub competencies: Vec<String>,
    pub stages: Vec<StageOutline>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageLevel {
    None,
    Partial,
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyCoverage {
    pub competency: String,
    #[serde(default)]
    pub covered_by: Vec<String>,
    pub coverage: CoverageLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageAnalysis {
    pub competencies: Vec<CompetencyCoverage>,
    #[serde(default)]
    pub gaps: Vec<String>,
    #[serde(default)]
    pub redundancies: Vec<String>,
    pub coverage_score: f64,
}

pub fn coverage_schema() -> Schema {
    let competency = Schema::object()
        .field("competency", Schema::string().min_len(1))
        .optional("covered_by", Schema::array(Schema::string()).max_len(8))
        .field("coverage", Schema::enumeration(&["none", "partial", "full"]));
    Schema::object()
        .field(
            "competencies",
            Schema::array(competency).min_len(1).max_len(MAX_COMPETENCIES),
        )
        .optional("gaps", Schema::array(Schema::string().min_len(1)).max_len(10))
        .optional("redundancies", Schema::array(Schema::string().min_len(1)).max_len(10))
        .field("coverage_score", Schema::number().range(0.0, 1.0))
}

fn render_stages(stages: &[StageOutline]) -> String {
    let lines: Vec<String> = stages
        .iter()
        .map(|s| {
            let focus: Vec<&str> = s
                .focus_areas
                .iter()
                .map(|f| f.trim())
                .filter(|f| !f.is_empty())
                .collect();
            format!("- {}: {}", s.name.trim(), focus.join(", "))
        })
        .collect();
    wrap_user_content("interview_stages", &sanitize(&lines.join("\n")))
}

pub async fn analyze_coverage(
    ctx: &PipelineContext,
    request: &InterviewCoverageRequest,
) -> Result<PipelineOutput<CoverageAnalysis>, AiError> {
    let prompt = fill_template(
        INTERVIEW_COVERAGE_PROMPT_TEMPLATE,
        &[
            ("role", &wrap_user_content("role", request.role.trim())),
            ("competencies", &wrap_list("required_competencies", &request.competencies)),
            ("stages", &render_stages(&request.stages)),
        ],
    );

    let input = json!({
        "role": request.role,
        "competencies": request.competencies.len(),
        "stages": request.stages.len(),
    });
    run_single_call(ctx, &INTERVIEW_COVERAGE, &coverage_schema(), input, prompt).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::pipeline::testing::{test_context, FakeSearch, ScriptedLlm};

    fn request() -> InterviewCoverageRequest {
        InterviewCoverageRequest {
            role: "SRE".into(),
            competencies: vec!["Incident response".into(), "Automation".into()],
            stages: vec![
                StageOutline {
                    name: "Screen".into(),
                    focus_areas: vec!["Automation".into(), " ".into()],
                },
                StageOutline {
                    name: "Onsite".into(),
                    focus_areas: vec!["Automation".into()],
                },
            ],
        }
    }

    #[test]
    fn test_render_stages() {
        assert_eq!(
            render_stages(&request().stages),
            "<interview_stages>\n- Screen: Automation\n- Onsite: Automation\n</interview_stages>"
        );
    }

    #[tokio::test]
    async fn test_coverage_analysis_round_trip() {
        let llm = Arc::new(ScriptedLlm::new(|_, _| {
            Ok(json!({
                "competencies": [
                    {"competency": "Incident response", "covered_by": [], "coverage": "none"},
                    {"competency": "Automation", "covered_by": ["Screen", "Onsite"], "coverage": "full"}
                ],
                "gaps": ["Incident response"],
                "redundancies": ["Automation"],
                "coverage_score": "0.5"
            }))
        }));
        let ctx = test_context(llm, Arc::new(FakeSearch::empty()));

        let output = analyze_coverage(&ctx, &request()).await.unwrap();

        assert_eq!(output.data.coverage_score, 0.5);
        assert_eq!(output.data.competencies[0].coverage, CoverageLevel::None);
        assert_eq!(output.data.gaps, vec!["Incident response"]);
    }
}
