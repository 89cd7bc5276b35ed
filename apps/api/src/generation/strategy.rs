//! Hiring strategy pipeline.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::AiError;
use crate::llm_client::prompts::fill_template;
use crate::pipeline::sanitize::{wrap_optional, wrap_user_content};
use crate::pipeline::schema::Schema;
use crate::pipeline::{EndpointSpec, PipelineContext, PipelineOutput};

use super::prompts::{
    HIRING_STRATEGY_PROMPT_TEMPLATE, HIRING_STRATEGY_PROMPT_VERSION, HIRING_STRATEGY_SYSTEM,
};
use super::{run_single_call, PipelineDef};

pub const HIRING_STRATEGY: PipelineDef = PipelineDef {
    name: "hiring_strategy",
    endpoint: EndpointSpec::new("hiring_strategy", 4096, 0.5),
    prompt_version: HIRING_STRATEGY_PROMPT_VERSION,
    system: HIRING_STRATEGY_SYSTEM,
};

#[derive(Debug, Clone, Deserialize)]
pub struct HiringStrategyRequest {
    pub role: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub urgency: Option<String>,
    /// Budget, headcount or process constraints in free text.
    #[serde(default)]
    pub constraints: Option<String>,
    /// Summary of an earlier market research result, if the caller has one.
    #[serde(default)]
    pub market_summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcingChannel {
    pub channel: String,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiringStrategy {
    pub positioning: String,
    pub sourcing_channels: Vec<SourcingChannel>,
    pub compensation_guidance: String,
    pub timeline_weeks: u32,
    #[serde(default)]
    pub risks: Vec<String>,
}

pub fn hiring_strategy_schema() -> Schema {
    let channel = Schema::object()
        .field("channel", Schema::string().min_len(2).max_len(80))
        .field("rationale", Schema::string().min_len(5).max_len(400));
    Schema::object()
        .field(
            "positioning",
            Schema::string().min_len(20).max_len(800).strip_boilerplate(),
        )
        .field("sourcing_channels", Schema::array(channel).min_len(2).max_len(8))
        .field(
            "compensation_guidance",
            Schema::string().min_len(10).max_len(800).strip_boilerplate(),
        )
        .field("timeline_weeks", Schema::number().range(1.0, 52.0))
        .optional("risks", Schema::array(Schema::string().min_len(3)).max_len(6))
}

pub async fn generate_hiring_strategy(
    ctx: &PipelineContext,
    request: &HiringStrategyRequest,
) -> Result<PipelineOutput<HiringStrategy>, AiError> {
    let prompt = fill_template(
        HIRING_STRATEGY_PROMPT_TEMPLATE,
        &[
            ("role", &wrap_user_content("role", request.role.trim())),
            ("level", &wrap_optional("level", request.level.as_deref())),
            ("location", &wrap_optional("location", request.location.as_deref())),
            ("urgency", &wrap_optional("urgency", request.urgency.as_deref())),
            ("constraints", &wrap_optional("constraints", request.constraints.as_deref())),
            (
                "market_summary",
                &wrap_optional("market_summary", request.market_summary.as_deref()),
            ),
        ],
    );

    let input = json!({
        "role": request.role,
        "location": request.location,
        "has_market_summary": request.market_summary.is_some(),
    });
    run_single_call(ctx, &HIRING_STRATEGY, &hiring_strategy_schema(), input, prompt).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::pipeline::testing::{test_context, FakeSearch, ScriptedLlm};

    fn request() -> HiringStrategyRequest {
        HiringStrategyRequest {
            role: "Data Scientist".into(),
            level: None,
            location: Some("Lisbon".into()),
            urgency: Some("high".into()),
            constraints: None,
            market_summary: None,
        }
    }

    #[tokio::test]
    async fn test_timeline_clamped_and_risks_truncated() {
        let llm = Arc::new(ScriptedLlm::new(|_, _| {
            Ok(json!({
                "positioning": "Shape the analytics roadmap of a growing fintech.",
                "sourcing_channels": [
                    {"channel": "Referrals", "rationale": "Fastest to close"},
                    {"channel": "Kaggle", "rationale": "Strong applied talent"}
                ],
                "compensation_guidance": "Anchor at the 60th percentile for Lisbon.",
                "timeline_weeks": 80,
                "risks": ["a risk", "b risk", "c risk", "d risk", "e risk", "f risk", "g risk"]
            }))
        }));
        let ctx = test_context(llm, Arc::new(FakeSearch::empty()));

        let output = generate_hiring_strategy(&ctx, &request()).await.unwrap();

        assert_eq!(output.data.timeline_weeks, 52);
        assert_eq!(output.data.risks.len(), 6);
        assert_eq!(output.data.sourcing_channels[0].channel, "Referrals");
    }

    #[tokio::test]
    async fn test_single_channel_is_rejected() {
        let llm = Arc::new(ScriptedLlm::new(|_, _| {
            Ok(json!({
                "positioning": "Shape the analytics roadmap of a growing fintech.",
                "sourcing_channels": [{"channel": "Referrals", "rationale": "Fastest to close"}],
                "compensation_guidance": "Anchor at the 60th percentile.",
                "timeline_weeks": 8
            }))
        }));
        let ctx = test_context(llm, Arc::new(FakeSearch::empty()));

        let err = generate_hiring_strategy(&ctx, &request()).await.unwrap_err();
        match err {
            AiError::Validation { issues, .. } => {
                assert_eq!(issues[0].path_strings(), vec!["sourcing_channels"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
