//! Job description pipeline.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::AiError;
use crate::llm_client::prompts::fill_template;
use crate::pipeline::sanitize::{wrap_optional, wrap_user_content};
use crate::pipeline::schema::Schema;
use crate::pipeline::{EndpointSpec, PipelineContext, PipelineOutput};

use super::prompts::{
    JOB_DESCRIPTION_PROMPT_TEMPLATE, JOB_DESCRIPTION_PROMPT_VERSION, JOB_DESCRIPTION_SYSTEM,
};
use super::{run_single_call, wrap_list, PipelineDef};

pub const JOB_DESCRIPTION: PipelineDef = PipelineDef {
    name: "job_description",
    endpoint: EndpointSpec::new("job_description", 4096, 0.4),
    prompt_version: JOB_DESCRIPTION_PROMPT_VERSION,
    system: JOB_DESCRIPTION_SYSTEM,
};

#[derive(Debug, Clone, Deserialize)]
pub struct JobDescriptionRequest {
    pub role: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub team_context: Option<String>,
    #[serde(default)]
    pub key_requirements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescription {
    pub title: String,
    pub summary: String,
    pub responsibilities: Vec<String>,
    pub requirements: Vec<String>,
    #[serde(default)]
    pub nice_to_haves: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
}

pub fn job_description_schema() -> Schema {
    let item = || Schema::string().min_len(3).max_len(300);
    Schema::object()
        .field("title", Schema::string().min_len(2).max_len(120))
        .field(
            "summary",
            Schema::string().min_len(40).max_len(1200).strip_boilerplate(),
        )
        .field("responsibilities", Schema::array(item()).min_len(4).max_len(10))
        .field("requirements", Schema::array(item()).min_len(3).max_len(10))
        .optional("nice_to_haves", Schema::array(item()).max_len(6))
        .optional("benefits", Schema::array(item()).max_len(8))
}

pub async fn generate_job_description(
    ctx: &PipelineContext,
    request: &JobDescriptionRequest,
) -> Result<PipelineOutput<JobDescription>, AiError> {
    let prompt = fill_template(
        JOB_DESCRIPTION_PROMPT_TEMPLATE,
        &[
            ("role", &wrap_user_content("role", request.role.trim())),
            ("company", &wrap_optional("company", request.company_name.as_deref())),
            ("level", &wrap_optional("level", request.level.as_deref())),
            ("location", &wrap_optional("location", request.location.as_deref())),
            ("team_context", &wrap_optional("team_context", request.team_context.as_deref())),
            ("key_requirements", &wrap_list("key_requirements", &request.key_requirements)),
        ],
    );

    let input = json!({
        "role": request.role,
        "level": request.level,
        "key_requirements": request.key_requirements.len(),
    });
    run_single_call(ctx, &JOB_DESCRIPTION, &job_description_schema(), input, prompt).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::pipeline::testing::{test_context, FakeSearch, ScriptedLlm};

    fn request() -> JobDescriptionRequest {
        JobDescriptionRequest {
            role: "Platform Engineer".into(),
            company_name: Some("Acme".into()),
            level: Some("Senior".into()),
            location: None,
            team_context: None,
            key_requirements: vec!["Kubernetes in production".into()],
        }
    }

    fn reply() -> serde_json::Value {
        json!({
            "title": "Senior Platform Engineer",
            "summary": "Own the internal platform that lets forty product teams ship safely.\n\nNote: generated for Acme.",
            "responsibilities": ["Run clusters", "Build tooling", "Mentor engineers", "Own incidents", "Shape roadmap"],
            "requirements": ["Kubernetes in production", "Go or Rust", "Terraform", "On-call experience"],
            "nice_to_haves": ["eBPF", "Bazel", "Nix", "Cilium", "Envoy", "Vault", "Istio", "Argo"],
            "benefits": ["Remote friendly"]
        })
    }

    #[tokio::test]
    async fn test_job_description_is_coerced_into_contract() {
        let llm = Arc::new(ScriptedLlm::new(|_, _| Ok(reply())));
        let ctx = test_context(llm.clone(), Arc::new(FakeSearch::empty()));

        let output = generate_job_description(&ctx, &request()).await.unwrap();

        assert_eq!(
            output.data.summary,
            "Own the internal platform that lets forty product teams ship safely."
        );
        assert_eq!(output.data.nice_to_haves.len(), 6);
        assert_eq!(output.data.nice_to_haves[5], "Vault");
        assert_eq!(output.metadata.prompt_version, JOB_DESCRIPTION_PROMPT_VERSION);
        assert_eq!(llm.calls_to("job_description"), 1);
    }

    #[tokio::test]
    async fn test_prompt_wraps_user_fields() {
        let llm = Arc::new(ScriptedLlm::new(|_, _| Ok(reply())));
        let ctx = test_context(llm.clone(), Arc::new(FakeSearch::empty()));

        generate_job_description(&ctx, &request()).await.unwrap();

        let prompt = &llm.calls()[0].prompt;
        assert!(prompt.contains("<role>\nPlatform Engineer\n</role>"));
        assert!(prompt.contains("<key_requirements>\n- Kubernetes in production\n</key_requirements>"));
        assert!(prompt.contains("<location>\nnot specified\n</location>"));
    }

    #[tokio::test]
    async fn test_placeholder_text_in_user_input_is_kept_literal() {
        let llm = Arc::new(ScriptedLlm::new(|_, _| Ok(reply())));
        let ctx = test_context(llm.clone(), Arc::new(FakeSearch::empty()));
        let mut req = request();
        req.key_requirements = vec!["literal {role} token".into()];
        req.team_context = Some("reports to {company} leadership".into());

        generate_job_description(&ctx, &req).await.unwrap();

        let prompt = &llm.calls()[0].prompt;
        assert!(prompt.contains("<key_requirements>\n- literal {role} token\n</key_requirements>"));
        assert!(prompt.contains("<team_context>\nreports to {company} leadership\n</team_context>"));
        assert_eq!(prompt.matches("<role>\nPlatform Engineer\n</role>").count(), 1);
    }

    #[tokio::test]
    async fn test_too_few_responsibilities_is_not_invented() {
        let llm = Arc::new(ScriptedLlm::new(|_, _| {
            let mut reply = reply();
            reply["responsibilities"] = json!(["Run clusters"]);
            Ok(reply)
        }));
        let ctx = test_context(llm.clone(), Arc::new(FakeSearch::empty()));

        let err = generate_job_description(&ctx, &request()).await.unwrap_err();

        assert!(matches!(err, AiError::Validation { .. }));
        // primary then fallback
        assert_eq!(llm.calls().len(), 2);
    }
}
