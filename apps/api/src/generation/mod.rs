// Domain pipelines: one traced, schema-validated model call each, plus the
// quick market research phase.
// All LLM calls go through PipelineContext::generate; no vendor calls here.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::errors::AiError;
use crate::llm_client::prompts::NO_FABRICATION_INSTRUCTION;
use crate::pipeline::sanitize::wrap_user_content;
use crate::pipeline::schema::Schema;
use crate::pipeline::tracer::PipelineTracer;
use crate::pipeline::{EndpointSpec, OutputMetadata, PipelineContext, PipelineOutput};

pub mod candidate_profile;
pub mod coverage;
pub mod feedback;
pub mod handlers;
pub mod interview;
pub mod job_description;
pub mod market;
pub mod prompts;
pub mod strategy;

/// Static description of a single-call pipeline.
#[derive(Debug, Clone, Copy)]
pub struct PipelineDef {
    pub name: &'static str,
    pub endpoint: EndpointSpec,
    pub prompt_version: &'static str,
    pub system: &'static str,
}

/// Runs `build_prompt` → `generate` under one tracer and stamps metadata.
/// `input` is the traced summary of the request, not the prompt itself.
pub(crate) async fn run_single_call<T: DeserializeOwned>(
    ctx: &PipelineContext,
    def: &PipelineDef,
    schema: &Schema,
    input: Value,
    prompt: String,
) -> Result<PipelineOutput<T>, AiError> {
    let tracer = PipelineTracer::new(def.name);
    tracer
        .step("build_prompt", input)
        .ok(json!({ "chars": prompt.chars().count(), "prompt_version": def.prompt_version }));

    let system = format!("{}\n\n{}", def.system, NO_FABRICATION_INSTRUCTION);
    let result = tracer
        .step("generate", json!({ "endpoint": def.endpoint.id }))
        .record(
            ctx.generate::<T>(&def.endpoint, schema, &prompt, Some(&system))
                .await,
            |s| json!({ "model": s.model, "coerced": s.coerced }),
        );
    tracer.finish();

    let structured = result?;
    Ok(PipelineOutput {
        data: structured.data,
        metadata: OutputMetadata::new(&structured.model, def.prompt_version, tracer.id()),
    })
}

/// Wraps a list of user-supplied items as one bulleted block.
pub(crate) fn wrap_list(label: &str, items: &[String]) -> String {
    let lines: Vec<String> = items
        .iter()
        .map(|i| i.trim())
        .filter(|i| !i.is_empty())
        .map(|i| format!("- {i}"))
        .collect();
    if lines.is_empty() {
        wrap_user_content(label, "not specified")
    } else {
        wrap_user_content(label, &lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde::Deserialize;

    use crate::pipeline::testing::{test_context, FakeSearch, ScriptedLlm};

    const DEF: PipelineDef = PipelineDef {
        name: "test_pipeline",
        endpoint: EndpointSpec::new("test_pipeline", 512, 0.0),
        prompt_version: "test-v1",
        system: "You test things.",
    };

    #[derive(Debug, Deserialize)]
    struct Echo {
        text: String,
    }

    #[tokio::test]
    async fn test_run_single_call_stamps_metadata() {
        let llm = Arc::new(ScriptedLlm::new(|_, _| Ok(json!({"text": "hello"}))));
        let ctx = test_context(llm.clone(), Arc::new(FakeSearch::empty()));
        let schema = Schema::object().field("text", Schema::string());

        let output: PipelineOutput<Echo> =
            run_single_call(&ctx, &DEF, &schema, json!({}), "prompt".into())
                .await
                .unwrap();

        assert_eq!(output.data.text, "hello");
        assert_eq!(output.metadata.model_used, "primary");
        assert_eq!(output.metadata.prompt_version, "test-v1");
        assert!(output.metadata.source_count.is_none());
        assert_eq!(llm.calls()[0].prompt, "prompt");
    }

    #[test]
    fn test_wrap_list_skips_blank_items() {
        let wrapped = wrap_list("skills", &["Rust".into(), "  ".into(), " Go ".into()]);
        assert_eq!(wrapped, "<skills>\n- Rust\n- Go\n</skills>");
        assert_eq!(wrap_list("skills", &[]), "<skills>\nnot specified\n</skills>");
    }
}
