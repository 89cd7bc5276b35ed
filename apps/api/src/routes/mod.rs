pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::generation::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/diagnostics/calls",
            get(handlers::handle_recent_calls),
        )
        // Content generation
        .route(
            "/api/v1/job-descriptions",
            post(handlers::handle_job_description),
        )
        .route(
            "/api/v1/interview-plans",
            post(handlers::handle_interview_plan),
        )
        .route(
            "/api/v1/hiring-strategies",
            post(handlers::handle_hiring_strategy),
        )
        .route(
            "/api/v1/feedback-syntheses",
            post(handlers::handle_feedback_synthesis),
        )
        .route(
            "/api/v1/interview-coverage",
            post(handlers::handle_interview_coverage),
        )
        .route(
            "/api/v1/candidate-profiles",
            post(handlers::handle_candidate_profile),
        )
        // Market research (quick / deep)
        .route(
            "/api/v1/market-research",
            post(handlers::handle_market_research),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::cache::MemoryCacheStore;
    use crate::errors::AiError;
    use crate::pipeline::testing::{test_context, FakeSearch, ScriptedLlm};

    fn job_description_reply() -> Value {
        json!({
            "title": "Senior Backend Engineer",
            "summary": "Own the payments platform end to end with a small senior team.",
            "responsibilities": ["Design APIs", "Run on-call", "Mentor engineers", "Shape the roadmap"],
            "requirements": ["Rust or Go", "Distributed systems", "Postgres"],
            "nice_to_haves": [],
            "benefits": []
        })
    }

    fn app(llm: Arc<ScriptedLlm>) -> Router {
        let ctx = test_context(llm, Arc::new(FakeSearch::empty()));
        build_router(AppState {
            ctx: Arc::new(ctx),
            cache: Arc::new(MemoryCacheStore::new()),
        })
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_call_stats() {
        let response = app(Arc::new(ScriptedLlm::new(|_, _| Ok(json!({})))))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "hireflow");
        assert_eq!(body["calls"]["total_calls"], 0);
    }

    #[tokio::test]
    async fn test_job_description_round_trip() {
        let llm = Arc::new(ScriptedLlm::new(|_, _| Ok(job_description_reply())));
        let router = app(llm.clone());

        let response = router
            .clone()
            .oneshot(post_json(
                "/api/v1/job-descriptions",
                json!({"role": "Backend Engineer", "key_requirements": ["Rust"]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["data"]["title"], "Senior Backend Engineer");
        assert_eq!(body["metadata"]["model_used"], "primary");

        let calls = router
            .oneshot(Request::get("/api/v1/diagnostics/calls").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let entries = json_body(calls).await;
        assert_eq!(entries.as_array().map(Vec::len), Some(1));
        assert_eq!(entries[0]["endpoint"], "job_description");
    }

    #[tokio::test]
    async fn test_blank_role_is_rejected_before_model_call() {
        let llm = Arc::new(ScriptedLlm::new(|_, _| Ok(job_description_reply())));

        let response = app(llm.clone())
            .oneshot(post_json("/api/v1/job-descriptions", json!({"role": "   "})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(llm.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_feedback_is_rejected() {
        let llm = Arc::new(ScriptedLlm::new(|_, _| Ok(json!({}))));

        let response = app(llm)
            .oneshot(post_json(
                "/api/v1/feedback-syntheses",
                json!({"role": "Designer", "feedback": []}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_coverage_requires_stages() {
        let llm = Arc::new(ScriptedLlm::new(|_, _| Ok(json!({}))));

        let response = app(llm)
            .oneshot(post_json(
                "/api/v1/interview-coverage",
                json!({"role": "Designer", "competencies": ["Craft"], "stages": []}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unfixable_output_maps_to_422() {
        let llm = Arc::new(ScriptedLlm::new(|_, _| Ok(json!({"title": "Engineer"}))));

        let response = app(llm)
            .oneshot(post_json("/api/v1/job-descriptions", json!({"role": "Engineer"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "GENERATION_INVALID");
    }

    #[tokio::test]
    async fn test_missing_api_key_maps_to_500() {
        let llm = Arc::new(ScriptedLlm::new(|_, _| {
            Err(AiError::Config("ANTHROPIC_API_KEY is not set".into()))
        }));

        let response = app(llm)
            .oneshot(post_json("/api/v1/candidate-profiles", json!({"role": "Engineer"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "CONFIGURATION_ERROR");
    }

    #[tokio::test]
    async fn test_market_research_defaults_to_quick_and_caches() {
        let llm = Arc::new(ScriptedLlm::new(|_, _| {
            Ok(json!({
                "summary": "Registered nurses remain in short supply across the region.",
                "demand_level": "very_high",
                "key_skills": ["Triage", "Patient care", "Documentation"],
                "competitor_insights": [],
                "hiring_challenges": [],
                "recommendations": ["Offer flexible rosters"],
                "confidence": 0.5
            }))
        }));
        let router = app(llm.clone());

        for _ in 0..2 {
            let response = router
                .clone()
                .oneshot(post_json("/api/v1/market-research", json!({"role": "Nurse"})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = json_body(response).await;
            assert_eq!(body["data"]["phase"], "quick");
            assert_eq!(body["data"]["posting_count_source"], "estimated");
        }
        assert_eq!(llm.calls().len(), 1);
    }
}
