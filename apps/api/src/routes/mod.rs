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
        .route("/api/v1/jobs/extract", post(handlers::handle_extract_jobs))
        .route(
            "/api/v1/portfolio/query",
            post(handlers::handle_portfolio_query),
        )
        .route(
            "/api/v1/emails/generate",
            post(handlers::handle_generate_emails),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::generation::pipeline::tests::{pipeline_with, sample_portfolio, ScriptedModel};

    const TWO_POSTINGS: &str = r#"```json
[
  {"role": "Cloud Engineer", "experience": "2 years", "skills": ["Python", "AWS"], "description": "Cloud"},
  {"role": "iOS Developer", "experience": "3 years", "skills": ["Swift"], "description": "Apps"}
]
```"#;

    fn app(extraction_reply: &str) -> Router {
        let config = Config::from_lookup(|key| {
            (key == "GROQ_API_KEY").then(|| "test-key".to_string())
        })
        .unwrap();
        let pipeline = pipeline_with(ScriptedModel::new(extraction_reply), sample_portfolio());
        build_router(AppState {
            pipeline: Arc::new(pipeline),
            config,
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

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = app("[]")
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["llm_provider"], "groq");
        assert_eq!(body["index_backend"], "in_memory");
    }

    #[tokio::test]
    async fn generate_returns_one_result_per_posting_in_order() {
        let response = app(TWO_POSTINGS)
            .oneshot(post_json(
                "/api/v1/emails/generate",
                json!({"page_text": "<h2>Open roles</h2> Cloud Engineer. iOS Developer."}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["results"][0]["job"]["role"], "Cloud Engineer");
        assert_eq!(body["results"][1]["job"]["role"], "iOS Developer");
        assert!(body["results"][0]["email"]["body"]
            .as_str()
            .unwrap()
            .contains("https://example.com/proj1"));
        assert_eq!(body["results"][1]["links"][0], "https://example.com/ios");
    }

    #[tokio::test]
    async fn generate_with_no_postings_is_ok() {
        let response = app("[]")
            .oneshot(post_json(
                "/api/v1/emails/generate",
                json!({"page_text": "About us"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "no_postings");
    }

    #[tokio::test]
    async fn empty_page_text_is_rejected() {
        let response = app("[]")
            .oneshot(post_json("/api/v1/jobs/extract", json!({"page_text": "   "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"]["code"],
            "VALIDATION_ERROR"
        );
    }

    #[tokio::test]
    async fn unparseable_model_output_is_422_with_raw_text() {
        let response = app("Sorry, I can't help.")
            .oneshot(post_json(
                "/api/v1/jobs/extract",
                json!({"page_text": "Careers"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "EXTRACTION_PARSE_ERROR");
        assert_eq!(body["error"]["details"]["raw_output"], "Sorry, I can't help.");
    }

    #[tokio::test]
    async fn portfolio_query_respects_top_k() {
        let app = app("[]");

        // Load happens on the first pipeline run.
        let _ = app
            .clone()
            .oneshot(post_json(
                "/api/v1/emails/generate",
                json!({"page_text": "About us"}),
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(post_json(
                "/api/v1/portfolio/query",
                json!({"skills": ["Python", "AWS"], "top_k": 1}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["links"], json!(["https://example.com/proj1"]));
    }

    #[tokio::test]
    async fn portfolio_query_rejects_oversized_top_k() {
        let response = app("[]")
            .oneshot(post_json(
                "/api/v1/portfolio/query",
                json!({"skills": ["Python"], "top_k": u64::MAX}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"]["code"],
            "VALIDATION_ERROR"
        );
    }
}
