use axum::{
    extract::{Form, State},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vector_store::{run_search, SearchOutcome, VectorStore};

pub mod errors;
pub mod views;

use errors::{search_status, AppError};

/// Installs the global fmt subscriber. `RUST_LOG` wins when set, otherwise `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchForm {
    #[serde(default)]
    pub query_vector: String,
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn overview(State(store): State<Arc<VectorStore>>) -> Response {
    match store.list_overview().await {
        Ok(overview) => Html(views::render_overview(&overview)).into_response(),
        Err(e) => {
            error!("Failed to load overview: {:#}", e);
            AppError::from(e).into_html_response()
        }
    }
}

async fn search_page() -> Html<String> {
    Html(views::render_search_page("", &SearchOutcome::NoInput))
}

async fn search_submit(
    State(store): State<Arc<VectorStore>>,
    Form(form): Form<SearchForm>,
) -> Response {
    let outcome = run_search(&store, Some(&form.query_vector)).await;
    if let SearchOutcome::Results { results, .. } = &outcome {
        info!("Similarity search returned {} rows", results.len());
    }

    let status = search_status(&outcome);
    (
        status,
        Html(views::render_search_page(&form.query_vector, &outcome)),
    )
        .into_response()
}

async fn stats(State(store): State<Arc<VectorStore>>) -> Response {
    match store.stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            error!("Failed to compute stats: {:#}", e);
            AppError::from(e).into_json_response()
        }
    }
}

pub fn create_app(store: Arc<VectorStore>) -> Router {
    Router::new()
        .route("/", get(overview))
        .route("/search", get(search_page).post(search_submit))
        .route("/api/stats", get(stats))
        .route("/health", get(health))
        .with_state(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use demo_core::DatabaseConfig;
    use tower::ServiceExt;
    use vector_store::SchemaVariant;

    /// App whose store points at a closed port, so every database call fails.
    fn create_unreachable_app() -> Router {
        let database = DatabaseConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..DatabaseConfig::default()
        };
        create_app(Arc::new(VectorStore::new(database, SchemaVariant::Native)))
    }

    fn search_request(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/search")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn should_return_ok_for_health_endpoint() {
        let app = create_unreachable_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn should_return_404_for_unknown_endpoint() {
        let app = create_unreachable_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/unknown")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn should_render_empty_search_form_without_database() {
        let app = create_unreachable_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/search")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains(r#"<form method="post" action="/search">"#));
        assert!(!html.contains("class=\"error\""));
    }

    #[tokio::test]
    async fn should_show_dimension_message_for_short_vector() {
        let app = create_unreachable_app();

        let response = app
            .oneshot(search_request("query_vector=0.1%2C0.2"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Query vector must have exactly 3 dimensions."));
        assert!(!html.contains("Database error"));
    }

    #[tokio::test]
    async fn should_show_format_message_for_non_numeric_vector() {
        let app = create_unreachable_app();

        let response = app
            .oneshot(search_request("query_vector=a%2Cb%2Cc"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Invalid vector format"));
    }

    #[tokio::test]
    async fn should_prompt_for_vector_when_field_missing() {
        let app = create_unreachable_app();

        let response = app.oneshot(search_request("")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Please enter a query vector."));
    }

    #[tokio::test]
    async fn should_return_500_with_database_error_for_valid_vector() {
        let app = create_unreachable_app();

        let response = app
            .oneshot(search_request("query_vector=0.1+0.9+0.2"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let html = body_text(response).await;
        assert!(html.contains("Database error: "));
        assert!(html.contains(r#"value="0.1 0.9 0.2""#));
    }

    #[tokio::test]
    async fn should_return_json_error_when_stats_unavailable() {
        let app = create_unreachable_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"]
            .as_str()
            .unwrap()
            .contains("Failed to connect to PostgreSQL"));
    }

    #[tokio::test]
    async fn should_render_error_page_when_overview_unavailable() {
        let app = create_unreachable_app();

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let html = body_text(response).await;
        assert!(html.starts_with("<h1>Error</h1><p>"));
    }
}
