use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;
use vector_store::{SearchOutcome, VectorError};

use crate::views::render_error_page;

/// Boundary errors. Handlers convert store results into this and pick the
/// HTML or JSON rendering; the store itself knows nothing about HTTP.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Returns the appropriate HTTP status code for this error
    pub fn http_status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) => 400,
            AppError::Storage(_) => 500,
            AppError::Config(_) => 500,
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn into_html_response(self) -> Response {
        (self.status(), Html(render_error_page(&self.to_string()))).into_response()
    }

    pub fn into_json_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Storage(format!("{:#}", e))
    }
}

impl From<VectorError> for AppError {
    fn from(e: VectorError) -> Self {
        AppError::Validation(e.to_string())
    }
}

/// Status for a rendered search page. Validation problems are shown inline
/// on a normal page; only storage failures turn the response into a 500.
pub fn search_status(outcome: &SearchOutcome) -> StatusCode {
    match outcome {
        SearchOutcome::QueryError(message) => AppError::Storage(message.clone()).status(),
        SearchOutcome::NoInput
        | SearchOutcome::ValidationError(_)
        | SearchOutcome::Results { .. } => StatusCode::OK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vector_store::EmbeddingVector;

    #[test]
    fn should_return_correct_http_status_codes() {
        assert_eq!(
            AppError::Validation("test".to_string()).http_status_code(),
            400
        );
        assert_eq!(AppError::Storage("test".to_string()).http_status_code(), 500);
        assert_eq!(AppError::Config("test".to_string()).http_status_code(), 500);
    }

    #[test]
    fn should_convert_anyhow_chain_into_storage_error() {
        let error = anyhow::anyhow!("connection refused").context("Failed to connect to PostgreSQL");

        let app_error = AppError::from(error);

        assert!(matches!(app_error, AppError::Storage(_)));
        assert_eq!(
            app_error.to_string(),
            "Failed to connect to PostgreSQL: connection refused"
        );
    }

    #[test]
    fn should_convert_vector_error_into_validation_error() {
        let app_error = AppError::from(VectorError::Empty);

        assert_eq!(app_error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(app_error.to_string(), "Please enter a query vector.");
    }

    #[test]
    fn should_map_search_outcomes_to_status() {
        assert_eq!(search_status(&SearchOutcome::NoInput), StatusCode::OK);
        assert_eq!(
            search_status(&SearchOutcome::ValidationError(VectorError::Empty)),
            StatusCode::OK
        );
        assert_eq!(
            search_status(&SearchOutcome::Results {
                query: EmbeddingVector::new([0.1, 0.2, 0.3]),
                results: Vec::new(),
            }),
            StatusCode::OK
        );
        assert_eq!(
            search_status(&SearchOutcome::QueryError("boom".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn should_render_json_error_body() {
        let response = AppError::Storage("database unavailable".to_string()).into_json_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "database unavailable");
    }
}
