use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use code_exec::{
    encode, CodeExecutionService, CompileResponse, ErrorType, ExecutionRequest, ServiceConfig,
};
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::info;

/// Largest request body accepted by `/compile`.
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid request body: {0}")]
    InvalidRequest(String),
    #[error("Server error: {0}")]
    ServerError(String),
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match self {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = CompileResponse {
            result: None,
            error: Some(self.to_string()),
            execution_time_ms: None,
            memory_usage: None,
        };

        (status, Json(body)).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    service: Arc<CodeExecutionService>,
}

pub fn create_app(config: ServiceConfig) -> Router {
    let state = AppState {
        service: Arc::new(CodeExecutionService::new(config)),
    };

    let cors = CorsLayer::permissive();

    Router::new()
        .route("/health", get(health_check))
        .route("/compile", post(compile))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<(), ServerError> {
    info!("Starting code execution server on {}", addr);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::ServerError(e.to_string()))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| ServerError::ServerError(e.to_string()))?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn compile(
    State(state): State<AppState>,
    payload: Result<Json<ExecutionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CompileResponse>), ServerError> {
    let Json(request) = payload?;

    let outcome = state.service.execute(request).await;
    let status = match outcome.error_type {
        Some(ErrorType::ApiError) => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    };

    Ok((status, Json(encode(&outcome))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use serde_json::json;
    use tower::ServiceExt;

    async fn post_compile(body: String) -> (StatusCode, CompileResponse) {
        let app = create_app(ServiceConfig::default());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/compile")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_app(ServiceConfig::default());

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
    }

    #[tokio::test]
    async fn test_compile() {
        let code = "fn fibonacci(n) { if (n <= 1) { return n; } \
                    return fibonacci(n - 1) + fibonacci(n - 2); } println(fibonacci(10));";
        let (status, response) =
            post_compile(json!({ "code": code, "language": "custom" }).to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.result.as_deref(), Some("55\n"));
        assert_eq!(response.error, None);
        assert!(response.execution_time_ms.is_some());
    }

    #[tokio::test]
    async fn test_language_defaults_to_custom() {
        let (status, response) = post_compile(json!({ "code": "1 + 2" }).to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.result.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_user_errors_are_ok_responses() {
        let (status, response) =
            post_compile(json!({ "code": "println(1 / 0);", "language": "custom" }).to_string())
                .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.result, None);
        assert!(response.error.unwrap().contains("division by zero"));
    }

    #[tokio::test]
    async fn test_unsupported_language() {
        let (status, response) =
            post_compile(json!({ "code": "DISPLAY 'HI'.", "language": "cobol" }).to_string())
                .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response.error.as_deref(), Some("Unsupported language: cobol"));
        assert_eq!(response.execution_time_ms, None);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (status, response) = post_compile("{\"language\": \"custom\"}".to_string()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(response.error.is_some());
    }
}
