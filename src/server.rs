//! HTTP surface: `GET /answer?question=..` backed by a shared `QueryEngine`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::engine::{QueryEngine, MISSING_QUESTION};
use crate::error::QaError;

/// Builds the router; the engine is shared read-only across requests.
pub fn router(engine: Arc<QueryEngine>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/answer", get(answer_handler))
        .layer(CorsLayer::permissive())
        .with_state(engine)
}

/// Query string accepted by `/answer`.
#[derive(Debug, Deserialize)]
pub struct AnswerParams {
    /// Natural-language question.
    #[serde(default)]
    pub question: Option<String>,
}

/// JSON body returned for failed requests.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Error category, e.g. `input` or `remote_service`.
    pub kind: String,
    /// Human-readable detail.
    pub message: String,
}

/// Error response with a status chosen per failure category.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody {
                kind: "internal".into(),
                message: message.into(),
            },
        }
    }
}

/// HTTP status for each error category.
pub fn status_for(err: &QaError) -> StatusCode {
    match err {
        QaError::Input(_) => StatusCode::BAD_REQUEST,
        QaError::RemoteService(_) => StatusCode::BAD_GATEWAY,
        QaError::DimensionMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        QaError::Data(_) => StatusCode::INTERNAL_SERVER_ERROR,
        QaError::Tokenizer(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl From<QaError> for ApiError {
    fn from(err: QaError) -> Self {
        Self {
            status: status_for(&err),
            body: ErrorBody {
                kind: err.kind().to_string(),
                message: err.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn answer_handler(
    State(engine): State<Arc<QueryEngine>>,
    Query(params): Query<AnswerParams>,
) -> Result<String, ApiError> {
    let question = params.question.unwrap_or_default();
    if question.trim().is_empty() {
        return Err(QaError::Input(MISSING_QUESTION.into()).into());
    }
    tracing::info!(%question, "answering question");
    let result = tokio::task::spawn_blocking(move || engine.answer(&question))
        .await
        .map_err(|err| ApiError::internal(format!("answer task join error: {err}")))?;
    match result {
        Ok(answer) => Ok(answer.text),
        Err(err) => {
            tracing::warn!(kind = err.kind(), error = %err, "question failed");
            Err(err.into())
        }
    }
}
