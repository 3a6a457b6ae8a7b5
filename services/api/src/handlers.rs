//! Axum Handlers for the REST API
//!
//! Uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    issuer::IssuerError,
    models::{ErrorResponse, HealthResponse, VoiceTokenResponse},
    state::AppState,
};

pub enum ApiError {
    NotConfigured,
    /// The token service refused; its status is forwarded.
    Upstream(StatusCode),
    InternalServerError(anyhow::Error),
}

impl ApiError {
    fn body(status: StatusCode, error: &str) -> Response {
        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
            }),
        )
            .into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotConfigured => {
                error!("VOCAL_BRIDGE_API_KEY is not set; cannot issue voice tokens");
                Self::body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "VOCAL_BRIDGE_API_KEY not configured",
                )
            }
            ApiError::Upstream(status) => {
                Self::body(status, "Failed to get token from Vocal Bridge")
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                Self::body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<IssuerError> for ApiError {
    fn from(err: IssuerError) -> Self {
        match err {
            IssuerError::NotConfigured => ApiError::NotConfigured,
            IssuerError::Upstream { status, .. } => ApiError::Upstream(
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            ),
            other => ApiError::InternalServerError(other.into()),
        }
    }
}

/// Issue a short-lived voice session token.
#[utoipa::path(
    get,
    path = "/api/voice-token",
    responses(
        (status = 200, description = "Token issued", body = VoiceTokenResponse),
        (status = 500, description = "Key not configured or internal error", body = ErrorResponse),
        (status = "4XX", description = "Token service rejected the request", body = ErrorResponse),
        (status = "5XX", description = "Token service failed", body = ErrorResponse)
    )
)]
pub async fn voice_token(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let token = state.issuer.issue_token().await.inspect_err(|e| {
        if !matches!(e, IssuerError::NotConfigured) {
            warn!(error = %e, "Voice token request failed");
        }
    })?;
    info!("Voice token issued");
    Ok(Json(token))
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
