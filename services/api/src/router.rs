//! Axum Router Configuration
//!
//! The token endpoint, a health probe, OpenAPI documentation, and the built
//! web client served as static files with an `index.html` fallback.

use crate::{
    handlers,
    models::{ErrorResponse, HealthResponse, VoiceTokenResponse},
    state::AppState,
};

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::voice_token, handlers::health),
    components(schemas(VoiceTokenResponse, ErrorResponse, HealthResponse)),
    tags(
        (name = "TrialMatch API", description = "Voice session token proxy for the TrialMatch client")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let static_dir = app_state.config.static_dir.clone();
    let client = ServeDir::new(&static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    let api_router = Router::new()
        .route("/api/voice-token", get(handlers::voice_token))
        .route("/health", get(handlers::health))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
        .fallback_service(client)
}
