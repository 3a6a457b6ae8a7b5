//! API Models
//!
//! Response bodies of the token proxy, documented for OpenAPI with `utoipa`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Credentials for one voice session. Extra upstream fields are passed through untouched.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct VoiceTokenResponse {
    #[schema(example = "wss://rooms.vocalbridgeai.com")]
    pub livekit_url: String,
    pub token: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    #[schema(example = "VOCAL_BRIDGE_API_KEY not configured")]
    pub error: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
}
