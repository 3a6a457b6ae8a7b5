//! Client side of the backend token endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Credentials for one voice session. Tokens are short-lived; fetch a new one per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceToken {
    pub livekit_url: String,
    pub token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenSourceError {
    /// The backend answered with an error; `message` is its `error` field when present.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Anything that can hand out voice-session tokens.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<VoiceToken, TokenSourceError>;
}

/// Fetches tokens from the backend's `GET /api/voice-token`.
pub struct HttpTokenSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTokenSource {
    /// `base_url` is the backend origin, e.g. `http://localhost:3001`.
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/voice-token", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl TokenSource for HttpTokenSource {
    async fn fetch_token(&self) -> Result<VoiceToken, TokenSourceError> {
        debug!(endpoint = %self.endpoint, "Requesting voice token");
        let response = self.client.get(&self.endpoint).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| "Failed to get voice token".to_string());
            error!(status = status.as_u16(), message = %message, "Voice token request rejected");
            return Err(TokenSourceError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}
