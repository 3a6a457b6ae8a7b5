//! Vocal Bridge Token Issuer
//!
//! Exchanges the server-held API key for a short-lived voice session token.
//! The key never leaves this process; clients only see the issued token.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, error};

#[derive(Debug, thiserror::Error)]
pub enum IssuerError {
    #[error("VOCAL_BRIDGE_API_KEY not configured")]
    NotConfigured,
    /// The upstream answered with a non-success status.
    #[error("token service returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("token service unreachable: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("token service returned an unreadable body: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Issues voice session tokens. The returned JSON is passed to the client as is.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue_token(&self) -> Result<Value, IssuerError>;
}

pub struct VocalBridgeIssuer {
    client: reqwest::Client,
    api_key: Option<String>,
    token_url: String,
    participant_name: String,
}

impl VocalBridgeIssuer {
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        token_url: impl Into<String>,
        participant_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key,
            token_url: token_url.into(),
            participant_name: participant_name.into(),
        }
    }
}

#[async_trait]
impl TokenIssuer for VocalBridgeIssuer {
    async fn issue_token(&self) -> Result<Value, IssuerError> {
        let api_key = self.api_key.as_deref().ok_or(IssuerError::NotConfigured)?;

        debug!(url = %self.token_url, participant = %self.participant_name, "Requesting token from Vocal Bridge");
        let response = self
            .client
            .post(&self.token_url)
            .header("X-API-Key", api_key)
            .json(&json!({ "participant_name": self.participant_name }))
            .send()
            .await
            .map_err(IssuerError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "Vocal Bridge API error");
            return Err(IssuerError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        response.json::<Value>().await.map_err(IssuerError::Decode)
    }
}
