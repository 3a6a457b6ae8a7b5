//! Client and proxy together: the session controller fetches its token from a
//! running API instance, which in turn calls a mocked Vocal Bridge.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Level;
use trialmatch_api::{
    config::Config, issuer::VocalBridgeIssuer, router::create_router, state::AppState,
};
use trialmatch_core::session::{
    ConnectionStatus, RealtimeTransport, TransportError, TransportEvent,
};
use trialmatch_core::token::HttpTokenSource;
use trialmatch_core::{SessionController, SessionError, UserProfile};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingTransport {
    joined: Mutex<Option<(String, String)>>,
    published: Mutex<Vec<Value>>,
    inbound: Mutex<Option<mpsc::Sender<TransportEvent>>>,
}

impl RecordingTransport {
    async fn agent_says(&self, message: Value) {
        let sender = self.inbound.lock().unwrap().clone().unwrap();
        sender
            .send(TransportEvent::DataReceived {
                payload: serde_json::to_vec(&message).unwrap(),
                topic: Some("client_actions".to_string()),
            })
            .await
            .unwrap();
    }
}

#[async_trait]
impl RealtimeTransport for RecordingTransport {
    async fn connect(
        &self,
        url: &str,
        token: &str,
    ) -> Result<mpsc::Receiver<TransportEvent>, TransportError> {
        let (tx, rx) = mpsc::channel(8);
        *self.inbound.lock().unwrap() = Some(tx);
        *self.joined.lock().unwrap() = Some((url.to_string(), token.to_string()));
        Ok(rx)
    }

    async fn set_microphone_enabled(&self, _enabled: bool) -> Result<(), TransportError> {
        Ok(())
    }

    async fn publish_data(
        &self,
        payload: Vec<u8>,
        _topic: &str,
        _reliable: bool,
    ) -> Result<(), TransportError> {
        self.published
            .lock()
            .unwrap()
            .push(serde_json::from_slice(&payload).unwrap());
        Ok(())
    }

    async fn disconnect(&self) {}
}

async fn spawn_api(upstream: &MockServer, api_key: Option<&str>) -> String {
    let config = Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        vocal_bridge_api_key: api_key.map(str::to_string),
        token_url: format!("{}/api/v1/token", upstream.uri()),
        participant_name: "User".to_string(),
        static_dir: PathBuf::from("./client/dist"),
        log_level: Level::INFO,
    };
    let issuer = Arc::new(VocalBridgeIssuer::new(
        reqwest::Client::new(),
        config.vocal_bridge_api_key.clone(),
        config.token_url.clone(),
        config.participant_name.clone(),
    ));
    let app = create_router(Arc::new(AppState {
        issuer,
        config: Arc::new(config),
    }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_session_connects_with_proxied_token_and_applies_agent_actions() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/token"))
        .and(header("X-API-Key", "vb-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "livekit_url": "wss://rooms.example.com",
            "token": "session-jwt"
        })))
        .expect(1)
        .mount(&upstream)
        .await;
    let base_url = spawn_api(&upstream, Some("vb-key")).await;

    let transport = Arc::new(RecordingTransport::default());
    let tokens = Arc::new(HttpTokenSource::new(reqwest::Client::new(), &base_url));
    let mut controller = SessionController::new(transport.clone(), tokens)
        .with_profile_delay(Duration::from_millis(10));

    let profile = UserProfile {
        cancer_type: Some("Lung".to_string()),
        stage: Some("3".to_string()),
        ..Default::default()
    };
    controller.connect(profile).await.unwrap();
    assert_eq!(controller.status(), ConnectionStatus::Connected);
    assert_eq!(
        *transport.joined.lock().unwrap(),
        Some(("wss://rooms.example.com".to_string(), "session-jwt".to_string()))
    );

    controller.profile_sent().await;
    let published = transport.published.lock().unwrap().clone();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0]["action"], "user_profile");
    assert_eq!(published[0]["payload"]["cancerType"], "Lung");

    transport
        .agent_says(json!({
            "action": "update_match_count",
            "payload": { "count": 42 }
        }))
        .await;
    transport
        .agent_says(json!({ "action": "add_criteria", "key": "ecog_status", "value": "1" }))
        .await;

    for _ in 0..2 {
        let event = controller.next_event().await.unwrap();
        controller.handle_event(event);
    }
    assert_eq!(controller.panel().match_count, Some(42));
    assert_eq!(controller.panel().criteria.len(), 1);
    assert_eq!(controller.panel().criteria[0].key, "ecog_status");

    controller.disconnect().await;
    assert_eq!(controller.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_missing_api_key_surfaces_as_session_error() {
    let upstream = MockServer::start().await;
    let base_url = spawn_api(&upstream, None).await;

    let transport = Arc::new(RecordingTransport::default());
    let tokens = Arc::new(HttpTokenSource::new(reqwest::Client::new(), &base_url));
    let mut controller = SessionController::new(transport.clone(), tokens);

    let err = controller.connect(UserProfile::default()).await.unwrap_err();
    assert!(matches!(err, SessionError::TokenRequest(_)));
    assert_eq!(controller.status(), ConnectionStatus::Disconnected);
    assert_eq!(
        controller.last_error(),
        Some("VOCAL_BRIDGE_API_KEY not configured")
    );
    assert!(transport.joined.lock().unwrap().is_none());
}
