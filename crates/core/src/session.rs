//! Voice Session Controller
//!
//! Owns one patient's voice session: fetching a token, connecting the
//! real-time transport, sending the intake profile, and feeding every inbound
//! data message through normalization into the panel state. The transport
//! itself (WebRTC room, audio devices) is external and reached through
//! [`RealtimeTransport`].

use crate::action::normalize_bytes;
use crate::dispatch::{Outcome, PanelState};
use crate::profile::UserProfile;
use crate::protocol::{
    CLIENT_ACTIONS_TOPIC, OutboundMessage, TRIAL_SELECTED_ACTION, USER_PROFILE_ACTION,
};
use crate::token::{TokenSource, TokenSourceError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

/// Grace period between connecting and sending the profile, giving the agent
/// time to join. There is no readiness handshake to wait on instead.
pub const PROFILE_SEND_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Events raised by the transport, delivered in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected { reason: Option<String> },
    DataReceived {
        payload: Vec<u8>,
        topic: Option<String>,
    },
    TrackSubscribed { sid: String, kind: TrackKind },
    TrackUnsubscribed { sid: String, kind: TrackKind },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("could not connect: {0}")]
    Connect(String),
    #[error("could not publish data: {0}")]
    Publish(String),
    #[error("microphone unavailable: {0}")]
    Microphone(String),
}

/// The real-time room the agent lives in.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Joins the room. Events for this connection arrive on the returned receiver.
    async fn connect(
        &self,
        url: &str,
        token: &str,
    ) -> Result<mpsc::Receiver<TransportEvent>, TransportError>;

    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), TransportError>;

    async fn publish_data(
        &self,
        payload: Vec<u8>,
        topic: &str,
        reliable: bool,
    ) -> Result<(), TransportError>;

    async fn disconnect(&self);
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    TokenRequest(#[from] TokenSourceError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("not connected")]
    NotConnected,
    #[error("could not encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Remote audio tracks currently attached for playback.
#[derive(Debug, Default)]
pub struct AudioAttachments {
    tracks: Vec<String>,
}

impl AudioAttachments {
    pub fn attach(&mut self, sid: &str) {
        if !self.tracks.iter().any(|t| t == sid) {
            self.tracks.push(sid.to_string());
        }
    }

    pub fn detach(&mut self, sid: &str) -> bool {
        let before = self.tracks.len();
        self.tracks.retain(|t| t != sid);
        self.tracks.len() != before
    }

    /// Detaches everything, returning how many tracks were released.
    pub fn release_all(&mut self) -> usize {
        std::mem::take(&mut self.tracks).len()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Patient-initiated commands for a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    SelectTrial(String),
    SendAction {
        action: String,
        payload: Map<String, Value>,
    },
    ToggleMic,
    DismissTrialDetail,
    DismissReferralLetter,
    Disconnect,
}

pub struct SessionController {
    transport: Arc<dyn RealtimeTransport>,
    tokens: Arc<dyn TokenSource>,
    profile_delay: Duration,
    status: ConnectionStatus,
    mic_enabled: bool,
    last_error: Option<String>,
    panel: PanelState,
    events: Option<mpsc::Receiver<TransportEvent>>,
    audio: AudioAttachments,
    pending_profile: Option<JoinHandle<()>>,
    session_id: Option<Uuid>,
}

impl SessionController {
    pub fn new(transport: Arc<dyn RealtimeTransport>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            transport,
            tokens,
            profile_delay: PROFILE_SEND_DELAY,
            status: ConnectionStatus::Disconnected,
            mic_enabled: false,
            last_error: None,
            panel: PanelState::default(),
            events: None,
            audio: AudioAttachments::default(),
            pending_profile: None,
            session_id: None,
        }
    }

    pub fn with_profile_delay(mut self, delay: Duration) -> Self {
        self.profile_delay = delay;
        self
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn is_mic_enabled(&self) -> bool {
        self.mic_enabled
    }

    /// The message of the last connection failure, cleared on the next attempt.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn panel(&self) -> &PanelState {
        &self.panel
    }

    pub fn audio(&self) -> &AudioAttachments {
        &self.audio
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Starts a session for `profile`.
    ///
    /// On failure the controller is back to `Disconnected` with
    /// [`last_error`](Self::last_error) set; nothing is retried.
    pub async fn connect(&mut self, profile: UserProfile) -> Result<(), SessionError> {
        if self.status != ConnectionStatus::Disconnected {
            warn!(status = ?self.status, "Connect requested while a session is active");
            return Ok(());
        }

        let session_id = Uuid::new_v4();
        self.session_id = Some(session_id);
        self.status = ConnectionStatus::Connecting;
        self.last_error = None;
        self.panel = PanelState::new(profile.clone());

        let span = info_span!("voice_session", %session_id);
        match self.establish(profile).instrument(span).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(%session_id, error = %e, "Voice agent connection failed");
                self.last_error = Some(e.to_string());
                if self.events.is_some() {
                    self.transport.disconnect().await;
                }
                self.end_session();
                Err(e)
            }
        }
    }

    async fn establish(&mut self, profile: UserProfile) -> Result<(), SessionError> {
        let token = self.tokens.fetch_token().await?;
        info!(url = %token.livekit_url, "Token received. Joining room...");

        let events = self
            .transport
            .connect(&token.livekit_url, &token.token)
            .await?;
        self.events = Some(events);
        self.status = ConnectionStatus::Connected;

        self.transport.set_microphone_enabled(true).await?;
        self.mic_enabled = true;
        info!("Connected with microphone enabled");

        if !profile.is_empty() {
            self.schedule_profile_send(&profile)?;
        }
        Ok(())
    }

    fn schedule_profile_send(&mut self, profile: &UserProfile) -> Result<(), SessionError> {
        let message =
            OutboundMessage::client_action(USER_PROFILE_ACTION, profile.to_payload()).encode()?;
        let transport = Arc::clone(&self.transport);
        let delay = self.profile_delay;

        let task = async move {
            tokio::time::sleep(delay).await;
            info!("Sending user profile to agent");
            if let Err(e) = transport
                .publish_data(message, CLIENT_ACTIONS_TOPIC, true)
                .await
            {
                warn!(error = %e, "Failed to send user profile");
            }
        };
        self.pending_profile = Some(tokio::spawn(task.in_current_span()));
        Ok(())
    }

    /// Waits for a scheduled profile send to finish, if one is pending.
    pub async fn profile_sent(&mut self) {
        if let Some(handle) = self.pending_profile.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Profile send task did not complete");
            }
        }
    }

    /// Ends the session. Calling it again, or before connecting, does nothing.
    pub async fn disconnect(&mut self) {
        if self.status == ConnectionStatus::Disconnected && self.events.is_none() {
            debug!("Disconnect requested with no active session");
            return;
        }
        self.transport.disconnect().await;
        self.end_session();
    }

    fn end_session(&mut self) {
        if let Some(handle) = self.pending_profile.take() {
            handle.abort();
        }
        self.events = None;
        let released = self.audio.release_all();
        self.status = ConnectionStatus::Disconnected;
        self.mic_enabled = false;
        self.panel = PanelState::default();
        info!(session_id = ?self.session_id, released_tracks = released, "Voice session ended");
    }

    /// Flips the microphone and returns the new state.
    pub async fn toggle_mic(&mut self) -> Result<bool, SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        let enabled = !self.mic_enabled;
        self.transport.set_microphone_enabled(enabled).await?;
        self.mic_enabled = enabled;
        debug!(enabled, "Microphone toggled");
        Ok(enabled)
    }

    /// Sends a client action to the agent. Without a connection this only logs a warning.
    pub async fn send_action_to_agent(
        &self,
        action: &str,
        payload: Map<String, Value>,
    ) -> Result<(), SessionError> {
        if !self.is_connected() {
            warn!(action, "Cannot send action: not connected");
            return Ok(());
        }
        let message = OutboundMessage::client_action(action, payload);
        info!(action, "Sending action to agent");
        self.transport
            .publish_data(message.encode()?, CLIENT_ACTIONS_TOPIC, true)
            .await?;
        Ok(())
    }

    /// Tells the agent the patient opened a trial.
    pub async fn select_trial(&self, nct_id: &str) -> Result<(), SessionError> {
        let mut payload = Map::new();
        payload.insert("nct_id".to_string(), Value::String(nct_id.to_string()));
        self.send_action_to_agent(TRIAL_SELECTED_ACTION, payload)
            .await
    }

    pub fn dismiss_trial_detail(&mut self) {
        self.panel.dismiss_trial_detail();
    }

    pub fn dismiss_referral_letter(&mut self) {
        self.panel.dismiss_referral_letter();
    }

    /// Waits for the next transport event. `None` once there is no live session.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.as_mut()?.recv().await
    }

    /// Applies one transport event. Returns the reducer outcome for data messages
    /// that carried an action.
    pub fn handle_event(&mut self, event: TransportEvent) -> Option<Outcome> {
        match event {
            TransportEvent::Connected => {
                self.status = ConnectionStatus::Connected;
                self.last_error = None;
                None
            }
            TransportEvent::Disconnected { reason } => {
                warn!(reason = ?reason, "Transport disconnected");
                self.end_session();
                None
            }
            TransportEvent::DataReceived { payload, topic } => {
                debug!(topic = ?topic, bytes = payload.len(), "Data received");
                match normalize_bytes(&payload) {
                    Ok(Some(action)) => Some(self.panel.apply(&action)),
                    Ok(None) => None,
                    Err(e) => {
                        warn!(error = %e, raw = %String::from_utf8_lossy(&payload), "Dropping agent message");
                        None
                    }
                }
            }
            TransportEvent::TrackSubscribed {
                sid,
                kind: TrackKind::Audio,
            } => {
                self.audio.attach(&sid);
                None
            }
            TransportEvent::TrackUnsubscribed {
                sid,
                kind: TrackKind::Audio,
            } => {
                self.audio.detach(&sid);
                None
            }
            TransportEvent::TrackSubscribed { .. } | TransportEvent::TrackUnsubscribed { .. } => {
                None
            }
        }
    }

    /// Drives the session until it ends, interleaving transport events with
    /// patient commands. Transport events are handled first when both are ready.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        let mut commands_open = true;
        while self.events.is_some() {
            tokio::select! {
                biased;
                event = self.next_event() => match event {
                    Some(event) => {
                        self.handle_event(event);
                    }
                    None => {
                        warn!("Transport event stream closed");
                        self.end_session();
                    }
                },
                command = commands.recv(), if commands_open => match command {
                    Some(command) => {
                        if let Err(e) = self.handle_command(command).await {
                            warn!(error = %e, "Session command failed");
                        }
                    }
                    None => commands_open = false,
                },
            }
        }
    }

    async fn handle_command(&mut self, command: SessionCommand) -> Result<(), SessionError> {
        match command {
            SessionCommand::SelectTrial(nct_id) => self.select_trial(&nct_id).await?,
            SessionCommand::SendAction { action, payload } => {
                self.send_action_to_agent(&action, payload).await?
            }
            SessionCommand::ToggleMic => {
                self.toggle_mic().await?;
            }
            SessionCommand::DismissTrialDetail => self.dismiss_trial_detail(),
            SessionCommand::DismissReferralLetter => self.dismiss_referral_letter(),
            SessionCommand::Disconnect => self.disconnect().await,
        }
        Ok(())
    }
}
