//! Wire format of the data channel shared with the hosted agent.

use serde::Serialize;
use serde_json::{Map, Value};

/// The `type` value marking the vendor's action envelope.
pub const CLIENT_ACTION_TYPE: &str = "client_action";

/// Data channel topic that client actions are published on.
pub const CLIENT_ACTIONS_TOPIC: &str = "client_actions";

/// Outbound action tag carrying the intake profile.
pub const USER_PROFILE_ACTION: &str = "user_profile";

/// Outbound action tag sent when the patient opens a trial card.
pub const TRIAL_SELECTED_ACTION: &str = "trial_selected";

/// A message sent from the client to the agent.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub action: String,
    pub payload: Map<String, Value>,
}

impl OutboundMessage {
    pub fn client_action(action: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            kind: CLIENT_ACTION_TYPE,
            action: action.into(),
            payload,
        }
    }

    /// Serializes the message into the UTF-8 bytes published on the channel.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
