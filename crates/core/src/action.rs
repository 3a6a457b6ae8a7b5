//! Normalization of inbound data-channel messages into canonical agent actions.
//!
//! The agent speaks two dialects: the vendor envelope
//! `{ "type": "client_action", "action": ..., "payload": { ... } }` and a direct
//! `{ "action": ..., ...fields }` object. Both are resolved here, once, into an
//! [`AgentAction`]; nothing downstream looks at the raw shape again.

use crate::protocol::CLIENT_ACTION_TYPE;
use crate::trial::Trial;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Failure to decode an inbound message. Never surfaced to the patient.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("malformed agent message: {0}")]
    MalformedMessage(#[from] serde_json::Error),
}

/// The shape of a decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// The vendor envelope. `action` is `None` when missing or not a string.
    Wrapped {
        action: Option<String>,
        payload: Map<String, Value>,
    },
    /// A plain object carrying a non-empty string `action`.
    Direct(Map<String, Value>),
    /// Anything else: valid JSON that is not a command.
    Other(Value),
}

impl InboundMessage {
    /// Parses raw message text and classifies its shape.
    pub fn parse(text: &str) -> Result<Self, NormalizeError> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::classify(value))
    }

    fn classify(value: Value) -> Self {
        let Value::Object(mut object) = value else {
            return Self::Other(value);
        };

        if object.get("type").and_then(Value::as_str) == Some(CLIENT_ACTION_TYPE) {
            let action = match object.remove("action") {
                Some(Value::String(action)) => Some(action),
                _ => None,
            };
            let payload = match object.remove("payload") {
                Some(Value::Object(payload)) => payload,
                _ => Map::new(),
            };
            return Self::Wrapped { action, payload };
        }

        match object.get("action") {
            Some(Value::String(action)) if !action.is_empty() => Self::Direct(object),
            _ => Self::Other(Value::Object(object)),
        }
    }

    /// Resolves the message into a canonical action, if it is one.
    ///
    /// For the envelope, every payload key is lifted next to `action`; a payload
    /// key named `action` never replaces the envelope's tag.
    pub fn into_action(self) -> Option<AgentAction> {
        match self {
            Self::Wrapped {
                action: Some(action),
                mut payload,
            } if !action.is_empty() => {
                payload.remove("action");
                Some(AgentAction {
                    action,
                    fields: payload,
                })
            }
            Self::Wrapped { .. } | Self::Other(_) => None,
            Self::Direct(mut object) => match object.remove("action") {
                Some(Value::String(action)) => Some(AgentAction {
                    action,
                    fields: object,
                }),
                _ => None,
            },
        }
    }
}

/// The action tags the panel knows how to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    AddCriteria,
    ShowTrials,
    UpdateMatchCount,
    ClearTrials,
    ShowTrialDetails,
    ShowReferralLetter,
    Unknown,
}

impl ActionKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "add_criteria" => Self::AddCriteria,
            "show_trials" => Self::ShowTrials,
            "update_match_count" => Self::UpdateMatchCount,
            "clear_trials" => Self::ClearTrials,
            "show_trial_details" => Self::ShowTrialDetails,
            "show_referral_letter" => Self::ShowReferralLetter,
            _ => Self::Unknown,
        }
    }
}

/// A canonical command from the agent: a tag plus whatever fields came with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAction {
    pub action: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl AgentAction {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            fields: Map::new(),
        }
    }

    /// Adds a field; handy for building actions in code and tests.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn kind(&self) -> ActionKind {
        ActionKind::from_tag(&self.action)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    fn non_empty_str(&self, name: &str) -> Option<&str> {
        self.field(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// The nested `payload` object, when the agent sent one.
    pub fn payload(&self) -> Option<&Map<String, Value>> {
        self.field("payload").and_then(Value::as_object)
    }

    pub fn key(&self) -> Option<&str> {
        self.non_empty_str("key")
    }

    /// The criteria value as text. Numbers and booleans are rendered.
    pub fn value(&self) -> Option<String> {
        match self.field("value")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn nct_id(&self) -> Option<&str> {
        self.non_empty_str("nct_id")
    }

    pub fn letter_html(&self) -> Option<&str> {
        self.non_empty_str("letter_html")
    }

    /// The `trials` list, if present. Decoding can still fail on a bad shape.
    pub fn trials(&self) -> Option<serde_json::Result<Vec<Trial>>> {
        self.field("trials")
            .map(|raw| Vec::<Trial>::deserialize(raw))
    }

    /// The integral `payload.count`, if present.
    pub fn match_count(&self) -> Option<i64> {
        self.payload()?.get("count")?.as_i64()
    }

    /// Reads the whole action (tag and every field) as another type.
    pub fn reinterpret<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        let mut object = self.fields.clone();
        object.insert("action".to_string(), Value::String(self.action.clone()));
        serde_json::from_value(Value::Object(object))
    }
}

/// Decodes one data-channel message into an action.
///
/// Returns `Ok(None)` for well-formed messages that carry no command.
pub fn normalize(text: &str) -> Result<Option<AgentAction>, NormalizeError> {
    let message = InboundMessage::parse(text)?;
    let action = message.clone().into_action();
    match (&message, &action) {
        (InboundMessage::Wrapped { .. }, Some(action)) => {
            debug!(action = %action.action, "Converted vendor envelope into action")
        }
        (_, Some(action)) => debug!(action = %action.action, "Direct action received"),
        (_, None) => debug!(message = ?message, "Non-action message received"),
    }
    Ok(action)
}

/// Like [`normalize`] for raw channel bytes. Invalid UTF-8 is replaced, not rejected.
pub fn normalize_bytes(payload: &[u8]) -> Result<Option<AgentAction>, NormalizeError> {
    normalize(&String::from_utf8_lossy(payload))
}
