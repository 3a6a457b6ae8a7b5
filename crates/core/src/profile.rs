use serde::{Deserialize, Serialize};

/// The patient profile collected by the intake form.
///
/// It is sent to the agent once when the session connects. Field names on the
/// wire are camelCase and unset fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancer_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_treatments: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biomarkers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl UserProfile {
    /// True when no field is set, i.e. there is nothing worth telling the agent.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.cancer_type.is_none()
            && self.stage.is_none()
            && self.prior_treatments.is_none()
            && self.biomarkers.is_none()
            && self.location.is_none()
    }

    /// The profile as a JSON object, ready to be used as an outbound payload.
    pub fn to_payload(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}

/// One free-form fact about the patient learned during the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    pub key: String,
    pub value: String,
}

impl Criteria {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Inserts or replaces a criteria entry by key.
///
/// An existing entry keeps its position and takes the new value; a new key is
/// appended at the end.
pub fn upsert_criteria(criteria: &mut Vec<Criteria>, entry: Criteria) {
    match criteria.iter_mut().find(|c| c.key == entry.key) {
        Some(existing) => existing.value = entry.value,
        None => criteria.push(entry),
    }
}
