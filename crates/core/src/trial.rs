use serde::{Deserialize, Deserializer, Serialize};

/// Reads an explicit `null` as the type's default, same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Summary of a single clinical trial as listed by the agent.
///
/// Every field defaults when absent so that a loosely shaped agent payload
/// still yields something displayable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// The public ClinicalTrials.gov identifier (e.g. `NCT01234567`).
    #[serde(default, deserialize_with = "null_as_default")]
    pub nct_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub phase: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub locations: Vec<String>,
}

impl Trial {
    /// The status rendered as a CSS-friendly slug: lowercase with whitespace
    /// runs collapsed to `-` ("Not yet recruiting" -> "not-yet-recruiting").
    pub fn status_slug(&self) -> String {
        self.status
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
    }

    /// First location plus a count of the remaining ones, e.g. `Boston, MA +2 more`.
    pub fn location_summary(&self) -> Option<String> {
        let first = self.locations.first()?;
        match self.locations.len() {
            1 => Some(first.clone()),
            n => Some(format!("{} +{} more", first, n - 1)),
        }
    }
}

/// Contact details for a trial site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Contact {
    pub fn is_empty(&self) -> bool {
        [&self.name, &self.phone, &self.email]
            .iter()
            .all(|field| field.as_deref().is_none_or(str::is_empty))
    }
}

/// Full detail for a trial the agent chose to present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialDetail {
    #[serde(flatten)]
    pub trial: Trial,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eligibility: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sponsor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<String>,
}

impl TrialDetail {
    pub fn nct_id(&self) -> &str {
        &self.trial.nct_id
    }

    /// Contact details, only when at least one of them is filled in.
    pub fn visible_contact(&self) -> Option<&Contact> {
        self.contact.as_ref().filter(|c| !c.is_empty())
    }
}

/// A referral letter generated by the agent for the patient's oncologist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferralLetter {
    #[serde(default, deserialize_with = "null_as_default")]
    pub patient_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub trial_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub nct_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sponsor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria_met: Option<Vec<String>>,
    /// Raw HTML markup of the letter body, rendered as-is.
    #[serde(default, deserialize_with = "null_as_default")]
    pub letter_html: String,
}
