//! Presentation helpers for the profile sidebar and the referral letter.

use crate::dispatch::PanelState;
use crate::trial::ReferralLetter;
use regex::Regex;
use std::sync::LazyLock;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|h[1-6]|li|tr)>").expect("valid regex")
});
static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid regex"));

/// Human-readable label for a profile or criteria key.
///
/// Well-known keys have fixed labels; anything else is split on `_` and camel
/// case boundaries with the first letter capitalized.
pub fn format_label(key: &str) -> String {
    let known = match key {
        "cancerType" | "cancer_type" => Some("Cancer Type"),
        "stage" => Some("Stage"),
        "priorTreatments" | "prior_treatments" => Some("Prior Treatments"),
        "biomarkers" => Some("Biomarkers"),
        "location" => Some("Location"),
        "age" => Some("Age"),
        "gender" => Some("Gender"),
        "diagnosis" => Some("Diagnosis"),
        "treatment_history" => Some("Treatment History"),
        "current_medications" => Some("Current Medications"),
        "allergies" => Some("Allergies"),
        "ecog_status" => Some("ECOG Status"),
        "genetic_markers" => Some("Genetic Markers"),
        _ => None,
    };
    if let Some(label) = known {
        return label.to_string();
    }

    let spaced = CAMEL_BOUNDARY.replace_all(&key.replace('_', " "), "$1 $2").into_owned();
    let trimmed = spaced.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One line in the profile sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarItem {
    /// `None` for the location line, which shows only its value.
    pub label: Option<String>,
    pub value: String,
    /// True for facts added by the agent during the call.
    pub additional: bool,
}

impl SidebarItem {
    fn new(label: Option<&str>, value: String) -> Self {
        Self {
            label: label.map(str::to_string),
            value,
            additional: false,
        }
    }
}

/// Rows of the profile sidebar: intake fields first, then agent criteria in order.
pub fn sidebar_items(state: &PanelState) -> Vec<SidebarItem> {
    let profile = &state.profile;
    let joined = |items: &Option<Vec<String>>| {
        items
            .as_ref()
            .filter(|items| !items.is_empty())
            .map(|items| items.join(", "))
    };

    let mut rows = Vec::new();
    if let Some(location) = &profile.location {
        rows.push(SidebarItem::new(None, location.clone()));
    }
    if let Some(cancer) = &profile.cancer_type {
        rows.push(SidebarItem::new(Some("Cancer"), cancer.clone()));
    }
    if let Some(stage) = &profile.stage {
        rows.push(SidebarItem::new(Some("Stage"), stage.clone()));
    }
    if let Some(prior) = joined(&profile.prior_treatments) {
        rows.push(SidebarItem::new(Some("Prior"), prior));
    }
    if let Some(markers) = joined(&profile.biomarkers) {
        rows.push(SidebarItem::new(Some("Biomarkers"), markers));
    }
    rows.extend(state.criteria.iter().map(|c| SidebarItem {
        label: Some(format_label(&c.key)),
        value: c.value.clone(),
        additional: true,
    }));
    rows
}

/// The "~N trials" badge, when the agent reported a count.
pub fn match_count_label(state: &PanelState) -> Option<String> {
    state.match_count.map(|n| format!("~{} trials", n))
}

impl ReferralLetter {
    /// Name shown in the letter header.
    pub fn display_patient_name(&self) -> &str {
        if self.patient_name.is_empty() {
            "Patient"
        } else {
            &self.patient_name
        }
    }

    /// The letter body as plain text, for copying to the clipboard.
    pub fn plain_text(&self) -> String {
        let with_breaks = BLOCK_BREAK.replace_all(&self.letter_html, "\n");
        let stripped = TAG.replace_all(&with_breaks, "");
        let decoded = decode_entities(&stripped);

        decoded
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
