//! The pre-connection intake form and its fixed option catalogs.

use crate::location::LocationError;
use crate::profile::UserProfile;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error for a value that is not part of a catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{value}' is not a valid {catalog}")]
pub struct UnknownOption {
    pub catalog: &'static str,
    pub value: String,
}

macro_rules! catalog {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            /// Every option, in display order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownOption;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownOption { catalog: $label, value: s.to_string() }),
                }
            }
        }
    };
}

catalog!(
    /// Primary cancer type.
    CancerType, "cancer type" {
        Lung => "Lung",
        Breast => "Breast",
        Colon => "Colon",
        Prostate => "Prostate",
        Pancreatic => "Pancreatic",
        Melanoma => "Melanoma",
        Other => "Other",
    }
);

catalog!(
    Stage, "stage" {
        One => "1",
        Two => "2",
        Three => "3",
        Four => "4",
        Unknown => "Unknown",
    }
);

catalog!(
    PriorTreatment, "prior treatment" {
        Chemotherapy => "Chemotherapy",
        Radiation => "Radiation",
        Surgery => "Surgery",
        Immunotherapy => "Immunotherapy",
        None => "None",
    }
);

catalog!(
    Biomarker, "biomarker" {
        EgfrPositive => "EGFR+",
        Brca => "BRCA",
        Alk => "ALK",
        PdL1 => "PD-L1",
        Unknown => "Unknown",
    }
);

/// Where the automatic location lookup stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LocationStatus {
    #[default]
    Detecting,
    Detected(String),
    Failed(String),
}

/// Selections made on the intake form before the call starts.
///
/// Single-choice fields clear when the current choice is picked again;
/// multi-choice fields toggle membership and keep the order of selection.
#[derive(Debug, Clone, Default)]
pub struct IntakeForm {
    name: String,
    cancer_type: Option<CancerType>,
    stage: Option<Stage>,
    prior_treatments: Vec<PriorTreatment>,
    biomarkers: Vec<Biomarker>,
    location: LocationStatus,
}

impl IntakeForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn select_cancer_type(&mut self, choice: CancerType) {
        toggle_single(&mut self.cancer_type, choice);
    }

    pub fn select_stage(&mut self, choice: Stage) {
        toggle_single(&mut self.stage, choice);
    }

    pub fn toggle_prior_treatment(&mut self, choice: PriorTreatment) {
        toggle_multi(&mut self.prior_treatments, choice);
    }

    pub fn toggle_biomarker(&mut self, choice: Biomarker) {
        toggle_multi(&mut self.biomarkers, choice);
    }

    /// Records the outcome of the location lookup. There is no manual entry.
    pub fn set_location_result(&mut self, result: Result<String, LocationError>) {
        self.location = match result {
            Ok(place) => LocationStatus::Detected(place),
            Err(e) => LocationStatus::Failed(e.to_string()),
        };
    }

    pub fn location_status(&self) -> &LocationStatus {
        &self.location
    }

    pub fn cancer_type(&self) -> Option<CancerType> {
        self.cancer_type
    }

    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    pub fn prior_treatments(&self) -> &[PriorTreatment] {
        &self.prior_treatments
    }

    pub fn biomarkers(&self) -> &[Biomarker] {
        &self.biomarkers
    }

    /// Builds the profile sent to the agent, leaving out anything not filled in.
    pub fn to_profile(&self) -> UserProfile {
        let name = self.name.trim();
        UserProfile {
            name: (!name.is_empty()).then(|| name.to_string()),
            cancer_type: self.cancer_type.map(|c| c.to_string()),
            stage: self.stage.map(|s| s.to_string()),
            prior_treatments: non_empty(&self.prior_treatments),
            biomarkers: non_empty(&self.biomarkers),
            location: match &self.location {
                LocationStatus::Detected(place) if !place.is_empty() => Some(place.clone()),
                _ => None,
            },
        }
    }
}

fn toggle_single<T: PartialEq>(slot: &mut Option<T>, choice: T) {
    if slot.as_ref() == Some(&choice) {
        *slot = None;
    } else {
        *slot = Some(choice);
    }
}

fn toggle_multi<T: PartialEq>(selected: &mut Vec<T>, choice: T) {
    if let Some(idx) = selected.iter().position(|s| *s == choice) {
        selected.remove(idx);
    } else {
        selected.push(choice);
    }
}

fn non_empty<T: fmt::Display>(items: &[T]) -> Option<Vec<String>> {
    (!items.is_empty()).then(|| items.iter().map(ToString::to_string).collect())
}
