//! The panel reducer: applies canonical agent actions to the UI state.
//!
//! Applying an action never fails. When an action's precondition does not
//! hold the state is left untouched and the reason is reported in the
//! [`Outcome`].

use crate::action::{ActionKind, AgentAction};
use crate::profile::{Criteria, UserProfile, upsert_criteria};
use crate::trial::{ReferralLetter, Trial, TrialDetail};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Everything the panel shows for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PanelState {
    pub profile: UserProfile,
    /// Facts added by the agent, unique by key, in first-insertion order.
    pub criteria: Vec<Criteria>,
    pub trials: Vec<Trial>,
    pub match_count: Option<i64>,
    pub selected_detail: Option<TrialDetail>,
    pub referral_letter: Option<ReferralLetter>,
}

/// What applying an action did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied(ActionKind),
    /// A known tag whose precondition failed.
    Skipped {
        kind: ActionKind,
        reason: &'static str,
    },
    Unrecognized(String),
}

impl PanelState {
    pub fn new(profile: UserProfile) -> Self {
        Self {
            profile,
            ..Default::default()
        }
    }

    /// Applies one action in place.
    pub fn apply(&mut self, action: &AgentAction) -> Outcome {
        let kind = action.kind();
        let outcome = match kind {
            ActionKind::AddCriteria => self.add_criteria(action),
            ActionKind::ShowTrials => self.show_trials(action),
            ActionKind::UpdateMatchCount => match action.match_count() {
                Some(count) => {
                    self.match_count = Some(count);
                    Outcome::Applied(kind)
                }
                None => skipped(kind, "payload.count missing or not an integer"),
            },
            ActionKind::ClearTrials => {
                self.trials.clear();
                Outcome::Applied(kind)
            }
            ActionKind::ShowTrialDetails => self.show_trial_details(action),
            ActionKind::ShowReferralLetter => self.show_referral_letter(action),
            ActionKind::Unknown => Outcome::Unrecognized(action.action.clone()),
        };

        match &outcome {
            Outcome::Applied(kind) => info!(?kind, "Applied agent action"),
            Outcome::Skipped { kind, reason } => {
                debug!(?kind, reason, "Agent action skipped")
            }
            Outcome::Unrecognized(tag) => info!(tag = %tag, "Unknown agent action"),
        }
        outcome
    }

    fn add_criteria(&mut self, action: &AgentAction) -> Outcome {
        let kind = ActionKind::AddCriteria;
        match (action.key(), action.value()) {
            (Some(key), Some(value)) => {
                upsert_criteria(&mut self.criteria, Criteria::new(key, value));
                Outcome::Applied(kind)
            }
            _ => skipped(kind, "key or value missing"),
        }
    }

    fn show_trials(&mut self, action: &AgentAction) -> Outcome {
        let kind = ActionKind::ShowTrials;
        match action.trials() {
            Some(Ok(trials)) => {
                self.trials = trials;
                Outcome::Applied(kind)
            }
            Some(Err(e)) => {
                warn!(error = %e, "Could not decode trials");
                skipped(kind, "trials malformed")
            }
            None => skipped(kind, "trials missing"),
        }
    }

    fn show_trial_details(&mut self, action: &AgentAction) -> Outcome {
        let kind = ActionKind::ShowTrialDetails;
        if action.nct_id().is_none() {
            return skipped(kind, "nct_id missing");
        }
        match action.reinterpret::<TrialDetail>() {
            Ok(detail) => {
                self.selected_detail = Some(detail);
                Outcome::Applied(kind)
            }
            Err(e) => {
                warn!(error = %e, "Could not read trial detail");
                skipped(kind, "trial detail malformed")
            }
        }
    }

    fn show_referral_letter(&mut self, action: &AgentAction) -> Outcome {
        let kind = ActionKind::ShowReferralLetter;
        let letter = if let Some(payload) = action.payload() {
            serde_json::from_value::<ReferralLetter>(serde_json::Value::Object(payload.clone()))
        } else if action.letter_html().is_some() {
            action.reinterpret::<ReferralLetter>()
        } else {
            return skipped(kind, "payload and letter_html missing");
        };

        match letter {
            Ok(letter) => {
                self.referral_letter = Some(letter);
                Outcome::Applied(kind)
            }
            Err(e) => {
                warn!(error = %e, "Could not read referral letter");
                skipped(kind, "referral letter malformed")
            }
        }
    }

    /// Closes the trial detail modal.
    pub fn dismiss_trial_detail(&mut self) {
        self.selected_detail = None;
    }

    /// Closes the referral letter modal.
    pub fn dismiss_referral_letter(&mut self) {
        self.referral_letter = None;
    }
}

fn skipped(kind: ActionKind, reason: &'static str) -> Outcome {
    Outcome::Skipped { kind, reason }
}

/// Pure form of [`PanelState::apply`]: returns the next state, leaving the input alone.
pub fn reduce(state: &PanelState, action: &AgentAction) -> PanelState {
    let mut next = state.clone();
    next.apply(action);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::normalize;
    use serde_json::json;

    fn trial(nct_id: &str) -> Trial {
        Trial {
            nct_id: nct_id.to_string(),
            title: format!("Trial {nct_id}"),
            phase: "Phase 2".to_string(),
            status: "Recruiting".to_string(),
            locations: vec!["Boston, MA".to_string()],
        }
    }

    fn show_trials(trials: &[Trial]) -> AgentAction {
        AgentAction::new("show_trials").with("trials", serde_json::to_value(trials).unwrap())
    }

    fn add_criteria(key: &str, value: &str) -> AgentAction {
        AgentAction::new("add_criteria")
            .with("key", json!(key))
            .with("value", json!(value))
    }

    fn populated() -> PanelState {
        let mut state = PanelState::new(UserProfile {
            cancer_type: Some("Lung".to_string()),
            ..Default::default()
        });
        state.apply(&add_criteria("age", "70"));
        state.apply(&show_trials(&[trial("NCT1"), trial("NCT2")]));
        state
    }

    #[test]
    fn test_add_criteria_last_write_wins_in_place() {
        let mut state = PanelState::default();
        state.apply(&add_criteria("stage", "3"));
        state.apply(&add_criteria("age", "64"));
        let outcome = state.apply(&add_criteria("stage", "4"));

        assert_eq!(outcome, Outcome::Applied(ActionKind::AddCriteria));
        assert_eq!(
            state.criteria,
            vec![Criteria::new("stage", "4"), Criteria::new("age", "64")]
        );
    }

    #[test]
    fn test_add_criteria_requires_key_and_value() {
        let mut state = PanelState::default();
        let outcome = state.apply(&AgentAction::new("add_criteria").with("key", json!("stage")));
        assert!(matches!(outcome, Outcome::Skipped { .. }));
        state.apply(&add_criteria("", "4"));
        assert!(state.criteria.is_empty());
    }

    #[test]
    fn test_show_trials_replaces_and_is_idempotent() {
        let mut state = populated();
        state.apply(&show_trials(&[]));
        assert!(state.trials.is_empty());

        let once = state.clone();
        state.apply(&show_trials(&[]));
        assert_eq!(state, once);
    }

    #[test]
    fn test_show_trials_replaces_rather_than_merges() {
        let mut state = populated();
        state.apply(&show_trials(&[trial("NCT3")]));
        assert_eq!(state.trials, vec![trial("NCT3")]);
    }

    #[test]
    fn test_show_trials_malformed_is_noop() {
        let before = populated();
        let mut state = before.clone();
        let outcome = state.apply(&AgentAction::new("show_trials").with("trials", json!("nope")));
        assert!(matches!(outcome, Outcome::Skipped { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn test_clear_then_show() {
        let mut state = populated();
        state.apply(&AgentAction::new("clear_trials"));
        assert!(state.trials.is_empty());
        state.apply(&show_trials(&[trial("NCT7")]));
        assert_eq!(state.trials, vec![trial("NCT7")]);
    }

    #[test]
    fn test_update_match_count() {
        let mut state = PanelState::default();
        state.apply(&AgentAction::new("update_match_count").with("payload", json!({"count": 42})));
        assert_eq!(state.match_count, Some(42));

        state.apply(&AgentAction::new("update_match_count").with("payload", json!({"count": -3})));
        assert_eq!(state.match_count, Some(-3));
    }

    #[test]
    fn test_update_match_count_ignores_non_numeric() {
        let mut state = PanelState::default();
        state.apply(&AgentAction::new("update_match_count").with("payload", json!({"count": 5})));
        for bad in [json!({"count": "many"}), json!({"count": 2.5}), json!({})] {
            state.apply(&AgentAction::new("update_match_count").with("payload", bad));
        }
        state.apply(&AgentAction::new("update_match_count").with("count", json!(9)));
        assert_eq!(state.match_count, Some(5));
    }

    #[test]
    fn test_update_match_count_reads_nested_payload_only() {
        let mut state = PanelState::default();
        let direct = normalize(r#"{"action":"update_match_count","payload":{"count":42}}"#)
            .unwrap()
            .unwrap();
        state.apply(&direct);
        assert_eq!(state.match_count, Some(42));

        let flattened = normalize(
            r#"{"type":"client_action","action":"update_match_count","payload":{"count":7}}"#,
        )
        .unwrap()
        .unwrap();
        assert!(matches!(state.apply(&flattened), Outcome::Skipped { .. }));
        assert_eq!(state.match_count, Some(42));
    }

    #[test]
    fn test_show_trial_details_leaves_trials_alone() {
        let mut state = populated();
        let trials_before = state.trials.clone();
        let action = normalize(
            r#"{"action":"show_trial_details","nct_id":"NCT123","title":"Foo","sponsor":"Acme"}"#,
        )
        .unwrap()
        .unwrap();

        state.apply(&action);

        let detail = state.selected_detail.as_ref().unwrap();
        assert_eq!(detail.nct_id(), "NCT123");
        assert_eq!(detail.trial.title, "Foo");
        assert_eq!(detail.sponsor.as_deref(), Some("Acme"));
        assert_eq!(state.trials, trials_before);
    }

    #[test]
    fn test_show_trial_details_from_envelope() {
        let mut state = PanelState::default();
        let action = normalize(
            r#"{"type":"client_action","action":"show_trial_details","payload":{"nct_id":"NCT5","eligibility":["18+"],"contact":{"phone":"555"}}}"#,
        )
        .unwrap()
        .unwrap();
        state.apply(&action);

        let detail = state.selected_detail.unwrap();
        assert_eq!(detail.nct_id(), "NCT5");
        assert_eq!(detail.eligibility, Some(vec!["18+".to_string()]));
        assert_eq!(detail.contact.unwrap().phone.as_deref(), Some("555"));
    }

    #[test]
    fn test_null_fields_do_not_drop_agent_payloads() {
        let mut state = PanelState::default();
        let details = normalize(
            r#"{"action":"show_trial_details","nct_id":"NCT9","title":"Foo","phase":null,"status":null}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            state.apply(&details),
            Outcome::Applied(ActionKind::ShowTrialDetails)
        );
        assert_eq!(state.selected_detail.as_ref().unwrap().nct_id(), "NCT9");

        let trials = AgentAction::new("show_trials").with(
            "trials",
            json!([
                { "nct_id": "NCT1", "title": "A", "phase": "Phase 2", "status": "Recruiting" },
                { "nct_id": "NCT2", "title": "B", "phase": null, "status": "Recruiting" }
            ]),
        );
        state.apply(&trials);
        assert_eq!(state.trials.len(), 2);
        assert_eq!(state.trials[1].nct_id, "NCT2");

        let letter = AgentAction::new("show_referral_letter").with(
            "payload",
            json!({ "patient_name": null, "nct_id": "NCT1", "letter_html": "<p>Hi</p>" }),
        );
        state.apply(&letter);
        assert_eq!(state.referral_letter.unwrap().letter_html, "<p>Hi</p>");
    }

    #[test]
    fn test_show_trial_details_requires_nct_id() {
        let before = populated();
        let mut state = before.clone();
        state.apply(&AgentAction::new("show_trial_details").with("title", json!("Foo")));
        assert_eq!(state, before);
    }

    #[test]
    fn test_referral_letter_prefers_payload() {
        let mut state = PanelState::default();
        let action = AgentAction::new("show_referral_letter")
            .with("letter_html", json!("<p>outer</p>"))
            .with(
                "payload",
                json!({"patient_name": "Ada", "nct_id": "NCT1", "trial_name": "T", "letter_html": "<p>inner</p>"}),
            );
        state.apply(&action);

        let letter = state.referral_letter.unwrap();
        assert_eq!(letter.patient_name, "Ada");
        assert_eq!(letter.letter_html, "<p>inner</p>");
    }

    #[test]
    fn test_referral_letter_from_spread_fields() {
        let mut state = PanelState::default();
        let action = normalize(
            r#"{"type":"client_action","action":"show_referral_letter","payload":{"patient_name":"Ada","nct_id":"NCT1","trial_name":"T","letter_html":"<p>Dear Dr.</p>","criteria_met":["Stage 3"]}}"#,
        )
        .unwrap()
        .unwrap();
        state.apply(&action);

        let letter = state.referral_letter.unwrap();
        assert_eq!(letter.nct_id, "NCT1");
        assert_eq!(letter.criteria_met, Some(vec!["Stage 3".to_string()]));
    }

    #[test]
    fn test_referral_letter_without_content_is_noop() {
        let mut state = PanelState::default();
        let outcome = state.apply(&AgentAction::new("show_referral_letter").with("nct_id", json!("NCT1")));
        assert!(matches!(outcome, Outcome::Skipped { .. }));
        assert_eq!(state.referral_letter, None);
    }

    #[test]
    fn test_unknown_tag_leaves_state_unchanged() {
        let before = populated();
        let after = reduce(&before, &AgentAction::new("noop_tag"));
        assert_eq!(after, before);

        let mut state = before.clone();
        assert_eq!(
            state.apply(&AgentAction::new("noop_tag")),
            Outcome::Unrecognized("noop_tag".to_string())
        );
    }

    #[test]
    fn test_reduce_does_not_touch_input() {
        let before = PanelState::default();
        let after = reduce(&before, &add_criteria("age", "50"));
        assert!(before.criteria.is_empty());
        assert_eq!(after.criteria.len(), 1);
    }

    #[test]
    fn test_dismissal_then_new_detail_wins() {
        let mut state = PanelState::default();
        let detail = AgentAction::new("show_trial_details").with("nct_id", json!("NCT1"));
        state.apply(&detail);
        state.dismiss_trial_detail();
        assert_eq!(state.selected_detail, None);
        state.apply(&detail);
        assert!(state.selected_detail.is_some());

        state.apply(&AgentAction::new("show_referral_letter").with("letter_html", json!("<p/>")));
        state.dismiss_referral_letter();
        assert_eq!(state.referral_letter, None);
    }
}
