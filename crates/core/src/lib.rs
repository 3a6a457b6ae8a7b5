//! TrialMatch Core
//!
//! Client-side logic for a voice session with the hosted trial-search agent:
//! decoding agent messages, reducing them into panel state, driving the
//! session over a real-time transport, and collecting the intake profile.

pub mod action;
pub mod dispatch;
pub mod intake;
pub mod location;
pub mod profile;
pub mod protocol;
pub mod session;
pub mod token;
pub mod trial;
pub mod view;

pub use action::{AgentAction, normalize};
pub use dispatch::{PanelState, reduce};
pub use profile::{Criteria, UserProfile};
pub use session::{SessionController, SessionError};
pub use trial::{ReferralLetter, Trial, TrialDetail};
