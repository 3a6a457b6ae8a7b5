//! TrialMatch API Library Crate
//!
//! The token proxy behind the TrialMatch voice client: configuration, the
//! Vocal Bridge token issuer, HTTP handlers and routing. The `api` binary is a
//! thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod issuer;
pub mod models;
pub mod router;
pub mod state;
