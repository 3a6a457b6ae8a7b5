//! Shared Application State

use crate::config::Config;
use crate::issuer::TokenIssuer;
use std::sync::Arc;

/// Created once at startup and shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub issuer: Arc<dyn TokenIssuer>,
    pub config: Arc<Config>,
}
