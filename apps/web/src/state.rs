use std::sync::Arc;

use crate::config::Config;
use crate::session::{SessionController, SessionStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Per-browser sessions. Never shared between users.
    pub sessions: Arc<SessionStore>,
    /// Preprocessor, evaluator and speech renderer wired together.
    pub controller: Arc<SessionController>,
    pub config: Config,
}
