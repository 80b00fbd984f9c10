use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::SessionState;
use crate::errors::AppError;

pub const SESSION_COOKIE: &str = "resume_expert_session";

/// One browser session. `state` is held for the whole interaction, which
/// serialises actions within the session. `inflight` is kept outside it so a
/// cancel request can reach a running evaluation.
pub struct SessionHandle {
    pub state: Mutex<SessionState>,
    inflight: StdMutex<Option<Inflight>>,
    last_seen: StdMutex<Instant>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self {
            state: Mutex::default(),
            inflight: StdMutex::default(),
            last_seen: StdMutex::new(Instant::now()),
        }
    }
}

/// A registered evaluation. Unregisters itself when dropped, including when
/// the request that started it goes away mid-call.
pub struct EvaluationGuard<'a> {
    handle: &'a SessionHandle,
    id: Uuid,
    pub token: CancellationToken,
}

impl Drop for EvaluationGuard<'_> {
    fn drop(&mut self) {
        self.handle.finish_evaluation(self.id);
    }
}

#[derive(Debug, Clone)]
struct Inflight {
    id: Uuid,
    token: CancellationToken,
}

impl SessionHandle {
    fn inflight(&self) -> std::sync::MutexGuard<'_, Option<Inflight>> {
        self.inflight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a new evaluation so `cancel_inflight` can reach it.
    pub fn begin_evaluation(&self) -> EvaluationGuard<'_> {
        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        *self.inflight() = Some(Inflight {
            id,
            token: token.clone(),
        });
        EvaluationGuard {
            handle: self,
            id,
            token,
        }
    }

    fn finish_evaluation(&self, id: Uuid) {
        let mut inflight = self.inflight();
        if inflight.as_ref().map(|i| i.id == id).unwrap_or(false) {
            inflight.take();
        }
    }

    /// Cancels the running evaluation, if any. Returns whether one was running.
    pub fn cancel_inflight(&self) -> bool {
        match self.inflight().take() {
            Some(inflight) => {
                inflight.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_evaluating(&self) -> bool {
        self.inflight().is_some()
    }

    fn touch(&self) {
        *self
            .last_seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .elapsed()
    }
}

/// In-memory sessions keyed by the session cookie. A session ends once it has
/// been idle for longer than the configured timeout and the sweeper runs.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<SessionHandle>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the caller's session, creating an empty one for a missing or
    /// unknown id. The bool is true when a new session was created.
    pub async fn resolve(&self, id: Option<Uuid>) -> (Uuid, Arc<SessionHandle>, bool) {
        if let Some(id) = id {
            if let Some(handle) = self.sessions.read().await.get(&id) {
                debug!("Resumed session {id}");
                handle.touch();
                return (id, handle.clone(), false);
            }
        }

        let id = Uuid::new_v4();
        let handle = Arc::new(SessionHandle::default());
        self.sessions.write().await.insert(id, handle.clone());
        info!("Started session {id}");
        (id, handle, true)
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<SessionHandle>> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops every session idle for at least `max_idle`, together with its
    /// upload and results. Sessions still used by a request are kept.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| {
            Arc::strong_count(handle) > 1 || handle.is_evaluating() || handle.idle_for() < max_idle
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("Evicted {evicted} idle session(s), {} remaining", sessions.len());
        }
        evicted
    }

    /// Runs `evict_idle` every `every` until the runtime shuts down.
    pub fn spawn_sweeper(self: &Arc<Self>, max_idle: Duration, every: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                store.evict_idle(max_idle).await;
            }
        })
    }
}

/// Session id from the request's `Cookie` header, if present and well-formed.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

pub fn session_cookie(id: Uuid) -> Result<HeaderValue, AppError> {
    let cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
    HeaderValue::from_str(&cookie)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid session cookie: {e}")))
}
