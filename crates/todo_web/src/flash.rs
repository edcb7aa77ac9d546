//! One-shot messages for the client whose request produced them.
//!
//! Each browser gets a random session id in the `todo_session` cookie.
//! Messages are queued under that id and handed out by the next page the
//! same browser renders.

use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderValue;
use axum::response::{IntoResponseParts, ResponseParts};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::convert::Infallible;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "todo_session";

/// Per-session queue length; older messages are dropped first.
pub const MAX_PENDING_PER_SESSION: usize = 16;
/// Sessions with undelivered messages; the least recently used one is evicted.
pub const MAX_SESSIONS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashLevel {
    Success,
    Info,
    Warning,
    Danger,
}

impl FlashLevel {
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub level: &'static str,
    pub message: String,
}

/// The caller's session id. New ids are sent back as a cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashSession {
    id: Uuid,
    fresh: bool,
}

impl FlashSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            fresh: true,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn from_cookie_header(header: &str) -> Option<Self> {
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
            .map(|id| Self { id, fresh: false })
    }

    fn cookie(&self) -> String {
        format!("{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax", self.id)
    }
}

impl Default for FlashSession {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> FromRequestParts<S> for FlashSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(Self::from_cookie_header)
            .unwrap_or_default())
    }
}

impl IntoResponseParts for FlashSession {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if self.fresh
            && let Ok(value) = HeaderValue::from_str(&self.cookie())
        {
            res.headers_mut().insert(SET_COOKIE, value);
        }
        Ok(res)
    }
}

#[derive(Debug, Default)]
struct Pending {
    last_used: u64,
    flashes: Vec<Flash>,
}

#[derive(Debug, Default)]
struct Sessions {
    clock: u64,
    pending: HashMap<Uuid, Pending>,
}

/// Undelivered messages keyed by session. Only sessions with something
/// waiting are kept.
#[derive(Debug, Default)]
pub struct FlashStore {
    sessions: Mutex<Sessions>,
}

impl FlashStore {
    pub fn push<M: Into<String>>(&self, session: &FlashSession, level: FlashLevel, message: M) {
        let mut sessions = self.sessions.lock();
        sessions.clock += 1;
        let now = sessions.clock;

        if !sessions.pending.contains_key(&session.id) && sessions.pending.len() >= MAX_SESSIONS {
            let oldest = sessions
                .pending
                .iter()
                .min_by_key(|(_, pending)| pending.last_used)
                .map(|(id, _)| *id);
            if let Some(id) = oldest {
                sessions.pending.remove(&id);
                tracing::debug!(session = %id, "evicted undelivered flash messages");
            }
        }

        let pending = sessions.pending.entry(session.id).or_default();
        pending.last_used = now;
        pending.flashes.push(Flash {
            level: level.css_class(),
            message: message.into(),
        });
        if pending.flashes.len() > MAX_PENDING_PER_SESSION {
            let excess = pending.flashes.len() - MAX_PENDING_PER_SESSION;
            pending.flashes.drain(..excess);
        }
    }

    pub fn take(&self, session: &FlashSession) -> Vec<Flash> {
        self.sessions
            .lock()
            .pending
            .remove(&session.id)
            .map(|pending| pending.flashes)
            .unwrap_or_default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().pending.len()
    }
}
