//! Request context and session bookkeeping
//!
//! Every outgoing request carries an immutable [`RequestContext`]: which
//! API surface issued it, the session it belongs to, a fresh response
//! identifier, and the locale/orientation hints captured at request time.
//! The context travels with every suggestion and result it produced, so
//! a response can be correlated and replayed later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// The API surface a request originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiSurface {
    Suggest,
    ReverseGeocode,
    Category,
    Details,
    Retrieve,
}

impl ApiSurface {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Suggest => "suggest",
            Self::ReverseGeocode => "reverse_geocode",
            Self::Category => "category",
            Self::Details => "details",
            Self::Retrieve => "retrieve",
        }
    }
}

impl fmt::Display for ApiSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable token shared by a sequence of related suggest calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-response token for telemetry correlation, distinct from the
/// session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResponseId(pub String);

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of session and response identifiers.
///
/// Production uses [`UuidSource`]; tests fix both identifiers with
/// [`SequentialIdSource`] so request shape can be asserted without
/// wall-clock randomness.
pub trait IdSource: Send + Sync {
    fn session_id(&self) -> SessionId;
    fn response_id(&self) -> ResponseId;
}

/// Random v4 UUIDs.
pub struct UuidSource;

impl IdSource for UuidSource {
    fn session_id(&self) -> SessionId {
        SessionId(uuid::Uuid::new_v4().to_string())
    }

    fn response_id(&self) -> ResponseId {
        ResponseId(uuid::Uuid::new_v4().to_string())
    }
}

/// Deterministic counter-based identifiers.
pub struct SequentialIdSource {
    sessions: AtomicU64,
    responses: AtomicU64,
}

impl SequentialIdSource {
    pub fn new() -> Self {
        Self {
            sessions: AtomicU64::new(0),
            responses: AtomicU64::new(0),
        }
    }
}

impl Default for SequentialIdSource {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSource for SequentialIdSource {
    fn session_id(&self) -> SessionId {
        let n = self.sessions.fetch_add(1, Ordering::SeqCst);
        SessionId(format!("session-{n}"))
    }

    fn response_id(&self) -> ResponseId {
        let n = self.responses.fetch_add(1, Ordering::SeqCst);
        ResponseId(format!("response-{n}"))
    }
}

/// Device orientation hint captured at request time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenOrientation {
    Portrait,
    Landscape,
}

/// Immutable metadata attached to one outgoing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub api_surface: ApiSurface,
    pub session_id: SessionId,
    pub response_id: ResponseId,
    /// Wall-clock time the request was built, for debugging only.
    pub captured_at: DateTime<Utc>,
    pub locale: Option<String>,
    pub orientation: Option<ScreenOrientation>,
}

impl RequestContext {
    pub fn new(
        api_surface: ApiSurface,
        session_id: SessionId,
        response_id: ResponseId,
    ) -> Self {
        Self {
            api_surface,
            session_id,
            response_id,
            captured_at: Utc::now(),
            locale: None,
            orientation: None,
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_orientation(mut self, orientation: ScreenOrientation) -> Self {
        self.orientation = Some(orientation);
        self
    }
}

/// Tracks the session identifier across a logical search interaction.
///
/// The first suggest call creates the session; subsequent suggest calls
/// that refine the same query reuse it. Selection calls never mint a new
/// session; they carry the one from the suggest call that produced the
/// chosen suggestion.
pub struct SessionTracker {
    current: Mutex<Option<SessionId>>,
    ids: Arc<dyn IdSource>,
}

impl SessionTracker {
    pub fn new(ids: Arc<dyn IdSource>) -> Self {
        Self {
            current: Mutex::new(None),
            ids,
        }
    }

    /// The active session, created on first use.
    pub fn current_or_new(&self) -> SessionId {
        let mut current = self.current.lock().unwrap();
        match &*current {
            Some(session) => session.clone(),
            None => {
                let session = self.ids.session_id();
                debug!(session = %session, "started search session");
                *current = Some(session.clone());
                session
            }
        }
    }

    /// Start a fresh logical session and return its identifier.
    pub fn renew(&self) -> SessionId {
        let session = self.ids.session_id();
        debug!(session = %session, "renewed search session");
        *self.current.lock().unwrap() = Some(session.clone());
        session
    }
}
