//! Result type definitions

use crate::context::RequestContext;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A WGS84 coordinate, longitude first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
}

impl Point {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Structured address components. All optional: the backend fills in
/// whatever it knows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub house_number: Option<String>,
    pub street: Option<String>,
    pub neighborhood: Option<String>,
    pub place: Option<String>,
    pub region: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
}

/// How a suggestion is materialized into a full [`SearchResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SuggestAction {
    /// The suggestion already carries everything a result needs; select
    /// is a pure local transform with no second round trip.
    Resolved,
    /// Resolving requires a second call to the core search engine.
    Retrieve {
        /// Action token / endpoint path to retrieve against.
        endpoint: String,
        /// Whether the same token may be used to resolve this suggestion
        /// more than once within a single batch.
        multi_retrievable: bool,
    },
}

/// A lightweight, possibly-unresolved candidate returned from a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub name: String,
    pub coordinate: Option<Point>,
    pub address: Option<Address>,
    pub categories: Vec<String>,
    /// Straight-line distance from the request proximity, when known.
    pub distance_meters: Option<f64>,
    pub action: SuggestAction,
    /// Context of the suggest call that produced this suggestion. Its
    /// session identifier travels into any follow-up selection.
    pub context: RequestContext,
}

impl Suggestion {
    /// Whether selecting this suggestion needs a second round trip.
    pub fn requires_retrieval(&self) -> bool {
        matches!(self.action, SuggestAction::Retrieve { .. })
    }
}

/// A fully resolved entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub name: String,
    pub coordinate: Point,
    pub address: Option<Address>,
    pub categories: Vec<String>,
    /// Context of the request that produced this result.
    pub context: RequestContext,
    /// Raw core-engine response snapshot, kept for reproducibility and
    /// debugging, never mutated.
    pub snapshot: serde_json::Value,
}

/// Pairs a payload with the request context that produced it and a flag
/// stating whether replaying the identical request is guaranteed to
/// reproduce the identical payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
    pub payload: T,
    pub context: RequestContext,
    /// False when the backend mixed in non-deterministic ranking inputs
    /// such as ambient location at call time.
    pub is_reproducible: bool,
}

impl<T> ResponseEnvelope<T> {
    pub fn new(payload: T, context: RequestContext, is_reproducible: bool) -> Self {
        Self {
            payload,
            context,
            is_reproducible,
        }
    }
}

/// Error taxonomy for failed operations.
///
/// Cancellation is deliberately absent: a cancelled task delivers no
/// callback at all. A failed task still terminates as done, never
/// cancelled, so cleanup keyed on terminality behaves uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// The call never reached the backend.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The backend was reached but returned a failure status.
    #[error("backend returned status {status}: {message}")]
    Backend { status: u16, message: String },
    /// A non-multi-retrievable action token was used twice in one batch.
    #[error("retrieve action for suggestion '{0}' already used in this batch")]
    ActionReuse(String),
    /// A batched selection exceeded the configured size cap.
    #[error("batch of {requested} suggestions exceeds the configured limit of {limit}")]
    BatchLimit { limit: usize, requested: usize },
    /// The suggestion could not be materialized into a result.
    #[error("suggestion '{0}' could not be resolved into a result")]
    Unresolvable(String),
}

impl SearchError {
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    /// Backend failure in the 4xx range.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Backend { status, .. } if (400..500).contains(status))
    }

    /// Backend failure in the 5xx range.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Backend { status, .. } if *status >= 500)
    }
}

/// Aggregate outcome of a batched selection: per-item isolation, one
/// failing member never fails the others.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub results: Vec<SearchResult>,
    pub failures: Vec<(Suggestion, SearchError)>,
}

impl BatchOutcome {
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_split_by_status_class() {
        let client = SearchError::backend(404, "not found");
        let server = SearchError::backend(503, "unavailable");
        let transport = SearchError::Transport("connection refused".into());

        assert!(client.is_client_error());
        assert!(!client.is_server_error());
        assert!(server.is_server_error());
        assert!(!server.is_client_error());
        assert!(!transport.is_client_error());
        assert!(!transport.is_server_error());
    }

    #[test]
    fn retrieve_actions_require_a_round_trip() {
        let context = crate::context::RequestContext::new(
            crate::context::ApiSurface::Suggest,
            crate::context::SessionId("s".into()),
            crate::context::ResponseId("r".into()),
        );

        let resolved = Suggestion {
            id: "a".into(),
            name: "Cafe".into(),
            coordinate: Some(Point::new(13.4, 52.5)),
            address: None,
            categories: vec![],
            distance_meters: None,
            action: SuggestAction::Resolved,
            context: context.clone(),
        };
        let two_step = Suggestion {
            action: SuggestAction::Retrieve {
                endpoint: "retrieve/42".into(),
                multi_retrievable: false,
            },
            ..resolved.clone()
        };

        assert!(!resolved.requires_retrieval());
        assert!(two_step.requires_retrieval());
    }

    #[test]
    fn suggest_action_serializes_tagged() {
        let action = SuggestAction::Retrieve {
            endpoint: "retrieve/42".into(),
            multi_retrievable: true,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"], "retrieve");
        assert_eq!(json["endpoint"], "retrieve/42");
    }
}
