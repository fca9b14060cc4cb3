//! Core search engine boundary
//!
//! The ranking/matching engine is an external collaborator reached over
//! an RPC-like boundary. This module defines the callback contract the
//! orchestration layer programs against: submit a search or retrieve
//! request, get back a cancellable [`RequestHandle`], and receive exactly
//! one callback with a raw payload or a tagged error. [`remote`] ships
//! the HTTP-backed production implementation.

use crate::context::RequestContext;
use crate::results::{Address, Point, SearchError};
use crate::task::Cancellable;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod remote;

pub use remote::RemoteSearchCore;

/// Completion callback for a core request. Invoked at most once; never
/// invoked after the request handle was cancelled.
pub type CoreCallback = Box<dyn FnOnce(Result<CorePayload, SearchError>) + Send>;

/// Opaque cancellable handle for one in-flight core request.
///
/// Cancellation is fire-and-forget: no acknowledgement comes back, and
/// side effects already in flight are not rolled back.
#[derive(Clone)]
pub struct RequestHandle {
    inner: Arc<dyn Cancellable>,
}

impl RequestHandle {
    pub fn new(inner: Arc<dyn Cancellable>) -> Self {
        Self { inner }
    }

    /// Handle for requests that completed before returning; cancelling
    /// it does nothing.
    pub fn completed() -> Self {
        struct Noop;
        impl Cancellable for Noop {
            fn cancel(&self) {}
        }
        Self::new(Arc::new(Noop))
    }
}

impl Cancellable for RequestHandle {
    fn cancel(&self) {
        self.inner.cancel();
    }
}

/// What the application is searching by.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryInput {
    /// Forward search by text.
    Text(String),
    /// Reverse geocoding by coordinate.
    Point(Point),
}

/// Options forwarded to the core engine, already defaulted by the
/// orchestration layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreOptions {
    pub limit: Option<usize>,
    pub language: Option<String>,
    /// Bias ranking toward this coordinate. Its presence makes the
    /// response non-reproducible when it was derived from ambient
    /// device location.
    pub proximity: Option<Point>,
    pub countries: Vec<String>,
    /// Canonical category name for category search.
    pub category: Option<String>,
}

/// A search (or reverse-geocode) request against the core engine.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub context: RequestContext,
    pub input: QueryInput,
    pub options: CoreOptions,
}

/// A retrieve request: resolve one or more action tokens in a single
/// atomic round trip.
#[derive(Debug, Clone, Serialize)]
pub struct RetrieveRequest {
    pub context: RequestContext,
    pub tokens: Vec<String>,
    pub options: CoreOptions,
}

/// One raw entry as produced by the core engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreEntry {
    pub id: String,
    pub name: String,
    pub coordinate: Option<Point>,
    pub address: Option<Address>,
    pub categories: Vec<String>,
    pub distance_meters: Option<f64>,
    /// Present when resolving this entry needs a second round trip.
    pub retrieve_endpoint: Option<String>,
    pub multi_retrievable: bool,
}

impl Default for CoreEntry {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            coordinate: None,
            address: None,
            categories: Vec::new(),
            distance_meters: None,
            retrieve_endpoint: None,
            multi_retrievable: false,
        }
    }
}

/// Raw core-engine response: entries plus reproducibility metadata and
/// the untouched JSON snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorePayload {
    pub entries: Vec<CoreEntry>,
    /// Whether replaying the identical request is guaranteed to
    /// reproduce this payload.
    pub reproducible: bool,
    #[serde(skip)]
    pub raw: serde_json::Value,
}

/// The core search engine collaborator.
///
/// Implementations must invoke the callback at most once, from any
/// thread, and must never invoke it after the returned handle was
/// cancelled.
pub trait SearchCore: Send + Sync {
    fn submit_search(&self, request: SearchRequest, callback: CoreCallback) -> RequestHandle;

    fn submit_retrieve(&self, request: RetrieveRequest, callback: CoreCallback)
        -> RequestHandle;
}
