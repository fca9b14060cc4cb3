//! GeoSearch SDK: client-side place search with a cancellable two-phase
//! suggest/retrieve protocol
//!
//! An application submits a text query (or a reverse-geocoding point),
//! receives lightweight [`Suggestion`]s, and resolves a chosen
//! suggestion into a full [`SearchResult`], possibly via a second
//! round trip to the core search engine. Every asynchronous entry point
//! returns a [`CancellableTask`]; callbacks fire exactly once and
//! cancellation propagates to whatever the operation wraps.

pub mod client;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod network;
pub mod results;
pub mod task;

pub use client::SearchEngineClient;
pub use config::Settings;
pub use dispatch::CallbackDispatcher;
pub use results::{ResponseEnvelope, SearchError, SearchResult, Suggestion};
pub use task::{Cancellable, CancellableTask};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
