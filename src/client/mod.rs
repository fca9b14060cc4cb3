//! Search orchestration façade
//!
//! [`SearchEngineClient`] drives the two-phase protocol against the core
//! search engine: suggestion retrieval, single and batched selection,
//! reverse geocoding, category search, and atomic detail retrieval.
//! Every entry point is non-blocking, wraps its collaborator call in a
//! [`CancellableTask`] handed back to the caller, and delivers its
//! outcome through the [`CallbackDispatcher`] on the caller's chosen
//! execution context. The caller owns the returned task and should
//! cancel it when no longer interested; failing to do so leaks the
//! wrapped collaborator handle until the call finishes on its own.

mod options;

pub use options::{CategoryOptions, DetailsOptions, ReverseOptions, SuggestOptions};

use crate::config::Settings;
use crate::context::{
    ApiSurface, IdSource, RequestContext, SessionId, SessionTracker, UuidSource,
};
use crate::dispatch::{CallbackDispatcher, ExecutionContext};
use crate::engine::{
    CoreEntry, CoreOptions, QueryInput, RetrieveRequest, SearchCore, SearchRequest,
};
use crate::results::{
    BatchOutcome, Point, ResponseEnvelope, SearchError, SearchResult, SuggestAction,
    Suggestion,
};
use crate::task::{BatchJoin, CancellableTask, ChildSet};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Callback receiving suggestions or a tagged error.
pub type SuggestCallback =
    Box<dyn FnOnce(Result<ResponseEnvelope<Vec<Suggestion>>, SearchError>) + Send>;
/// Callback receiving one resolved result or a tagged error.
pub type SelectCallback =
    Box<dyn FnOnce(Result<ResponseEnvelope<SearchResult>, SearchError>) + Send>;
/// Callback receiving multiple resolved results or a tagged error.
pub type ResultsCallback =
    Box<dyn FnOnce(Result<ResponseEnvelope<Vec<SearchResult>>, SearchError>) + Send>;
/// Callback receiving the aggregate outcome of a batched selection.
/// Per-item failures live inside the outcome; the aggregate itself
/// always completes.
pub type BatchCallback = Box<dyn FnOnce(ResponseEnvelope<BatchOutcome>) + Send>;

/// Optional per-call execution context for callback delivery.
pub type CallContext = Option<Arc<dyn ExecutionContext>>;

type SelectionSink =
    Box<dyn FnOnce(Result<ResponseEnvelope<SearchResult>, SearchError>) + Send>;

/// The orchestration façade over the core search engine.
pub struct SearchEngineClient {
    core: Arc<dyn SearchCore>,
    dispatcher: CallbackDispatcher,
    sessions: SessionTracker,
    ids: Arc<dyn IdSource>,
    settings: Settings,
}

impl SearchEngineClient {
    /// Create a client with random (UUID) session/response identifiers.
    pub fn new(
        core: Arc<dyn SearchCore>,
        dispatcher: CallbackDispatcher,
        settings: Settings,
    ) -> Self {
        Self::with_id_source(core, dispatcher, settings, Arc::new(UuidSource))
    }

    /// Create a client with a caller-supplied identifier source, letting
    /// tests fix session and response identifiers.
    pub fn with_id_source(
        core: Arc<dyn SearchCore>,
        dispatcher: CallbackDispatcher,
        settings: Settings,
        ids: Arc<dyn IdSource>,
    ) -> Self {
        Self {
            core,
            dispatcher,
            sessions: SessionTracker::new(Arc::clone(&ids)),
            ids,
            settings,
        }
    }

    /// Start a fresh logical search session. Subsequent suggest calls
    /// carry the returned identifier.
    pub fn new_session(&self) -> SessionId {
        self.sessions.renew()
    }

    /// Request suggestions for a text query.
    pub fn suggest(
        &self,
        query: &str,
        options: &SuggestOptions,
        exec: CallContext,
        callback: SuggestCallback,
    ) -> Arc<CancellableTask> {
        let context = RequestContext::new(
            ApiSurface::Suggest,
            self.sessions.current_or_new(),
            self.ids.response_id(),
        )
        .with_locale(options.effective_language(&self.settings));

        info!(
            session = %context.session_id,
            response = %context.response_id,
            query,
            "issuing suggest request"
        );
        self.spawn_search(
            SearchRequest {
                context: context.clone(),
                input: QueryInput::Text(query.to_string()),
                options: options.to_core(&self.settings),
            },
            exec,
            callback,
        )
    }

    /// Request suggestions for a coordinate (reverse geocoding).
    ///
    /// Structurally identical to [`suggest`](Self::suggest); each call is
    /// its own one-shot session.
    pub fn reverse_geocode(
        &self,
        point: Point,
        options: &ReverseOptions,
        exec: CallContext,
        callback: SuggestCallback,
    ) -> Arc<CancellableTask> {
        let context = RequestContext::new(
            ApiSurface::ReverseGeocode,
            self.ids.session_id(),
            self.ids.response_id(),
        )
        .with_locale(options.effective_language(&self.settings));

        info!(
            session = %context.session_id,
            response = %context.response_id,
            lon = point.lon,
            lat = point.lat,
            "issuing reverse geocode request"
        );
        self.spawn_search(
            SearchRequest {
                context: context.clone(),
                input: QueryInput::Point(point),
                options: options.to_core(&self.settings),
            },
            exec,
            callback,
        )
    }

    /// One-shot category search yielding resolved results directly.
    pub fn category_search(
        &self,
        category: &str,
        options: &CategoryOptions,
        exec: CallContext,
        callback: ResultsCallback,
    ) -> Arc<CancellableTask> {
        let context = RequestContext::new(
            ApiSurface::Category,
            self.ids.session_id(),
            self.ids.response_id(),
        )
        .with_locale(options.effective_language(&self.settings));

        info!(
            session = %context.session_id,
            response = %context.response_id,
            category,
            "issuing category search"
        );

        let task = CancellableTask::new();
        let task_done = Arc::clone(&task);
        let dispatcher = self.dispatcher.clone();
        let request = SearchRequest {
            context: context.clone(),
            input: QueryInput::Text(category.to_string()),
            options: options.to_core(category, &self.settings),
        };
        let handle = self.core.submit_search(
            request,
            Box::new(move |outcome| {
                let outcome = outcome.map(|payload| {
                    let snapshot = payload.raw;
                    let results = payload
                        .entries
                        .into_iter()
                        .filter_map(|entry| result_from_entry(entry, &context, &snapshot))
                        .collect::<Vec<_>>();
                    ResponseEnvelope::new(results, context, payload.reproducible)
                });
                task_done.mark_done(move || {
                    dispatcher.dispatch(exec.as_ref(), Box::new(move || callback(outcome)));
                });
            }),
        );
        task.attach_wrapped(Arc::new(handle));
        task
    }

    /// Resolve a chosen suggestion into a full result.
    ///
    /// A suggestion whose action is already resolved completes without a
    /// second collaborator call; otherwise one retrieve round trip is
    /// issued against the action's endpoint. The SDK never caches
    /// retrievals: selecting the same suggestion again is a fresh,
    /// independent retrieval.
    pub fn select(
        &self,
        suggestion: &Suggestion,
        exec: CallContext,
        callback: SelectCallback,
    ) -> Arc<CancellableTask> {
        let dispatcher = self.dispatcher.clone();
        self.spawn_selection(
            suggestion.clone(),
            Box::new(move |outcome| {
                dispatcher.dispatch(exec.as_ref(), Box::new(move || callback(outcome)));
            }),
        )
    }

    /// Resolve several suggestions concurrently.
    ///
    /// One child task per suggestion; a failing member never fails its
    /// siblings. The aggregate callback fires exactly once, after every
    /// child reached a terminal state. Cancelling the returned task
    /// cancels every still-pending child; outcomes of children that
    /// completed before the cancel are honored for those children but
    /// the aggregate is no longer delivered. A batch larger than
    /// `Settings::max_batch_size` is rejected up front: every member
    /// fails with [`SearchError::BatchLimit`] and no request is issued.
    pub fn select_batch(
        &self,
        suggestions: &[Suggestion],
        exec: CallContext,
        callback: BatchCallback,
    ) -> Arc<CancellableTask> {
        let parent = CancellableTask::new();
        let owned: Vec<Suggestion> = suggestions.to_vec();
        let context = RequestContext::new(
            ApiSurface::Retrieve,
            owned
                .first()
                .map(|s| s.context.session_id.clone())
                .unwrap_or_else(|| self.ids.session_id()),
            self.ids.response_id(),
        );
        info!(
            session = %context.session_id,
            count = owned.len(),
            "issuing batch selection"
        );

        let limit = self.settings.max_batch_size;
        if owned.len() > limit {
            let requested = owned.len();
            warn!(requested, limit, "rejecting oversized batch selection");
            let failures = owned
                .into_iter()
                .map(|suggestion| (suggestion, SearchError::BatchLimit { limit, requested }))
                .collect();
            let envelope = ResponseEnvelope::new(
                BatchOutcome {
                    results: Vec::new(),
                    failures,
                },
                context,
                true,
            );
            let dispatcher = self.dispatcher.clone();
            parent.mark_done(move || {
                dispatcher.dispatch(exec.as_ref(), Box::new(move || callback(envelope)));
            });
            return parent;
        }

        let parent_done = Arc::clone(&parent);
        let dispatcher = self.dispatcher.clone();
        let by_index = owned.clone();
        let join = BatchJoin::new(
            owned.len(),
            move |outcomes: Vec<Option<Result<ResponseEnvelope<SearchResult>, SearchError>>>| {
                let mut batch = BatchOutcome::default();
                let mut reproducible = true;
                for (index, slot) in outcomes.into_iter().enumerate() {
                    match slot {
                        Some(Ok(envelope)) => {
                            reproducible &= envelope.is_reproducible;
                            batch.results.push(envelope.payload);
                        }
                        Some(Err(error)) => {
                            batch.failures.push((by_index[index].clone(), error));
                        }
                        // Cancelled child; the aggregate callback is
                        // already gone with the parent.
                        None => {}
                    }
                }
                let envelope = ResponseEnvelope::new(batch, context, reproducible);
                parent_done.mark_done(move || {
                    dispatcher.dispatch(exec.as_ref(), Box::new(move || callback(envelope)));
                });
            },
        );

        let mut single_use_tokens: HashSet<String> = HashSet::new();
        let mut children = Vec::with_capacity(owned.len());
        for (index, suggestion) in owned.into_iter().enumerate() {
            if let SuggestAction::Retrieve {
                endpoint,
                multi_retrievable: false,
            } = &suggestion.action
            {
                if !single_use_tokens.insert(endpoint.clone()) {
                    warn!(
                        id = %suggestion.id,
                        "single-use retrieve token repeated within batch"
                    );
                    join.complete(index, Err(SearchError::ActionReuse(suggestion.id)));
                    continue;
                }
            }

            let join_done = Arc::clone(&join);
            let child = self.spawn_selection(
                suggestion,
                Box::new(move |outcome| join_done.complete(index, outcome)),
            );
            let join_cancelled = Arc::clone(&join);
            child.add_on_cancelled(move || join_cancelled.abandon(index));
            children.push(child);
        }

        parent.attach_wrapped(ChildSet::new(children));
        parent
    }

    /// Retrieve full results for several identifiers in one request.
    ///
    /// Unlike [`select_batch`](Self::select_batch) this is a single
    /// round trip: the whole request succeeds or fails atomically, so
    /// there is no partial outcome.
    pub fn retrieve_details(
        &self,
        ids: &[String],
        options: &DetailsOptions,
        exec: CallContext,
        callback: ResultsCallback,
    ) -> Arc<CancellableTask> {
        let context = RequestContext::new(
            ApiSurface::Details,
            self.ids.session_id(),
            self.ids.response_id(),
        );
        info!(
            session = %context.session_id,
            response = %context.response_id,
            count = ids.len(),
            "issuing details retrieval"
        );

        let task = CancellableTask::new();
        let task_done = Arc::clone(&task);
        let dispatcher = self.dispatcher.clone();
        let request = RetrieveRequest {
            context: context.clone(),
            tokens: ids.to_vec(),
            options: options.to_core(&self.settings),
        };
        let handle = self.core.submit_retrieve(
            request,
            Box::new(move |outcome| {
                let outcome = outcome.and_then(|payload| {
                    let snapshot = payload.raw;
                    let mut results = Vec::with_capacity(payload.entries.len());
                    for entry in payload.entries {
                        let id = entry.id.clone();
                        match result_from_entry(entry, &context, &snapshot) {
                            Some(result) => results.push(result),
                            // Atomic semantics: one unmappable entry
                            // fails the whole request.
                            None => return Err(SearchError::Unresolvable(id)),
                        }
                    }
                    Ok(ResponseEnvelope::new(results, context, payload.reproducible))
                });
                task_done.mark_done(move || {
                    dispatcher.dispatch(exec.as_ref(), Box::new(move || callback(outcome)));
                });
            }),
        );
        task.attach_wrapped(Arc::new(handle));
        task
    }

    /// Shared suggest/reverse path: one core search call mapped to
    /// suggestions.
    fn spawn_search(
        &self,
        request: SearchRequest,
        exec: CallContext,
        callback: SuggestCallback,
    ) -> Arc<CancellableTask> {
        let context = request.context.clone();
        let task = CancellableTask::new();
        let task_done = Arc::clone(&task);
        let dispatcher = self.dispatcher.clone();

        let handle = self.core.submit_search(
            request,
            Box::new(move |outcome| {
                let outcome = outcome.map(|payload| {
                    let suggestions = payload
                        .entries
                        .into_iter()
                        .map(|entry| suggestion_from_entry(entry, &context))
                        .collect::<Vec<_>>();
                    debug!(
                        response = %context.response_id,
                        count = suggestions.len(),
                        "mapped suggestions"
                    );
                    ResponseEnvelope::new(suggestions, context, payload.reproducible)
                });
                if let Err(error) = &outcome {
                    warn!(%error, "search request failed");
                }
                task_done.mark_done(move || {
                    dispatcher.dispatch(exec.as_ref(), Box::new(move || callback(outcome)));
                });
            }),
        );
        task.attach_wrapped(Arc::new(handle));
        task
    }

    /// Single-selection logic shared by `select` and the batch fan-out.
    fn spawn_selection(&self, suggestion: Suggestion, sink: SelectionSink) -> Arc<CancellableTask> {
        let context = RequestContext::new(
            ApiSurface::Retrieve,
            suggestion.context.session_id.clone(),
            self.ids.response_id(),
        );
        let task = CancellableTask::new();

        match suggestion.action.clone() {
            SuggestAction::Resolved => {
                debug!(id = %suggestion.id, "selection resolved locally");
                let outcome = resolve_locally(&suggestion, context);
                task.mark_done(move || sink(outcome));
            }
            SuggestAction::Retrieve { endpoint, .. } => {
                debug!(id = %suggestion.id, endpoint = %endpoint, "selection requires retrieval");
                let task_done = Arc::clone(&task);
                let request = RetrieveRequest {
                    context: context.clone(),
                    tokens: vec![endpoint],
                    options: CoreOptions {
                        language: Some(self.settings.default_language.clone()),
                        ..CoreOptions::default()
                    },
                };
                let handle = self.core.submit_retrieve(
                    request,
                    Box::new(move |outcome| {
                        let outcome = outcome.and_then(|payload| {
                            let snapshot = payload.raw.clone();
                            payload
                                .entries
                                .into_iter()
                                .next()
                                .and_then(|entry| result_from_entry(entry, &context, &snapshot))
                                .map(|result| {
                                    ResponseEnvelope::new(
                                        result,
                                        context.clone(),
                                        payload.reproducible,
                                    )
                                })
                                .ok_or(SearchError::Unresolvable(suggestion.id))
                        });
                        task_done.mark_done(move || sink(outcome));
                    }),
                );
                task.attach_wrapped(Arc::new(handle));
            }
        }
        task
    }
}

fn suggestion_from_entry(entry: CoreEntry, context: &RequestContext) -> Suggestion {
    let action = match entry.retrieve_endpoint {
        Some(endpoint) => SuggestAction::Retrieve {
            endpoint,
            multi_retrievable: entry.multi_retrievable,
        },
        None => SuggestAction::Resolved,
    };
    Suggestion {
        id: entry.id,
        name: entry.name,
        coordinate: entry.coordinate,
        address: entry.address,
        categories: entry.categories,
        distance_meters: entry.distance_meters,
        action,
        context: context.clone(),
    }
}

fn result_from_entry(
    entry: CoreEntry,
    context: &RequestContext,
    snapshot: &serde_json::Value,
) -> Option<SearchResult> {
    Some(SearchResult {
        id: entry.id,
        name: entry.name,
        coordinate: entry.coordinate?,
        address: entry.address,
        categories: entry.categories,
        context: context.clone(),
        snapshot: snapshot.clone(),
    })
}

/// Pure local transform for already-resolved suggestions. Reproducible
/// by definition: no backend input is involved.
fn resolve_locally(
    suggestion: &Suggestion,
    context: RequestContext,
) -> Result<ResponseEnvelope<SearchResult>, SearchError> {
    let coordinate = suggestion
        .coordinate
        .ok_or_else(|| SearchError::Unresolvable(suggestion.id.clone()))?;
    let result = SearchResult {
        id: suggestion.id.clone(),
        name: suggestion.name.clone(),
        coordinate,
        address: suggestion.address.clone(),
        categories: suggestion.categories.clone(),
        context: context.clone(),
        snapshot: serde_json::Value::Null,
    };
    Ok(ResponseEnvelope::new(result, context, true))
}
