//! HTTP-backed core search engine
//!
//! Each submitted request becomes one abortable tokio task. Cancelling
//! the returned handle aborts the task, which drops the completion
//! callback with it, so the caller never hears from a cancelled request.

use super::{
    CoreCallback, CorePayload, RequestHandle, RetrieveRequest, SearchCore, SearchRequest,
};
use crate::network::HttpClient;
use crate::results::SearchError;
use crate::task::Cancellable;
use futures::future::{AbortHandle, Abortable};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// Production [`SearchCore`] speaking JSON over HTTP.
pub struct RemoteSearchCore {
    http: HttpClient,
    runtime: tokio::runtime::Handle,
}

struct AbortOnCancel(AbortHandle);

impl Cancellable for AbortOnCancel {
    fn cancel(&self) {
        self.0.abort();
    }
}

impl RemoteSearchCore {
    pub fn new(http: HttpClient, runtime: tokio::runtime::Handle) -> Self {
        Self { http, runtime }
    }

    fn spawn(
        &self,
        path: String,
        body: serde_json::Value,
        callback: CoreCallback,
    ) -> RequestHandle {
        let http = self.http.clone();
        let (abort_handle, registration) = AbortHandle::new_pair();

        let request = async move {
            let outcome = execute(&http, &path, &body).await;
            callback(outcome);
        };
        self.runtime.spawn(Abortable::new(request, registration));

        RequestHandle::new(Arc::new(AbortOnCancel(abort_handle)))
    }
}

async fn execute(
    http: &HttpClient,
    path: &str,
    body: &serde_json::Value,
) -> Result<CorePayload, SearchError> {
    debug!(path, "submitting core request");
    let response = http
        .post_json(path, body)
        .await
        .map_err(|e| SearchError::Transport(e.to_string()))?;

    if !(200..300).contains(&response.status) {
        warn!(path, status = response.status, "core request failed");
        return Err(SearchError::backend(response.status, response.text));
    }

    let raw: serde_json::Value = serde_json::from_str(&response.text)
        .map_err(|e| SearchError::backend(response.status, format!("malformed payload: {e}")))?;
    let mut payload: CorePayload = serde_json::from_value(raw.clone())
        .map_err(|e| SearchError::backend(response.status, format!("malformed payload: {e}")))?;
    payload.raw = raw;
    Ok(payload)
}

impl SearchCore for RemoteSearchCore {
    fn submit_search(&self, request: SearchRequest, callback: CoreCallback) -> RequestHandle {
        let path = match request.context.api_surface {
            crate::context::ApiSurface::ReverseGeocode => "reverse".to_string(),
            crate::context::ApiSurface::Category => "category".to_string(),
            _ => "suggest".to_string(),
        };
        let body = json!({
            "input": request.input,
            "options": request.options,
            "session_id": request.context.session_id,
            "response_id": request.context.response_id,
        });
        self.spawn(path, body, callback)
    }

    fn submit_retrieve(
        &self,
        request: RetrieveRequest,
        callback: CoreCallback,
    ) -> RequestHandle {
        // A single token is an endpoint in its own right; multi-token
        // (details) requests go through the shared retrieve endpoint.
        let (path, body) = match request.tokens.as_slice() {
            [token] => (
                token.clone(),
                json!({
                    "options": request.options,
                    "session_id": request.context.session_id,
                    "response_id": request.context.response_id,
                }),
            ),
            tokens => (
                "retrieve".to_string(),
                json!({
                    "tokens": tokens,
                    "options": request.options,
                    "session_id": request.context.session_id,
                    "response_id": request.context.response_id,
                }),
            ),
        };
        self.spawn(path, body, callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::context::{ApiSurface, RequestContext, ResponseId, SessionId};
    use crate::engine::{CoreOptions, QueryInput};
    use std::sync::mpsc;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context(surface: ApiSurface) -> RequestContext {
        RequestContext::new(
            surface,
            SessionId("session-0".into()),
            ResponseId("response-0".into()),
        )
    }

    fn core_for(server: &MockServer) -> RemoteSearchCore {
        let settings = Settings {
            endpoint: server.uri(),
            ..Settings::default()
        };
        let http = HttpClient::new(&settings).unwrap();
        RemoteSearchCore::new(http, tokio::runtime::Handle::current())
    }

    #[tokio::test]
    async fn search_maps_successful_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/suggest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "entries": [{"id": "p1", "name": "Plaza", "coordinate": {"lon": 1.0, "lat": 2.0}}],
                "reproducible": true,
            })))
            .mount(&server)
            .await;

        let core = core_for(&server);
        let (tx, rx) = mpsc::channel();
        core.submit_search(
            SearchRequest {
                context: context(ApiSurface::Suggest),
                input: QueryInput::Text("plaza".into()),
                options: CoreOptions::default(),
            },
            Box::new(move |outcome| tx.send(outcome).unwrap()),
        );

        let payload = tokio::task::spawn_blocking(move || {
            rx.recv_timeout(Duration::from_secs(5)).unwrap()
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(payload.entries.len(), 1);
        assert!(payload.reproducible);
        assert_eq!(payload.raw["entries"][0]["id"], "p1");
    }

    #[tokio::test]
    async fn single_token_retrieve_hits_the_action_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/retrieve/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "entries": [{"id": "p42", "name": "Amphitheatre", "coordinate": {"lon": -122.08, "lat": 37.42}}],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let core = core_for(&server);
        let (tx, rx) = mpsc::channel();
        core.submit_retrieve(
            RetrieveRequest {
                context: context(ApiSurface::Retrieve),
                tokens: vec!["retrieve/42".into()],
                options: CoreOptions::default(),
            },
            Box::new(move |outcome| tx.send(outcome).unwrap()),
        );

        let payload = tokio::task::spawn_blocking(move || {
            rx.recv_timeout(Duration::from_secs(5)).unwrap()
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(payload.entries[0].id, "p42");
    }

    #[tokio::test]
    async fn server_failure_surfaces_as_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let core = core_for(&server);
        let (tx, rx) = mpsc::channel();
        core.submit_search(
            SearchRequest {
                context: context(ApiSurface::Suggest),
                input: QueryInput::Text("plaza".into()),
                options: CoreOptions::default(),
            },
            Box::new(move |outcome| tx.send(outcome).unwrap()),
        );

        let err = tokio::task::spawn_blocking(move || {
            rx.recv_timeout(Duration::from_secs(5)).unwrap()
        })
        .await
        .unwrap()
        .unwrap_err();
        assert!(err.is_server_error());
    }

    #[tokio::test]
    async fn unreachable_backend_surfaces_as_transport_error() {
        // Reserved port with nothing listening.
        let settings = Settings {
            endpoint: "http://127.0.0.1:9".into(),
            request_timeout: 1.0,
            ..Settings::default()
        };
        let http = HttpClient::new(&settings).unwrap();
        let core = RemoteSearchCore::new(http, tokio::runtime::Handle::current());

        let (tx, rx) = mpsc::channel();
        core.submit_search(
            SearchRequest {
                context: context(ApiSurface::Suggest),
                input: QueryInput::Text("plaza".into()),
                options: CoreOptions::default(),
            },
            Box::new(move |outcome| tx.send(outcome).unwrap()),
        );

        let outcome = tokio::task::spawn_blocking(move || {
            rx.recv_timeout(Duration::from_secs(10)).unwrap()
        })
        .await
        .unwrap();
        assert!(matches!(outcome, Err(SearchError::Transport(_))));
    }

    #[tokio::test]
    async fn cancelled_request_never_calls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"entries": []}))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let core = core_for(&server);
        let (tx, rx) = mpsc::channel();
        let handle = core.submit_search(
            SearchRequest {
                context: context(ApiSurface::Suggest),
                input: QueryInput::Text("plaza".into()),
                options: CoreOptions::default(),
            },
            Box::new(move |outcome| tx.send(outcome).unwrap()),
        );
        handle.cancel();

        let silent = tokio::task::spawn_blocking(move || {
            rx.recv_timeout(Duration::from_millis(500)).is_err()
        })
        .await
        .unwrap();
        assert!(silent, "cancelled request must not deliver a callback");
    }
}
