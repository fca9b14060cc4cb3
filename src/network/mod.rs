//! HTTP plumbing for the remote core engine

use crate::config::Settings;
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Thin reqwest wrapper: base-endpoint joining, SDK user agent, timeout,
/// and status/text capture for the error mapping above it.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base: Url,
    user_agent: String,
}

/// Raw HTTP outcome; status-class interpretation happens at the engine
/// boundary, not here.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub text: String,
}

impl HttpClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut base: Url = settings
            .endpoint
            .parse()
            .with_context(|| format!("invalid endpoint '{}'", settings.endpoint))?;
        // Url::join treats a base without a trailing slash as a file.
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs_f64(settings.request_timeout))
            .gzip(true)
            .brotli(true)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base,
            user_agent: settings.user_agent.clone(),
        })
    }

    /// POST a JSON body to a path relative to the configured endpoint.
    pub async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<HttpResponse> {
        let url = self
            .base
            .join(path)
            .with_context(|| format!("invalid request path '{path}'"))?;

        let response = self
            .client
            .post(url)
            .header("User-Agent", &self.user_agent)
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        Ok(HttpResponse { status, text })
    }
}
