//! SDK configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// SDK settings, loadable from a file and/or `GEOSEARCH_*` environment
/// variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the core search engine endpoint.
    pub endpoint: String,
    /// Per-request timeout in seconds.
    pub request_timeout: f64,
    /// Language sent when a call provides none.
    pub default_language: String,
    /// User agent for outgoing requests.
    pub user_agent: String,
    /// Maximum number of suggestions accepted by one batched selection.
    pub max_batch_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.geosearch.example/v1/".to_string(),
            request_timeout: 5.0,
            default_language: "en".to_string(),
            user_agent: format!("geosearch-sdk/{}", env!("CARGO_PKG_VERSION")),
            max_batch_size: 100,
        }
    }
}

impl Settings {
    /// Load settings from an optional file, then layer `GEOSEARCH_*`
    /// environment variables on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder
            .add_source(config::Environment::with_prefix("GEOSEARCH").try_parsing(true));

        let settings: Settings = builder
            .build()
            .context("failed to load configuration")?
            .try_deserialize()
            .context("invalid configuration values")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.endpoint
            .parse::<Url>()
            .with_context(|| format!("endpoint '{}' is not a valid URL", self.endpoint))?;
        anyhow::ensure!(
            self.request_timeout > 0.0,
            "request_timeout must be positive"
        );
        anyhow::ensure!(self.max_batch_size > 0, "max_batch_size must be positive");
        Ok(())
    }
}
