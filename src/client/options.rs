//! Per-call options for the public orchestration surface

use crate::config::Settings;
use crate::engine::CoreOptions;
use crate::results::Point;

/// Options for forward search suggestions.
#[derive(Debug, Clone, Default)]
pub struct SuggestOptions {
    pub limit: Option<usize>,
    pub language: Option<String>,
    /// Bias ranking toward this coordinate.
    pub proximity: Option<Point>,
    /// ISO country codes to restrict results to.
    pub countries: Vec<String>,
}

impl SuggestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_proximity(mut self, proximity: Point) -> Self {
        self.proximity = Some(proximity);
        self
    }

    pub(crate) fn to_core(&self, settings: &Settings) -> CoreOptions {
        CoreOptions {
            limit: self.limit,
            language: Some(self.effective_language(settings)),
            proximity: self.proximity,
            countries: self.countries.clone(),
            category: None,
        }
    }

    pub(crate) fn effective_language(&self, settings: &Settings) -> String {
        self.language
            .clone()
            .unwrap_or_else(|| settings.default_language.clone())
    }
}

/// Options for reverse geocoding.
#[derive(Debug, Clone, Default)]
pub struct ReverseOptions {
    pub limit: Option<usize>,
    pub language: Option<String>,
}

impl ReverseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub(crate) fn to_core(&self, settings: &Settings) -> CoreOptions {
        CoreOptions {
            limit: self.limit,
            language: Some(self.effective_language(settings)),
            ..CoreOptions::default()
        }
    }

    pub(crate) fn effective_language(&self, settings: &Settings) -> String {
        self.language
            .clone()
            .unwrap_or_else(|| settings.default_language.clone())
    }
}

/// Options for one-shot category search.
#[derive(Debug, Clone, Default)]
pub struct CategoryOptions {
    pub limit: Option<usize>,
    pub language: Option<String>,
    pub proximity: Option<Point>,
}

impl CategoryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_proximity(mut self, proximity: Point) -> Self {
        self.proximity = Some(proximity);
        self
    }

    pub(crate) fn to_core(&self, category: &str, settings: &Settings) -> CoreOptions {
        CoreOptions {
            limit: self.limit,
            language: Some(self.effective_language(settings)),
            proximity: self.proximity,
            category: Some(category.to_string()),
            ..CoreOptions::default()
        }
    }

    pub(crate) fn effective_language(&self, settings: &Settings) -> String {
        self.language
            .clone()
            .unwrap_or_else(|| settings.default_language.clone())
    }
}

/// Options for atomic multi-identifier detail retrieval.
#[derive(Debug, Clone, Default)]
pub struct DetailsOptions {
    pub language: Option<String>,
}

impl DetailsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub(crate) fn to_core(&self, settings: &Settings) -> CoreOptions {
        CoreOptions {
            language: Some(
                self.language
                    .clone()
                    .unwrap_or_else(|| settings.default_language.clone()),
            ),
            ..CoreOptions::default()
        }
    }
}
