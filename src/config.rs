//! Scraper configuration.
//!
//! Everything has a default, so an empty YAML document (or no file at all) is
//! a valid configuration. CLI flags are layered on top by the binary.
//!
//! ```yaml
//! window: last-week
//! max_concurrent_fetches: 8
//! request_timeout_secs: 20
//! search_templates:
//!   last_hour: "https://www.google.co.uk/search?q={query}+site:pastebin.com&tbs=qdr:h"
//! raw_path:
//!   from: ".com/"
//!   to: ".com/raw/"
//! ```

use crate::error::ConfigError;
use crate::models::RecencyWindow;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument, warn};

const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 16;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const LAST_HOUR_QUERY_TEMPLATE: &str = "https://www.google.co.uk/search?q={query}+site:pastebin.com&source=lnt&tbs=qdr:h&sa=X&ved=0ahUKEwia3_bDrNndAhXKIMAKHTrIA2YQpwUIIw&biw=1440&bih=755";
const LAST_DAY_QUERY_TEMPLATE: &str = "https://www.google.co.uk/search?q={query}+site:pastebin.com&source=lnt&tbs=qdr:d&sa=X&ved=0ahUKEwjt-JSZrNndAhXJJMAKHXahDXIQpwUIIw&biw=1440&bih=755";
const LAST_WEEK_QUERY_TEMPLATE: &str = "https://www.google.co.uk/search?q={query}+site:pastebin.com&source=lnt&tbs=qdr:w&sa=X&ved=0ahUKEwi4pteVrNndAhURQMAKHYZcDH0QpwUIIw&biw=1440&bih=755";

/// Runtime configuration for a [`Scraper`](crate::Scraper).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Recency window applied to every search in a batch.
    pub window: RecencyWindow,
    /// Upper bound on citation fetches in flight across the whole batch.
    /// `None` lifts the bound entirely.
    pub max_concurrent_fetches: Option<usize>,
    /// Per-request timeout. `None` lets a request hang for as long as the peer does.
    pub request_timeout_secs: Option<u64>,
    pub search_templates: SearchTemplates,
    pub raw_path: RawPathRewrite,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            window: RecencyWindow::default(),
            max_concurrent_fetches: Some(DEFAULT_MAX_CONCURRENT_FETCHES),
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            search_templates: SearchTemplates::default(),
            raw_path: RawPathRewrite::default(),
        }
    }
}

impl ScraperConfig {
    pub fn new(window: RecencyWindow) -> Self {
        Self {
            window,
            ..Self::default()
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to an empty mapping.
        if yaml.trim().is_empty() {
            warn!(window = %RecencyWindow::default(), "Empty configuration; using the default recency window");
            return Ok(Self::default());
        }
        let document: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        if document.get("window").is_none() {
            warn!(window = %RecencyWindow::default(), "No window configured; using the default recency window");
        }
        let config: ScraperConfig = serde_yaml::from_value(document)?;
        config.validate()?;
        Ok(config)
    }

    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml_str(&yaml)?;
        info!(window = %config.window, "Loaded scraper configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_fetches == Some(0) {
            return Err(ConfigError::Invalid(
                "max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        for window in RecencyWindow::ALL {
            if !self
                .search_templates
                .for_window(window)
                .contains(SearchTemplates::PLACEHOLDER)
            {
                return Err(ConfigError::Invalid(format!(
                    "search template for {window} lacks the {} placeholder",
                    SearchTemplates::PLACEHOLDER
                )));
            }
        }
        if self.raw_path.from.is_empty() {
            return Err(ConfigError::Invalid(
                "raw_path.from must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Search URL templates, one per recency window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchTemplates {
    pub last_hour: String,
    pub last_day: String,
    pub last_week: String,
}

impl SearchTemplates {
    /// Replaced by the encoded channel name.
    pub const PLACEHOLDER: &'static str = "{query}";

    pub fn for_window(&self, window: RecencyWindow) -> &str {
        match window {
            RecencyWindow::LastHour => &self.last_hour,
            RecencyWindow::LastDay => &self.last_day,
            RecencyWindow::LastWeek => &self.last_week,
        }
    }

    /// Point all three windows at one template. Handy when the search
    /// provider is a local stand-in.
    pub fn uniform(template: impl Into<String>) -> Self {
        let template = template.into();
        Self {
            last_hour: template.clone(),
            last_day: template.clone(),
            last_week: template,
        }
    }
}

impl Default for SearchTemplates {
    fn default() -> Self {
        Self {
            last_hour: LAST_HOUR_QUERY_TEMPLATE.to_string(),
            last_day: LAST_DAY_QUERY_TEMPLATE.to_string(),
            last_week: LAST_WEEK_QUERY_TEMPLATE.to_string(),
        }
    }
}

/// Textual rewrite turning a paste listing URL into its raw-content URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPathRewrite {
    pub from: String,
    pub to: String,
}

impl Default for RawPathRewrite {
    fn default() -> Self {
        Self {
            from: ".com/".to_string(),
            to: ".com/raw/".to_string(),
        }
    }
}
