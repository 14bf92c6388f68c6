//! Data models flowing through the scraping pipeline.
//!
//! - [`RecencyWindow`]: how far back the search provider should look
//! - [`ChannelQuery`]: one channel name bound to a window, drives one search request
//! - [`Citation`]: a discovered paste URL, normalized before it is fetched
//! - [`FilteredContent`]: the playlist lines kept from one fetched paste

use crate::config::{RawPathRewrite, SearchTemplates};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

/// Time-range filter applied to the search query.
///
/// Each variant selects a distinct search URL template. The single-letter
/// forms (`H`, `D`, `W`) are accepted everywhere the long names are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RecencyWindow {
    #[serde(alias = "H", alias = "h")]
    #[value(alias = "H", alias = "h")]
    LastHour,
    #[default]
    #[serde(alias = "D", alias = "d")]
    #[value(alias = "D", alias = "d")]
    LastDay,
    #[serde(alias = "W", alias = "w")]
    #[value(alias = "W", alias = "w")]
    LastWeek,
}

impl RecencyWindow {
    pub const ALL: [RecencyWindow; 3] = [
        RecencyWindow::LastHour,
        RecencyWindow::LastDay,
        RecencyWindow::LastWeek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecencyWindow::LastHour => "last-hour",
            RecencyWindow::LastDay => "last-day",
            RecencyWindow::LastWeek => "last-week",
        }
    }
}

impl fmt::Display for RecencyWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecencyWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last-hour" | "H" | "h" => Ok(RecencyWindow::LastHour),
            "last-day" | "D" | "d" => Ok(RecencyWindow::LastDay),
            "last-week" | "W" | "w" => Ok(RecencyWindow::LastWeek),
            other => Err(format!(
                "unknown recency window '{other}' (expected last-hour, last-day or last-week)"
            )),
        }
    }
}

/// One channel to search for, bound to a recency window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelQuery {
    name: String,
    window: RecencyWindow,
}

impl ChannelQuery {
    pub fn new(name: impl Into<String>, window: RecencyWindow) -> Self {
        Self {
            name: name.into(),
            window,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn window(&self) -> RecencyWindow {
        self.window
    }

    /// Search term for the query string: every space becomes `+`, and each
    /// word is percent-encoded so stray `&` or `#` cannot break the URL.
    pub fn search_term(&self) -> String {
        self.name
            .split(' ')
            .map(|word| urlencoding::encode(word).into_owned())
            .collect::<Vec<_>>()
            .join("+")
    }

    /// Build the search URL from the template matching this query's window.
    ///
    /// # Arguments
    ///
    /// * `templates` - One URL template per recency window, each holding the
    ///   `{query}` placeholder
    ///
    /// # Returns
    ///
    /// The template for [`ChannelQuery::window`] with its first placeholder
    /// replaced by [`ChannelQuery::search_term`].
    ///
    /// # Examples
    ///
    /// ```
    /// use iptv_scraper::{ChannelQuery, RecencyWindow, SearchTemplates};
    ///
    /// let templates = SearchTemplates::uniform("https://search.test/?q={query}");
    /// let query = ChannelQuery::new("Sky Sports", RecencyWindow::LastHour);
    /// assert_eq!(query.search_url(&templates), "https://search.test/?q=Sky+Sports");
    /// ```
    pub fn search_url(&self, templates: &SearchTemplates) -> String {
        templates
            .for_window(self.window)
            .replacen(SearchTemplates::PLACEHOLDER, &self.search_term(), 1)
    }
}

/// A paste URL discovered on a search results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation(String);

impl Citation {
    /// Normalize the text of a citation element into a URL, prefixing
    /// `https://` when the text carries no scheme.
    pub fn from_element_text(text: &str) -> Self {
        let text = text.trim();
        if text.starts_with("http") {
            Citation(text.to_string())
        } else {
            Citation(format!("https://{text}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rewrite the listing URL into its raw-content form. Only the first
    /// occurrence of the listing path segment is substituted.
    ///
    /// # Arguments
    ///
    /// * `rewrite` - The listing path segment and its raw-content replacement
    ///
    /// # Returns
    ///
    /// The rewritten URL, or the citation unchanged when `rewrite.from` does
    /// not occur in it.
    ///
    /// # Examples
    ///
    /// ```
    /// use iptv_scraper::{Citation, RawPathRewrite};
    ///
    /// let citation = Citation::from_element_text("pastebin.com/AbC123");
    /// assert_eq!(
    ///     citation.raw_url(&RawPathRewrite::default()),
    ///     "https://pastebin.com/raw/AbC123"
    /// );
    /// ```
    pub fn raw_url(&self, rewrite: &RawPathRewrite) -> String {
        self.0.replacen(&rewrite.from, &rewrite.to, 1)
    }
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Playlist lines kept from one fetched paste, each terminated by `\n`.
///
/// Empty content is a valid outcome: the paste was fetched but held no
/// directive or locator lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredContent(Vec<u8>);

impl FilteredContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line followed by a single newline.
    pub(crate) fn push_line(&mut self, line: &[u8]) {
        self.0.extend_from_slice(line);
        self.0.push(b'\n');
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Hand the content over as a byte reader.
    pub fn into_reader(self) -> Cursor<Vec<u8>> {
        Cursor::new(self.0)
    }

    pub fn lines(&self) -> impl Iterator<Item = &[u8]> {
        self.0
            .split(|b| *b == b'\n')
            .filter(|line| !line.is_empty())
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl AsRef<[u8]> for FilteredContent {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<FilteredContent> for Vec<u8> {
    fn from(content: FilteredContent) -> Self {
        content.0
    }
}
