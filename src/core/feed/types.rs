use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::filter::RelevancePolicy;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum FeedFormat {
    XmlFeed,
    JsonFeed,
}

/// A configured origin of entries. Immutable after startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub policy: RelevancePolicy,
    /// Look-back window in days; falls back to the fetch default when unset.
    pub window_days: Option<u32>,
    /// Entries taken from the document, in document order, before windowing.
    pub max_entries: Option<usize>,
}

/// One entry exactly as the feed document carried it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// The entry carried a date element, parseable or not.
    #[serde(default)]
    pub date_present: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParsedFeed {
    pub format: FeedFormat,
    pub title: String,
    pub entries: Vec<RawEntry>,
    /// Set when the first parse failed and the repaired payload was used.
    pub repaired: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DateOrigin {
    Feed,
    /// The feed's date could not be parsed; the fetch time was substituted.
    Inferred,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub description: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    pub date_origin: DateOrigin,
    pub source: String,
    pub categories: Vec<String>,
}

impl Article {
    pub fn date_inferred(&self) -> bool {
        self.date_origin == DateOrigin::Inferred
    }

    /// Lower-cased title and description, the text every keyword test runs against.
    pub fn haystack(&self) -> String {
        format!("{} {}", self.title, self.description).to_lowercase()
    }
}
