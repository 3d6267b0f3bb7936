//! Run configuration loaded from a single TOML file.
//!
//! Sources, keyword tables and the taxonomy live here rather than in code so a
//! change to the feed list is a config change, not a rebuild.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::core::categorize::{Taxonomy, TopicRule};
use crate::core::dedupe::DedupeConfig;
use crate::core::feed::fetcher::DEFAULT_USER_AGENT;
use crate::core::feed::types::Source;
use crate::core::filter::{RelevanceFilter, RelevancePolicy};
use crate::core::importer::normalize_url;

pub const CONFIG_ENV: &str = "FEEDMERGE_CONFIG";
const OUTPUT_DIR_ENV: &str = "FEEDMERGE_OUTPUT_DIR";
/// Upper bound for any look-back window, about a century.
pub const MAX_WINDOW_DAYS: u32 = 36_500;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("missing required configuration field: {0}")]
    MissingField(String),
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub dedupe: DedupeConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub page: PageConfig,
    #[serde(default)]
    pub taxonomy: Vec<TopicRule>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelConfig {
    pub title: String,
    pub description: String,
    pub link: String,
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            title: "ESG News Feed".to_string(),
            description: "Latest ESG and sustainability news".to_string(),
            link: "https://example.com".to_string(),
            language: default_language(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    /// Empty disables the feed document.
    pub feed_file: String,
    /// Empty disables the CSV export.
    pub csv_prefix: String,
    /// Empty disables the page model.
    pub page_file: String,
    pub max_items: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            feed_file: "feed.xml".to_string(),
            csv_prefix: "ESG_Stories_".to_string(),
            page_file: "page.json".to_string(),
            max_items: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchSettings {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub concurrency: usize,
    pub window_days: u32,
    pub max_entries: usize,
    pub description_cap: usize,
    pub display_timezone: String,
    pub unwrap_redirects: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 20,
            max_retries: 2,
            concurrency: 4,
            window_days: 7,
            max_entries: 50,
            description_cap: 300,
            display_timezone: "America/New_York".to_string(),
            unwrap_redirects: true,
        }
    }
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct FilterConfig {
    pub off_topic: Vec<String>,
    pub industry: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PageConfig {
    pub source_label_prefixes: Vec<String>,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            source_label_prefixes: vec!["Google Alert: ".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    pub url: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<RelevancePolicy>,
    /// Shorthand for `policy = "bypass"`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub trusted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
}

impl SourceConfig {
    pub fn to_source(&self) -> Source {
        let policy = if self.trusted {
            RelevancePolicy::Bypass
        } else {
            self.policy.unwrap_or_default()
        };
        Source {
            url: self.url.trim().to_string(),
            name: self.name.trim().to_string(),
            keywords: self.keywords.clone(),
            policy,
            window_days: self.window_days,
            max_entries: self.max_entries,
        }
    }
}

fn default_language() -> String {
    "en-us".to_string()
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(directory) = std::env::var(OUTPUT_DIR_ENV) {
            if !directory.trim().is_empty() {
                self.output.directory = PathBuf::from(directory.trim());
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::MissingField("sources".to_string()));
        }
        if self.output.feed_file.is_empty()
            && self.output.csv_prefix.is_empty()
            && self.output.page_file.is_empty()
        {
            return Err(invalid("output", "every output target is disabled"));
        }
        if self.output.max_items == 0 {
            return Err(invalid("output.max_items", "must be at least 1"));
        }
        let threshold = self.dedupe.similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(invalid(
                "dedupe.similarity_threshold",
                &format!("{threshold} is outside (0, 1]"),
            ));
        }
        if self.fetch.concurrency == 0 {
            return Err(invalid("fetch.concurrency", "must be at least 1"));
        }
        check_window("fetch.window_days", self.fetch.window_days)?;
        self.display_timezone()?;

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(invalid("sources.name", &format!("empty name for {}", source.url)));
            }
            if let Some(window_days) = source.window_days {
                check_window("sources.window_days", window_days)?;
            }
            let parsed = url::Url::parse(source.url.trim())
                .map_err(|error| invalid("sources.url", &format!("{}: {error}", source.url)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(invalid(
                    "sources.url",
                    &format!("{} is not an http(s) URL", source.url),
                ));
            }
            if !seen.insert(normalize_url(&source.url)) {
                return Err(invalid(
                    "sources.url",
                    &format!("{} is configured twice", source.url),
                ));
            }
        }
        Ok(())
    }

    pub fn sources(&self) -> Vec<Source> {
        self.sources.iter().map(SourceConfig::to_source).collect()
    }

    pub fn taxonomy(&self) -> Taxonomy {
        if self.taxonomy.is_empty() {
            Taxonomy::default()
        } else {
            Taxonomy::new(self.taxonomy.clone())
        }
    }

    pub fn relevance_filter(&self) -> RelevanceFilter {
        RelevanceFilter::new(&self.filter.off_topic, &self.filter.industry)
    }

    pub fn display_timezone(&self) -> Result<Tz, ConfigError> {
        self.fetch
            .display_timezone
            .parse::<Tz>()
            .map_err(|error| invalid("fetch.display_timezone", &error.to_string()))
    }
}

fn check_window(field: &str, window_days: u32) -> Result<(), ConfigError> {
    if window_days > MAX_WINDOW_DAYS {
        return Err(invalid(
            field,
            &format!("{window_days} days exceeds the {MAX_WINDOW_DAYS} day limit"),
        ));
    }
    Ok(())
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
