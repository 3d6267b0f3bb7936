pub mod page;
pub mod rss;
pub mod tabular;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::info;

use crate::core::config::{AppConfig, ChannelConfig, ConfigError, OutputConfig};
use crate::core::feed::types::Article;
use page::{build_page_model, CorpusStats, PageModel};

pub const CSV_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("xml write failed: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("output write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("page model serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("rendered output is not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The three artifacts of one run, rendered but not yet written.
#[derive(Debug, Clone)]
pub struct Publication {
    pub generated_at: DateTime<Utc>,
    pub feed_document: String,
    pub tabular_export: String,
    pub page_model: PageModel,
}

#[derive(Debug, Clone)]
pub struct Publisher {
    channel: ChannelConfig,
    timezone: Tz,
    max_items: usize,
    label_prefixes: Vec<String>,
}

impl Publisher {
    pub fn new(
        channel: ChannelConfig,
        timezone: Tz,
        max_items: usize,
        label_prefixes: Vec<String>,
    ) -> Self {
        Self {
            channel,
            timezone,
            max_items,
            label_prefixes,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.channel.clone(),
            config.display_timezone()?,
            config.output.max_items,
            config.page.source_label_prefixes.clone(),
        ))
    }

    /// Renders every artifact from a corpus. The corpus is sorted here, so
    /// callers may pass articles in arrival order.
    pub fn publish(
        &self,
        mut corpus: Vec<Article>,
        stats: CorpusStats,
        generated_at: DateTime<Utc>,
    ) -> Result<Publication, PublishError> {
        sort_corpus(&mut corpus);
        let feed_document = rss::render_feed_document(
            &corpus,
            &self.channel,
            self.timezone,
            generated_at,
            self.max_items,
        )?;
        let tabular_export = tabular::render_csv(&corpus, self.timezone)?;
        let page_model = build_page_model(
            corpus,
            &self.channel,
            self.timezone,
            &self.label_prefixes,
            stats,
            generated_at,
        );
        Ok(Publication {
            generated_at,
            feed_document,
            tabular_export,
            page_model,
        })
    }

    /// Writes the enabled artifacts and returns their paths.
    pub fn write(
        &self,
        publication: &Publication,
        output: &OutputConfig,
    ) -> Result<Vec<PathBuf>, PublishError> {
        std::fs::create_dir_all(&output.directory).map_err(|source| PublishError::Write {
            path: output.directory.clone(),
            source,
        })?;
        let mut written = Vec::new();

        if !output.feed_file.is_empty() {
            let path = output.directory.join(&output.feed_file);
            write_file(&path, publication.feed_document.as_bytes())?;
            written.push(path);
        }
        if !output.csv_prefix.is_empty() {
            let stamp = publication
                .generated_at
                .with_timezone(&self.timezone)
                .format(CSV_TIMESTAMP_FORMAT);
            let path = output
                .directory
                .join(format!("{}{stamp}.csv", output.csv_prefix));
            write_file(&path, publication.tabular_export.as_bytes())?;
            written.push(path);
        }
        if !output.page_file.is_empty() {
            let path = output.directory.join(&output.page_file);
            let json = serde_json::to_vec_pretty(&publication.page_model)?;
            write_file(&path, &json)?;
            written.push(path);
        }

        for path in &written {
            info!(path = %path.display(), "output written");
        }
        Ok(written)
    }
}

/// Newest first; equal timestamps keep their arrival order.
pub fn sort_corpus(corpus: &mut [Article]) {
    corpus.sort_by(|left, right| right.published_at.cmp(&left.published_at));
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), PublishError> {
    std::fs::write(path, contents).map_err(|source| PublishError::Write {
        path: path.to_path_buf(),
        source,
    })
}
