pub mod core;

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::aggregate::{Aggregator, RunOutcome, SourceReport};
use crate::core::config::{AppConfig, ConfigError};
use crate::core::feed::fetcher::FetchError;
use crate::core::importer::{
    build_import_preview, normalize_url, parse_sources, render_sources_toml, ImportError,
    ImportFormat, ImportSource,
};
use crate::core::publish::{Publication, PublishError, Publisher};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build the HTTP client: {0}")]
    Client(#[from] FetchError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub reports: Vec<SourceReport>,
    pub duplicates_removed: usize,
    pub published: usize,
    pub written: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportPreviewResponse {
    pub new_count: usize,
    pub duplicate_count: usize,
    pub new_sources: Vec<ImportSource>,
    pub duplicate_sources: Vec<ImportSource>,
    /// `[[sources]]` tables for the new sources only.
    pub toml: String,
}

/// One full aggregation run, timestamped with the current time.
pub async fn run_pipeline(config: &AppConfig) -> Result<RunSummary, RunError> {
    run_pipeline_at(config, Utc::now()).await
}

pub async fn run_pipeline_at(
    config: &AppConfig,
    now: DateTime<Utc>,
) -> Result<RunSummary, RunError> {
    let (outcome, publication) = aggregate_and_render(config, now).await?;
    let publisher = Publisher::from_config(config)?;
    let written = publisher.write(&publication, &config.output)?;
    Ok(RunSummary {
        reports: outcome.reports,
        duplicates_removed: outcome.duplicates_removed,
        published: publication.page_model.stats.count,
        written,
    })
}

/// Aggregates and renders without touching the filesystem.
pub async fn aggregate_and_render(
    config: &AppConfig,
    now: DateTime<Utc>,
) -> Result<(RunOutcome, Publication), RunError> {
    let aggregator = Aggregator::from_config(config)?;
    let publisher = Publisher::from_config(config)?;
    let mut outcome = aggregator.run(&config.sources(), now).await;
    let corpus = std::mem::take(&mut outcome.corpus);
    let publication = publisher.publish(corpus, outcome.stats(), now)?;
    Ok((outcome, publication))
}

/// Parses an import payload and splits it against the configured sources.
pub fn preview_import(
    config: &AppConfig,
    format: ImportFormat,
    content: &str,
) -> Result<ImportPreviewResponse, ImportError> {
    let candidates = parse_sources(format, content)?;
    let existing_feed_urls: HashSet<String> = config
        .sources
        .iter()
        .map(|source| normalize_url(&source.url))
        .collect();
    let preview = build_import_preview(candidates, &existing_feed_urls);
    let toml = render_sources_toml(&preview.new_sources)?;

    Ok(ImportPreviewResponse {
        new_count: preview.new_sources.len(),
        duplicate_count: preview.duplicate_sources.len(),
        new_sources: preview.new_sources,
        duplicate_sources: preview.duplicate_sources,
        toml,
    })
}
