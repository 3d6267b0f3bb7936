use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::categorize::Taxonomy;
use crate::core::config::{AppConfig, FetchSettings};
use crate::core::dedupe::{dedupe, DedupeConfig};
use crate::core::feed::entry::EntryRules;
use crate::core::feed::fetcher::{build_client, FetchError};
use crate::core::feed::fetch_articles;
use crate::core::feed::types::{Article, Source};
use crate::core::filter::RelevanceFilter;
use crate::core::publish::page::CorpusStats;
use crate::core::publish::sort_corpus;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    #[default]
    Ok,
    Failed,
}

/// What one source contributed to a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceReport {
    pub name: String,
    pub url: String,
    pub status: SourceStatus,
    /// Entries read from the document after the per-source cap.
    pub fetched: usize,
    pub incomplete: usize,
    pub window_rejected: usize,
    pub filter_rejected: usize,
    pub kept: usize,
    pub repaired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Deduplicated, newest first.
    pub corpus: Vec<Article>,
    pub reports: Vec<SourceReport>,
    pub duplicates_removed: usize,
}

impl RunOutcome {
    pub fn failed_sources(&self) -> usize {
        self.reports
            .iter()
            .filter(|report| report.status == SourceStatus::Failed)
            .count()
    }

    pub fn stats(&self) -> CorpusStats {
        CorpusStats {
            reports: self.reports.clone(),
            duplicates_removed: self.duplicates_removed,
        }
    }
}

pub struct Aggregator {
    client: reqwest::Client,
    settings: FetchSettings,
    filter: RelevanceFilter,
    taxonomy: Taxonomy,
    dedupe: DedupeConfig,
}

impl Aggregator {
    pub fn new(
        client: reqwest::Client,
        settings: FetchSettings,
        filter: RelevanceFilter,
        taxonomy: Taxonomy,
        dedupe: DedupeConfig,
    ) -> Self {
        Self {
            client,
            settings,
            filter,
            taxonomy,
            dedupe,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, FetchError> {
        let client = build_client(&config.fetch.user_agent, config.fetch.timeout())?;
        Ok(Self::new(
            client,
            config.fetch.clone(),
            config.relevance_filter(),
            config.taxonomy(),
            config.dedupe,
        ))
    }

    /// Runs every source and merges the results. Sources are fetched
    /// concurrently but combined in list order, so the first source in the
    /// list wins every duplicate tie regardless of which response lands first.
    pub async fn run(&self, sources: &[Source], now: DateTime<Utc>) -> RunOutcome {
        let per_source: Vec<(SourceReport, Vec<Article>)> = stream::iter(sources)
            .map(|source| self.collect_source(source, now))
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut reports = Vec::with_capacity(per_source.len());
        let mut combined = Vec::new();
        for (report, articles) in per_source {
            reports.push(report);
            combined.extend(articles);
        }

        let arrived = combined.len();
        let outcome = dedupe(combined, &self.dedupe);
        let mut corpus = outcome.articles;
        sort_corpus(&mut corpus);

        let run = RunOutcome {
            corpus,
            reports,
            duplicates_removed: outcome.removed,
        };
        info!(
            sources = run.reports.len(),
            failed = run.failed_sources(),
            arrived,
            duplicates = run.duplicates_removed,
            published = run.corpus.len(),
            "aggregation finished"
        );
        run
    }

    pub fn rules_for(&self, source: &Source, now: DateTime<Utc>) -> EntryRules {
        let window_days = source.window_days.unwrap_or(self.settings.window_days);
        EntryRules {
            now,
            window: Duration::days(i64::from(window_days)),
            description_cap: self.settings.description_cap,
            unwrap_redirects: self.settings.unwrap_redirects,
        }
    }

    async fn collect_source(&self, source: &Source, now: DateTime<Utc>) -> (SourceReport, Vec<Article>) {
        let mut report = SourceReport {
            name: source.name.clone(),
            url: source.url.clone(),
            ..SourceReport::default()
        };
        let rules = self.rules_for(source, now);
        let max_entries = source.max_entries.unwrap_or(self.settings.max_entries);

        let harvest = match fetch_articles(
            &self.client,
            source,
            &rules,
            max_entries,
            self.settings.max_retries,
        )
        .await
        {
            Ok(harvest) => harvest,
            Err(error) => {
                warn!(source = %source.name, url = %source.url, %error, "source skipped");
                report.status = SourceStatus::Failed;
                report.error = Some(error.to_string());
                return (report, Vec::new());
            }
        };

        report.fetched = harvest.entries_seen;
        report.incomplete = harvest.skipped_incomplete;
        report.window_rejected = harvest.skipped_window;
        report.repaired = harvest.repaired;

        let mut kept = Vec::with_capacity(harvest.articles.len());
        for mut article in harvest.articles {
            let haystack = article.haystack();
            if !self.filter.is_relevant_text(source, &haystack) {
                report.filter_rejected += 1;
                continue;
            }
            article.categories = self.taxonomy.categorize_text(&haystack);
            kept.push(article);
        }
        report.kept = kept.len();

        info!(
            source = %source.name,
            fetched = report.fetched,
            window_rejected = report.window_rejected,
            filter_rejected = report.filter_rejected,
            kept = report.kept,
            "source collected"
        );
        (report, kept)
    }
}
