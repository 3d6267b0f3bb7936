use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::core::aggregate::{SourceReport, SourceStatus};
use crate::core::config::ChannelConfig;
use crate::core::feed::types::Article;
use crate::core::text::host_of;

pub const DISPLAY_DATE_FORMAT: &str = "%b %d, %Y";
pub const GENERATED_DISPLAY_FORMAT: &str = "%B %d, %Y at %I:%M %p %Z";

/// Run figures the page needs beyond the corpus itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusStats {
    pub reports: Vec<SourceReport>,
    pub duplicates_removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageModel {
    pub title: String,
    pub description: String,
    pub generated_at: DateTime<Utc>,
    pub generated_display: String,
    pub stats: PageStats,
    pub articles: Vec<PageArticle>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageStats {
    pub count: usize,
    pub sources: usize,
    pub failed_sources: usize,
    pub duplicates_removed: usize,
    pub inferred_dates: usize,
    /// Articles per tag, for the page's category filters.
    pub categories: BTreeMap<String, usize>,
    pub reports: Vec<SourceReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageArticle {
    pub title: String,
    pub link: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub display_date: String,
    pub source: String,
    pub source_label: String,
    pub website: Option<String>,
    pub categories: Vec<String>,
    pub date_inferred: bool,
}

pub fn build_page_model(
    corpus: Vec<Article>,
    channel: &ChannelConfig,
    timezone: Tz,
    label_prefixes: &[String],
    stats: CorpusStats,
    generated_at: DateTime<Utc>,
) -> PageModel {
    let mut categories = BTreeMap::new();
    for tag in corpus.iter().flat_map(|article| &article.categories) {
        *categories.entry(tag.clone()).or_insert(0) += 1;
    }
    let inferred_dates = corpus.iter().filter(|article| article.date_inferred()).count();
    let failed_sources = stats
        .reports
        .iter()
        .filter(|report| report.status == SourceStatus::Failed)
        .count();

    let articles: Vec<PageArticle> = corpus
        .into_iter()
        .map(|article| PageArticle {
            display_date: article
                .published_at
                .with_timezone(&timezone)
                .format(DISPLAY_DATE_FORMAT)
                .to_string(),
            source_label: source_label(&article.source, label_prefixes),
            website: host_of(&article.link),
            date_inferred: article.date_inferred(),
            title: article.title,
            link: article.link,
            description: article.description,
            published_at: article.published_at,
            source: article.source,
            categories: article.categories,
        })
        .collect();

    PageModel {
        title: channel.title.clone(),
        description: channel.description.clone(),
        generated_at,
        generated_display: generated_at
            .with_timezone(&timezone)
            .format(GENERATED_DISPLAY_FORMAT)
            .to_string(),
        stats: PageStats {
            count: articles.len(),
            sources: stats.reports.len(),
            failed_sources,
            duplicates_removed: stats.duplicates_removed,
            inferred_dates,
            categories,
            reports: stats.reports,
        },
        articles,
    }
}

/// Source name with the first matching configured prefix removed.
pub fn source_label(source: &str, prefixes: &[String]) -> String {
    prefixes
        .iter()
        .filter(|prefix| !prefix.is_empty())
        .find_map(|prefix| source.strip_prefix(prefix.as_str()))
        .unwrap_or(source)
        .trim()
        .to_string()
}
