pub mod entry;
pub mod fetcher;
pub mod parser;
pub mod types;

use tracing::debug;

use entry::{to_article, EntryRules, SkipReason};
use fetcher::{fetch_feed_with_retry, FetchError};
use parser::{parse_feed_bytes, FeedParseError};
use types::{Article, ParsedFeed, Source};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] FeedParseError),
}

/// Articles converted from one feed document, with the entries that did not make it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Harvest {
    pub articles: Vec<Article>,
    pub entries_seen: usize,
    pub skipped_incomplete: usize,
    pub skipped_window: usize,
    pub repaired: bool,
}

/// Fetches and parses one source. Window and field rules are applied here;
/// relevance and categories are left to the caller.
pub async fn fetch_articles(
    client: &reqwest::Client,
    source: &Source,
    rules: &EntryRules,
    max_entries: usize,
    max_retries: usize,
) -> Result<Harvest, SourceError> {
    let fetched = fetch_feed_with_retry(client, &source.url, max_retries).await?;
    let parsed = parse_feed_bytes(&fetched.body)?;
    Ok(harvest(&parsed, source, rules, max_entries))
}

pub fn harvest(parsed: &ParsedFeed, source: &Source, rules: &EntryRules, max_entries: usize) -> Harvest {
    let mut result = Harvest {
        repaired: parsed.repaired,
        ..Harvest::default()
    };
    for raw in parsed.entries.iter().take(max_entries) {
        result.entries_seen += 1;
        match to_article(raw, &source.name, rules) {
            Ok(article) => result.articles.push(article),
            Err(
                reason @ (SkipReason::MissingTitle | SkipReason::MissingLink | SkipReason::MissingDate),
            ) => {
                debug!(source = %source.name, ?reason, "entry skipped");
                result.skipped_incomplete += 1;
            }
            Err(reason @ (SkipReason::OutsideWindow | SkipReason::InFuture)) => {
                debug!(source = %source.name, ?reason, title = ?raw.title, "entry outside window");
                result.skipped_window += 1;
            }
        }
    }
    result
}
