use chrono::{DateTime, Duration, Utc};
use url::Url;

use super::types::{Article, DateOrigin, RawEntry};
use crate::core::text::{clean_text, truncate_with_ellipsis};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingTitle,
    MissingLink,
    MissingDate,
    OutsideWindow,
    InFuture,
}

/// Rules applied to every entry of one source during one fetch.
#[derive(Debug, Clone)]
pub struct EntryRules {
    pub now: DateTime<Utc>,
    pub window: Duration,
    pub description_cap: usize,
    pub unwrap_redirects: bool,
}

impl EntryRules {
    /// `None` when the window reaches past the earliest representable time.
    pub fn oldest_accepted(&self) -> Option<DateTime<Utc>> {
        self.now.checked_sub_signed(self.window)
    }
}

/// Builds the canonical article for `raw`, or says why the entry is dropped.
/// Categories are left empty for the categorizer.
pub fn to_article(raw: &RawEntry, source: &str, rules: &EntryRules) -> Result<Article, SkipReason> {
    let title = raw
        .title
        .as_deref()
        .map(clean_text)
        .filter(|title| !title.is_empty())
        .ok_or(SkipReason::MissingTitle)?;
    let link = raw
        .link
        .as_deref()
        .map(|link| canonical_link(link, rules.unwrap_redirects))
        .filter(|link| !link.is_empty())
        .ok_or(SkipReason::MissingLink)?;

    let (published_at, date_origin) = match (raw.published_at, raw.date_present) {
        (Some(published_at), _) => (published_at, DateOrigin::Feed),
        (None, true) => (rules.now, DateOrigin::Inferred),
        (None, false) => return Err(SkipReason::MissingDate),
    };
    if published_at > rules.now {
        return Err(SkipReason::InFuture);
    }
    if rules
        .oldest_accepted()
        .is_some_and(|oldest| published_at < oldest)
    {
        return Err(SkipReason::OutsideWindow);
    }

    let description = raw
        .summary
        .as_deref()
        .map(clean_text)
        .map(|text| truncate_with_ellipsis(&text, rules.description_cap))
        .unwrap_or_default();

    Ok(Article {
        title,
        description,
        link,
        published_at,
        date_origin,
        source: source.to_string(),
        categories: Vec::new(),
    })
}

/// Trims the link and, when asked, replaces a Google redirect
/// (`https://www.google.com/url?...&url=<target>`) with its target.
pub fn canonical_link(link: &str, unwrap_redirects: bool) -> String {
    let link = link.trim();
    if !unwrap_redirects {
        return link.to_string();
    }
    redirect_target(link).unwrap_or_else(|| link.to_string())
}

fn redirect_target(link: &str) -> Option<String> {
    let parsed = Url::parse(link).ok()?;
    let host = parsed.host_str()?;
    if !(host == "google.com" || host.ends_with(".google.com")) || parsed.path() != "/url" {
        return None;
    }
    parsed
        .query_pairs()
        .find(|(key, _)| key == "url" || key == "q")
        .map(|(_, value)| value.into_owned())
        .filter(|target| target.starts_with("http://") || target.starts_with("https://"))
}
