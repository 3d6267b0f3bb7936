use serde::{Deserialize, Serialize};

use crate::core::feed::types::{Article, Source};

/// How a source's entries are admitted into the corpus.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelevancePolicy {
    /// Reject when any off-topic keyword appears; used for curated sources.
    #[default]
    Deny,
    /// Accept only when an industry keyword appears; used for broad sources.
    Allow,
    /// Accept everything; the source is filtered upstream.
    Bypass,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelevanceFilter {
    off_topic: Vec<String>,
    industry: Vec<String>,
}

impl RelevanceFilter {
    pub fn new(off_topic: &[String], industry: &[String]) -> Self {
        Self {
            off_topic: lowercase_all(off_topic),
            industry: lowercase_all(industry),
        }
    }

    pub fn is_relevant(&self, source: &Source, article: &Article) -> bool {
        self.is_relevant_text(source, &article.haystack())
    }

    /// `haystack` must already be lower-cased.
    pub fn is_relevant_text(&self, source: &Source, haystack: &str) -> bool {
        match source.policy {
            RelevancePolicy::Bypass => true,
            RelevancePolicy::Deny => !contains_any(haystack, &self.off_topic),
            RelevancePolicy::Allow => {
                if source.keywords.is_empty() {
                    contains_any(haystack, &self.industry)
                } else {
                    source
                        .keywords
                        .iter()
                        .any(|keyword| haystack.contains(&keyword.to_lowercase()))
                }
            }
        }
    }
}

pub fn contains_any(haystack: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .any(|keyword| !keyword.is_empty() && haystack.contains(keyword.as_str()))
}

fn lowercase_all(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|keyword| keyword.trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::feed::types::DateOrigin;
    use chrono::Utc;

    fn source(policy: RelevancePolicy, keywords: &[&str]) -> Source {
        Source {
            url: "https://example.com/feed.xml".to_string(),
            name: "Example".to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            policy,
            window_days: None,
            max_entries: None,
        }
    }

    fn article(title: &str, description: &str) -> Article {
        Article {
            title: title.to_string(),
            description: description.to_string(),
            link: "https://example.com/a".to_string(),
            published_at: Utc::now(),
            date_origin: DateOrigin::Feed,
            source: "Example".to_string(),
            categories: Vec::new(),
        }
    }

    fn filter() -> RelevanceFilter {
        RelevanceFilter::new(
            &["Celebrity".to_string(), "gossip".to_string(), "sports".to_string()],
            &["renewable".to_string(), "grid".to_string(), "ESG".to_string()],
        )
    }

    #[test]
    fn allow_list_rejects_off_topic_without_industry_keyword() {
        let gossip = article("Celebrity gossip roundup", "Who wore what this week");
        assert!(!filter().is_relevant(&source(RelevancePolicy::Allow, &[]), &gossip));
    }

    #[test]
    fn bypass_accepts_anything() {
        let gossip = article("Celebrity gossip roundup", "Who wore what this week");
        assert!(filter().is_relevant(&source(RelevancePolicy::Bypass, &[]), &gossip));
    }

    #[test]
    fn allow_list_accepts_case_insensitive_industry_match() {
        let story = article("New ESG disclosure guidance", "");
        assert!(filter().is_relevant(&source(RelevancePolicy::Allow, &[]), &story));
    }

    #[test]
    fn allow_list_prefers_source_keywords() {
        let story = article("ERCOT issues conservation appeal", "Texas demand peaks");
        let ercot = source(RelevancePolicy::Allow, &["ERCOT"]);
        assert!(filter().is_relevant(&ercot, &story));

        let grid_only = article("Grid upgrade approved", "");
        assert!(!filter().is_relevant(&ercot, &grid_only));
    }

    #[test]
    fn deny_list_rejects_on_description_match() {
        let story = article("Weekend roundup", "Plus the latest in sports betting");
        assert!(!filter().is_relevant(&source(RelevancePolicy::Deny, &[]), &story));

        let clean = article("Solar capacity doubles", "Utility-scale additions");
        assert!(filter().is_relevant(&source(RelevancePolicy::Deny, &[]), &clean));
    }
}
