use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::feed::types::Article;

pub const DEFAULT_MIN_TITLE_LEN: usize = 20;
pub const DEFAULT_MIN_TITLE_WORDS: usize = 3;
/// Earlier revisions of the aggregator used 0.7 and 0.9 as well; 0.8 is the documented default.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DedupeConfig {
    /// Titles shorter than this (in characters) are only compared by link.
    #[serde(default = "default_min_title_len")]
    pub min_title_len: usize,
    #[serde(default = "default_min_title_words")]
    pub min_title_words: usize,
    /// Titles are near-duplicates when their word-set Jaccard similarity exceeds this.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            min_title_len: DEFAULT_MIN_TITLE_LEN,
            min_title_words: DEFAULT_MIN_TITLE_WORDS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

fn default_min_title_len() -> usize {
    DEFAULT_MIN_TITLE_LEN
}

fn default_min_title_words() -> usize {
    DEFAULT_MIN_TITLE_WORDS
}

fn default_similarity_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}

#[derive(Debug, Clone, PartialEq)]
pub struct DedupeOutcome {
    pub articles: Vec<Article>,
    pub removed: usize,
}

/// Title prepared once for repeated comparisons.
struct TitleKey {
    eligible: bool,
    words: HashSet<String>,
}

impl TitleKey {
    fn new(title: &str, config: &DedupeConfig) -> Self {
        let folded = title.to_lowercase();
        let words: HashSet<String> = folded.split_whitespace().map(ToString::to_string).collect();
        let eligible = folded.chars().count() >= config.min_title_len
            && words.len() >= config.min_title_words;
        Self { eligible, words }
    }
}

/// Intersection size over union size; 0.0 when both sets are empty.
pub fn jaccard(left: &HashSet<String>, right: &HashSet<String>) -> f64 {
    let union = left.union(right).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = left.intersection(right).count();
    intersection as f64 / union as f64
}

pub fn title_similarity(left: &str, right: &str) -> f64 {
    let words = |title: &str| -> HashSet<String> {
        title
            .to_lowercase()
            .split_whitespace()
            .map(ToString::to_string)
            .collect()
    };
    jaccard(&words(left), &words(right))
}

pub fn is_duplicate(left: &Article, right: &Article, config: &DedupeConfig) -> bool {
    keys_match(
        left,
        &TitleKey::new(&left.title, config),
        right,
        &TitleKey::new(&right.title, config),
        config,
    )
}

fn keys_match(
    left: &Article,
    left_key: &TitleKey,
    right: &Article,
    right_key: &TitleKey,
    config: &DedupeConfig,
) -> bool {
    if left.link == right.link {
        return true;
    }
    if !left_key.eligible || !right_key.eligible {
        return false;
    }
    jaccard(&left_key.words, &right_key.words) > config.similarity_threshold
}

/// Keeps the first arrival of every duplicate group, preserving arrival order.
pub fn dedupe(articles: Vec<Article>, config: &DedupeConfig) -> DedupeOutcome {
    let total = articles.len();
    let mut accepted: Vec<(Article, TitleKey)> = Vec::with_capacity(total);

    for candidate in articles {
        let candidate_key = TitleKey::new(&candidate.title, config);
        if let Some((existing, _)) = accepted.iter().find(|(existing, existing_key)| {
            keys_match(&candidate, &candidate_key, existing, existing_key, config)
        }) {
            debug!(
                dropped = %candidate.link,
                kept = %existing.link,
                "duplicate article dropped"
            );
            continue;
        }
        accepted.push((candidate, candidate_key));
    }

    let articles: Vec<Article> = accepted.into_iter().map(|(article, _)| article).collect();
    DedupeOutcome {
        removed: total - articles.len(),
        articles,
    }
}
