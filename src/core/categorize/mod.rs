use serde::{Deserialize, Serialize};

use crate::core::feed::types::Article;
use crate::core::filter::contains_any;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicRule {
    pub tag: String,
    pub keywords: Vec<String>,
}

/// Ordered tag table. Static for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    rules: Vec<TopicRule>,
}

impl Taxonomy {
    pub fn new(rules: Vec<TopicRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| TopicRule {
                tag: rule.tag.trim().to_string(),
                keywords: rule
                    .keywords
                    .iter()
                    .map(|keyword| keyword.trim().to_lowercase())
                    .filter(|keyword| !keyword.is_empty())
                    .collect(),
            })
            .filter(|rule| !rule.tag.is_empty())
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[TopicRule] {
        &self.rules
    }

    pub fn categorize(&self, article: &Article) -> Vec<String> {
        self.categorize_text(&article.haystack())
    }

    /// Every tag with at least one keyword in `haystack`, in table order.
    pub fn categorize_text(&self, haystack: &str) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for rule in &self.rules {
            if contains_any(haystack, &rule.keywords) && !tags.contains(&rule.tag) {
                tags.push(rule.tag.clone());
            }
        }
        tags
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        let table: [(&str, &[&str]); 8] = [
            (
                "renewable",
                &["renewable", "solar", "wind", "clean energy", "green energy", "sustainable energy"],
            ),
            (
                "technology",
                &["technology", "innovation", "digital", "artificial intelligence", "machine learning", "automation"],
            ),
            (
                "gridOperator",
                &["grid operator", "caiso", "ercot", "pjm", "miso", "nyiso", "ferc", "transmission"],
            ),
            (
                "dataCenters",
                &["data center", "datacenter", "cloud computing", "digital infrastructure"],
            ),
            (
                "esg",
                &["esg", "environmental", "governance", "sustainability", "corporate responsibility"],
            ),
            (
                "carbonMarkets",
                &["carbon credit", "carbon market", "carbon offset", "carbon trading", "emissions trading"],
            ),
            (
                "supplyChain",
                &["supply chain", "scope 3", "procurement", "supplier"],
            ),
            (
                "regulatory",
                &[
                    "regulation",
                    "regulatory",
                    "compliance",
                    "disclosure rule",
                    "environmental protection agency",
                    "securities and exchange commission",
                ],
            ),
        ];
        Self::new(
            table
                .iter()
                .map(|(tag, keywords)| TopicRule {
                    tag: tag.to_string(),
                    keywords: keywords.iter().map(|k| k.to_string()).collect(),
                })
                .collect(),
        )
    }
}
