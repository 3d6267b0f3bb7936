use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::config::SourceConfig;
use crate::core::filter::RelevancePolicy;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportSource {
    pub name: String,
    pub url: String,
    pub keywords: Vec<String>,
    pub trusted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportPreview {
    pub new_sources: Vec<ImportSource>,
    pub duplicate_sources: Vec<ImportSource>,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("invalid OPML content: {0}")]
    Opml(String),
    #[error("invalid JSON import format: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to render sources as TOML: {0}")]
    Toml(#[from] toml::ser::Error),
    #[error("unsupported import format: {0}")]
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Opml,
    UrlList,
    Json,
}

impl std::str::FromStr for ImportFormat {
    type Err = ImportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "opml" | "xml" => Ok(Self::Opml),
            "url_list" | "urls" | "txt" => Ok(Self::UrlList),
            "json" | "json_list" => Ok(Self::Json),
            unsupported => Err(ImportError::UnsupportedFormat(unsupported.to_string())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum JsonImportItem {
    Url(String),
    Object {
        url: String,
        name: Option<String>,
        #[serde(default)]
        keywords: Vec<String>,
        #[serde(default)]
        trusted: bool,
    },
}

pub fn parse_sources(format: ImportFormat, content: &str) -> Result<Vec<ImportSource>, ImportError> {
    match format {
        ImportFormat::Opml => parse_opml(content),
        ImportFormat::UrlList => Ok(parse_url_list(content)),
        ImportFormat::Json => parse_json_sources(content),
    }
}

pub fn parse_opml(opml_content: &str) -> Result<Vec<ImportSource>, ImportError> {
    let doc = roxmltree::Document::parse(opml_content)
        .map_err(|error| ImportError::Opml(error.to_string()))?;
    let mut results = Vec::new();

    for node in doc.descendants().filter(|node| node.has_tag_name("outline")) {
        let Some(feed_url) = node.attribute("xmlUrl") else {
            continue;
        };
        if feed_url.trim().is_empty() {
            continue;
        }

        let name = node
            .attribute("title")
            .or_else(|| node.attribute("text"))
            .unwrap_or(feed_url)
            .to_string();
        // OPML folders are not keywords; imports keep the default policy.
        results.push(ImportSource {
            name,
            url: feed_url.trim().to_string(),
            keywords: Vec::new(),
            trusted: false,
        });
    }

    Ok(results)
}

pub fn parse_url_list(input: &str) -> Vec<ImportSource> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| line.starts_with("http://") || line.starts_with("https://"))
        .map(|line| ImportSource {
            name: line.to_string(),
            url: line.to_string(),
            keywords: Vec::new(),
            trusted: false,
        })
        .collect()
}

pub fn parse_json_sources(input: &str) -> Result<Vec<ImportSource>, ImportError> {
    let items: Vec<JsonImportItem> = serde_json::from_str(input)?;
    let sources = items
        .into_iter()
        .map(|item| match item {
            JsonImportItem::Url(url) => ImportSource {
                name: url.clone(),
                url,
                keywords: Vec::new(),
                trusted: false,
            },
            JsonImportItem::Object {
                url,
                name,
                keywords,
                trusted,
            } => ImportSource {
                name: name.unwrap_or_else(|| url.clone()),
                url,
                keywords,
                trusted,
            },
        })
        .collect();
    Ok(sources)
}

/// Splits candidates into new sources and ones already configured or repeated.
pub fn build_import_preview(
    candidates: Vec<ImportSource>,
    existing_urls: &HashSet<String>,
) -> ImportPreview {
    let mut seen = HashSet::new();
    let mut duplicate_sources = Vec::new();
    let mut new_sources = Vec::new();

    for source in candidates {
        let normalized = normalize_url(&source.url);
        if normalized.is_empty() {
            continue;
        }

        if existing_urls.contains(&normalized) {
            duplicate_sources.push(source);
            continue;
        }

        if !seen.insert(normalized) {
            duplicate_sources.push(source);
            continue;
        }
        new_sources.push(source);
    }

    ImportPreview {
        new_sources,
        duplicate_sources,
    }
}

pub fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}

/// `[[sources]]` tables ready to append to the config file.
pub fn render_sources_toml(sources: &[ImportSource]) -> Result<String, ImportError> {
    #[derive(Serialize)]
    struct SourcesDocument {
        sources: Vec<SourceConfig>,
    }

    let document = SourcesDocument {
        sources: sources
            .iter()
            .map(|source| SourceConfig {
                url: source.url.clone(),
                name: source.name.clone(),
                keywords: source.keywords.clone(),
                policy: if source.keywords.is_empty() || source.trusted {
                    None
                } else {
                    Some(RelevancePolicy::Allow)
                },
                trusted: source.trusted,
                window_days: None,
                max_entries: None,
            })
            .collect(),
    };
    Ok(toml::to_string(&document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AppConfig;

    fn has_source_with_url(list: &[ImportSource], target: &str) -> bool {
        list.iter().any(|item| item.url == target)
    }

    #[test]
    fn parses_opml_fixture() {
        let opml = include_str!("../../../fixtures/import-samples/energy.opml");
        let sources = parse_opml(opml).expect("opml should parse");

        assert_eq!(sources.len(), 3);
        assert!(has_source_with_url(&sources, "https://www.utilitydive.com/feeds/news/"));
        let canary = sources
            .iter()
            .find(|source| source.name == "Canary Media")
            .expect("canary media should be imported");
        assert!(canary.keywords.is_empty());
    }

    #[test]
    fn opml_sources_load_back_with_deny_policy() {
        let opml = include_str!("../../../fixtures/import-samples/energy.opml");
        let sources = parse_opml(opml).expect("opml should parse");
        let rendered = render_sources_toml(&sources).expect("sources should render");
        assert!(!rendered.contains("policy"));

        let config = AppConfig::from_toml_str(&rendered).expect("rendered toml should parse");
        config.validate().expect("rendered config should validate");
        let loaded = config.sources();
        assert_eq!(loaded.len(), 3);
        assert!(loaded
            .iter()
            .all(|source| source.policy == RelevancePolicy::Deny && source.keywords.is_empty()));
    }

    #[test]
    fn rejects_malformed_opml() {
        assert!(matches!(parse_opml("<opml><body>"), Err(ImportError::Opml(_))));
    }

    #[test]
    fn parses_url_list() {
        let input = r#"
            # comment
            https://example.com/feed.xml
            https://example.com/atom.xml
            not-a-url
        "#;
        let items = parse_url_list(input);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://example.com/feed.xml");
    }

    #[test]
    fn parses_json_sources_from_string_and_object() {
        let json = r#"
            [
              "https://example.com/feed.xml",
              {
                "url": "https://www.google.com/alerts/feeds/1/2",
                "name": "Google Alert: SMR",
                "keywords": ["smr", "small modular reactor"]
              }
            ]
        "#;

        let items = parse_json_sources(json).expect("json should parse");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "https://example.com/feed.xml");
        assert_eq!(items[1].name, "Google Alert: SMR");
        assert_eq!(items[1].keywords.len(), 2);
    }

    #[test]
    fn format_aliases_resolve() {
        assert_eq!("urls".parse::<ImportFormat>().unwrap(), ImportFormat::UrlList);
        assert_eq!("OPML".parse::<ImportFormat>().unwrap(), ImportFormat::Opml);
        assert!(matches!(
            "yaml".parse::<ImportFormat>(),
            Err(ImportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn preview_marks_existing_and_duplicate_sources() {
        let candidate = |name: &str, url: &str| ImportSource {
            name: name.to_string(),
            url: url.to_string(),
            keywords: Vec::new(),
            trusted: false,
        };
        let candidates = vec![
            candidate("A", "https://example.com/feed.xml"),
            candidate("A duplicate", "https://example.com/feed.xml/"),
            candidate("B", "https://another.com/feed.xml"),
        ];
        let existing = HashSet::from([normalize_url("https://another.com/feed.xml")]);
        let preview = build_import_preview(candidates, &existing);

        assert_eq!(preview.new_sources.len(), 1);
        assert_eq!(preview.new_sources[0].name, "A");
        assert_eq!(preview.duplicate_sources.len(), 2);
    }

    #[test]
    fn rendered_sources_load_back_as_config() {
        let sources = parse_json_sources(
            r#"[{"url": "https://alerts.example.com/esg", "name": "ESG", "keywords": ["esg"]},
                {"url": "https://curated.example.com/rss", "name": "Curated", "trusted": true}]"#,
        )
        .expect("json should parse");
        let rendered = render_sources_toml(&sources).expect("sources should render");

        let config = AppConfig::from_toml_str(&rendered).expect("rendered toml should parse");
        config.validate().expect("rendered config should validate");
        let loaded = config.sources();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].policy, RelevancePolicy::Allow);
        assert_eq!(loaded[1].policy, RelevancePolicy::Bypass);
    }
}
