use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use serde::Deserialize;
use tracing::warn;

use super::types::{FeedFormat, ParsedFeed, RawEntry};

#[derive(Debug, thiserror::Error)]
pub enum FeedParseError {
    #[error("feed payload is empty")]
    EmptyPayload,
    #[error("xml feed parse error: {0}")]
    Xml(#[from] feed_rs::parser::ParseFeedError),
    #[error("json feed parse error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
struct JsonFeed {
    title: Option<String>,
    #[serde(default)]
    items: Vec<JsonFeedItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct JsonFeedItem {
    title: Option<String>,
    url: Option<String>,
    summary: Option<String>,
    content_text: Option<String>,
    content_html: Option<String>,
    date_published: Option<String>,
}

/// Parses RSS, Atom or JSON Feed bytes. A malformed XML document gets one
/// repair pass before the source is given up on.
pub fn parse_feed_bytes(raw: &[u8]) -> Result<ParsedFeed, FeedParseError> {
    let trimmed = trim_leading_ascii_whitespace(strip_bom(raw));
    if trimmed.is_empty() {
        return Err(FeedParseError::EmptyPayload);
    }
    if trimmed[0] == b'{' {
        return parse_json_feed(trimmed);
    }
    match parse_xml_feed(trimmed) {
        Ok(feed) => Ok(feed),
        Err(first_error) => {
            let repaired = repair_xml(trimmed);
            if repaired.as_slice() == trimmed {
                return Err(first_error);
            }
            warn!(error = %first_error, "feed did not parse cleanly, retrying repaired payload");
            let mut feed = parse_xml_feed(&repaired).map_err(|_| first_error)?;
            feed.repaired = true;
            Ok(feed)
        }
    }
}

pub fn looks_like_feed(raw: &[u8]) -> bool {
    let head: String = String::from_utf8_lossy(&raw[..raw.len().min(1024)]).to_lowercase();
    head.contains("<rss")
        || head.contains("<feed")
        || head.contains("<rdf:rdf")
        || head.contains("<channel")
        || head.trim_start().starts_with('{')
}

/// Stands in for a date element whose text did not parse, so entries can tell
/// an unreadable date from a missing one.
const UNPARSEABLE_DATE: DateTime<Utc> = DateTime::<Utc>::MIN_UTC;

fn parse_xml_feed(raw: &[u8]) -> Result<ParsedFeed, FeedParseError> {
    let feed = feed_rs::parser::Builder::new()
        .timestamp_parser(timestamp_or_marker)
        .build()
        .parse(raw)?;
    let title = feed
        .title
        .as_ref()
        .map(|text| text.content.clone())
        .unwrap_or_else(|| "Untitled Feed".to_string());
    let entries = feed.entries.iter().map(entry_from_xml).collect();

    Ok(ParsedFeed {
        format: FeedFormat::XmlFeed,
        title,
        entries,
        repaired: false,
    })
}

fn parse_json_feed(raw: &[u8]) -> Result<ParsedFeed, FeedParseError> {
    let feed: JsonFeed = serde_json::from_slice(raw)?;
    let title = feed.title.unwrap_or_else(|| "Untitled Feed".to_string());
    let entries = feed
        .items
        .into_iter()
        .map(|item| RawEntry {
            title: item.title,
            link: item.url,
            summary: item.summary.or(item.content_html).or(item.content_text),
            published_at: item.date_published.as_deref().and_then(parse_timestamp),
            date_present: item
                .date_published
                .as_deref()
                .is_some_and(|date| !date.trim().is_empty()),
        })
        .collect();

    Ok(ParsedFeed {
        format: FeedFormat::JsonFeed,
        title,
        entries,
        repaired: false,
    })
}

fn entry_from_xml(entry: &Entry) -> RawEntry {
    let title = entry.title.as_ref().map(|text| text.content.clone());
    let link = entry
        .links
        .iter()
        .find(|link| link.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| entry.links.first())
        .map(|entry_link| entry_link.href.clone());
    let summary = entry
        .summary
        .as_ref()
        .map(|text| text.content.clone())
        .or_else(|| entry.content.as_ref().and_then(|content| content.body.clone()));
    let stamp = entry.published.or(entry.updated);

    RawEntry {
        title,
        link,
        summary,
        published_at: stamp.filter(|stamp| *stamp != UNPARSEABLE_DATE),
        date_present: stamp.is_some(),
    }
}

fn timestamp_or_marker(text: &str) -> Option<DateTime<Utc>> {
    if text.trim().is_empty() {
        return None;
    }
    parse_timestamp(text).or(Some(UNPARSEABLE_DATE))
}

/// RFC 3339 first, then RFC 2822.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_rfc2822(value))
        .ok()
        .map(|timestamp| timestamp.with_timezone(&Utc))
}

/// Drops bytes before the first tag, invalid XML control characters, and
/// escapes ampersands that do not start an entity reference.
fn repair_xml(raw: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(raw);
    let start = text.find('<').unwrap_or(0);
    let body = &text[start..];

    let mut repaired = String::with_capacity(body.len());
    let mut rest = body;
    while let Some(ch) = rest.chars().next() {
        let width = ch.len_utf8();
        if ch == '&' && !starts_entity(&rest[width..]) {
            repaired.push_str("&amp;");
        } else if !is_xml_control(ch) {
            repaired.push(ch);
        }
        rest = &rest[width..];
    }
    repaired.into_bytes()
}

fn starts_entity(after_ampersand: &str) -> bool {
    let Some(end) = after_ampersand.find(';') else {
        return false;
    };
    if end == 0 || end > 10 {
        return false;
    }
    let name = &after_ampersand[..end];
    if let Some(numeric) = name.strip_prefix('#') {
        return match numeric.strip_prefix('x').or_else(|| numeric.strip_prefix('X')) {
            Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
            None => !numeric.is_empty() && numeric.chars().all(|c| c.is_ascii_digit()),
        };
    }
    name.chars().all(|c| c.is_ascii_alphanumeric())
}

fn is_xml_control(ch: char) -> bool {
    let code = ch as u32;
    code < 0x20 && code != 0x09 && code != 0x0A && code != 0x0D
}

fn strip_bom(raw: &[u8]) -> &[u8] {
    raw.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(raw)
}

fn trim_leading_ascii_whitespace(raw: &[u8]) -> &[u8] {
    let mut index = 0;
    while index < raw.len() && raw[index].is_ascii_whitespace() {
        index += 1;
    }
    &raw[index..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rss_fixture_feed() {
        let xml = include_bytes!("../../../fixtures/feeds/alerts.rss.xml");
        let parsed = parse_feed_bytes(xml).expect("rss fixture must parse");

        assert_eq!(parsed.format, FeedFormat::XmlFeed);
        assert!(!parsed.repaired);
        assert_eq!(parsed.title, "Grid Alerts");
        assert_eq!(parsed.entries.len(), 4);
        assert_eq!(
            parsed.entries[0].title.as_deref(),
            Some("ERCOT sets new summer demand record as solar output climbs")
        );
        assert_eq!(
            parsed.entries[0].published_at,
            Some(Utc.with_ymd_and_hms(2026, 10, 16, 14, 30, 0).unwrap())
        );
        assert_eq!(parsed.entries[3].published_at, None);
        assert!(!parsed.entries[3].date_present);
    }

    #[test]
    fn unparseable_date_is_present_but_unset() {
        let xml = b"<?xml version=\"1.0\"?>\n<rss version=\"2.0\"><channel><title>Wire</title>\
<item><title>Bad date</title><link>https://example.com/bad</link><pubDate>not a date</pubDate></item>\
<item><title>No date</title><link>https://example.com/none</link></item>\
<item><title>Good date</title><link>https://example.com/good</link><pubDate>Fri, 16 Oct 2026 14:30:00 GMT</pubDate></item>\
</channel></rss>";
        let parsed = parse_feed_bytes(xml).expect("feed must parse");

        let dates: Vec<(Option<DateTime<Utc>>, bool)> = parsed
            .entries
            .iter()
            .map(|entry| (entry.published_at, entry.date_present))
            .collect();
        assert_eq!(
            dates,
            vec![
                (None, true),
                (None, false),
                (Some(Utc.with_ymd_and_hms(2026, 10, 16, 14, 30, 0).unwrap()), true),
            ]
        );
    }

    #[test]
    fn parses_atom_fixture_feed() {
        let xml = include_bytes!("../../../fixtures/feeds/policy.atom.xml");
        let parsed = parse_feed_bytes(xml).expect("atom fixture must parse");

        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(
            parsed.entries[0].link.as_deref(),
            Some("https://policy.example.org/epa-disclosure")
        );
        assert!(parsed.entries[0].published_at.is_some());
    }

    #[test]
    fn parses_json_feed() {
        let json = include_bytes!("../../../fixtures/feeds/sample.jsonfeed.json");
        let parsed = parse_feed_bytes(json).expect("json feed must parse");

        assert_eq!(parsed.format, FeedFormat::JsonFeed);
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[0].title.as_deref(), Some("First entry"));
        assert!(parsed.entries[0].published_at.is_some());
        assert_eq!(parsed.entries[1].published_at, None);
        assert!(!parsed.entries[1].date_present);
    }

    #[test]
    fn bozo_feed_still_yields_entries() {
        let xml = b"junk before\n<?xml version=\"1.0\"?>\n<rss version=\"2.0\"><channel><title>AT&T News</title>\
<item><title>Wind & Solar\x01 Update</title><link>https://example.com/a?x=1&y=2</link></item>\
</channel></rss>";
        let parsed = parse_feed_bytes(xml).expect("malformed feed must still parse");

        assert_eq!(parsed.entries.len(), 1);
        let link = parsed.entries[0].link.as_deref().unwrap_or_default();
        assert!(link.ends_with("y=2"), "unexpected link {link}");
    }

    #[test]
    fn repair_drops_leading_junk_and_control_characters() {
        let repaired = repair_xml(b"junk\n<rss><title>Wind & Solar\x01 Update</title></rss>");
        assert_eq!(
            String::from_utf8(repaired).unwrap(),
            "<rss><title>Wind &amp; Solar Update</title></rss>"
        );
    }

    #[test]
    fn keeps_existing_entities_when_repairing() {
        let repaired = repair_xml(b"<a>&amp; &#38; &#x26; & done</a>");
        assert_eq!(
            String::from_utf8(repaired).unwrap(),
            "<a>&amp; &#38; &#x26; &amp; done</a>"
        );
    }

    #[test]
    fn unparseable_payload_is_an_error() {
        assert!(matches!(
            parse_feed_bytes(b"   "),
            Err(FeedParseError::EmptyPayload)
        ));
        assert!(parse_feed_bytes(b"<html><body>Sign in</body></html>").is_err());
    }

    #[test]
    fn sniffs_feed_documents() {
        assert!(looks_like_feed(b"<?xml version=\"1.0\"?><rss version=\"2.0\">"));
        assert!(looks_like_feed(b"<feed xmlns=\"http://www.w3.org/2005/Atom\">"));
        assert!(!looks_like_feed(b"<!DOCTYPE html><html><head>"));
    }

    #[test]
    fn timestamps_accept_rfc3339_and_rfc2822() {
        let expected = Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2026-10-01T08:00:00-04:00"), Some(expected));
        assert_eq!(parse_timestamp("Thu, 01 Oct 2026 12:00:00 +0000"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
