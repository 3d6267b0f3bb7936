use std::io::Write;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::PublishError;
use crate::core::config::ChannelConfig;
use crate::core::feed::types::Article;

/// RSS 2.0 document for an already sorted corpus, capped at `max_items`.
pub fn render_feed_document(
    corpus: &[Article],
    channel: &ChannelConfig,
    timezone: Tz,
    generated_at: DateTime<Utc>,
    max_items: usize,
) -> Result<String, PublishError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut rss_start = BytesStart::new("rss");
    rss_start.push_attribute(("version", "2.0"));
    writer.write_event(Event::Start(rss_start))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;
    write_text_element(&mut writer, "title", &channel.title)?;
    write_text_element(&mut writer, "description", &channel.description)?;
    write_text_element(&mut writer, "link", &channel.link)?;
    write_text_element(&mut writer, "language", &channel.language)?;
    write_text_element(
        &mut writer,
        "lastBuildDate",
        &generated_at.with_timezone(&timezone).to_rfc2822(),
    )?;

    for article in corpus.iter().take(max_items) {
        writer.write_event(Event::Start(BytesStart::new("item")))?;
        write_text_element(&mut writer, "title", &article.title)?;
        write_text_element(&mut writer, "description", &article.description)?;
        write_text_element(&mut writer, "link", &article.link)?;
        write_text_element(
            &mut writer,
            "pubDate",
            &article.published_at.with_timezone(&timezone).to_rfc2822(),
        )?;
        write_text_element(&mut writer, "source", &article.source)?;
        if !article.categories.is_empty() {
            write_text_element(&mut writer, "categories", &article.categories.join(", "))?;
        }
        writer.write_event(Event::End(BytesEnd::new("item")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    let mut document = writer.into_inner();
    document.push(b'\n');
    Ok(String::from_utf8(document)?)
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<(), PublishError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(&strip_xml_controls(text))))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

// XML 1.0 allows tab, LF and CR below 0x20 and nothing else.
fn strip_xml_controls(text: &str) -> String {
    text.chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || c >= ' ')
        .collect()
}
