use chrono_tz::Tz;

use super::PublishError;
use crate::core::feed::types::Article;

pub const CSV_HEADER: [&str; 7] = [
    "Date",
    "Title",
    "Description",
    "Link",
    "Source",
    "Categories",
    "Tags",
];
pub const CSV_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row per article. Categories and Tags carry the same joined tag list.
pub fn render_csv(corpus: &[Article], timezone: Tz) -> Result<String, PublishError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for article in corpus {
        let date = article
            .published_at
            .with_timezone(&timezone)
            .format(CSV_DATE_FORMAT)
            .to_string();
        let tags = article.categories.join(", ");
        writer.write_record([
            date.as_str(),
            article.title.as_str(),
            article.description.as_str(),
            article.link.as_str(),
            article.source.as_str(),
            tags.as_str(),
            tags.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|error| PublishError::Io(error.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}
