use html2text::render::text_renderer::TrivialDecorator;
use tracing::debug;

const RENDER_WIDTH: usize = 10_000;
const ELLIPSIS: &str = "...";

/// Renders markup to plain text: tags dropped, entities decoded, whitespace collapsed.
pub fn clean_text(input: &str) -> String {
    if input.trim().is_empty() {
        return String::new();
    }
    if !looks_like_markup(input) {
        return collapse_whitespace(input);
    }
    match html2text::config::with_decorator(TrivialDecorator::new())
        .string_from_read(input.as_bytes(), RENDER_WIDTH)
    {
        Ok(rendered) => collapse_whitespace(&rendered),
        Err(error) => {
            debug!(%error, "markup could not be rendered, keeping raw text");
            collapse_whitespace(input)
        }
    }
}

/// Caps `text` at `max_chars` characters, marking the cut with an ellipsis.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars).collect();
    format!("{}{ELLIPSIS}", kept.trim_end())
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Host of `link` without a leading `www.`.
pub fn host_of(link: &str) -> Option<String> {
    let parsed = url::Url::parse(link).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

fn looks_like_markup(input: &str) -> bool {
    input.contains('<') || input.contains('&')
}
