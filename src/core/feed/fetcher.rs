use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use std::time::Duration;

use super::parser::looks_like_feed;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36";
pub const FEED_ACCEPT: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.8, */*;q=0.7";

#[derive(Debug, Clone)]
pub struct FetchedFeed {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
    #[error("received {content_type} instead of a feed; the feed may require auth or is blocked")]
    NotAFeed { content_type: String },
    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

/// Client shared by every source of a run.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(FEED_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

    let client = reqwest::Client::builder()
        .user_agent(HeaderValue::from_str(user_agent)?)
        .default_headers(headers)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

pub async fn fetch_feed(client: &reqwest::Client, url: &str) -> Result<FetchedFeed, FetchError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);
    let body = response.bytes().await?.to_vec();

    if let Some(declared) = content_type.as_deref() {
        if is_html(declared) && !looks_like_feed(&body) {
            return Err(FetchError::NotAFeed {
                content_type: declared.to_string(),
            });
        }
    }

    Ok(FetchedFeed { body, content_type })
}

pub async fn fetch_feed_with_retry(
    client: &reqwest::Client,
    url: &str,
    max_retries: usize,
) -> Result<FetchedFeed, FetchError> {
    let mut attempt = 0_usize;
    loop {
        match fetch_feed(client, url).await {
            Ok(result) => return Ok(result),
            Err(err) => {
                let should_retry = matches!(err, FetchError::Request(_))
                    || matches!(err, FetchError::HttpStatus(code) if code >= 500);
                if !should_retry || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                tracing::debug!(url, attempt, error = %err, "retrying feed fetch");
                tokio::time::sleep(Duration::from_millis(40 * attempt as u64)).await;
            }
        }
    }
}

fn is_html(content_type: &str) -> bool {
    let lowered = content_type.to_ascii_lowercase();
    lowered.starts_with("text/html") || lowered.starts_with("application/xhtml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::Response;
    use axum::routing::get;
    use axum::Router;
    use reqwest::header::USER_AGENT;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone)]
    struct AppState {
        request_count: Arc<AtomicUsize>,
    }

    fn response_with(status: StatusCode, content_type: &str, body: String) -> Response {
        let mut response = Response::new(axum::body::Body::from(body));
        *response.status_mut() = status;
        response.headers_mut().insert(
            CONTENT_TYPE,
            content_type.parse().expect("header must parse"),
        );
        response
    }

    async fn flaky_feed_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
        let counter = state.request_count.fetch_add(1, Ordering::SeqCst);
        if counter == 0 {
            return response_with(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain",
                "temporary failure".to_string(),
            );
        }

        let identified = headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|agent| agent.starts_with("Mozilla/5.0"))
            && headers
                .get(ACCEPT)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|accept| accept.contains("application/rss+xml"));
        if !identified {
            return response_with(StatusCode::FORBIDDEN, "text/plain", "blocked".to_string());
        }

        response_with(
            StatusCode::OK,
            "application/rss+xml",
            include_str!("../../../fixtures/feeds/alerts.rss.xml").to_string(),
        )
    }

    async fn login_page_handler() -> Response {
        response_with(
            StatusCode::OK,
            "text/html; charset=utf-8",
            "<!DOCTYPE html><html><body>Please sign in</body></html>".to_string(),
        )
    }

    async fn html_typed_feed_handler() -> Response {
        response_with(
            StatusCode::OK,
            "text/html",
            include_str!("../../../fixtures/feeds/alerts.rss.xml").to_string(),
        )
    }

    async fn missing_handler() -> Response {
        response_with(StatusCode::NOT_FOUND, "text/plain", "gone".to_string())
    }

    async fn spawn_test_server() -> (String, tokio::task::JoinHandle<()>) {
        let state = AppState {
            request_count: Arc::new(AtomicUsize::new(0)),
        };
        let app = Router::new()
            .route("/feed.xml", get(flaky_feed_handler))
            .route("/login", get(login_page_handler))
            .route("/html-typed.xml", get(html_typed_feed_handler))
            .route("/missing.xml", get(missing_handler))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener.local_addr().expect("local addr should exist");
        let join_handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server should run");
        });
        (format!("http://{address}"), join_handle)
    }

    fn test_client() -> reqwest::Client {
        build_client(DEFAULT_USER_AGENT, Duration::from_secs(5)).expect("client should build")
    }

    #[tokio::test]
    async fn fetch_feed_retries_and_sends_client_identity() {
        let (base, server_task) = spawn_test_server().await;
        let client = test_client();

        let fetched = fetch_feed_with_retry(&client, &format!("{base}/feed.xml"), 2)
            .await
            .expect("fetch should succeed with retry");
        assert!(fetched.body.starts_with(b"<?xml"));
        assert_eq!(fetched.content_type.as_deref(), Some("application/rss+xml"));

        server_task.abort();
    }

    #[tokio::test]
    async fn html_error_page_is_not_a_feed() {
        let (base, server_task) = spawn_test_server().await;
        let client = test_client();

        let result = fetch_feed_with_retry(&client, &format!("{base}/login"), 2).await;
        assert!(matches!(result, Err(FetchError::NotAFeed { .. })));

        let mislabelled = fetch_feed(&client, &format!("{base}/html-typed.xml"))
            .await
            .expect("feed served as text/html should still be accepted");
        assert!(looks_like_feed(&mislabelled.body));

        server_task.abort();
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let (base, server_task) = spawn_test_server().await;
        let client = test_client();

        let result = fetch_feed_with_retry(&client, &format!("{base}/missing.xml"), 3).await;
        assert!(matches!(result, Err(FetchError::HttpStatus(404))));

        server_task.abort();
    }
}
