//! Integration tests for `HttpFetcher` and a collector run over a mock server.
//!
//! Each test stands up its own `wiremock` server so no real network traffic
//! is made.

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pbs_scraper::sources::reddit;
use pbs_scraper::{HttpFetcher, PageFetcher, ScraperError};

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(5, "pbs-test/0.1", 0, 0).expect("failed to build test fetcher")
}

fn fetcher_with_retries(max_retries: u32) -> HttpFetcher {
    HttpFetcher::new(5, "pbs-test/0.1", max_retries, 0).expect("failed to build test fetcher")
}

// ---------------------------------------------------------------------------
// Status handling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_text_returns_body_on_200() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/poe/build-guides"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;

    let body = fetcher()
        .fetch_text(&format!("{}/poe/build-guides", server.uri()))
        .await
        .unwrap();
    assert_eq!(body, "<html>ok</html>");
}

#[tokio::test]
async fn not_found_maps_to_not_found_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/missing", server.uri());
    let result = fetcher_with_retries(3).fetch_text(&url).await;
    match result {
        Err(ScraperError::NotFound { url: reported }) => assert_eq!(reported, url),
        other => panic!("expected NotFound, got: {other:?}"),
    }
}

#[tokio::test]
async fn rate_limit_reports_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let result = fetcher().fetch_text(&server.uri()).await;
    match result {
        Err(ScraperError::RateLimited {
            retry_after_secs, ..
        }) => assert_eq!(retry_after_secs, 30),
        other => panic!("expected RateLimited, got: {other:?}"),
    }
}

#[tokio::test]
async fn server_error_is_unexpected_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = fetcher().fetch_text(&server.uri()).await;
    assert!(
        matches!(result, Err(ScraperError::UnexpectedStatus { status: 503, .. })),
        "expected UnexpectedStatus 503, got: {result:?}"
    );
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn retries_after_429_and_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("second time lucky"))
        .mount(&server)
        .await;

    let body = fetcher_with_retries(1).fetch_text(&server.uri()).await.unwrap();
    assert_eq!(body, "second time lucky");
}

#[tokio::test]
async fn retry_exhaustion_returns_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .expect(2)
        .mount(&server)
        .await;

    let result = fetcher_with_retries(1).fetch_text(&server.uri()).await;
    assert!(
        matches!(result, Err(ScraperError::RateLimited { .. })),
        "expected RateLimited after retries, got: {result:?}"
    );
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_json_rejects_non_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let result = fetcher().fetch_json(&server.uri()).await;
    assert!(matches!(result, Err(ScraperError::Deserialize { .. })));
}

// ---------------------------------------------------------------------------
// Forum search over HTTP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn forum_search_listing_parses_from_http_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/r/PathOfExileBuilds/search.json"))
        .and(query_param("q", "league starter"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"children": [
                {"kind": "t3", "data": {
                    "title": "Cyclone Slayer is a great league starter",
                    "selftext": "",
                    "score": 120,
                    "num_comments": 12,
                    "upvote_ratio": 0.93,
                    "permalink": "/r/PathOfExileBuilds/comments/abc/cyclone/",
                    "link_flair_text": null
                }}
            ]}
        })))
        .mount(&server)
        .await;

    let body = fetcher()
        .fetch_text(&format!(
            "{}/r/PathOfExileBuilds/search.json?q=league%20starter",
            server.uri()
        ))
        .await
        .unwrap();
    let posts = reddit::parse_search(&body).unwrap();

    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].score, 120);
    assert!(posts[0].url.ends_with("/comments/abc/cyclone/"));
}
