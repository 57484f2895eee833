use super::*;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str, max_retries: u32) -> FirecrawlClient {
    let config = FirecrawlConfig {
        base_url: base_url.to_string(),
        api_key: "fc-test".to_string(),
        timeout_secs: 5,
        max_retries,
        backoff_base_ms: 0,
        crawl_poll_interval: Duration::from_millis(1),
        crawl_max_polls: 3,
    };
    let limiter = Arc::new(RateLimiter::new(100, Duration::from_millis(1)));
    FirecrawlClient::new(config, limiter).expect("failed to build test FirecrawlClient")
}

#[tokio::test]
async fn scrape_sends_bearer_key_and_returns_markdown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(header("authorization", "Bearer fc-test"))
        .and(body_partial_json(json!({"url": "https://acme.com/contact", "formats": ["markdown"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "markdown": "# Contact\njane@acme.com",
                "metadata": {"title": "Contact Us", "ogSiteName": "Acme", "sourceURL": "https://acme.com/contact", "statusCode": 200}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = test_client(&server.uri(), 0)
        .scrape("https://acme.com/contact")
        .await
        .unwrap();
    assert_eq!(page.url, "https://acme.com/contact");
    assert!(page.markdown.contains("jane@acme.com"));
    assert_eq!(page.metadata.title.as_deref(), Some("Contact Us"));
    assert_eq!(page.metadata.og_site_name.as_deref(), Some("Acme"));
}

#[tokio::test]
async fn scrape_reports_upstream_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": false, "error": "site blocked"})),
        )
        .mount(&server)
        .await;

    let err = test_client(&server.uri(), 0)
        .scrape("https://blocked.example")
        .await
        .unwrap_err();
    assert!(
        matches!(err, ScraperError::Upstream { ref message, .. } if message == "site blocked"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn error_status_carries_body_preview() {
    let server = MockServer::start().await;
    let long_body = "x".repeat(500);
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .respond_with(ResponseTemplate::new(402).set_body_string(long_body))
        .mount(&server)
        .await;

    let err = test_client(&server.uri(), 2)
        .scrape("https://acme.com")
        .await
        .unwrap_err();
    match err {
        ScraperError::UnexpectedStatus {
            status, preview, ..
        } => {
            assert_eq!(status, 402);
            assert_eq!(preview.len(), 200);
        }
        other => panic!("expected UnexpectedStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn rate_limited_response_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"markdown": "ok", "metadata": {}}
        })))
        .mount(&server)
        .await;

    let page = test_client(&server.uri(), 1)
        .scrape("https://acme.com")
        .await
        .unwrap();
    assert_eq!(page.markdown, "ok");
    assert_eq!(page.url, "https://acme.com");
}

#[tokio::test]
async fn extract_decodes_schema_output() {
    #[derive(Debug, Deserialize)]
    struct Out {
        profiles: Vec<crate::types::Profile>,
    }

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .and(body_partial_json(json!({"formats": ["extract"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"extract": {"profiles": [{"full_name": "Jane Doe", "title": "VP Sales"}]}}
        })))
        .mount(&server)
        .await;

    let out: Out = test_client(&server.uri(), 0)
        .extract("https://linkedin.com/search", "Extract profiles", &json!({"type": "object"}))
        .await
        .unwrap();
    assert_eq!(out.profiles.len(), 1);
    assert_eq!(out.profiles[0].full_name.as_deref(), Some("Jane Doe"));
    assert_eq!(out.profiles[0].company, None);
}

#[tokio::test]
async fn crawl_polls_until_completed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/crawl"))
        .and(body_partial_json(json!({"limit": 5, "maxDepth": 2, "includePaths": ["**/team*"]})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "id": "crawl-1"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/crawl/crawl-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "scraping"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/crawl/crawl-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "data": [
                {"markdown": "team page", "metadata": {"sourceURL": "https://acme.com/team"}},
                {"markdown": "home", "metadata": {"url": "https://acme.com/"}}
            ]
        })))
        .mount(&server)
        .await;

    let options = CrawlOptions {
        limit: 5,
        max_depth: 2,
        include_paths: vec!["**/team*".to_string()],
        exclude_paths: vec![],
    };
    let pages = test_client(&server.uri(), 0)
        .crawl("https://acme.com", &options)
        .await
        .unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].url, "https://acme.com/team");
    assert_eq!(pages[1].url, "https://acme.com/");
}

#[tokio::test]
async fn crawl_that_never_finishes_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/crawl"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "id": "slow"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/crawl/slow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "scraping"})))
        .expect(3)
        .mount(&server)
        .await;

    let options = CrawlOptions {
        limit: 1,
        max_depth: 1,
        include_paths: vec![],
        exclude_paths: vec![],
    };
    let err = test_client(&server.uri(), 0)
        .crawl("https://acme.com", &options)
        .await
        .unwrap_err();
    assert!(matches!(err, ScraperError::CrawlTimeout { polls: 3, .. }));
}

#[tokio::test]
async fn failed_crawl_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/crawl"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "id": "bad"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/crawl/bad"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "failed"})))
        .mount(&server)
        .await;

    let options = CrawlOptions {
        limit: 1,
        max_depth: 1,
        include_paths: vec![],
        exclude_paths: vec![],
    };
    let err = test_client(&server.uri(), 0)
        .crawl("https://acme.com", &options)
        .await
        .unwrap_err();
    assert!(matches!(err, ScraperError::CrawlFailed { ref status, .. } if status == "failed"));
}

#[test]
fn config_requires_api_key() {
    use leadgen_core::Environment;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    let mut app = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        db_max_connections: 1,
        db_min_connections: 1,
        db_acquire_timeout_secs: 1,
        firecrawl_api_key: None,
        firecrawl_base_url: "https://api.firecrawl.dev".to_string(),
        crawler_webhook_secret: None,
        rate_limit_max_tokens: 2,
        rate_limit_refill_ms: 1000,
        scraper_request_timeout_secs: 60,
        scraper_max_retries: 3,
        scraper_retry_backoff_base_secs: 2,
        webhook_delivery_timeout_secs: 10,
    };
    assert!(matches!(
        FirecrawlConfig::from_app_config(&app),
        Err(ScraperError::MissingApiKey)
    ));

    app.firecrawl_api_key = Some("fc-live".to_string());
    let config = FirecrawlConfig::from_app_config(&app).unwrap();
    assert_eq!(config.backoff_base_ms, 2000);
    assert!(!format!("{config:?}").contains("fc-live"));
}

#[tokio::test]
async fn crawl_follows_next_links_until_the_limit() {
    let server = MockServer::start().await;
    let next = format!("{}/v1/crawl/paged?skip=1", server.uri());
    Mock::given(method("POST"))
        .and(path("/v1/crawl"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "id": "paged"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/crawl/paged"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "data": [{"markdown": "page", "metadata": {"sourceURL": "https://acme.com/a"}}],
            "next": next,
        })))
        .mount(&server)
        .await;

    let options = CrawlOptions {
        limit: 3,
        max_depth: 1,
        include_paths: vec![],
        exclude_paths: vec![],
    };
    let pages = test_client(&server.uri(), 0)
        .crawl("https://acme.com", &options)
        .await
        .unwrap();
    assert_eq!(pages.len(), 3);
}

#[tokio::test]
async fn endless_next_links_hit_the_pagination_limit() {
    let server = MockServer::start().await;
    let next = format!("{}/v1/crawl/cycle?skip=1", server.uri());
    Mock::given(method("POST"))
        .and(path("/v1/crawl"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "id": "cycle"})),
        )
        .mount(&server)
        .await;
    // Every result page is empty and points back at itself.
    Mock::given(method("GET"))
        .and(path("/v1/crawl/cycle"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "data": [],
            "next": next,
        })))
        .expect(1 + MAX_CRAWL_RESULT_PAGES as u64)
        .mount(&server)
        .await;

    let options = CrawlOptions {
        limit: 10,
        max_depth: 1,
        include_paths: vec![],
        exclude_paths: vec![],
    };
    let err = test_client(&server.uri(), 0)
        .crawl("https://acme.com", &options)
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            ScraperError::PaginationLimit { ref crawl_id, max_pages }
                if crawl_id == "cycle" && max_pages == MAX_CRAWL_RESULT_PAGES
        ),
        "got {err:?}"
    );
}
