// tests/http_clients.rs
use std::time::Duration;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use news_digest::ingest::fetcher::{fetch_feed, HttpFeedFetcher};
use news_digest::ingest::types::FeedFetcher;
use news_digest::notify::{Notifier, WebhookFlavor, WebhookNotifier};
use news_digest::translate::{GoogleWebTranslator, Translator};
use news_digest::DigestError;

#[tokio::test]
async fn fetcher_returns_body_and_parses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(include_str!("fixtures/rss_sample.xml")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFeedFetcher::new("news-digest-test").unwrap();
    let feed = fetch_feed(&fetcher, &format!("{}/rss", server.uri()))
        .await
        .expect("feed");
    let titles: Vec<String> = feed.into_iter().map(|e| e.title).collect();
    assert_eq!(titles.len(), 4);
    assert_eq!(titles[0], "Samsung unveils new chip");
}

#[tokio::test]
async fn fetcher_maps_server_error_to_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let fetcher = HttpFeedFetcher::new("news-digest-test").unwrap();
    let url = format!("{}/rss", server.uri());
    let err = fetcher.fetch(&url).await.unwrap_err();
    assert!(matches!(err, DigestError::SourceUnavailable { .. }), "{err:?}");
    assert!(fetch_feed(&fetcher, &url).await.is_none());
}

#[tokio::test]
async fn fetcher_gives_up_after_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<rss/>")
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let fetcher = HttpFeedFetcher::new("news-digest-test")
        .unwrap()
        .with_timeout(Duration::from_millis(100));
    let err = fetcher.fetch(&server.uri()).await.unwrap_err();
    assert!(matches!(err, DigestError::SourceUnavailable { .. }));
}

#[tokio::test]
async fn non_feed_body_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<rss><channel><item><title>x</title></channel></rss>"))
        .mount(&server)
        .await;

    let fetcher = HttpFeedFetcher::new("news-digest-test").unwrap();
    assert!(fetch_feed(&fetcher, &server.uri()).await.is_none());
}

#[tokio::test]
async fn translator_joins_segments() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/translate"))
        .and(query_param("client", "gtx"))
        .and(query_param("sl", "en"))
        .and(query_param("tl", "ko"))
        .and(query_param("q", "Chip prices rise. Again."))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            [["칩 가격 상승. ", "Chip prices rise. ", null], ["또.", "Again.", null]],
            null,
            "en"
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let tr = GoogleWebTranslator::new("en", "ko")
        .unwrap()
        .with_endpoint(&format!("{}/translate", server.uri()));
    assert_eq!(tr.translate("Chip prices rise. Again.").await.unwrap(), "칩 가격 상승. 또.");
}

#[tokio::test]
async fn translator_errors_on_status_and_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("q", "down"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("q", "blank"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([[], null, "en"])))
        .mount(&server)
        .await;

    let tr = GoogleWebTranslator::new("en", "ko")
        .unwrap()
        .with_endpoint(&server.uri());
    assert!(matches!(
        tr.translate("down").await,
        Err(DigestError::TranslationFailed { .. })
    ));
    assert!(matches!(
        tr.translate("blank").await,
        Err(DigestError::TranslationFailed { .. })
    ));
}

async fn posted_json(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn webhook_posts_stamped_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let url = format!("{}/hook", server.uri());
    let slack = WebhookNotifier::new(Some(url.clone()));
    slack.send("daily done").await.unwrap();
    let discord = WebhookNotifier::new(Some(url)).with_flavor(WebhookFlavor::Discord);
    discord.send("weekly done").await.unwrap();

    let bodies = posted_json(&server).await;
    let text = bodies[0]["text"].as_str().unwrap();
    assert!(text.starts_with('['), "{text}");
    assert!(text.ends_with("] daily done"), "{text}");
    let content = bodies[1]["content"].as_str().unwrap();
    assert!(content.ends_with("] weekly done"), "{content}");
}

#[tokio::test]
async fn webhook_failure_is_an_error_and_missing_url_is_a_noop() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let n = WebhookNotifier::new(Some(server.uri()));
    assert!(matches!(
        n.send("x").await,
        Err(DigestError::NotificationFailed(_))
    ));

    let off = WebhookNotifier::new(Some("  ".into()));
    assert!(!off.is_enabled());
    off.send("x").await.unwrap();
}
