// tests/sheets_store.rs
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use news_digest::sink::sheets::GoogleSheetsStore;
use news_digest::sink::{header_row, SinkSession, TabularStore, ALL_NEWS, TABLES};
use news_digest::DigestError;

fn store(server: &MockServer) -> GoogleSheetsStore {
    GoogleSheetsStore::with_endpoint(&server.uri(), "sid", "tok").unwrap()
}

async fn mount_meta(server: &MockServer, titles: &[&str]) {
    let sheets: Vec<_> = titles
        .iter()
        .map(|t| json!({ "properties": { "title": t } }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sid"))
        .and(query_param("fields", "sheets.properties.title"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sheets": sheets })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn missing_sheet_is_created() {
    let server = MockServer::start().await;
    mount_meta(&server, &["Filtered News"]).await;
    Mock::given(method("POST"))
        .and(path("/v4/spreadsheets/sid:batchUpdate"))
        .and(body_partial_json(json!({
            "requests": [{ "addSheet": { "properties": { "title": "All News" } } }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let s = store(&server);
    s.ensure_table(ALL_NEWS).await.unwrap();
    // Already present: metadata only, no second addSheet.
    s.ensure_table("Filtered News").await.unwrap();
}

#[tokio::test]
async fn read_rows_stringifies_cells() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/v4/spreadsheets/sid/values/'All%20News'$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "'All News'!A1:G2",
            "values": [["search_time", "article_date"], ["05-13 08:00", 5, null]]
        })))
        .mount(&server)
        .await;

    let rows = store(&server).read_rows(ALL_NEWS).await.unwrap();
    assert_eq!(rows[1], vec!["05-13 08:00", "5", ""]);
}

#[tokio::test]
async fn empty_range_reads_as_no_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/values/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "range": "x" })))
        .mount(&server)
        .await;

    assert!(store(&server).read_rows(ALL_NEWS).await.unwrap().is_empty());
}

#[tokio::test]
async fn append_sends_raw_rows_and_maps_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r":append$"))
        .and(query_param("valueInputOption", "RAW"))
        .and(query_param("insertDataOption", "INSERT_ROWS"))
        .and(body_partial_json(json!({ "values": [["a", "b"]] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let s = store(&server);
    s.append_rows(ALL_NEWS, &[vec!["a".into(), "b".into()]])
        .await
        .unwrap();

    let err = s
        .append_rows(ALL_NEWS, &[vec!["other".into()]])
        .await
        .unwrap_err();
    assert!(matches!(err, DigestError::SinkWriteFailed { .. }), "{err:?}");
}

#[tokio::test]
async fn session_open_writes_header_into_empty_sheets() {
    let server = MockServer::start().await;
    mount_meta(&server, &TABLES).await;
    Mock::given(method("GET"))
        .and(path_regex(r"/values/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"!A1$"))
        .and(query_param("valueInputOption", "RAW"))
        .and(body_partial_json(json!({ "values": [header_row()] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&server)
        .await;

    let s = store(&server);
    let mut session = SinkSession::open(&s, &TABLES).await.unwrap();
    session.close().await;
}
