//! Indexing relay over real HTTP
//!
//! Runs the relay against a mock backend to check what actually goes on the wire.

use mockito::{Matcher, Server};
use rag_console::api::{IndexApi, RagClient};
use rag_console::config::Config;
use rag_console::files::FileList;
use rag_console::notice::NoticeSlot;
use rag_console::relay::{IndexingRelay, JobState, Outcome, ProgressEvent};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn relay_for(base_url: &str) -> (IndexingRelay, NoticeSlot) {
    let mut config = Config::default();
    config.server.base_url = base_url.to_string();
    config.server.timeout_secs = 5;

    let client: Arc<dyn IndexApi> = Arc::new(RagClient::new(&config).unwrap());
    let notices = NoticeSlot::new(Duration::from_millis(5000));
    let relay = IndexingRelay::new(client, notices.clone(), Duration::from_millis(2000));
    (relay, notices)
}

#[tokio::test]
async fn test_confirm_reply_never_sends_confirmed_true_on_its_own() {
    let mut server = Server::new_async().await;

    let unconfirmed = server
        .mock("POST", "/api/rag/reindex")
        .match_body(Matcher::Json(json!({ "confirmed": false })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"confirm","message":"Reindex all 2 files? This rebuilds the whole index."}"#)
        .expect(1)
        .create_async()
        .await;

    let destructive = server
        .mock("POST", "/api/rag/reindex")
        .match_body(Matcher::Json(json!({ "confirmed": true })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"success","message":"Reindexing started"}"#)
        .expect(0)
        .create_async()
        .await;

    let (mut relay, _) = relay_for(&server.url());

    let outcome = relay.request_reindex_all().await;
    assert!(matches!(outcome, Outcome::NeedsConfirmation(_)));

    relay.decline_reindex();
    assert!(relay.confirm_reindex_all().await.is_failed());

    unconfirmed.assert_async().await;
    destructive.assert_async().await;
}

#[tokio::test]
async fn test_confirmed_reindex_reaches_backend() {
    let mut server = Server::new_async().await;

    server
        .mock("POST", "/api/rag/reindex")
        .match_body(Matcher::Json(json!({ "confirmed": false })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"confirm","message":"Reindex?"}"#)
        .create_async()
        .await;

    let destructive = server
        .mock("POST", "/api/rag/reindex")
        .match_body(Matcher::Json(json!({ "confirmed": true })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"success","message":"Reindexing started"}"#)
        .expect(1)
        .create_async()
        .await;

    let (mut relay, notices) = relay_for(&server.url());
    relay.request_reindex_all().await;
    let outcome = relay.confirm_reindex_all().await;

    assert!(matches!(outcome, Outcome::Done(_)));
    assert_eq!(notices.current().unwrap().text, "Reindexing started");
    destructive.assert_async().await;
}

#[tokio::test]
async fn test_files_fetch_renders_markers() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/rag/files")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"status":"success","files":[{"filename":"a.pdf","is_indexed":true},{"filename":"b.pdf","is_indexed":false}]}"#,
        )
        .create_async()
        .await;

    let (relay, _) = relay_for(&server.url());
    let mut files = FileList::new();
    assert!(relay.refresh_files(&mut files).await);

    let rows = files.render();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].contains("a.pdf") && rows[0].contains("✅ Indexed"));
    assert!(rows[1].contains("b.pdf") && rows[1].contains("❌ Not indexed"));
}

#[tokio::test]
async fn test_error_status_with_json_body_is_server_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/rag/update_index")
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"error","message":"Virhe indeksoinnissa"}"#)
        .create_async()
        .await;

    let (mut relay, notices) = relay_for(&server.url());
    relay.on_progress_event(ProgressEvent::new(0.4, "Indexing a.pdf...", true));

    assert!(relay.request_update_index().await.is_failed());
    assert!(notices
        .current()
        .unwrap()
        .text
        .contains("Virhe indeksoinnissa"));
    assert!(matches!(relay.state(), JobState::Running { .. }));
}

#[tokio::test]
async fn test_cancel_network_error_leaves_job_running() {
    // nothing listens on the discard port
    let (mut relay, notices) = relay_for("http://127.0.0.1:9");
    relay.on_progress_event(ProgressEvent::new(0.5, "Indexing a.pdf...", true));
    let before = relay.view().clone();

    assert!(relay.request_cancel().await.is_failed());

    assert_eq!(relay.view(), &before);
    assert!(relay.view().cancel_visible);
    assert!(notices.current().unwrap().text.starts_with("Cancel failed"));
}

#[tokio::test]
async fn test_non_json_error_body_reports_http_status() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/rag/cancel")
        .with_status(502)
        .with_body("Bad Gateway")
        .create_async()
        .await;

    let (mut relay, notices) = relay_for(&server.url());
    relay.request_cancel().await;

    assert_eq!(
        notices.current().unwrap().text,
        "Cancel failed: HTTP 502: Bad Gateway"
    );
}
