//! End-to-end tests: the `issn-harvest` binary against a local mock of both
//! providers and a temporary SQLite fact table.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use issn_harvest::store::{FactStore, SqliteFactStore};
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Crossref title served for 1234-5678; tests change it between runs.
#[derive(Clone)]
struct Mock {
    title: Arc<Mutex<String>>,
}

async fn journal(State(mock): State<Mock>, Path(issn): Path<String>) -> Response {
    if issn == "1234-5678" {
        let title = mock.title.lock().unwrap().clone();
        Json(json!({ "message": { "title": title, "publisher": "P", "prefix": "10.1" } }))
            .into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn sources(Query(params): Query<HashMap<String, String>>) -> Response {
    if params.get("filter").map(String::as_str) == Some("issn:1234-5678") {
        Json(json!({ "results": [ { "country_code": "US", "is_oa": true } ] })).into_response()
    } else {
        Json(json!({ "results": [] })).into_response()
    }
}

async fn spawn_mock() -> (String, Mock) {
    let mock = Mock {
        title: Arc::new(Mutex::new("J".to_string())),
    };
    let app = Router::new()
        .route("/journals/{issn}", get(journal))
        .route("/sources", get(sources))
        .with_state(mock.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), mock)
}

struct Env {
    _tmp: TempDir,
    root: PathBuf,
    config: PathBuf,
}

fn setup(base_url: &str, issns: &[&str]) -> Env {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let mut csv = String::from("issn,name\n");
    for issn in issns {
        csv.push_str(&format!("{},x\n", issn));
    }
    fs::write(root.join("issn_master.csv"), csv).unwrap();

    let config = root.join("issn-harvest.toml");
    fs::write(
        &config,
        format!(
            r#"[store]
path = "{root}/data/facts.sqlite"

[ingest]
input = "{root}/issn_master.csv"
batch_size = 2
inter_chunk_delay_secs = 0

[http]
timeout_secs = 5

[providers.crossref]
base_url = "{base}"

[providers.openalex]
base_url = "{base}"
"#,
            root = root.display(),
            base = base_url
        ),
    )
    .unwrap();

    Env {
        _tmp: tmp,
        root,
        config,
    }
}

async fn run_cli(env: &Env, args: &[&str]) -> (String, String, bool) {
    let output = tokio::process::Command::new(env!("CARGO_BIN_EXE_issn-harvest"))
        .arg("--config")
        .arg(&env.config)
        .args(args)
        .output()
        .await
        .expect("failed to run issn-harvest");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

async fn open_store(env: &Env) -> SqliteFactStore {
    SqliteFactStore::connect(&env.root.join("data/facts.sqlite"), 1)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_init_idempotent() {
    let (base, _) = spawn_mock().await;
    let env = setup(&base, &[]);

    let (stdout, stderr, ok) = run_cli(&env, &["init"]).await;
    assert!(ok, "init failed: stdout={} stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    let (_, _, ok) = run_cli(&env, &["init"]).await;
    assert!(ok, "second init failed");
}

#[tokio::test]
async fn test_end_to_end_single_issn() {
    let (base, _) = spawn_mock().await;
    let env = setup(&base, &["1234-5678"]);

    let (stdout, stderr, ok) = run_cli(&env, &["run", "--progress", "off"]).await;
    assert!(ok, "run failed: stdout={} stderr={}", stdout, stderr);
    assert!(stdout.contains("appended: 1"), "{}", stdout);
    assert!(stdout.contains("ok"));

    let store = open_store(&env).await;
    let rows = store.history("1234-5678").await.unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.title.as_deref(), Some("J"));
    assert_eq!(row.publisher.as_deref(), Some("P"));
    assert_eq!(row.doi_prefix.as_deref(), Some("10.1"));
    assert_eq!(row.country_code.as_deref(), Some("US"));
    assert_eq!(row.is_open_access, Some(true));
    assert_eq!(row.fetch_date, chrono::Local::now().date_naive());
    assert_eq!(
        row.fingerprint,
        "ea38fdd22540643f6a97220e79c5d762e5a22d324640d7c2ce26d86b5292fc44"
    );
    store.close().await;

    let (stdout, _, ok) = run_cli(&env, &["run", "--progress", "off"]).await;
    assert!(ok);
    assert!(stdout.contains("appended: 0"), "{}", stdout);
    assert!(stdout.contains("unchanged: 1"), "{}", stdout);

    let store = open_store(&env).await;
    assert_eq!(store.stats().await.unwrap().rows, 1);
    store.close().await;
}

#[tokio::test]
async fn test_change_is_captured_as_new_row() {
    let (base, mock) = spawn_mock().await;
    let env = setup(&base, &["1234-5678", "0000-0001", "0000-0002"]);

    let (stdout, _, ok) = run_cli(&env, &["run", "--progress", "off"]).await;
    assert!(ok);
    assert!(stdout.contains("appended: 3"), "{}", stdout);

    *mock.title.lock().unwrap() = "J (Renamed)".to_string();
    let (stdout, _, ok) = run_cli(&env, &["run", "--progress", "off"]).await;
    assert!(ok);
    assert!(stdout.contains("appended: 1"), "{}", stdout);
    assert!(stdout.contains("unchanged: 2"), "{}", stdout);

    let (stdout, _, ok) = run_cli(&env, &["history", "1234-5678", "--json"]).await;
    assert!(ok);
    let rows: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    let titles: Vec<&str> = rows.iter().map(|r| r["title"].as_str().unwrap()).collect();
    assert!(titles.contains(&"J"));
    assert!(titles.contains(&"J (Renamed)"));
}

#[tokio::test]
async fn test_unknown_issns_store_empty_rows() {
    let (base, _) = spawn_mock().await;
    let env = setup(&base, &["0000-0001"]);

    let (_, _, ok) = run_cli(&env, &["run", "--progress", "off"]).await;
    assert!(ok);

    let store = open_store(&env).await;
    let rows = store.history("0000-0001").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, None);
    assert_eq!(rows[0].publisher, None);
    assert_eq!(rows[0].doi_prefix, None);
    assert_eq!(rows[0].country_code, None);
    assert_eq!(rows[0].is_open_access, None);
    store.close().await;
}

#[tokio::test]
async fn test_dry_run_and_limit() {
    let (base, _) = spawn_mock().await;
    let env = setup(&base, &["1234-5678", "0000-0001", "0000-0002"]);

    let (stdout, _, ok) =
        run_cli(&env, &["run", "--dry-run", "--limit", "2", "--progress", "off"]).await;
    assert!(ok);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("processed: 2"), "{}", stdout);
    assert!(stdout.contains("would append: 2"), "{}", stdout);

    let (stdout, _, ok) = run_cli(&env, &["stats"]).await;
    assert!(ok);
    assert!(stdout.contains("Rows:           0"), "{}", stdout);
}

#[tokio::test]
async fn test_provider_outage_defers_without_writing() {
    // Nothing listens on this port.
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let env = setup(&format!("http://127.0.0.1:{}", port), &["1234-5678"]);

    let (stdout, stderr, ok) = run_cli(&env, &["run", "--progress", "off"]).await;
    assert!(ok, "outage must not fail the run: {}", stderr);
    assert!(stdout.contains("deferred: 1"), "{}", stdout);
    assert!(stdout.contains("appended: 0"), "{}", stdout);
}

#[tokio::test]
async fn test_store_failure_is_fatal() {
    let (base, _) = spawn_mock().await;
    let env = setup(&base, &["1234-5678"]);
    // A regular file where the data directory should be.
    fs::write(env.root.join("data"), "not a directory").unwrap();

    let (_, stderr, ok) = run_cli(&env, &["run", "--progress", "off"]).await;
    assert!(!ok);
    assert!(stderr.contains("Error"), "{}", stderr);
}

#[tokio::test]
async fn test_missing_input_is_fatal() {
    let (base, _) = spawn_mock().await;
    let env = setup(&base, &[]);
    fs::remove_file(env.root.join("issn_master.csv")).unwrap();

    let (_, stderr, ok) = run_cli(&env, &["run"]).await;
    assert!(!ok);
    assert!(stderr.contains("ISSN input"), "{}", stderr);
}
