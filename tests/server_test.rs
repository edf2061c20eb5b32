use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use genre_pulse::app::ports::{HttpClientPort, HttpRequest, HttpResponse};
use genre_pulse::config::{Config, Credentials};
use genre_pulse::pipeline::Pipeline;
use genre_pulse::server::{create_server, AppState};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;

/// Every request fails at the transport level.
struct Offline;

#[async_trait]
impl HttpClientPort for Offline {
    async fn send(&self, _request: HttpRequest) -> std::result::Result<HttpResponse, String> {
        Err("connection refused".to_string())
    }
}

/// Every request gets an empty 401, which still proves the host answers.
struct Unauthorized;

#[async_trait]
impl HttpClientPort for Unauthorized {
    async fn send(&self, _request: HttpRequest) -> std::result::Result<HttpResponse, String> {
        Ok(HttpResponse {
            status: 401,
            bytes: b"{}".to_vec(),
        })
    }
}

fn app_with(config: Config, credentials: Credentials, http: Arc<dyn HttpClientPort>) -> Router {
    let pipeline = Pipeline::from_config(config, &credentials, http.clone());
    create_server(AppState {
        pipeline: Arc::new(pipeline),
        credentials: Arc::new(credentials),
        http,
    })
}

fn app(root: &Path) -> Router {
    let mut config = Config::rooted_at(root);
    config.collection.failure_pause_secs = 0;
    app_with(config, Credentials::default(), Arc::new(Offline))
}

async fn get(app: &Router, uri: &str) -> Result<(StatusCode, HeaderMap, Vec<u8>)> {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty())?)
        .await?;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = hyper::body::to_bytes(response.into_body()).await?;
    Ok((status, headers, bytes.to_vec()))
}

fn json(bytes: &[u8]) -> Result<Value> {
    Ok(serde_json::from_slice(bytes)?)
}

#[tokio::test]
async fn download_before_generation_is_not_found() -> Result<()> {
    let dir = tempdir()?;
    let app = app(dir.path());

    let (status, _, body) = get(&app, "/download_report").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)?["detail"], "Report not found");
    Ok(())
}

#[tokio::test]
async fn generated_report_downloads_byte_for_byte() -> Result<()> {
    let dir = tempdir()?;
    let app = app(dir.path());

    let (status, _, body) = get(&app, "/generate_report").await?;
    assert_eq!(status, StatusCode::OK);
    let envelope = json(&body)?;
    assert_eq!(envelope["status"], "success");
    assert_eq!(envelope["message"], "✅ Weekly Genre Pulse Report Generated");
    assert!(envelope["run_id"].is_string());
    assert_eq!(envelope["steps"]["analysis"]["outcome"], "skipped");

    let report_path = envelope["report_path"]
        .as_str()
        .context("report_path missing")?
        .to_string();
    assert!(report_path.ends_with("weekly_genre_pulse.md"));

    let (status, headers, bytes) = get(&app, "/download_report").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, fs::read(&report_path)?);
    let disposition = headers[header::CONTENT_DISPOSITION].to_str()?;
    assert!(disposition.contains("weekly_genre_pulse.md"));
    assert!(headers[header::CONTENT_TYPE].to_str()?.starts_with("text/markdown"));
    Ok(())
}

#[tokio::test]
async fn artist_analysis_writes_an_artist_specific_report() -> Result<()> {
    let dir = tempdir()?;
    let app = app(dir.path());

    let (status, _, body) = get(&app, "/analyze_artist/Daft%20Punk").await?;
    assert_eq!(status, StatusCode::OK);
    let envelope = json(&body)?;
    assert_eq!(envelope["status"], "success");
    let report_path = envelope["report_path"]
        .as_str()
        .context("report_path missing")?;
    assert!(report_path.ends_with("daft_punk_genre_pulse.md"), "{}", report_path);
    let body = fs::read_to_string(report_path)?;
    assert!(body.contains("# Emerging Artist Analysis: Daft Punk"));

    let (status, _, bytes) = get(&app, "/download_report?artist=Daft%20Punk").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, fs::read(report_path)?);

    // the default report was never generated
    let (status, _, _) = get(&app, "/download_report").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn write_failures_become_the_error_envelope() -> Result<()> {
    let dir = tempdir()?;
    let blocker = dir.path().join("not_a_dir");
    fs::write(&blocker, "file")?;

    let mut config = Config::rooted_at(dir.path());
    config.collection.failure_pause_secs = 0;
    config.paths.reports_dir = blocker.join("reports");
    let app = app_with(config, Credentials::default(), Arc::new(Offline));

    let (status, _, body) = get(&app, "/generate_report").await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let envelope = json(&body)?;
    assert_eq!(envelope["status"], "error");
    let detail = envelope["detail"].as_str().context("detail missing")?;
    assert!(!detail.is_empty());
    Ok(())
}

#[tokio::test]
async fn health_reports_directories_and_sources() -> Result<()> {
    let dir = tempdir()?;
    let credentials = Credentials::from_lookup(|key| match key {
        "YOUTUBE_API_KEY" => Some("yt".to_string()),
        _ => None,
    });
    let app = app_with(Config::rooted_at(dir.path()), credentials.clone(), Arc::new(Offline));

    let (status, _, body) = get(&app, "/health").await?;
    assert_eq!(status, StatusCode::OK);
    let health = json(&body)?;
    assert_eq!(health["status"], "✅ API is running");
    assert_eq!(health["data_directory_exists"], false);
    assert_eq!(health["report_directory_exists"], false);
    assert_eq!(health["services"]["spotify"], "not_configured");
    assert_eq!(health["services"]["lastfm"], "not_configured");
    assert_eq!(health["services"]["youtube"], "unreachable");

    fs::create_dir_all(dir.path().join("data"))?;
    let app = app_with(Config::rooted_at(dir.path()), credentials, Arc::new(Unauthorized));
    let (_, _, body) = get(&app, "/health").await?;
    let health = json(&body)?;
    assert_eq!(health["data_directory_exists"], true);
    assert_eq!(health["services"]["youtube"], "reachable");
    Ok(())
}

#[tokio::test]
async fn metrics_without_a_recorder_is_an_empty_ok() -> Result<()> {
    let dir = tempdir()?;
    let app = app(dir.path());

    let (status, _, body) = get(&app, "/metrics").await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    Ok(())
}
