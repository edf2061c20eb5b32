use crate::app::ports::{HttpClientPort, HttpRequest};
use crate::config::Credentials;
use crate::constants::{LASTFM_API_BASE, SPOTIFY_API_BASE, YOUTUBE_API_BASE};
use crate::observability::metrics;
use crate::pipeline::{Pipeline, PipelineSummary};
use crate::sources::SourceKind;
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use hyper::Server;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub credentials: Arc<Credentials>,
    pub http: Arc<dyn HttpClientPort>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub artist: Option<String>,
}

fn error_response(detail: impl ToString) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"status": "error", "detail": detail.to_string()})),
    )
        .into_response()
}

fn success_response(message: String, summary: &PipelineSummary) -> Response {
    Json(json!({
        "status": "success",
        "message": message,
        "report_path": summary.report_path.display().to_string(),
        "run_id": summary.run_id,
        "steps": summary,
    }))
    .into_response()
}

/// Run the whole pipeline for the configured target artist.
async fn generate_report(State(state): State<AppState>) -> Response {
    let artist = state.pipeline.config().collection.target_artist.clone();
    let path = state.pipeline.reports().default_report_path();
    match state.pipeline.run(&artist, &path).await {
        Ok(summary) => success_response("✅ Weekly Genre Pulse Report Generated".to_string(), &summary),
        Err(e) => {
            error!("Report generation failed: {}", e);
            error_response(e)
        }
    }
}

/// Same pipeline, but collected for and written under `artist_name`.
async fn analyze_artist(
    State(state): State<AppState>,
    AxumPath(artist_name): AxumPath<String>,
) -> Response {
    let path = state.pipeline.reports().report_path_for(&artist_name);
    match state.pipeline.run(&artist_name, &path).await {
        Ok(summary) => success_response(
            format!("✅ Report generated for {}", artist_name),
            &summary,
        ),
        Err(e) => {
            error!(artist = %artist_name, "Artist analysis failed: {}", e);
            error_response(e)
        }
    }
}

async fn download_report(
    State(state): State<AppState>,
    Query(params): Query<DownloadParams>,
) -> Response {
    let reports = state.pipeline.reports();
    let path: PathBuf = match params.artist.as_deref() {
        Some(artist) if !artist.trim().is_empty() => reports.report_path_for(artist),
        _ => reports.default_report_path(),
    };

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"detail": "Report not found"})),
            )
                .into_response();
        }
        Err(e) => return error_response(e),
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report.md".to_string());
    (
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.pipeline.config();
    let timeout = Duration::from_secs(config.server.probe_timeout_secs);

    let mut services = BTreeMap::new();
    for kind in SourceKind::ALL {
        let configured = match kind {
            SourceKind::Spotify => state.credentials.spotify().is_some(),
            SourceKind::Youtube => state.credentials.youtube().is_some(),
            SourceKind::Lastfm => state.credentials.lastfm().is_some(),
        };
        let status = if configured {
            probe(state.http.as_ref(), kind, timeout).await
        } else {
            "not_configured"
        };
        services.insert(kind.as_str(), status);
    }

    Json(json!({
        "status": "✅ API is running",
        "data_directory_exists": config.paths.data_dir.is_dir(),
        "report_directory_exists": config.paths.reports_dir.is_dir(),
        "services": services,
    }))
}

/// Any HTTP answer counts as reachable; only transport failures do not.
async fn probe(http: &dyn HttpClientPort, kind: SourceKind, timeout: Duration) -> &'static str {
    let url = match kind {
        SourceKind::Spotify => SPOTIFY_API_BASE,
        SourceKind::Youtube => YOUTUBE_API_BASE,
        SourceKind::Lastfm => LASTFM_API_BASE,
    };
    let request = HttpRequest::get(url).timeout(timeout);
    match tokio::time::timeout(timeout, http.send(request)).await {
        Ok(Ok(_)) => "reachable",
        _ => "unreachable",
    }
}

/// Prometheus text; an empty body until a recorder is installed.
async fn metrics_handler() -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render().unwrap_or_default(),
    )
        .into_response()
}

/// Build the router with every route and layer.
pub fn create_server(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/generate_report", get(generate_report))
        .route("/download_report", get(download_report))
        .route("/analyze_artist/:artist_name", get(analyze_artist))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Start the HTTP server on `host:port`.
pub async fn start_server(
    state: AppState,
    host: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let app = create_server(state);

    info!("🚀 HTTP server running on http://{}", addr);
    println!("🚀 HTTP server running on http://localhost:{port}");
    println!("💚 Health check: http://localhost:{port}/health");
    println!("📝 Generate:     http://localhost:{port}/generate_report");

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
