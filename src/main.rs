use anyhow::Context;
use clap::{Parser, Subcommand};
use genre_pulse::app::ports::HttpClientPort;
use genre_pulse::config::{Config, Credentials};
use genre_pulse::infra::ReqwestHttp;
use genre_pulse::logging;
use genre_pulse::observability::metrics;
use genre_pulse::pipeline::Pipeline;
use genre_pulse::server::{self, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "genre_pulse")]
#[command(about = "Weekly genre pulse: collect artist metrics, forecast and report")]
#[command(version)]
struct Cli {
    /// Path to the TOML config; defaults apply when the file is missing
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run collection, analysis and report once
    Run {
        /// Target artist (defaults to the configured one)
        #[arg(long)]
        artist: Option<String>,
    },
    /// Repeat `run` on a fixed interval
    Schedule {
        #[arg(long)]
        interval_hours: Option<u64>,
        #[arg(long)]
        artist: Option<String>,
    },
    /// Collect and persist source data only
    Collect {
        #[arg(long)]
        artist: Option<String>,
    },
    /// Forecast from the persisted Spotify table
    Analyze,
    /// Write the report without collecting
    Report {
        #[arg(long)]
        artist: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    let _log_guard = logging::init_logging(&config.paths.log_dir);
    if let Err(e) = metrics::init() {
        warn!("Metrics disabled: {}", e);
    }

    let credentials = Credentials::from_env();
    let http: Arc<dyn HttpClientPort> = Arc::new(ReqwestHttp::new());
    let default_artist = config.collection.target_artist.clone();
    let pipeline = Arc::new(Pipeline::from_config(config, &credentials, http.clone()));

    match cli.command {
        Commands::Serve { port } => {
            let server_config = pipeline.config().server.clone();
            let state = AppState {
                pipeline,
                credentials: Arc::new(credentials),
                http,
            };
            server::start_server(
                state,
                &server_config.host,
                port.unwrap_or(server_config.port),
            )
            .await
            .map_err(|e| anyhow::anyhow!("server error: {}", e))?;
        }
        Commands::Run { artist } => {
            println!("🚀 Running full pipeline...");
            let artist = artist.unwrap_or(default_artist);
            run_once(&pipeline, &artist).await?;
        }
        Commands::Schedule {
            interval_hours,
            artist,
        } => {
            let hours = interval_hours.unwrap_or(pipeline.config().schedule.interval_hours).max(1);
            let artist = artist.unwrap_or(default_artist);
            println!("⏰ Running every {} hours", hours);
            let mut ticker = tokio::time::interval(Duration::from_secs(hours * 3600));
            loop {
                ticker.tick().await;
                // a failed run is logged and the schedule keeps going
                if let Err(e) = run_once(&pipeline, &artist).await {
                    error!("Scheduled run failed: {:#}", e);
                }
            }
        }
        Commands::Collect { artist } => {
            println!("📡 Collecting source data...");
            let artist = artist.unwrap_or(default_artist);
            let (bundle, persisted) = pipeline.collect(&artist).await?;
            for (kind, status) in &bundle.status {
                let rows = persisted.rows.get(kind).copied().unwrap_or(0);
                println!("  {}: {} ({} rows)", kind, status, rows);
            }
        }
        Commands::Analyze => {
            println!("📈 Analyzing trends...");
            let outcome = pipeline.analyze().await;
            println!("  forecast: {}", outcome);
        }
        Commands::Report { artist } => {
            let path = match &artist {
                Some(name) => pipeline.reports().report_path_for(name),
                None => pipeline.reports().default_report_path(),
            };
            let artist = artist.unwrap_or(default_artist);
            pipeline.report(&artist, &path).await?;
            println!("✅ Report written to {}", path.display());
        }
    }
    Ok(())
}

async fn run_once(pipeline: &Pipeline, artist: &str) -> anyhow::Result<()> {
    let path = if artist == pipeline.config().collection.target_artist {
        pipeline.reports().default_report_path()
    } else {
        pipeline.reports().report_path_for(artist)
    };
    let summary = pipeline
        .run(artist, &path)
        .await
        .context("pipeline run failed")?;
    info!(run_id = %summary.run_id, "Run complete");
    println!("✅ Report written to {}", summary.report_path.display());
    println!("  forecast: {}", summary.analysis);
    Ok(())
}
