use crate::app::ports::HttpClientPort;
use crate::collector::{CollectionBundle, DataCollector, SourceStatus};
use crate::config::{Config, Credentials};
use crate::constants::BUNDLE_FILE;
use crate::error::Result;
use crate::forecast::TrendAnalyzer;
use crate::observability::metrics;
use crate::persistence::{PersistedTables, PersistenceWriter};
use crate::report::{self, ReportGenerator};
use crate::sources::SourceKind;
use crate::types::StepOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// What one pipeline run did, step by step.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub run_id: Uuid,
    pub target_artist: String,
    pub started_at: DateTime<Utc>,
    pub report_path: PathBuf,
    pub sources: BTreeMap<SourceKind, SourceStatus>,
    pub persisted: BTreeMap<SourceKind, usize>,
    pub analysis: StepOutcome,
    pub duration_ms: u64,
}

/// Collect → persist → analyze → report.
///
/// Each step reads what the previous one wrote to disk. Runs hold a lock
/// for their whole duration so two triggers never write the shared data
/// files at the same time.
pub struct Pipeline {
    config: Config,
    collector: DataCollector,
    writer: PersistenceWriter,
    analyzer: TrendAnalyzer,
    reports: ReportGenerator,
    run_lock: Mutex<()>,
}

impl Pipeline {
    pub fn new(config: Config, collector: DataCollector) -> Self {
        if !report::covers_comparisons(&config.collection.comparison_artists) {
            warn!(
                configured = ?config.collection.comparison_artists,
                "Configured comparison artists differ from the ones the report compares against"
            );
        }
        Self {
            writer: PersistenceWriter::new(&config.paths.data_dir),
            analyzer: TrendAnalyzer::new(&config.paths.data_dir, &config.analysis),
            reports: ReportGenerator::new(&config.paths.reports_dir),
            collector,
            config,
            run_lock: Mutex::new(()),
        }
    }

    pub fn from_config(
        config: Config,
        credentials: &Credentials,
        http: Arc<dyn HttpClientPort>,
    ) -> Self {
        let collector = DataCollector::from_config(credentials, &config.collection, http);
        Self::new(config, collector)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn reports(&self) -> &ReportGenerator {
        &self.reports
    }

    /// Run every step for `target_artist` and write the report to `report_path`.
    ///
    /// Source failures and analysis problems are recorded in the summary;
    /// only failing to write files is an error.
    #[instrument(skip(self, report_path), fields(report = %report_path.display()))]
    pub async fn run(&self, target_artist: &str, report_path: &Path) -> Result<PipelineSummary> {
        let _guard = self.run_lock.lock().await;
        let started = Instant::now();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        metrics::pipeline::run_started();
        info!("🚀 Pipeline run {} started for '{}'", run_id, target_artist);

        let (bundle, persisted) = self.collect_step(target_artist).await?;
        let analysis = self.analyze_step();

        let mut summary = PipelineSummary {
            run_id,
            target_artist: target_artist.to_string(),
            started_at,
            report_path: report_path.to_path_buf(),
            sources: bundle.status,
            persisted: persisted.rows,
            analysis,
            duration_ms: 0,
        };

        self.reports
            .save_report(report_path, target_artist, Some(&summary))?;
        metrics::pipeline::step_outcome("report", "succeeded");

        let elapsed = started.elapsed();
        summary.duration_ms = elapsed.as_millis() as u64;
        metrics::pipeline::duration(elapsed.as_secs_f64());
        info!(
            "✅ Pipeline run {} finished in {}ms",
            run_id, summary.duration_ms
        );
        Ok(summary)
    }

    /// Collection and persistence only.
    pub async fn collect(&self, target_artist: &str) -> Result<(CollectionBundle, PersistedTables)> {
        let _guard = self.run_lock.lock().await;
        self.collect_step(target_artist).await
    }

    /// Forecast from whatever is already persisted.
    pub async fn analyze(&self) -> StepOutcome {
        let _guard = self.run_lock.lock().await;
        self.analyze_step()
    }

    /// Write the report without touching the data files.
    pub async fn report(&self, target_artist: &str, report_path: &Path) -> Result<()> {
        let _guard = self.run_lock.lock().await;
        self.reports.save_report(report_path, target_artist, None)
    }

    async fn collect_step(&self, target_artist: &str) -> Result<(CollectionBundle, PersistedTables)> {
        let bundle = self
            .collector
            .collect_all_data(target_artist, self.config.collection.days)
            .await;
        bundle.write_json(&self.config.paths.data_dir.join(BUNDLE_FILE))?;
        metrics::pipeline::step_outcome("collect", "succeeded");

        let spotify = bundle.records(SourceKind::Spotify);
        let youtube = bundle.records(SourceKind::Youtube);
        let lastfm = bundle.records(SourceKind::Lastfm);
        let persisted =
            self.writer
                .process_api_data(spotify.as_ref(), youtube.as_ref(), lastfm.as_ref())?;
        metrics::pipeline::step_outcome("persist", "succeeded");
        Ok((bundle, persisted))
    }

    fn analyze_step(&self) -> StepOutcome {
        let outcome = self.analyzer.analyze_trends();
        if !outcome.is_success() {
            warn!("Analysis step: {}", outcome);
        }
        metrics::pipeline::step_outcome("analyze", outcome.label());
        outcome
    }
}
