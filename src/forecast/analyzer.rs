use crate::config::AnalysisConfig;
use crate::constants::FORECAST_FILE;
use crate::error::{PulseError, Result};
use crate::forecast::arima::{ArimaOrder, AutoArima};
use crate::persistence::{read_table, Table};
use crate::sources::SourceKind;
use crate::types::StepOutcome;
use chrono::{Duration, Local, NaiveDate};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// One line of the forecast file. History rows carry the observation and
/// the in-sample fit; future rows only the forecast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow {
    pub ds: NaiveDate,
    pub observed: Option<f64>,
    pub forecast: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastSummary {
    pub order: ArimaOrder,
    pub aic: f64,
    pub value_column: Option<String>,
    pub history: usize,
    pub horizon: usize,
    pub path: PathBuf,
}

/// Fits an ARIMA model to the persisted Spotify table and writes a short
/// weekly forecast next to it.
pub struct TrendAnalyzer {
    data_dir: PathBuf,
    horizon: usize,
    value_column: Option<String>,
    model: AutoArima,
}

impl TrendAnalyzer {
    pub fn new(data_dir: impl Into<PathBuf>, config: &AnalysisConfig) -> Self {
        Self {
            data_dir: data_dir.into(),
            horizon: config.horizon,
            value_column: config.value_column.clone(),
            model: AutoArima::default(),
        }
    }

    pub fn input_path(&self) -> PathBuf {
        self.data_dir.join(SourceKind::Spotify.data_file())
    }

    pub fn output_path(&self) -> PathBuf {
        self.data_dir.join(FORECAST_FILE)
    }

    /// Run the analysis; never fails, the outcome says what happened.
    #[instrument(skip(self), fields(input = %self.input_path().display()))]
    pub fn analyze_trends(&self) -> StepOutcome {
        let input = self.input_path();
        if !input.exists() {
            warn!("No Spotify table to analyze");
            return StepOutcome::skipped(format!("{} not found", input.display()));
        }

        match self.try_analyze(&input) {
            Ok(summary) => {
                info!(
                    "📈 {} fitted on {} weeks (AIC {:.3}); forecast written to {}",
                    summary.order,
                    summary.history,
                    summary.aic,
                    summary.path.display()
                );
                StepOutcome::succeeded(format!(
                    "{} forecast for {} periods",
                    summary.order, summary.horizon
                ))
            }
            Err(PulseError::EmptyTable(path)) => {
                warn!("Spotify table is empty, skipping forecast");
                StepOutcome::skipped(format!("{} has no rows", path))
            }
            Err(e) => {
                warn!("Trend analysis failed: {}", e);
                StepOutcome::failed(e.to_string())
            }
        }
    }

    /// Fit and write the forecast; the file is only touched on success.
    pub fn try_analyze(&self, input: &Path) -> Result<ForecastSummary> {
        let table = read_table(input)?;
        if table.is_empty() {
            return Err(PulseError::EmptyTable(input.display().to_string()));
        }

        let (value_column, series) = self.observed_series(&table)?;
        let fit = self.model.fit(&series)?;
        let fitted = fit.fitted();
        let predicted = fit.forecast(self.horizon);

        let dates = weekly_dates(Local::now().date_naive(), series.len());
        let mut rows: Vec<ForecastRow> = dates
            .iter()
            .zip(series.iter().zip(fitted.iter()))
            .map(|(ds, (observed, fit))| ForecastRow {
                ds: *ds,
                observed: Some(*observed),
                forecast: *fit,
            })
            .collect();
        let last = dates.last().copied().unwrap_or_else(|| Local::now().date_naive());
        for (step, value) in predicted.iter().enumerate() {
            rows.push(ForecastRow {
                ds: last + Duration::weeks(step as i64 + 1),
                observed: None,
                forecast: Some(*value),
            });
        }

        let path = self.output_path();
        write_forecast(&path, &rows)?;

        Ok(ForecastSummary {
            order: fit.order,
            aic: fit.aic,
            value_column,
            history: series.len(),
            horizon: self.horizon,
            path,
        })
    }

    /// The column to model and its values. Uses the configured column when
    /// set, otherwise the first one; a table without columns is all zeros.
    fn observed_series(&self, table: &Table) -> Result<(Option<String>, Vec<f64>)> {
        let column = match &self.value_column {
            Some(name) => Some(table.column_index(name).ok_or_else(|| {
                PulseError::Config(format!("value column '{}' not in Spotify table", name))
            })?),
            None if table.headers.is_empty() => None,
            None => Some(0),
        };

        let Some(idx) = column else {
            return Ok((None, vec![0.0; table.len()]));
        };

        let name = table.headers[idx].clone();
        let values = table
            .rows
            .iter()
            .enumerate()
            .map(|(row, cells)| {
                let raw = cells.get(idx).map(String::as_str).unwrap_or("").trim();
                raw.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| PulseError::NonNumeric {
                        column: name.clone(),
                        row,
                        value: raw.to_string(),
                    })
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok((Some(name), values))
    }
}

/// `count` weekly dates with the last one on `end`.
fn weekly_dates(end: NaiveDate, count: usize) -> Vec<NaiveDate> {
    (0..count)
        .map(|i| end - Duration::weeks((count - 1 - i) as i64))
        .collect()
}

fn write_forecast(path: &Path, rows: &[ForecastRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::write_table;
    use tempfile::tempdir;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    fn analyzer(dir: &Path, value_column: Option<&str>) -> TrendAnalyzer {
        let config = AnalysisConfig {
            horizon: 4,
            value_column: value_column.map(str::to_string),
        };
        TrendAnalyzer::new(dir, &config)
    }

    #[test]
    fn missing_table_is_skipped_and_writes_nothing() {
        let dir = tempdir().unwrap();
        let analyzer = analyzer(dir.path(), None);
        assert!(matches!(analyzer.analyze_trends(), StepOutcome::Skipped { .. }));
        assert!(!analyzer.output_path().exists());
    }

    #[test]
    fn empty_table_is_skipped() {
        let dir = tempdir().unwrap();
        let analyzer = analyzer(dir.path(), None);
        fs::write(analyzer.input_path(), b"").unwrap();
        assert!(matches!(analyzer.analyze_trends(), StepOutcome::Skipped { .. }));
        assert!(!analyzer.output_path().exists());
    }

    #[test]
    fn numeric_first_column_produces_history_plus_horizon_rows() {
        let dir = tempdir().unwrap();
        let analyzer = analyzer(dir.path(), None);
        let rows: Vec<Vec<String>> = (0..10)
            .map(|i| vec![(60 + i).to_string(), format!("track {}", i)])
            .collect();
        let t = Table {
            headers: vec!["popularity".into(), "track_name".into()],
            rows,
        };
        write_table(&analyzer.input_path(), &t).unwrap();

        let outcome = analyzer.analyze_trends();
        assert!(outcome.is_success(), "{}", outcome);

        let written = read_table(&analyzer.output_path()).unwrap();
        assert_eq!(written.headers, vec!["ds", "observed", "forecast"]);
        assert_eq!(written.len(), 14);
        // future rows have no observation
        for row in &written.rows[10..] {
            assert!(row[1].is_empty());
            assert!(row[2].parse::<f64>().is_ok());
        }
        let today = Local::now().date_naive().to_string();
        assert_eq!(written.rows[9][0], today);
    }

    #[test]
    fn non_numeric_values_fail_without_writing() {
        let dir = tempdir().unwrap();
        let analyzer = analyzer(dir.path(), None);
        let t = table(&["title"], &[&["X"]]);
        write_table(&analyzer.input_path(), &t).unwrap();

        match analyzer.analyze_trends() {
            StepOutcome::Failed { reason } => assert!(reason.contains("title"), "{}", reason),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(!analyzer.output_path().exists());
    }

    #[test]
    fn configured_value_column_is_used() {
        let dir = tempdir().unwrap();
        let analyzer = analyzer(dir.path(), Some("listeners"));
        let t = table(
            &["name", "listeners"],
            &[&["a", "10"], &["b", "12"], &["c", "14"], &["d", "16"]],
        );
        write_table(&analyzer.input_path(), &t).unwrap();

        let summary = analyzer.try_analyze(&analyzer.input_path()).unwrap();
        assert_eq!(summary.value_column.as_deref(), Some("listeners"));
        assert_eq!(summary.history, 4);
    }

    #[test]
    fn unknown_value_column_is_a_failure() {
        let dir = tempdir().unwrap();
        let analyzer = analyzer(dir.path(), Some("streams"));
        write_table(&analyzer.input_path(), &table(&["popularity"], &[&["1"]])).unwrap();
        assert!(matches!(analyzer.analyze_trends(), StepOutcome::Failed { .. }));
    }

    #[test]
    fn table_without_columns_is_a_zero_series() {
        let analyzer = analyzer(Path::new("."), None);
        let t = Table {
            headers: Vec::new(),
            rows: vec![Vec::new(), Vec::new()],
        };
        let (column, series) = analyzer.observed_series(&t).unwrap();
        assert!(column.is_none());
        assert_eq!(series, vec![0.0, 0.0]);
    }

    #[test]
    fn weekly_dates_end_on_the_given_day() {
        let end = NaiveDate::from_ymd_opt(2024, 3, 29).unwrap();
        let dates = weekly_dates(end, 3);
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
                end - Duration::weeks(1),
                end,
            ]
        );
    }
}
