use crate::error::Result;
use crate::sources::SourceKind;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A flat table of string cells; columns in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Build a table from a JSON payload.
    ///
    /// Arrays give one row per element; an object gives a single row; any
    /// other shape (or no payload) gives an empty table. Non-object array
    /// elements land in a `value` column.
    pub fn from_payload(payload: Option<&Value>) -> Self {
        let records: Vec<&Value> = match payload {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(obj @ Value::Object(_)) => vec![obj],
            _ => Vec::new(),
        };

        let mut headers: Vec<String> = Vec::new();
        for record in &records {
            match record {
                Value::Object(map) => {
                    for key in map.keys() {
                        if !headers.iter().any(|h| h == key) {
                            headers.push(key.clone());
                        }
                    }
                }
                _ => {
                    if !headers.iter().any(|h| h == "value") {
                        headers.push("value".to_string());
                    }
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                headers
                    .iter()
                    .map(|h| match record {
                        Value::Object(map) => map.get(h).map(cell).unwrap_or_default(),
                        other if h == "value" => cell(other),
                        _ => String::new(),
                    })
                    .collect()
            })
            .collect();

        Self { headers, rows }
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}

/// Write `table` to `path`, replacing the file. A table with no columns
/// becomes a zero-byte file.
pub fn write_table(path: &Path, table: &Table) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    if table.headers.is_empty() {
        fs::write(path, b"")?;
        return Ok(());
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a table written by [`write_table`]; a zero-byte file is an empty table.
pub fn read_table(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }
    Ok(Table { headers, rows })
}

/// Row counts written per source.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PersistedTables {
    pub rows: BTreeMap<SourceKind, usize>,
}

/// Writes one CSV per source into the data directory.
pub struct PersistenceWriter {
    data_dir: PathBuf,
}

impl PersistenceWriter {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn path_for(&self, kind: SourceKind) -> PathBuf {
        self.data_dir.join(kind.data_file())
    }

    /// Persist the three source payloads; absent payloads produce empty files.
    pub fn process_api_data(
        &self,
        spotify: Option<&Value>,
        youtube: Option<&Value>,
        lastfm: Option<&Value>,
    ) -> Result<PersistedTables> {
        fs::create_dir_all(&self.data_dir)?;
        let mut persisted = PersistedTables::default();
        for (kind, payload) in [
            (SourceKind::Spotify, spotify),
            (SourceKind::Youtube, youtube),
            (SourceKind::Lastfm, lastfm),
        ] {
            let table = Table::from_payload(payload);
            let path = self.path_for(kind);
            write_table(&path, &table)?;
            debug!(source = %kind, path = %path.display(), "Wrote {} rows", table.len());
            persisted.rows.insert(kind, table.len());
        }
        info!("💾 Persisted source tables to {}", self.data_dir.display());
        Ok(persisted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn columns_follow_first_seen_key_order() {
        let payload = json!([
            {"b": 1, "a": "x"},
            {"a": "y", "c": {"nested": true}}
        ]);
        let table = Table::from_payload(Some(&payload));
        assert_eq!(table.headers, vec!["b", "a", "c"]);
        assert_eq!(table.rows[0], vec!["1", "x", ""]);
        assert_eq!(table.rows[1], vec!["", "y", r#"{"nested":true}"#]);
    }

    #[test]
    fn object_is_one_row_and_scalars_are_empty() {
        let obj = json!({"name": "Nova Sound", "listeners": 10});
        assert_eq!(Table::from_payload(Some(&obj)).len(), 1);
        assert!(Table::from_payload(Some(&json!(42))).headers.is_empty());
        assert!(Table::from_payload(None).is_empty());
    }

    #[test]
    fn scalar_elements_use_a_value_column() {
        let table = Table::from_payload(Some(&json!([3, "four", null])));
        assert_eq!(table.headers, vec!["value"]);
        assert_eq!(table.rows, vec![vec!["3"], vec!["four"], vec![""]]);
    }

    #[test]
    fn all_absent_payloads_still_produce_three_readable_files() {
        let dir = tempdir().unwrap();
        let writer = PersistenceWriter::new(dir.path());
        let persisted = writer.process_api_data(None, None, None).unwrap();

        for kind in SourceKind::ALL {
            let path = writer.path_for(kind);
            assert!(path.exists(), "{} missing", path.display());
            assert_eq!(fs::metadata(&path).unwrap().len(), 0);
            assert!(read_table(&path).unwrap().is_empty());
            assert_eq!(persisted.rows[&kind], 0);
        }
    }

    #[test]
    fn tables_survive_a_write_read_cycle_with_awkward_cells() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.csv");
        let payload = json!([{"title": "Hello, \"World\"\nline two", "views": 12}]);
        let table = Table::from_payload(Some(&payload));
        write_table(&path, &table).unwrap();
        assert_eq!(read_table(&path).unwrap(), table);
    }

    #[test]
    fn rewrite_replaces_previous_contents() {
        let dir = tempdir().unwrap();
        let writer = PersistenceWriter::new(dir.path());
        writer
            .process_api_data(Some(&json!([{"a": 1}, {"a": 2}])), None, None)
            .unwrap();
        writer.process_api_data(None, None, None).unwrap();
        assert!(read_table(&writer.path_for(SourceKind::Spotify)).unwrap().is_empty());
    }
}
