use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::BenchError;

use super::schema::SchemaVersion;
use super::types::EntryRecord;

/// Writes one provider's records as a pretty JSON array.
///
/// The file is written next to its destination first and then renamed, so a
/// reader never observes a half-written artifact.
pub fn write_artifact(path: &Path, records: &[EntryRecord]) -> Result<(), BenchError> {
    let json = serde_json::to_string_pretty(records)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    log::info!("Saved {} records to {}", records.len(), path.display());
    Ok(())
}

/// Reads an artifact of any known schema version.
///
/// A missing or malformed file is a configuration error.
pub fn load_records(path: &Path, model_hint: &str) -> Result<Vec<EntryRecord>, BenchError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| BenchError::config(format!("cannot read {}", path.display()), e))?;
    let value: Value = serde_json::from_str(&contents)
        .map_err(|e| BenchError::config(format!("invalid JSON in {}", path.display()), e))?;
    let records = match value {
        Value::Array(records) => records,
        _ => {
            return Err(BenchError::ConfigError(format!(
                "{} must contain a JSON array of records",
                path.display()
            )))
        }
    };

    let version = SchemaVersion::detect(&records);
    log::debug!("{}: reading as {:?}", path.display(), version);
    Ok(records
        .iter()
        .map(|record| version.adapt(record, model_hint))
        .collect())
}
