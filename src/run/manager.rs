use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    dataset::QuestionEntry,
    error::BenchError,
    pool::ProviderPool,
    record::{write_artifact, EntryRecord, TrialResult},
};

use super::layout::{allocate_run_dir, ensure_destination, RunDirectory};

/// What a finished run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub run_dir: RunDirectory,
    /// One artifact per provider, in registry order.
    pub artifacts: Vec<PathBuf>,
    pub records: Vec<(String, Vec<EntryRecord>)>,
    pub failed_trials: usize,
}

#[derive(Serialize)]
struct RunManifest<'a> {
    run_id: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    trials: usize,
    providers: &'a [String],
    entries: usize,
    failed_trials: usize,
}

/// Drives the provider pool over a dataset and persists the results.
///
/// Trials for an entry run strictly one after another: trial `i + 1` starts
/// only once every provider has finished trial `i`. Entries are processed in
/// input order.
pub struct RunManager {
    pool: ProviderPool,
    trials: usize,
    destination: PathBuf,
}

impl RunManager {
    pub fn new(pool: ProviderPool, trials: usize, destination: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            trials,
            destination: destination.into(),
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Runs every entry `trials` times and writes one artifact per provider
    /// into a freshly allocated run directory.
    ///
    /// Configuration problems (no providers, zero trials, unusable
    /// destination) are reported before any provider is called.
    pub async fn run(&self, entries: &[QuestionEntry]) -> Result<RunSummary, BenchError> {
        if self.trials == 0 {
            return Err(BenchError::ConfigError(
                "trial count must be at least 1".to_string(),
            ));
        }
        if self.pool.is_empty() {
            return Err(BenchError::ConfigError(
                "no providers registered".to_string(),
            ));
        }
        ensure_destination(&self.destination)?;

        let started_at = Utc::now();
        let records = self.collect(entries).await;
        let failed_trials = records
            .iter()
            .flat_map(|(_, recs)| recs.iter())
            .map(EntryRecord::failed_trials)
            .sum();

        let run_dir = allocate_run_dir(&self.destination)?;
        let (artifacts, mut write_failures) = write_artifacts(&run_dir, &records);

        let providers = self.pool.provider_names();
        let manifest = RunManifest {
            run_id: run_dir.name(),
            started_at,
            finished_at: Utc::now(),
            trials: self.trials,
            providers: &providers,
            entries: entries.len(),
            failed_trials,
        };
        let manifest_path = run_dir.path().join("run.json");
        if let Err(e) = std::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?) {
            write_failures.push(format!("{}: {e}", manifest_path.display()));
        }
        if !write_failures.is_empty() {
            return Err(BenchError::ConfigError(format!(
                "run {} finished but {} file(s) could not be written: {}",
                run_dir.name(),
                write_failures.len(),
                write_failures.join("; ")
            )));
        }

        log::info!(
            "Run {} finished: {} entries x {} trials x {} providers, {} failed trials",
            run_dir.name(),
            entries.len(),
            self.trials,
            providers.len(),
            failed_trials
        );
        Ok(RunSummary {
            run_dir,
            artifacts,
            records,
            failed_trials,
        })
    }

    /// Runs all trials without touching the filesystem.
    pub async fn collect(&self, entries: &[QuestionEntry]) -> Vec<(String, Vec<EntryRecord>)> {
        let names = self.pool.provider_names();
        let mut per_provider: Vec<(String, Vec<EntryRecord>)> = names
            .iter()
            .map(|name| (name.clone(), Vec::with_capacity(entries.len())))
            .collect();

        for (i, entry) in entries.iter().enumerate() {
            log::info!("[{}/{}] Query: {}", i + 1, entries.len(), entry.query);
            let mut records: Vec<EntryRecord> = names
                .iter()
                .map(|name| {
                    EntryRecord::new(
                        entry.query.clone(),
                        entry.ground_truth.clone(),
                        entry.image_path.clone(),
                        name.clone(),
                    )
                })
                .collect();

            for trial in 1..=self.trials {
                let mut outcome = self.pool.run_trial(&entry.image, &entry.query, trial).await;
                for record in records.iter_mut() {
                    let result = outcome.remove(&record.provider_name).unwrap_or_else(|| {
                        TrialResult::failure(&record.provider_name, trial, "provider produced no result")
                    });
                    record.trials.push(result);
                }
            }

            for record in &records {
                let answers: Vec<&str> = record
                    .trials
                    .iter()
                    .map(|t| t.final_answer.as_str())
                    .collect();
                log::info!(
                    "  {}: {:?} (ground truth: {})",
                    record.provider_name,
                    answers,
                    entry.ground_truth
                );
            }

            for ((_, provider_records), record) in per_provider.iter_mut().zip(records) {
                provider_records.push(record);
            }
        }
        per_provider
    }
}

/// Writes every provider's artifact, even after a failure, and returns the
/// written paths along with a description of each failed write.
pub(super) fn write_artifacts(
    run_dir: &RunDirectory,
    records: &[(String, Vec<EntryRecord>)],
) -> (Vec<PathBuf>, Vec<String>) {
    let mut artifacts = Vec::with_capacity(records.len());
    let mut failures = Vec::new();
    for (provider, provider_records) in records {
        let path = run_dir.artifact_path(provider);
        match write_artifact(&path, provider_records) {
            Ok(()) => artifacts.push(path),
            Err(e) => {
                log::error!("cannot write {}: {e}", path.display());
                failures.push(format!("{}: {e}", path.display()));
            }
        }
    }
    (artifacts, failures)
}
