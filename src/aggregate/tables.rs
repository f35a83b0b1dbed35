use std::path::{Path, PathBuf};

use crate::error::BenchError;

use super::aggregator::Evaluation;

/// Locations of the three evaluation tables for one output prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePaths {
    pub per_question: PathBuf,
    pub runs: PathBuf,
    pub per_model: PathBuf,
}

impl TablePaths {
    pub fn for_prefix(prefix: &str) -> Self {
        Self {
            per_question: PathBuf::from(format!("{prefix}_accuracy_per_question.csv")),
            runs: PathBuf::from(format!("{prefix}_runs.csv")),
            per_model: PathBuf::from(format!("{prefix}_per_model.csv")),
        }
    }
}

/// Writes the per-question, per-run and per-model tables.
///
/// A table that cannot be created is a configuration error.
pub fn write_tables(evaluation: &Evaluation, prefix: &str) -> Result<TablePaths, BenchError> {
    let paths = TablePaths::for_prefix(prefix);

    let mut writer = open(&paths.per_question)?;
    writer.write_record([
        "model",
        "question",
        "ground_truth",
        "verdicts",
        "entry_accuracy",
    ])?;
    for row in &evaluation.questions {
        writer.write_record([
            row.model.as_str(),
            row.question.as_str(),
            row.ground_truth.as_str(),
            serde_json::to_string(&row.verdicts)?.as_str(),
            format!("{:.4}", row.entry_accuracy).as_str(),
        ])?;
    }
    writer.flush()?;

    let mut writer = open(&paths.runs)?;
    writer.write_record([
        "model",
        "run_idx",
        "question",
        "ground_truth",
        "final_answer",
        "verdict",
        "judge_error",
        "reasoning_trace",
        "human_trace",
    ])?;
    for row in &evaluation.runs {
        writer.write_record([
            row.model.as_str(),
            row.run_idx.to_string().as_str(),
            row.question.as_str(),
            row.ground_truth.as_str(),
            row.final_answer.as_str(),
            row.verdict_label(),
            row.judge_error.as_deref().unwrap_or_default(),
            row.reasoning_trace.as_str(),
            row.human_trace.as_deref().unwrap_or_default(),
        ])?;
    }
    writer.flush()?;

    let mut writer = open(&paths.per_model)?;
    writer.write_record(["model", "avg_correctness"])?;
    for row in &evaluation.models {
        writer.write_record([
            row.model.as_str(),
            format!("{:.4}", row.avg_correctness).as_str(),
        ])?;
    }
    writer.flush()?;

    log::info!(
        "Wrote {}, {} and {}",
        paths.per_question.display(),
        paths.runs.display(),
        paths.per_model.display()
    );
    Ok(paths)
}

fn open(path: &Path) -> Result<csv::Writer<std::fs::File>, BenchError> {
    csv::Writer::from_path(path)
        .map_err(|e| BenchError::config(format!("cannot create {}", path.display()), e))
}
