use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{error::BenchError, provider::ImageRef};

/// One question about one image, with its reference answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionEntry {
    pub query: String,
    /// Resolved location of the image.
    pub image: ImageRef,
    /// Image path exactly as written in the dataset, kept for traceability.
    pub image_path: String,
    pub ground_truth: String,
}

#[derive(Debug, Deserialize)]
struct DatasetRow {
    image: DatasetImage,
    query: String,
    #[serde(default)]
    answer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DatasetImage {
    path: String,
}

/// Loads `[{image: {path}, query, answer}, ...]`.
///
/// Image paths are resolved against `image_root`, defaulting to the parent of
/// the dataset's directory. Entries keep their input order.
pub fn load_dataset(path: &Path, image_root: Option<&Path>) -> Result<Vec<QuestionEntry>, BenchError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| BenchError::config(format!("cannot read dataset {}", path.display()), e))?;
    let rows: Vec<DatasetRow> = serde_json::from_str(&contents)
        .map_err(|e| BenchError::config(format!("invalid dataset {}", path.display()), e))?;

    let root = image_root
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_image_root(path));

    let entries: Vec<QuestionEntry> = rows
        .into_iter()
        .map(|row| QuestionEntry {
            image: ImageRef::new(root.join(&row.image.path)),
            image_path: row.image.path,
            query: row.query,
            ground_truth: row.answer.unwrap_or_default(),
        })
        .collect();
    log::info!("Loaded {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

fn default_image_root(dataset: &Path) -> PathBuf {
    dataset
        .parent()
        .map(|dir| dir.join(".."))
        .unwrap_or_else(|| PathBuf::from(".."))
}
