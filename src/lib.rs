//! Multi-provider visual question answering benchmark.
//!
//! Every dataset entry (an image and a question) is sent to all configured
//! providers at once, repeated for a number of sequential trials. Final
//! answers are extracted from the `<< answer >>` delimiter and persisted as
//! one JSON artifact per provider in a numbered run directory. Evaluation
//! reads those artifacts back, judges each trial against the ground truth
//! and derives per-question and per-model accuracy.
//!
//! ```no_run
//! use std::sync::Arc;
//! use vqa_bench::{
//!     backends::build_registry, config::BenchConfig, dataset::load_dataset,
//!     pool::ProviderPool, resilient::RetryExecutor, run::RunManager,
//! };
//!
//! # async fn demo() -> Result<(), vqa_bench::BenchError> {
//! let config = BenchConfig::default();
//! let registry = build_registry(&config)?;
//! let pool = ProviderPool::new(registry, RetryExecutor::new(config.retry.to_resilience()));
//! let entries = load_dataset("data/data.json".as_ref(), None)?;
//! let summary = RunManager::new(pool, 3, "inference_outputs").run(&entries).await?;
//! println!("{}", summary.run_dir.path().display());
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod backends;
pub mod config;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod judge;
pub mod pool;
pub mod provider;
pub mod record;
pub mod resilient;
pub mod run;

#[cfg(test)]
mod test_support;

pub use error::{BenchError, ErrorClass};
pub use provider::{ImageRef, ProviderRegistry, RawResponse, VisionProvider};
