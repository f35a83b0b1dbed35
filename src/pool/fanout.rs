use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;

use crate::{
    error::BenchError,
    extract::{find_answer, UNKNOWN_ANSWER},
    provider::{ImageRef, ProviderRegistry, VisionProvider},
    record::TrialResult,
    resilient::RetryExecutor,
};

/// Results of one trial, keyed by provider name.
pub type TrialOutcome = BTreeMap<String, TrialResult>;

/// Runs every registered provider concurrently for one trial.
///
/// Each call spawns one worker task per provider and waits for all of them
/// before returning, so the pool never outlives the trial. Every provider is
/// wrapped individually in the retry executor; a provider that fails
/// terminally (or panics) yields an error-tagged [`TrialResult`] and never
/// affects its siblings.
pub struct ProviderPool {
    registry: ProviderRegistry,
    executor: RetryExecutor,
    require_answer_token: bool,
}

impl ProviderPool {
    pub fn new(registry: ProviderRegistry, executor: RetryExecutor) -> Self {
        Self {
            registry,
            executor,
            require_answer_token: false,
        }
    }

    /// Treat a response without `<< >>` as a terminal provider error instead
    /// of recording the unknown-answer sentinel.
    pub fn require_answer_token(mut self, require: bool) -> Self {
        self.require_answer_token = require;
        self
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Asks every provider the same question and waits for all of them.
    pub async fn run_trial(&self, image: &ImageRef, query: &str, trial_index: usize) -> TrialOutcome {
        let image = Arc::new(image.clone());
        let query: Arc<str> = Arc::from(query);

        let (names, handles): (Vec<String>, Vec<_>) = self
            .registry
            .iter()
            .map(|(id, provider)| {
                let worker = Worker {
                    name: id.to_string(),
                    provider: provider.clone(),
                    executor: self.executor.clone(),
                    image: image.clone(),
                    query: query.clone(),
                    trial_index,
                    require_answer_token: self.require_answer_token,
                };
                (id.to_string(), tokio::spawn(worker.run()))
            })
            .unzip();

        names
            .into_iter()
            .zip(join_all(handles).await)
            .map(|(name, joined)| {
                let result = joined.unwrap_or_else(|err| {
                    log::error!("[{name}] worker for trial {trial_index} did not finish: {err}");
                    TrialResult::failure(&name, trial_index, format!("provider task failed: {err}"))
                });
                (name, result)
            })
            .collect()
    }
}

struct Worker {
    name: String,
    provider: Arc<dyn VisionProvider>,
    executor: RetryExecutor,
    image: Arc<ImageRef>,
    query: Arc<str>,
    trial_index: usize,
    require_answer_token: bool,
}

impl Worker {
    async fn run(self) -> TrialResult {
        let start = Instant::now();
        let (outcome, attempts) = self
            .executor
            .run_counted(&self.name, || self.attempt())
            .await;

        let mut result = match outcome {
            Ok((answer, trace)) => {
                log::info!("[{}] trial {}: {answer}", self.name, self.trial_index);
                TrialResult::success(&self.name, self.trial_index, answer, trace)
            }
            Err(err) => {
                log::warn!("[{}] trial {} failed: {err}", self.name, self.trial_index);
                TrialResult::failure(&self.name, self.trial_index, err.to_string())
            }
        };
        result.attempts = attempts;
        result.elapsed_ms = start.elapsed().as_millis();
        result
    }

    async fn attempt(&self) -> Result<(String, String), BenchError> {
        let raw = self.provider.infer(&self.image, &self.query).await?;
        let answer = match find_answer(&raw.text) {
            Some(answer) => answer,
            None if self.require_answer_token => {
                return Err(BenchError::MissingAnswer {
                    raw_response: raw.text,
                })
            }
            None => UNKNOWN_ANSWER.to_string(),
        };
        Ok((answer, raw.reasoning))
    }
}
