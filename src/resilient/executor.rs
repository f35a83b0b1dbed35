use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use crate::error::{BenchError, ErrorClass};

use super::config::ResilienceConfig;

/// One failed attempt, as seen by an observer.
#[derive(Debug, Clone)]
pub struct RetryEvent {
    /// Label of the retried operation, e.g. the provider name.
    pub operation: String,
    /// 1-based index of the attempt that failed.
    pub attempt: usize,
    pub class: ErrorClass,
    /// Wait before the next attempt; `None` when the executor gave up.
    pub wait: Option<Duration>,
    pub error: String,
}

/// Callback invoked for every failed attempt.
pub type RetryObserver = Arc<dyn Fn(&RetryEvent) + Send + Sync>;

/// Runs fallible async operations under exponential backoff with jitter.
///
/// Terminal errors are returned immediately. Rate limited errors carrying a
/// retry-after hint wait for that hint plus a small random offset; server
/// errors wait twice the computed delay (still capped).
#[derive(Clone)]
pub struct RetryExecutor {
    cfg: ResilienceConfig,
    observer: Option<RetryObserver>,
}

impl RetryExecutor {
    pub fn new(cfg: ResilienceConfig) -> Self {
        Self {
            cfg,
            observer: None,
        }
    }

    /// Registers a callback receiving every failed attempt.
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&RetryEvent) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.cfg
    }

    /// Runs `op` until it succeeds, fails terminally or the attempt budget runs out.
    pub async fn run<F, Fut, T>(&self, operation: &str, op: F) -> Result<T, BenchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BenchError>>,
    {
        self.run_counted(operation, op).await.0
    }

    /// Same as [`RetryExecutor::run`], also returning how many attempts were made.
    pub async fn run_counted<F, Fut, T>(
        &self,
        operation: &str,
        mut op: F,
    ) -> (Result<T, BenchError>, usize)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BenchError>>,
    {
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            log::debug!("{operation}: attempt {attempt}");
            let err = match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        log::info!("{operation}: succeeded on attempt {attempt}");
                    }
                    return (Ok(value), attempt);
                }
                Err(err) => err,
            };

            let class = err.class();
            if !class.is_retryable() {
                log::warn!("{operation}: terminal failure on attempt {attempt}: {err}");
                self.notify(operation, attempt, class, None, &err);
                return (Err(err), attempt);
            }
            if !self.cfg.max_attempts.allows(attempt) {
                log::warn!("{operation}: giving up after {attempt} attempts: {err}");
                self.notify(operation, attempt, class, None, &err);
                return (
                    Err(BenchError::RetryExceeded {
                        attempts: attempt,
                        last_error: err.to_string(),
                    }),
                    attempt,
                );
            }

            let wait = self.backoff_for(attempt, class);
            log::warn!(
                "{operation}: attempt {attempt} failed ({}): {err}; waiting {:.1}s before retry",
                class.label(),
                wait.as_secs_f64()
            );
            self.notify(operation, attempt, class, Some(wait), &err);
            sleep(wait).await;
        }
    }

    /// Wait chosen after the `attempt`-th (1-based) failure of the given class.
    pub fn backoff_for(&self, attempt: usize, class: ErrorClass) -> Duration {
        let mut rng = rand::thread_rng();
        let max = self.cfg.max_delay_ms as f64;
        let shift = attempt.saturating_sub(1).min(32) as u32;
        let delay = self
            .cfg
            .base_delay_ms
            .saturating_mul(1u64 << shift)
            .min(self.cfg.max_delay_ms) as f64;
        let jittered = delay + delay * self.cfg.jitter_ratio * rng.gen::<f64>();

        let millis = match class {
            ErrorClass::RateLimited {
                retry_after: Some(after),
            } => {
                let offset = if self.cfg.rate_limit_offset_ms.is_empty() {
                    0
                } else {
                    rng.gen_range(self.cfg.rate_limit_offset_ms.clone())
                };
                return after.saturating_add(Duration::from_millis(offset));
            }
            ErrorClass::Server => (jittered * 2.0).min(max),
            _ => jittered,
        };
        Duration::from_secs_f64(millis / 1_000.0)
    }

    fn notify(
        &self,
        operation: &str,
        attempt: usize,
        class: ErrorClass,
        wait: Option<Duration>,
        err: &BenchError,
    ) {
        if let Some(observer) = &self.observer {
            observer(&RetryEvent {
                operation: operation.to_string(),
                attempt,
                class,
                wait,
                error: err.to_string(),
            });
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(ResilienceConfig::defaults())
    }
}
