use std::ops::Range;

/// How many times an operation may be attempted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaxAttempts {
    /// Give up after this many attempts (including the first one).
    Finite(usize),
    /// Keep retrying until success or a terminal failure.
    Unbounded,
}

impl MaxAttempts {
    pub(super) fn allows(&self, attempt: usize) -> bool {
        match self {
            MaxAttempts::Finite(max) => attempt < *max,
            MaxAttempts::Unbounded => true,
        }
    }
}

impl From<Option<usize>> for MaxAttempts {
    fn from(value: Option<usize>) -> Self {
        match value {
            Some(n) => MaxAttempts::Finite(n.max(1)),
            None => MaxAttempts::Unbounded,
        }
    }
}

/// Configuration for retry and backoff behavior.
#[derive(Clone, Debug)]
pub struct ResilienceConfig {
    /// Attempt budget including the first one
    pub max_attempts: MaxAttempts,
    /// Backoff delay for the first retry in milliseconds
    pub base_delay_ms: u64,
    /// Maximum backoff delay in milliseconds
    pub max_delay_ms: u64,
    /// Upper bound of the random jitter, as a fraction of the computed delay
    pub jitter_ratio: f64,
    /// Random offset added on top of a server supplied retry-after, in milliseconds
    pub rate_limit_offset_ms: Range<u64>,
}

const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
const DEFAULT_MAX_DELAY_MS: u64 = 300_000;
const DEFAULT_JITTER_RATIO: f64 = 0.1;
const DEFAULT_RATE_LIMIT_OFFSET_MS: Range<u64> = 1_000..5_000;

impl ResilienceConfig {
    /// Unbounded retries, 1s base, 5 minute cap, 10% jitter.
    pub fn defaults() -> Self {
        Self {
            max_attempts: MaxAttempts::Unbounded,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_ratio: DEFAULT_JITTER_RATIO,
            rate_limit_offset_ms: DEFAULT_RATE_LIMIT_OFFSET_MS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: MaxAttempts) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self.max_delay_ms = max_delay_ms;
        self
    }

    pub fn with_jitter_ratio(mut self, jitter_ratio: f64) -> Self {
        self.jitter_ratio = jitter_ratio.max(0.0);
        self
    }

    pub fn with_rate_limit_offset(mut self, offset_ms: Range<u64>) -> Self {
        self.rate_limit_offset_ms = offset_ms;
        self
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self::defaults()
    }
}
