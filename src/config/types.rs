use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::resilient::{MaxAttempts, ResilienceConfig};

/// Instruction sent to every provider unless overridden per provider.
pub const DEFAULT_SYSTEM_PROMPT: &str = "Give a singular final answer to the best of your abilities \
(i.e a one word answer, a list of items, a date, a percentage statistic, an address, a name, etc.). \
The final answer MUST be enclosed in double angle brackets like << answer >>. \
The content inside the brackets must be plain text only, with no markdown or links. \
Do your absolute best to give a final answer. If no viable answer can be found, \
you MUST respond with << I don't know >> and nothing else.";

const DEFAULT_TRIALS: usize = 3;
const DEFAULT_OUTPUT_DIR: &str = "inference_outputs";
const DEFAULT_LOG_ROTATE_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_LOG_ROTATE_KEEP: usize = 5;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BenchConfig {
    pub run: RunConfig,
    pub retry: RetryConfig,
    pub providers: BTreeMap<String, ProviderConfig>,
    pub judge: JudgeConfig,
    pub logging: LoggingConfig,
}

impl Default for BenchConfig {
    /// Three providers (`claude`, `gemini`, `gpt`) with their usual models.
    fn default() -> Self {
        let providers = [
            ("claude", BackendKind::Anthropic, "claude-opus-4-20250514"),
            ("gemini", BackendKind::Google, "gemini-2.5-pro"),
            ("gpt", BackendKind::OpenAI, "o4-mini"),
        ]
        .into_iter()
        .map(|(name, backend, model)| {
            (
                name.to_string(),
                ProviderConfig {
                    backend: Some(backend.as_str().to_string()),
                    model: Some(model.to_string()),
                    thinking_budget: backend.default_thinking_budget(),
                    web_search: Some(backend.default_web_search()),
                    ..ProviderConfig::default()
                },
            )
        })
        .collect();
        Self {
            run: RunConfig::default(),
            retry: RetryConfig::default(),
            providers,
            judge: JudgeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    /// Trials per dataset entry.
    pub trials: usize,
    pub output_dir: PathBuf,
    /// Treat a response without `<< >>` as a terminal provider error.
    pub require_answer_token: bool,
    /// Directory image paths are resolved against; defaults to the parent of
    /// the dataset's directory.
    pub image_root: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            trials: DEFAULT_TRIALS,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            require_answer_token: false,
            image_root: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Omitted means retry until success or a terminal failure.
    pub max_attempts: Option<usize>,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ratio: f64,
    /// `[low, high)` in milliseconds.
    pub rate_limit_offset_ms: [u64; 2],
}

impl Default for RetryConfig {
    fn default() -> Self {
        let defaults = ResilienceConfig::defaults();
        Self {
            max_attempts: None,
            base_delay_ms: defaults.base_delay_ms,
            max_delay_ms: defaults.max_delay_ms,
            jitter_ratio: defaults.jitter_ratio,
            rate_limit_offset_ms: [
                defaults.rate_limit_offset_ms.start,
                defaults.rate_limit_offset_ms.end,
            ],
        }
    }
}

impl RetryConfig {
    pub fn to_resilience(&self) -> ResilienceConfig {
        let [low, high] = self.rate_limit_offset_ms;
        ResilienceConfig::defaults()
            .with_max_attempts(MaxAttempts::from(self.max_attempts))
            .with_backoff(self.base_delay_ms, self.max_delay_ms.max(self.base_delay_ms))
            .with_jitter_ratio(self.jitter_ratio)
            .with_rate_limit_offset(low.min(high)..high.max(low))
    }
}

/// Remote API family a provider talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    OpenAI,
    Anthropic,
    Google,
}

impl BackendKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "openai" | "gpt" => Some(Self::OpenAI),
            "anthropic" | "claude" => Some(Self::Anthropic),
            "google" | "gemini" => Some(Self::Google),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
        }
    }

    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Google => "GEMINI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAI => "o4-mini",
            Self::Anthropic => "claude-opus-4-20250514",
            Self::Google => "gemini-2.5-pro",
        }
    }

    /// Extended thinking budget sent when a provider sets none.
    pub fn default_thinking_budget(&self) -> Option<u32> {
        match self {
            Self::Anthropic => Some(1024),
            Self::OpenAI | Self::Google => None,
        }
    }

    /// Whether the server-side web search tool is offered when a provider
    /// does not say.
    pub fn default_web_search(&self) -> bool {
        matches!(self, Self::OpenAI | Self::Anthropic)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// `openai`, `anthropic` or `google`; the provider name is tried when unset.
    pub backend: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub system: Option<String>,
    pub max_tokens: Option<u32>,
    /// Reasoning budget for backends that expose one.
    pub thinking_budget: Option<u32>,
    /// Offer the backend's web search tool; unset follows the backend default.
    pub web_search: Option<bool>,
    pub timeout_seconds: Option<u64>,
    pub enabled: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            backend: None,
            model: None,
            api_key_env: None,
            base_url: None,
            system: None,
            max_tokens: None,
            thinking_budget: None,
            web_search: None,
            timeout_seconds: None,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeKind {
    /// Language model judge.
    Llm,
    /// Local deterministic comparator.
    Rules,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JudgeConfig {
    pub kind: JudgeKind,
    pub backend: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// Absolute tolerance for numeric answers (rules judge).
    pub tolerance: f64,
    /// Interchangeable answers (rules judge).
    pub equivalences: Vec<Vec<String>>,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            kind: JudgeKind::Llm,
            backend: Some(BackendKind::OpenAI.as_str().to_string()),
            model: Some("gpt-4o".to_string()),
            api_key_env: None,
            base_url: None,
            timeout_seconds: None,
            tolerance: 0.01,
            equivalences: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Log file; stderr only when unset.
    pub path: Option<String>,
    pub rotate_size: u64,
    pub rotate_keep: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            path: None,
            rotate_size: DEFAULT_LOG_ROTATE_SIZE,
            rotate_keep: DEFAULT_LOG_ROTATE_KEEP,
        }
    }
}
