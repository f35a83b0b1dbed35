use std::time::Duration;

use thiserror::Error;

/// Error types raised while running providers, judging answers or writing artifacts.
#[derive(Debug, Error)]
pub enum BenchError {
    /// Network level failure (timeout, connection reset, ...)
    #[error("HTTP error: {0}")]
    HttpError(String),
    /// Provider asked us to slow down
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },
    /// 5xx-equivalent failure on the provider side
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },
    /// Authentication and authorization errors
    #[error("Auth error: {0}")]
    AuthError(String),
    /// Invalid request parameters or inputs
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// API response parsing or format error
    #[error("Response format error: {message}. Raw response: {raw_response}")]
    ResponseFormatError {
        message: String,
        raw_response: String,
    },
    /// The provider answered, but without a delimited final answer
    #[error("No delimited final answer in response: {raw_response}")]
    MissingAnswer { raw_response: String },
    /// The judge answered something other than "success" or "fail"
    #[error("Unexpected judge output: {output}")]
    JudgeProtocol { output: String },
    /// Missing credential, unreadable dataset, unwritable destination
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// JSON serialization/deserialization errors
    #[error("JSON parse error: {0}")]
    JsonError(String),
    /// Filesystem errors
    #[error("IO error: {0}")]
    IoError(String),
    /// Tabular output errors
    #[error("CSV error: {0}")]
    CsvError(String),
    /// Retry attempts exceeded
    #[error("Retry attempts exceeded after {attempts} tries: {last_error}")]
    RetryExceeded { attempts: usize, last_error: String },
    /// Generic error
    #[error("Generic error: {0}")]
    Generic(String),
}

/// How the retry executor should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retry, honouring the server's hint when there is one.
    RateLimited { retry_after: Option<Duration> },
    /// Retry with a doubled backoff.
    Server,
    /// Retry with the plain backoff.
    Transient,
    /// Never retry.
    Terminal,
}

impl ErrorClass {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorClass::Terminal)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ErrorClass::RateLimited { .. } => "rate-limited",
            ErrorClass::Server => "server",
            ErrorClass::Transient => "transient",
            ErrorClass::Terminal => "terminal",
        }
    }
}

impl BenchError {
    /// Classifies the error for retry decisions.
    pub fn class(&self) -> ErrorClass {
        match self {
            BenchError::RateLimited { retry_after, .. } => ErrorClass::RateLimited {
                retry_after: *retry_after,
            },
            BenchError::ServerError { .. } => ErrorClass::Server,
            BenchError::HttpError(_) | BenchError::Generic(_) => ErrorClass::Transient,
            BenchError::AuthError(_)
            | BenchError::InvalidRequest(_)
            | BenchError::ResponseFormatError { .. }
            | BenchError::MissingAnswer { .. }
            | BenchError::JudgeProtocol { .. }
            | BenchError::ConfigError(_)
            | BenchError::JsonError(_)
            | BenchError::IoError(_)
            | BenchError::CsvError(_)
            | BenchError::RetryExceeded { .. } => ErrorClass::Terminal,
        }
    }

    /// Whether the error aborts the whole invocation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BenchError::ConfigError(_))
    }

    pub(crate) fn config(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        BenchError::ConfigError(format!("{context}: {err}"))
    }
}

/// Converts reqwest HTTP errors into BenchErrors
impl From<reqwest::Error> for BenchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return BenchError::ResponseFormatError {
                message: "failed to decode response body".to_string(),
                raw_response: err.to_string(),
            };
        }
        if let Some(status) = err.status() {
            if status.is_server_error() {
                return BenchError::ServerError {
                    status: status.as_u16(),
                    message: err.to_string(),
                };
            }
        }
        BenchError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(err: serde_json::Error) -> Self {
        BenchError::JsonError(format!(
            "{} at line {} column {}",
            err,
            err.line(),
            err.column()
        ))
    }
}

impl From<std::io::Error> for BenchError {
    fn from(err: std::io::Error) -> Self {
        BenchError::IoError(err.to_string())
    }
}

impl From<csv::Error> for BenchError {
    fn from(err: csv::Error) -> Self {
        BenchError::CsvError(err.to_string())
    }
}

impl From<toml::de::Error> for BenchError {
    fn from(err: toml::de::Error) -> Self {
        BenchError::ConfigError(format!("invalid TOML: {err}"))
    }
}
