use std::time::Duration;

use base64::Engine;
use reqwest::{header::RETRY_AFTER, Client, Response};
use secrecy::SecretString;

use crate::{error::BenchError, provider::ImageRef};

/// Everything an adapter needs to talk to its API.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub api_key: SecretString,
    pub model: String,
    /// Overrides the vendor endpoint, e.g. for a proxy.
    pub base_url: Option<String>,
    pub system: String,
    pub max_tokens: Option<u32>,
    pub thinking_budget: Option<u32>,
    /// Offer the vendor's server-side web search tool.
    pub web_search: bool,
    pub timeout_seconds: Option<u64>,
}

impl BackendSettings {
    pub fn new(api_key: SecretString, model: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            base_url: None,
            system: system.into(),
            max_tokens: None,
            thinking_budget: None,
            web_search: false,
            timeout_seconds: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub(crate) fn endpoint(&self, default_base: &str, path: &str) -> String {
        let base = self.base_url.as_deref().unwrap_or(default_base);
        format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    pub(crate) fn client(&self) -> Result<Client, BenchError> {
        let mut builder = Client::builder();
        if let Some(sec) = self.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(sec));
        }
        builder
            .build()
            .map_err(|e| BenchError::config("cannot build HTTP client", e))
    }
}

/// Reads and base64-encodes an image. An unreadable file is terminal.
pub(crate) async fn encode_image(image: &ImageRef) -> Result<String, BenchError> {
    let bytes = tokio::fs::read(image.path())
        .await
        .map_err(|e| BenchError::InvalidRequest(format!("cannot read image {image}: {e}")))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Passes successful responses through and classifies the others.
pub(crate) async fn check_status(provider: &str, resp: Response) -> Result<Response, BenchError> {
    let status = resp.status();
    log::debug!("{provider} HTTP status: {status}");
    if status.is_success() {
        return Ok(resp);
    }
    let retry_after = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = resp.text().await.unwrap_or_default();
    Err(status_error(provider, status.as_u16(), retry_after, body))
}

pub(crate) fn status_error(
    provider: &str,
    status: u16,
    retry_after: Option<Duration>,
    body: String,
) -> BenchError {
    let message = format!("{provider}: {body}");
    match status {
        429 => BenchError::RateLimited {
            message,
            retry_after,
        },
        500..=599 => BenchError::ServerError { status, message },
        401 | 403 => BenchError::AuthError(message),
        _ => BenchError::InvalidRequest(format!("{provider} returned {status}: {body}")),
    }
}

/// Longest server-requested wait that is honored as given.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60 * 60);

/// Seconds, possibly fractional, capped at [`MAX_RETRY_AFTER`]. HTTP dates
/// are ignored.
fn parse_retry_after(raw: &str) -> Option<Duration> {
    let secs = raw.trim().parse::<f64>().ok()?;
    if secs.is_nan() || secs < 0.0 {
        return None;
    }
    Some(
        Duration::try_from_secs_f64(secs)
            .map_or(MAX_RETRY_AFTER, |wait| wait.min(MAX_RETRY_AFTER)),
    )
}

pub(crate) fn format_error(provider: &str, message: &str, raw: impl ToString) -> BenchError {
    BenchError::ResponseFormatError {
        message: format!("{provider}: {message}"),
        raw_response: raw.to_string(),
    }
}
