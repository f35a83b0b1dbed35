//! Anthropic messages API adapter with extended thinking.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::{
    error::BenchError,
    extract::clean_trace,
    provider::{ImageRef, RawResponse, VisionProvider},
};

use super::transport::{check_status, encode_image, format_error, BackendSettings};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 32_000;

/// Client for Anthropic's messages endpoint.
#[derive(Debug, Clone)]
pub struct Anthropic {
    config: Arc<BackendSettings>,
    client: Client,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<Thinking>,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Serialize)]
struct Tool {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'static str,
}

const WEB_SEARCH_TOOL: Tool = Tool {
    kind: "web_search_20250305",
    name: "web_search",
};

#[derive(Serialize)]
struct Thinking {
    #[serde(rename = "type")]
    kind: &'static str,
    budget_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<RequestBlock<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequestBlock<'a> {
    Image { source: ImageSource<'a> },
    Text { text: &'a str },
}

#[derive(Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'a str,
    data: String,
}

#[derive(Deserialize, Debug)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    #[serde(other)]
    Other,
}

impl MessagesResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn thinking(&self) -> String {
        let joined = self
            .content
            .iter()
            .filter_map(|block| match block {
                ResponseBlock::Thinking { thinking } => Some(thinking.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ");
        clean_trace(&joined)
    }
}

impl Anthropic {
    pub fn new(settings: BackendSettings) -> Result<Self, BenchError> {
        let client = settings.client()?;
        Ok(Self::with_client(client, settings))
    }

    pub fn with_client(client: Client, settings: BackendSettings) -> Self {
        Self {
            config: Arc::new(settings),
            client,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl VisionProvider for Anthropic {
    async fn infer(&self, image: &ImageRef, query: &str) -> Result<RawResponse, BenchError> {
        if self.config.api_key.expose_secret().is_empty() {
            return Err(BenchError::AuthError("Missing Anthropic API key".to_string()));
        }
        let max_tokens = self.config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens,
            system: &self.config.system,
            thinking: self.config.thinking_budget.map(|budget| Thinking {
                kind: "enabled",
                budget_tokens: budget.min(max_tokens.saturating_sub(1)),
            }),
            messages: vec![Message {
                role: "user",
                content: vec![
                    RequestBlock::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: image.media_type(),
                            data: encode_image(image).await?,
                        },
                    },
                    RequestBlock::Text { text: query },
                ],
            }],
            tools: if self.config.web_search {
                vec![WEB_SEARCH_TOOL]
            } else {
                Vec::new()
            },
        };

        if log::log_enabled!(log::Level::Trace) {
            if let Ok(json) = serde_json::to_string(&body) {
                log::trace!("Anthropic request payload: {}", json);
            }
        }

        let resp = self
            .client
            .post(self.config.endpoint(DEFAULT_BASE_URL, "v1/messages"))
            .header("x-api-key", self.config.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;
        let resp = check_status("Anthropic", resp).await?;
        let text = resp.text().await?;
        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| format_error("Anthropic", &format!("unexpected body ({e})"), &text))?;
        Ok(RawResponse::new(parsed.text(), parsed.thinking()))
    }
}
