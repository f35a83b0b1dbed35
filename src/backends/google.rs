//! Google Gemini `generateContent` adapter.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::{
    error::BenchError,
    provider::{ImageRef, RawResponse, VisionProvider},
};

use super::transport::{check_status, encode_image, format_error, BackendSettings};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Client for the Gemini API.
#[derive(Debug, Clone)]
pub struct Google {
    config: Arc<BackendSettings>,
    client: Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Serialize)]
struct GoogleSearch {}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    thinking_config: ThinkingConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    include_thoughts: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_budget: Option<u32>,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    #[serde(default)]
    text: String,
    #[serde(default)]
    thought: bool,
}

impl Google {
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
impl VisionProvider for Google {
    async fn infer(&self, image: &ImageRef, query: &str) -> Result<RawResponse, BenchError> {
        if self.config.api_key.expose_secret().is_empty() {
            return Err(BenchError::AuthError("Missing Gemini API key".to_string()));
        }
        let body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text {
                    text: &self.config.system,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: image.media_type(),
                            data: encode_image(image).await?,
                        },
                    },
                    Part::Text { text: query },
                ],
            }],
            tools: if self.config.web_search {
                vec![Tool {
                    google_search: GoogleSearch {},
                }]
            } else {
                Vec::new()
            },
            generation_config: GenerationConfig {
                max_output_tokens: self.config.max_tokens,
                thinking_config: ThinkingConfig {
                    include_thoughts: true,
                    thinking_budget: self.config.thinking_budget,
                },
            },
        };

        if log::log_enabled!(log::Level::Trace) {
            if let Ok(json) = serde_json::to_string(&body) {
                log::trace!("Google request payload: {}", json);
            }
        }

        let path = format!("v1beta/models/{}:generateContent", self.config.model);
        let resp = self
            .client
            .post(self.config.endpoint(DEFAULT_BASE_URL, &path))
            .header("x-goog-api-key", self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;
        let resp = check_status("Google", resp).await?;
        let text = resp.text().await?;
        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| format_error("Google", &format!("unexpected body ({e})"), &text))?;

        let parts = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts)
            .ok_or_else(|| format_error("Google", "no candidates in response", &text))?;
        let (thoughts, answer): (Vec<_>, Vec<_>) = parts.into_iter().partition(|p| p.thought);
        let join = |parts: Vec<ResponsePart>, sep: &str| {
            parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join(sep)
        };
        Ok(RawResponse::new(join(answer, ""), join(thoughts, "\n")))
    }
}
