//! OpenAI adapter.
//!
//! Vision questions go through the Responses API so reasoning summaries can
//! be recorded; the LLM judge uses plain chat completions.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    error::BenchError,
    extract::{clean_trace, normalize},
    judge::JudgeBackend,
    provider::{ImageRef, RawResponse, VisionProvider},
};

use super::transport::{check_status, encode_image, format_error, BackendSettings};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const REASONING_EFFORT: &str = "high";
const REASONING_SUMMARY: &str = "detailed";

/// Client for OpenAI's responses and chat completions endpoints.
#[derive(Debug, Clone)]
pub struct OpenAI {
    config: Arc<BackendSettings>,
    client: Client,
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    reasoning: Reasoning,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    input: Vec<InputMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Serialize)]
struct Reasoning {
    effort: &'static str,
    summary: &'static str,
}

#[derive(Serialize)]
struct Tool {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct InputMessage<'a> {
    role: &'a str,
    content: Vec<InputPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputPart<'a> {
    InputText { text: &'a str },
    InputImage { image_url: String },
}

#[derive(Deserialize, Debug)]
struct ResponsesReply {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputItem {
    Reasoning {
        #[serde(default)]
        summary: Vec<SummaryPart>,
    },
    Message {
        #[serde(default)]
        content: Vec<OutputContent>,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug)]
struct SummaryPart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputContent {
    OutputText {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl ResponsesReply {
    fn has_message(&self) -> bool {
        self.output
            .iter()
            .any(|item| matches!(item, OutputItem::Message { .. }))
    }

    fn output_text(&self) -> String {
        self.output
            .iter()
            .filter_map(|item| match item {
                OutputItem::Message { content } => Some(content),
                _ => None,
            })
            .flatten()
            .filter_map(|part| match part {
                OutputContent::OutputText { text } => Some(text.as_str()),
                OutputContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    fn summaries(&self) -> String {
        let joined = self
            .output
            .iter()
            .filter_map(|item| match item {
                OutputItem::Reasoning { summary } => Some(summary),
                _ => None,
            })
            .flatten()
            .map(|part| part.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        clean_trace(&normalize(&joined))
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatMsg,
}

#[derive(Deserialize, Debug)]
struct ChatMsg {
    content: Option<String>,
}

impl OpenAI {
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

    /// Posts `body` to `path` and decodes the reply; the raw text is kept
    /// for error reports.
    async fn post<B, R>(&self, path: &str, body: &B) -> Result<(R, String), BenchError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        if self.config.api_key.expose_secret().is_empty() {
            return Err(BenchError::AuthError("Missing OpenAI API key".to_string()));
        }
        if log::log_enabled!(log::Level::Trace) {
            if let Ok(json) = serde_json::to_string(body) {
                log::trace!("OpenAI request payload: {}", json);
            }
        }

        let resp = self
            .client
            .post(self.config.endpoint(DEFAULT_BASE_URL, path))
            .bearer_auth(self.config.api_key.expose_secret())
            .json(body)
            .send()
            .await?;
        let resp = check_status("OpenAI", resp).await?;
        let text = resp.text().await?;
        let parsed = serde_json::from_str(&text)
            .map_err(|e| format_error("OpenAI", &format!("unexpected body ({e})"), &text))?;
        Ok((parsed, text))
    }
}

#[async_trait]
impl VisionProvider for OpenAI {
    async fn infer(&self, image: &ImageRef, query: &str) -> Result<RawResponse, BenchError> {
        let data = encode_image(image).await?;
        let tools = if self.config.web_search {
            vec![Tool {
                kind: "web_search_preview",
            }]
        } else {
            Vec::new()
        };
        let body = ResponsesRequest {
            model: &self.config.model,
            reasoning: Reasoning {
                effort: REASONING_EFFORT,
                summary: REASONING_SUMMARY,
            },
            tools,
            input: vec![
                InputMessage {
                    role: "system",
                    content: vec![InputPart::InputText {
                        text: &self.config.system,
                    }],
                },
                InputMessage {
                    role: "user",
                    content: vec![
                        InputPart::InputText { text: query },
                        InputPart::InputImage {
                            image_url: format!("data:{};base64,{data}", image.media_type()),
                        },
                    ],
                },
            ],
            max_output_tokens: self.config.max_tokens,
        };
        let (reply, raw): (ResponsesReply, String) = self.post("responses", &body).await?;
        if !reply.has_message() {
            return Err(format_error("OpenAI", "no message in response output", raw));
        }
        Ok(RawResponse::new(reply.output_text(), reply.summaries()))
    }
}

#[async_trait]
impl JudgeBackend for OpenAI {
    async fn complete(&self, prompt: &str) -> Result<String, BenchError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_completion_tokens: self.config.max_tokens,
            temperature: 0.0,
        };
        let (reply, raw): (ChatResponse, String) = self.post("chat/completions", &body).await?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| format_error("OpenAI", "empty judge reply", raw))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockito::Matcher;
    use secrecy::SecretString;
    use serde_json::json;

    use super::*;

    fn settings(base_url: &str) -> BackendSettings {
        let mut settings =
            BackendSettings::new(SecretString::new("test-key".into()), "o4-mini", "answer in << >>")
                .with_base_url(base_url);
        settings.web_search = true;
        settings
    }

    fn client(base_url: &str) -> OpenAI {
        OpenAI::new(settings(base_url)).expect("client")
    }

    fn image() -> (tempfile::TempDir, ImageRef) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chart.jpg");
        std::fs::write(&path, b"abc").expect("write");
        (dir, ImageRef::new(path))
    }

    const REPLY: &str = r#"{"output":[
        {"type":"reasoning","id":"rs_1","summary":[
            {"type":"summary_text","text":"**Reading** the map"},
            {"type":"summary_text","text":"then  searching"}
        ]},
        {"type":"web_search_call","id":"ws_1","status":"completed"},
        {"type":"message","role":"assistant","content":[
            {"type":"output_text","text":"It is << Lake Tahoe >>","annotations":[]}
        ]}
    ]}"#;

    #[tokio::test]
    async fn asks_for_reasoning_summaries_with_web_search() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/responses")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::PartialJson(json!({
                "model": "o4-mini",
                "reasoning": {"effort": "high", "summary": "detailed"},
                "tools": [{"type": "web_search_preview"}],
                "input": [
                    {"role": "system", "content": [{"type": "input_text", "text": "answer in << >>"}]},
                    {"role": "user", "content": [
                        {"type": "input_text", "text": "Which lake?"},
                        {"type": "input_image", "image_url": "data:image/jpeg;base64,YWJj"}
                    ]}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(REPLY)
            .create_async()
            .await;

        let (_dir, image) = image();
        let raw = client(&server.url())
            .infer(&image, "Which lake?")
            .await
            .expect("response");
        assert_eq!(raw.text, "It is << Lake Tahoe >>");
        assert_eq!(raw.reasoning, "Reading the map then searching");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn web_search_can_be_turned_off() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/responses")
            .match_body(Matcher::Regex(
                r#"^\{"model":"o4-mini","reasoning":\{[^}]*\},"input":"#.to_string(),
            ))
            .with_status(200)
            .with_body(REPLY)
            .create_async()
            .await;

        let mut settings = settings(&server.url());
        settings.web_search = false;
        let (_dir, image) = image();
        OpenAI::new(settings)
            .expect("client")
            .infer(&image, "q")
            .await
            .expect("response");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/responses")
            .with_status(429)
            .with_header("retry-after", "7")
            .with_body("slow down")
            .create_async()
            .await;

        let (_dir, image) = image();
        let err = client(&server.url()).infer(&image, "q").await.unwrap_err();
        assert!(matches!(
            err,
            BenchError::RateLimited { retry_after: Some(wait), .. } if wait == Duration::from_secs(7)
        ));
    }

    #[tokio::test]
    async fn output_without_a_message_is_a_format_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/responses")
            .with_status(200)
            .with_body(r#"{"output":[{"type":"reasoning","summary":[]}]}"#)
            .create_async()
            .await;

        let (_dir, image) = image();
        let err = client(&server.url()).infer(&image, "q").await.unwrap_err();
        assert!(matches!(err, BenchError::ResponseFormatError { .. }));
    }

    #[tokio::test]
    async fn judge_completion_uses_zero_temperature() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({
                "temperature": 0.0,
                "messages": [{"role": "user", "content": "Judge:"}]
            })))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"success"}}]}"#)
            .create_async()
            .await;

        let reply = client(&server.url()).complete("Judge:").await.expect("reply");
        assert_eq!(reply, "success");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn judge_without_choices_is_a_format_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let err = client(&server.url()).complete("Judge:").await.unwrap_err();
        assert!(matches!(err, BenchError::ResponseFormatError { .. }));
    }
}
