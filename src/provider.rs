//! Recognition transport: one network round-trip to a vision model.
//!
//! [`RecognitionTransport`] is the seam between the retry logic in
//! [`crate::pipeline::llm`] and the wire. A transport performs exactly one
//! attempt and reports what happened; retrying, pricing and refusal
//! detection all happen above it. Tests substitute a scripted transport.
//!
//! [`OpenAiTransport`] speaks the OpenAI chat-completions protocol, which
//! most hosted and self-hosted vision endpoints also accept.

use crate::config::RunConfig;
use crate::error::{OcrError, RecognitionError};
use crate::pipeline::encode::to_data_url;
use crate::prompts::{DEFAULT_SYSTEM_PROMPT, USER_INSTRUCTION};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Timeout for the one-shot credential check.
const VALIDATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Token usage reported for one attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A 2xx answer from the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    /// `None` when the service did not report usage.
    pub usage: Option<Usage>,
}

/// One attempt against the recognition service.
///
/// Implementations must be stateless per call and safe to share across
/// concurrent workers.
#[async_trait]
pub trait RecognitionTransport: Send + Sync + fmt::Debug {
    /// Send one image and return the model's answer.
    async fn complete(&self, image: &[u8]) -> Result<Completion, RecognitionError>;

    /// Check the credential without performing recognition.
    ///
    /// Returns [`RecognitionError::InvalidCredential`] for 401 and
    /// [`RecognitionError::RemoteApi`] for any other non-success status.
    async fn validate_credential(&self) -> Result<(), RecognitionError>;
}

// ── OpenAI-compatible transport ──────────────────────────────────────────

/// Chat-completions transport for OpenAI and compatible endpoints.
pub struct OpenAiTransport {
    api_key: String,
    base_url: String,
    model: String,
    system_prompt: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl fmt::Debug for OpenAiTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiTransport")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiTransport {
    /// Build a transport from the run configuration.
    ///
    /// # Errors
    /// [`OcrError::InvalidConfig`] when no API key is configured or found in
    /// the environment, [`OcrError::Internal`] if the HTTP client cannot be built.
    pub fn from_config(config: &RunConfig) -> Result<Self, OcrError> {
        let api_key = config.resolved_api_key().ok_or_else(|| {
            OcrError::InvalidConfig(format!(
                "No API key configured.\nSet {} or pass --api-key.",
                crate::config::API_KEY_ENV
            ))
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| OcrError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client,
        })
    }

    fn build_request(&self, image: &[u8]) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(self.system_prompt.clone()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: USER_INSTRUCTION.to_string(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: to_data_url(image),
                                detail: "high",
                            },
                        },
                    ]),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl RecognitionTransport for OpenAiTransport {
    async fn complete(&self, image: &[u8]) -> Result<Completion, RecognitionError> {
        let request = self.build_request(image);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;

        parse_chat_response(status, &body)
    }

    async fn validate_credential(&self) -> Result<(), RecognitionError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(VALIDATE_TIMEOUT)
            .send()
            .await
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        debug!("Credential check answered {}", status);
        match status {
            200 => Ok(()),
            401 => Err(RecognitionError::InvalidCredential),
            _ => Err(RecognitionError::RemoteApi {
                status,
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// Turn an HTTP status and body into a completion or a classified error.
fn parse_chat_response(status: u16, body: &str) -> Result<Completion, RecognitionError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ErrorResponse>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());
        return Err(RecognitionError::RemoteApi { status, message });
    }

    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| RecognitionError::MalformedResponse(e.to_string()))?;

    let text = parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.unwrap_or_default())
        .ok_or_else(|| RecognitionError::MalformedResponse("no choices in response".into()))?;

    Ok(Completion {
        text,
        usage: parsed.usage.map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        }),
    })
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
