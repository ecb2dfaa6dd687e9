//! OpenAI vision provider using the Chat Completions API.
//!
//! Sends the image as a data URL in the user message content array. The
//! request carries a bounded timeout and is retried at most once, only for
//! failures that are plausibly transient (429, 5xx, connect/timeout).

use super::provider::{VisionProvider, VisionReply, VisionRequest};
use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const RETRY_DELAY: Duration = Duration::from_millis(500);

pub struct OpenAiProvider {
    api_key: Option<String>,
    model: String,
    endpoint: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(api_key: Option<String>, model: &str, timeout: Duration) -> Self {
        Self {
            api_key,
            model: model.to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn send(&self, request: &VisionRequest, api_key: &str) -> Result<VisionReply, SendFailure> {
        let body = ChatRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: vec![ChatContent::Text {
                        text: request.system.clone(),
                    }],
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: vec![
                        ChatContent::ImageUrl {
                            image_url: ImageUrl {
                                url: request.image.data_url(),
                            },
                        },
                        ChatContent::Text {
                            text: request.prompt.clone(),
                        },
                    ],
                },
            ],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SendFailure {
                message: format!("OpenAI request failed: {}", e),
                retryable: e.is_timeout() || e.is_connect(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SendFailure {
                message: format!("OpenAI HTTP {}: {}", status, text),
                retryable: status.as_u16() == 429 || status.is_server_error(),
            });
        }

        let chat_resp: ChatResponse = resp.json().await.map_err(|e| SendFailure {
            message: format!("Failed to parse OpenAI response: {}", e),
            retryable: false,
        })?;

        let text = chat_resp
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| SendFailure {
                message: "OpenAI returned no content".to_string(),
                retryable: false,
            })?;

        Ok(VisionReply {
            text: text.trim().to_string(),
            model: chat_resp.model,
            tokens_used: chat_resp.usage.map(|u| u.total_tokens),
        })
    }
}

#[async_trait]
impl VisionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_configured(&self) -> bool {
        self.api_key.as_deref().map_or(false, |k| !k.is_empty())
    }

    async fn complete(&self, request: &VisionRequest) -> Result<VisionReply, AppError> {
        let Some(api_key) = self.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Err(AppError::AiUnavailable(
                "OpenAI API key not configured".to_string(),
            ));
        };

        match self.send(request, api_key).await {
            Ok(reply) => Ok(reply),
            Err(failure) if failure.retryable => {
                log::warn!("Retrying OpenAI request after failure: {}", failure.message);
                tokio::time::sleep(RETRY_DELAY).await;
                self.send(request, api_key)
                    .await
                    .map_err(|f| AppError::Ai(f.message))
            }
            Err(failure) => Err(AppError::Ai(failure.message)),
        }
    }
}

struct SendFailure {
    message: String,
    retryable: bool,
}

// --- Request types ---

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ChatContent>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ChatContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: String,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}
