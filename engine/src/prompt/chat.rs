use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app_config::cfg;
use crate::error::{is_auth_marker, AppError, AppResult};
use crate::HttpClient;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Ordered role-tagged dialogue. Batches fork from the primed base, so
/// no batch ever sees another batch's question or answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    messages: Vec<ChatMessage>,
}

impl ConversationState {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Fork with one extra message appended.
    pub fn with(&self, message: ChatMessage) -> Self {
        let mut fork = self.fork();
        fork.push(message);
        fork
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Seam to the completion service. Returns the assistant content for one
/// call; transport and API errors propagate as-is.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, conversation: &ConversationState) -> AppResult<String>;
}

#[async_trait]
impl<T: CompletionBackend + ?Sized> CompletionBackend for Arc<T> {
    async fn complete(&self, conversation: &ConversationState) -> AppResult<String> {
        (**self).complete(conversation).await
    }
}

pub struct OpenAiBackend {
    http_client: HttpClient,
}

impl OpenAiBackend {
    pub fn new(http_client: HttpClient) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(&self, conversation: &ConversationState) -> AppResult<String> {
        let resp = self
            .http_client
            .post(&cfg.api.chat_endpoint)
            .bearer_auth(&cfg.api.key)
            .json(&json!({
                "model": &cfg.model.id,
                "temperature": cfg.model.temperature,
                "top_p": cfg.model.top_p,
                "max_tokens": cfg.model.max_tokens,
                "frequency_penalty": cfg.model.frequency_penalty,
                "messages": conversation.messages(),
                "response_format": { "type": "json_object" },
            }))
            .send()
            .await?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| {
                if let Some(status) = e.status() {
                    match status {
                        StatusCode::UNAUTHORIZED => AppError::AuthExpired,
                        StatusCode::BAD_REQUEST => AppError::BadRequest(e.to_string()),
                        StatusCode::REQUEST_TIMEOUT => AppError::RequestTimeout,
                        StatusCode::TOO_MANY_REQUESTS => AppError::TooManyRequests,
                        _ => AppError::Internal(e.into()),
                    }
                } else {
                    AppError::Internal(e.into())
                }
            })?;

        let parsed = serde_json::from_value::<ChatApiResponseOrError>(resp.clone())
            .context(format!("Could not parse chat response: {}", resp))?;

        let parsed = match parsed {
            ChatApiResponseOrError::Error(error) => {
                if is_auth_marker(&error.message) {
                    return Err(AppError::AuthExpired);
                }
                return Err(anyhow!("Chat API error: {:?}", error).into());
            }
            ChatApiResponseOrError::Response(parsed) => parsed,
        };

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .context("No choices in response")?;

        Ok(choice.message.content)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: i32,
    pub message: ChatMessage,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiResponse {
    pub choices: Vec<ChatChoice>,
    pub usage: PromptUsage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiError {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatApiResponseOrError {
    Response(ChatApiResponse),
    Error(ChatApiError),
}
