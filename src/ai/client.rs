//! Client for an OpenAI-compatible chat completions endpoint.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{AiError, TextGenerator};

const SYSTEM_PROMPT: &str = "You are the assistant of a project collaboration dashboard. \
Help users plan projects, break work into tasks, and find teammates with the right skills. \
Answer concisely.";

#[derive(Debug, Clone, Serialize, Deserialize)]
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
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http: Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsClient {
    pub fn new(api_url: &str, api_key: &str, model: &str) -> Result<Self, AiError> {
        let http = Client::builder()
            .user_agent(concat!("teamboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

/// Build the message list for a prompt with optional caller-supplied context.
pub fn build_messages(prompt: &str, context: Option<&str>) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        messages.push(ChatMessage::system(format!("Context:\n{}", context)));
    }
    messages.push(ChatMessage::user(prompt));
    messages
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, context: Option<&str>) -> Result<String, AiError> {
        let request = ChatRequest {
            model: &self.model,
            messages: build_messages(prompt, context),
        };

        let res = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::Transport(e.to_string()))?;

        match res.status() {
            s if s.is_success() => {
                let body: ChatResponse = res
                    .json()
                    .await
                    .map_err(|e| AiError::Serde(e.to_string()))?;
                body.choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .filter(|text| !text.trim().is_empty())
                    .ok_or_else(|| AiError::Serde("No text content in response".to_string()))
            }
            StatusCode::UNAUTHORIZED => Err(AiError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(AiError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(AiError::Http { status, body })
            }
        }
    }
}
