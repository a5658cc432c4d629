//! AI assistant: relays prompts to a hosted text-generation model and caches answers.

mod client;

pub use client::{ChatCompletionsClient, ChatMessage, build_messages};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::Config;
use crate::error::AppError;

const CACHE_CAPACITY: u64 = 1_000;

#[derive(Debug, Clone, Error)]
pub enum AiError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("json error: {0}")]
    Serde(String),
}

impl From<AiError> for AppError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::RateLimited => {
                AppError::ServiceUnavailable("Assistant is rate limited, try again later".into())
            }
            other => AppError::Internal(format!("assistant request failed: {}", other)),
        }
    }
}

/// A hosted model that turns a prompt (plus optional context) into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str, context: Option<&str>) -> Result<String, AiError>;
}

/// Assistant front-end shared across requests: generator plus response cache.
#[derive(Clone)]
pub struct Assistant {
    generator: Arc<dyn TextGenerator>,
    cache: Cache<String, String>,
}

/// Answer from the assistant, flagged when served from cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub cached: bool,
}

impl Assistant {
    pub fn new(generator: Arc<dyn TextGenerator>, ttl: Duration) -> Self {
        Self {
            generator,
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Build the assistant from config. `None` when no API key is configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>, AiError> {
        let Some(api_key) = &config.ai_api_key else {
            return Ok(None);
        };
        let client = ChatCompletionsClient::new(&config.ai_api_url, api_key, &config.ai_model)?;
        Ok(Some(Self::new(
            Arc::new(client),
            Duration::from_secs(config.ai_cache_ttl_secs),
        )))
    }

    /// Ask the model, serving identical (model, context, prompt) triples from cache.
    /// Failed generations are not cached.
    pub async fn ask(&self, prompt: &str, context: Option<&str>) -> Result<Answer, AiError> {
        let key = cache_key(self.generator.model(), prompt, context);
        if let Some(text) = self.cache.get(&key).await {
            return Ok(Answer { text, cached: true });
        }

        let text = self.generator.generate(prompt, context).await?;
        self.cache.insert(key, text.clone()).await;
        Ok(Answer {
            text,
            cached: false,
        })
    }
}

fn cache_key(model: &str, prompt: &str, context: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update([0u8]);
    hasher.update(context.unwrap_or_default().as_bytes());
    hasher.update([0u8]);
    hasher.update(prompt.trim().as_bytes());
    hex::encode(hasher.finalize())
}
