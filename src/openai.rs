//! # OpenAI-compatible completion client
//!
//! Bridges the core [`CompletionClient`] trait to a chat-completions endpoint
//! (`POST {base_url}/chat/completions`) over `reqwest`.
//!
//! - Construct with [`OpenAiClient::new_from_env`]; the key is read from
//!   `OPENAI_KEY`, falling back to `OPENAI_API_KEY`.
//! - One `complete` call is exactly one HTTP request. Nothing is retried.
//! - When `llm.request_timeout_secs` is set, a hung request fails with a
//!   timeout instead of blocking its task forever.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use bookgen_core::contract::{ChatMessage, CompletionClient, CompletionError, Prompt};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::load_config::LlmSection;

const KEY_VARS: [&str; 2] = ["OPENAI_KEY", "OPENAI_API_KEY"];

#[derive(Debug, thiserror::Error)]
pub enum OpenAiError {
    #[error("no API key found; set OPENAI_KEY or OPENAI_API_KEY")]
    MissingKey,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("response has no choices[0].message.content")]
    MissingContent,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

pub struct OpenAiClient {
    http: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, llm: &LlmSection) -> Result<Self, OpenAiError> {
        let mut builder = Client::builder();
        if let Some(secs) = llm.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let endpoint = chat_endpoint(&llm.base_url);
        info!(
            endpoint = %endpoint,
            model = %llm.model,
            timeout_secs = ?llm.request_timeout_secs,
            "Initialised completion client"
        );
        Ok(Self {
            http: builder.build()?,
            endpoint,
            model: llm.model.clone(),
            api_key: api_key.into(),
        })
    }

    pub fn new_from_env(llm: &LlmSection) -> Result<Self, OpenAiError> {
        let api_key = KEY_VARS
            .iter()
            .find_map(|var| env::var(var).ok().filter(|v| !v.trim().is_empty()))
            .ok_or_else(|| {
                error!("OPENAI_KEY and OPENAI_API_KEY both missing in environment");
                OpenAiError::MissingKey
            })?;
        Self::new(api_key, llm)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// `{base_url}/chat/completions`, tolerating a trailing slash on the base.
pub fn chat_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Pull `choices[0].message.content` out of a chat-completions reply.
pub fn extract_content(reply: &Value) -> Result<String, OpenAiError> {
    reply
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or(OpenAiError::MissingContent)
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, CompletionError> {
        let body = ChatRequest {
            model: &self.model,
            messages: prompt.messages(),
        };
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(OpenAiError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
            error!(status = %status, endpoint = %self.endpoint, "Completion request rejected");
            return Err(OpenAiError::Status { status, body }.into());
        }

        let reply: Value = response.json().await.map_err(OpenAiError::from)?;
        let content = extract_content(&reply)?;
        debug!(len = content.len(), "Completion received");
        Ok(content)
    }
}
