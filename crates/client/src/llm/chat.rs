//! OpenAI-compatible chat-completion client.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use rocky_core::{AppConfig, Error};

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("missing API key: ROCKY_LLM_API_KEY not set")]
    MissingApiKey,

    #[error("HTTP error: {status}: {body}")]
    HttpError { status: u16, body: String },

    #[error("request timeout")]
    Timeout,

    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("model returned no content")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { LlmError::Timeout } else { LlmError::Network(Arc::new(err)) }
    }
}

impl From<LlmError> for Error {
    fn from(err: LlmError) -> Self {
        Error::QueryFailed(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl From<&AppConfig> for ChatConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            api_key: config.llm_api_key.clone(),
            base_url: config.llm_base_url.clone(),
            model: config.llm_model.clone(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    config: ChatConfig,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .use_rustls_tls()
            .build()
            .map_err(LlmError::from)?;
        Ok(Self { http, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Resolve the chat completions endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") { base.to_string() } else { format!("{base}/chat/completions") }
    }

    /// Non-streaming chat completion returning the first choice's content.
    pub async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let api_key = self.config.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;
        let body = ChatRequest { model: &self.config.model, messages, temperature: 0.1 };

        let response = self.http.post(self.endpoint()).bearer_auth(api_key).json(&body).send().await?;
        let status = response.status();
        tracing::debug!(status = status.as_u16(), model = %self.config.model, "chat completion response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::HttpError { status: status.as_u16(), body });
        }

        let bytes = response.bytes().await?;
        parse_completion(&bytes)
    }
}

fn parse_completion(bytes: &[u8]) -> Result<String, LlmError> {
    let parsed: ChatResponse = serde_json::from_slice(bytes).map_err(|e| LlmError::Parse(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(LlmError::EmptyResponse)
}
