//! Text-completion service client (OpenAI-compatible chat completions via rig).

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client as ReqwestClient;
use rig::client::CompletionClient as _;
use rig::completion::Prompt;
use rig::providers::openai;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::http_client::DEFAULT_TIMEOUT_MS;
use crate::retry::RetryConfig;

pub const DEFAULT_COMPLETION_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4-turbo";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: String::from("system"),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: String::from("user"),
            content: content.into(),
        }
    }

    fn is_system(&self) -> bool {
        self.role == "system"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// System messages become the agent preamble; everything else is the prompt.
    fn split(&self) -> (Option<String>, String) {
        let join = |system: bool| {
            self.messages
                .iter()
                .filter(|message| message.is_system() == system)
                .map(|message| message.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        let preamble = join(true);
        ((!preamble.is_empty()).then_some(preamble), join(false))
    }
}

/// Failure of a completion call. Always recoverable by the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompletionError {
    #[error("completion client could not be built: {0}")]
    Client(String),
    #[error("completion request failed: {0}")]
    Transport(String),
    #[error("completion timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("completion response contained no text")]
    EmptyResponse,
}

/// Text-completion seam used by the ticker resolver.
pub trait CompletionClient: Send + Sync {
    fn complete<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>>;
}

/// Chat completions against `{base_url}/chat/completions` through rig's OpenAI provider.
#[derive(Clone)]
pub struct OpenAiCompletionClient {
    client: openai::CompletionsClient<ReqwestClient>,
    retry: RetryConfig,
    timeout_ms: u64,
}

impl OpenAiCompletionClient {
    pub fn new(api_key: &str, base_url: &str) -> Result<Self, CompletionError> {
        let client = openai::CompletionsClient::builder()
            .api_key(api_key)
            .base_url(base_url.trim_end_matches('/'))
            .build()
            .map_err(|e| CompletionError::Client(e.to_string()))?;

        Ok(Self {
            client,
            retry: RetryConfig::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    async fn send(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let (preamble, prompt) = request.split();
        let mut builder = self
            .client
            .agent(&request.model)
            .max_tokens(u64::from(request.max_tokens));
        if let Some(preamble) = preamble.as_deref() {
            builder = builder.preamble(preamble);
        }
        let agent = builder.build();

        debug!(model = %request.model, max_tokens = request.max_tokens, "requesting completion");
        let attempts = self.retry.attempts();
        let mut attempt = 0;
        let text = loop {
            attempt += 1;
            let outcome = tokio::time::timeout(
                Duration::from_millis(self.timeout_ms),
                agent.prompt(prompt.as_str()),
            )
            .await;

            match outcome {
                Ok(result) => break result.map_err(|e| CompletionError::Transport(e.to_string()))?,
                Err(_) if self.retry.retry_on_timeout && attempt < attempts => {
                    let delay = self.retry.delay_for_attempt(attempt - 1);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying completion timeout");
                    tokio::time::sleep(delay).await;
                }
                Err(_) => {
                    return Err(CompletionError::Timeout {
                        timeout_ms: self.timeout_ms,
                    })
                }
            }
        };

        non_empty(text)
    }
}

impl CompletionClient for OpenAiCompletionClient {
    fn complete<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>> {
        Box::pin(self.send(request))
    }
}

fn non_empty(text: String) -> Result<String, CompletionError> {
    if text.trim().is_empty() {
        return Err(CompletionError::EmptyResponse);
    }
    Ok(text)
}
