//! Remote completion endpoint client.
//!
//! The memory subsystem never speaks the model's wire protocol itself: the
//! agent is handed a [`ModelClient`] and supplies only content. The shipped
//! implementation talks to any OpenAI-compatible chat-completions endpoint
//! (OpenRouter by default).

use crate::{MnemoConfig, MnemoError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Request timeout for a single completion call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Attempts for a retryable HTTP failure (429/5xx/network).
const REQUEST_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff between attempts.
const RETRY_BASE_DELAY_MS: u64 = 500;

const SYSTEM_PROMPT: &str = "You are a helpful, context-aware personal assistant \
that remembers facts from previous sessions and uses them naturally. Reply \
clearly and concisely.";

/// The seam to the external model collaborator. Tests substitute a scripted
/// implementation; production wiring supplies [`OpenRouterClient`].
pub trait ModelClient: Send + Sync {
    /// Produce the assistant reply for one turn. `context` is the assembled
    /// memory block (may be empty for a brand-new identity).
    fn complete(
        &self,
        context: &str,
        user_text: &str,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

// ─── Chat Completions API types ─────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

// ─── OpenRouter client ──────────────────────────────────────────────

/// Chat-completions client for OpenRouter-style endpoints.
pub struct OpenRouterClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenRouterClient {
    pub fn new(config: &MnemoConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(Duration::from_secs(15))
            .user_agent(concat!("mnemo/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MnemoError::ModelApi(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn is_retryable_status(status: reqwest::StatusCode) -> bool {
        status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn retry_backoff(attempt: u32) -> Duration {
        let exp = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(exp))
    }

    /// Fold the assembled memory block and the new user message into the
    /// prompt for one completion call.
    fn build_user_prompt(context: &str, user_text: &str) -> String {
        if context.is_empty() {
            user_text.to_string()
        } else {
            format!(
                "What you remember about this user:\n{}\nUser now says: {}",
                context, user_text
            )
        }
    }

    async fn send_once(&self, request: &ChatRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| MnemoError::ModelApi(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let msg = format!("HTTP {}: {}", status, body);
            return if Self::is_retryable_status(status) {
                Err(MnemoError::ModelApi(format!("retryable {}", msg)))
            } else {
                Err(MnemoError::ModelApi(msg))
            };
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| MnemoError::ModelApi(e.to_string()))?;

        Ok(chat_response
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default())
    }
}

impl ModelClient for OpenRouterClient {
    async fn complete(&self, context: &str, user_text: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Self::build_user_prompt(context, user_text),
                },
            ],
            max_tokens: 2048,
            temperature: 0.7,
        };

        let mut last_err = None;
        for attempt in 1..=REQUEST_ATTEMPTS {
            match self.send_once(&request).await {
                Ok(reply) => {
                    debug!(attempt, "Completion succeeded");
                    return Ok(reply);
                }
                Err(e) => {
                    let retryable = matches!(&e, MnemoError::ModelApi(m) if m.starts_with("retryable"));
                    warn!(attempt, error = %e, "Completion attempt failed");
                    last_err = Some(e);
                    if !retryable || attempt == REQUEST_ATTEMPTS {
                        break;
                    }
                    tokio::time::sleep(Self::retry_backoff(attempt)).await;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| MnemoError::ModelApi("request failed without detail".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_without_context_is_bare() {
        assert_eq!(OpenRouterClient::build_user_prompt("", "hello"), "hello");
    }

    #[test]
    fn test_prompt_embeds_context_before_message() {
        let prompt =
            OpenRouterClient::build_user_prompt("=== Known Facts ===\nname: Sam\n", "hi again");
        let facts = prompt.find("name: Sam").unwrap();
        let msg = prompt.find("User now says: hi again").unwrap();
        assert!(facts < msg);
    }

    #[test]
    fn test_backoff_grows() {
        assert!(OpenRouterClient::retry_backoff(2) > OpenRouterClient::retry_backoff(1));
    }
}
