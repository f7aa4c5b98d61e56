//! Anthropic Messages API client used to write comments
//!
//! Every call is stateless: one system prompt, one user message carrying the
//! post excerpt. Rate limits and server errors are retried with exponential
//! backoff; repeated hard failures open the circuit breaker.

use async_trait::async_trait;
use revisit_core::{Assistant, AssistantConfig, Result, RevisitError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::auth;
use crate::circuit_breaker::CircuitBreaker;
use crate::types::{AnthropicMessage, AnthropicRequest, AnthropicResponse};

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Post content beyond this many characters is not sent
pub const MAX_CONTENT_CHARS: usize = 1000;

/// Retry schedule for 429 and 5xx responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// [`Assistant`] backed by the Anthropic Messages API
pub struct AnthropicAssistant {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: usize,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl AnthropicAssistant {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let retry = RetryPolicy::default();
        Self {
            http: build_http(retry.request_timeout),
            api_url: ANTHROPIC_API_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 300,
            retry,
            breaker: CircuitBreaker::default(),
        }
    }

    /// Build from configuration, reading the key from the environment
    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        let key = auth::get_api_key()?;
        Ok(Self::new(key, &config.model).with_max_tokens(config.max_tokens))
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.http = build_http(retry.request_timeout);
        self.retry = retry;
        self
    }

    pub fn with_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = breaker;
        self
    }

    fn request(&self, content: &str, prompt: &str) -> AnthropicRequest {
        let excerpt: String = content.chars().take(MAX_CONTENT_CHARS).collect();
        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: (!prompt.trim().is_empty()).then(|| prompt.trim().to_string()),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: excerpt,
            }],
        }
    }

    async fn send(&self, request: &AnthropicRequest) -> Result<AnthropicResponse> {
        let mut retries = 0;
        let mut backoff = self.retry.initial_backoff;

        loop {
            debug!("Sending comment request (attempt {})", retries + 1);

            let response = self
                .http
                .post(&self.api_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(request)
                .send()
                .await
                .map_err(|e| RevisitError::Assistant(format!("Failed to send request: {}", e)))?;

            let status = response.status();

            if status.as_u16() == 429 {
                retries += 1;
                if retries > self.retry.max_retries {
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown".to_string());
                    return Err(RevisitError::ApiLimit(format!(
                        "Rate limit exceeded after {} retries: {}",
                        self.retry.max_retries, error_text
                    )));
                }

                let wait = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(backoff)
                    .min(self.retry.max_backoff);

                warn!(
                    "Rate limited (429). Waiting {:?} before retry {}/{}",
                    wait, retries, self.retry.max_retries
                );
                tokio::time::sleep(wait).await;
                backoff = (backoff * 2).min(self.retry.max_backoff);
                continue;
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown".to_string());

                if status.is_server_error() && retries < self.retry.max_retries {
                    retries += 1;
                    warn!(
                        "Server error ({}). Waiting {:?} before retry {}/{}",
                        status, backoff, retries, self.retry.max_retries
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.retry.max_backoff);
                    continue;
                }

                return Err(RevisitError::Assistant(format!(
                    "Anthropic API error {}: {}",
                    status, error_text
                )));
            }

            return response
                .json()
                .await
                .map_err(|e| RevisitError::Assistant(format!("Failed to parse response: {}", e)));
        }
    }
}

fn build_http(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}

/// Strip wrapping quotes models like to add around a one-line answer
fn clean_reply(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim();
    (!unquoted.is_empty()).then(|| unquoted.to_string())
}

#[async_trait]
impl Assistant for AnthropicAssistant {
    async fn generate(&self, content: &str, prompt: &str) -> Result<Option<String>> {
        if !self.breaker.can_execute() {
            return Err(RevisitError::ApiLimit(format!(
                "Circuit breaker is open; retry in {} seconds",
                self.breaker.time_until_retry() / 1000
            )));
        }

        let request = self.request(content, prompt);
        match self.send(&request).await {
            Ok(response) => {
                self.breaker.record_success();
                if let Some(usage) = response.usage {
                    info!(
                        "Comment generated ({} input tokens, {} output tokens)",
                        usage.input_tokens, usage.output_tokens
                    );
                }
                Ok(clean_reply(&response.text()))
            }
            Err(e) => {
                self.breaker.record_failure();
                error!(
                    "Assistant call failed (consecutive failures: {}): {}",
                    self.breaker.failure_count(),
                    e
                );
                Err(e)
            }
        }
    }

    fn is_available(&self) -> bool {
        self.breaker.can_execute()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_truncates_content() {
        let assistant = AnthropicAssistant::new("key", "claude-haiku-4-5").with_max_tokens(120);
        let content = "가".repeat(MAX_CONTENT_CHARS + 50);
        let request = assistant.request(&content, "  Be kind.  ");

        assert_eq!(request.max_tokens, 120);
        assert_eq!(request.system.as_deref(), Some("Be kind."));
        assert_eq!(request.messages[0].content.chars().count(), MAX_CONTENT_CHARS);
    }

    #[test]
    fn test_blank_prompt_is_omitted() {
        let assistant = AnthropicAssistant::new("key", "m");
        let request = assistant.request("post", " ");
        assert!(request.system.is_none());
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_clean_reply() {
        assert_eq!(clean_reply("  \"Nice photos!\" ").as_deref(), Some("Nice photos!"));
        assert_eq!(clean_reply("Nice photos!").as_deref(), Some("Nice photos!"));
        assert_eq!(clean_reply("\"\""), None);
        assert_eq!(clean_reply("   "), None);
    }
}
