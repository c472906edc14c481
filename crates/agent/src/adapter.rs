//! ProviderAdapter: the loop's single entry point to a model backend.
//!
//! Wraps any `Provider` with a per-attempt timeout and the retry policy.
//! Transient failures (timeouts, network errors, rate limits, 5xx) are retried
//! with exponential backoff; fatal ones surface immediately.

use std::sync::Arc;
use std::time::Duration;

use stepwise_core::error::ProviderError;
use stepwise_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use stepwise_core::run::RunConfig;
use stepwise_core::turn::Turn;
use tracing::{debug, warn};

use crate::retry::RetryPolicy;

#[derive(Clone)]
pub struct ProviderAdapter {
    provider: Arc<dyn Provider>,
    timeout: Duration,
    retry: RetryPolicy,
    model: String,
    system: Option<String>,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ProviderAdapter {
    pub fn new(provider: Arc<dyn Provider>, config: &RunConfig, system: Option<String>) -> Self {
        Self {
            provider,
            timeout: config.provider_timeout,
            retry: RetryPolicy::new(config.retry_attempts, config.retry_base_delay),
            model: config.model.clone(),
            system,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Build the request for the next model turn.
    pub fn request(&self, turns: &[Turn], tools: Vec<ToolDefinition>) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            system: self.system.clone(),
            turns: turns.to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools,
        }
    }

    /// Send the conversation and tool catalog, retrying transient failures.
    pub async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let provider = self.provider.name().to_string();
        let mut attempt = 0;

        loop {
            debug!(provider = %provider, attempt = attempt + 1, "Calling provider");
            let result = match tokio::time::timeout(self.timeout, self.provider.send(request.clone()))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(format!(
                    "no response within {}ms",
                    self.timeout.as_millis()
                ))),
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) if self.retry.should_retry(attempt, &e) => {
                    let delay = self.retry.delay_for(attempt, &e);
                    warn!(
                        provider = %provider,
                        attempt = attempt + 1,
                        max_attempts = self.retry.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient provider error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(provider = %provider, attempt = attempt + 1, error = %e, "Provider call failed");
                    return Err(e);
                }
            }
        }
    }
}

impl std::fmt::Debug for ProviderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAdapter")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}
