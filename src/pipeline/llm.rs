//! LLM interaction: build chat messages and call the provider.
//!
//! [`LlmTranslator`] adapts any `edgequake-llm` provider to the
//! [`TranslationService`] trait. It is intentionally thin: the prompt lives in
//! [`crate::prompts`] and output cleanup in [`crate::pipeline::postprocess`].
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient and frequent under
//! concurrent load. Retries use exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`): with a 1 s base and 3 retries the
//! wait sequence is 1 s → 2 s → 4 s. Authentication failures and content
//! rejections are permanent and returned immediately.

use crate::config::TranslationConfig;
use crate::error::TranslationServiceError;
use crate::output::TokenUsage;
use crate::prompts;
use crate::service::{TranslatedText, TranslationService};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Translation service backed by an LLM chat provider.
///
/// The provider is bound to a model when it is constructed; the `model`
/// argument of [`TranslationService::translate`] only labels logs and keys
/// the cache.
pub struct LlmTranslator {
    provider: Arc<dyn LLMProvider>,
    label: String,
    system_prompt: Option<String>,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout: Duration,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
}

impl LlmTranslator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &TranslationConfig) -> Self {
        Self {
            provider,
            label: config
                .provider_name
                .clone()
                .unwrap_or_else(|| "llm".to_string()),
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout: Duration::from_secs(config.api_timeout_secs.max(1)),
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
        }
    }

    /// Tokens consumed by every successful call made through this translator.
    pub fn usage(&self) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
        }
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl TranslationService for LlmTranslator {
    async fn translate(
        &self,
        text: &str,
        target_language: &str,
        model: &str,
    ) -> Result<String, TranslationServiceError> {
        self.translate_with_usage(text, target_language, model)
            .await
            .map(|t| t.text)
    }

    async fn translate_with_usage(
        &self,
        text: &str,
        target_language: &str,
        model: &str,
    ) -> Result<TranslatedText, TranslationServiceError> {
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(prompts::system_prompt(
                self.system_prompt.as_deref(),
                target_language,
            )),
            ChatMessage::user(text),
        ];
        let options = self.build_options();

        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    model, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match timeout(self.api_timeout, self.provider.chat(&messages, Some(&options))).await {
                Ok(Ok(response)) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        model,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    let usage = TokenUsage {
                        prompt_tokens: response.prompt_tokens as u64,
                        completion_tokens: response.completion_tokens as u64,
                    };
                    self.prompt_tokens
                        .fetch_add(usage.prompt_tokens, Ordering::Relaxed);
                    self.completion_tokens
                        .fetch_add(usage.completion_tokens, Ordering::Relaxed);
                    return Ok(TranslatedText {
                        text: response.content,
                        usage: Some(usage),
                    });
                }
                Ok(Err(e)) => {
                    let err_msg = format!("{}", e);
                    if is_permanent(&err_msg) {
                        warn!("{}: permanent failure, not retrying: {}", model, err_msg);
                        return Err(TranslationServiceError::Permanent(err_msg));
                    }
                    warn!("{}: attempt {} failed: {}", model, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
                Err(_) => {
                    let err_msg = format!("timed out after {}s", self.api_timeout.as_secs());
                    warn!("{}: attempt {} {}", model, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(TranslationServiceError::Transient(format!(
            "gave up after {} attempts: {}",
            self.max_retries + 1,
            last_err.unwrap_or_else(|| "Unknown error".to_string())
        )))
    }

    fn name(&self) -> &str {
        &self.label
    }
}

static RE_PERMANENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:401|403|unauthori[sz]ed|forbidden|invalid[ _]api[ _]key|incorrect api key|authentication|content[ _]?(?:filter|policy)|model[ _]not[ _]found|does not exist)\b",
    )
    .unwrap()
});

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, saturating.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// Whether a provider error message describes a failure retrying cannot fix.
fn is_permanent(message: &str) -> bool {
    RE_PERMANENT.is_match(message)
}
