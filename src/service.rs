//! The remote translation capability.
//!
//! The pipeline treats translation as an opaque, fallible remote function.
//! [`crate::pipeline::llm::LlmTranslator`] is the production implementation;
//! tests plug in scripted services.

use crate::error::TranslationServiceError;
use crate::output::TokenUsage;
use async_trait::async_trait;
use std::sync::Arc;

/// A single-call text translator.
///
/// Implementations own their retry policy: the dispatcher calls
/// [`translate`](TranslationService::translate) at most once per unique text
/// per run and reports whatever error comes back.
#[async_trait]
pub trait TranslationService: Send + Sync {
    /// Translate `text` into `target_language` using `model`.
    ///
    /// * `Ok(String)`: the raw translation (post-processing happens in the
    ///   dispatcher).
    /// * `Err(Transient)`: a later attempt may succeed.
    /// * `Err(Permanent)`: retrying will not help.
    async fn translate(
        &self,
        text: &str,
        target_language: &str,
        model: &str,
    ) -> Result<String, TranslationServiceError>;

    /// [`translate`](TranslationService::translate) plus the tokens the call
    /// consumed, when the backend reports them. The dispatcher calls this.
    async fn translate_with_usage(
        &self,
        text: &str,
        target_language: &str,
        model: &str,
    ) -> Result<TranslatedText, TranslationServiceError> {
        let text = self.translate(text, target_language, model).await?;
        Ok(TranslatedText { text, usage: None })
    }

    /// Human-readable name of this service (for logging/reports).
    fn name(&self) -> &str {
        "translation-service"
    }
}

/// Raw service output with optional token accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedText {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

#[async_trait]
impl<T: TranslationService + ?Sized> TranslationService for Arc<T> {
    async fn translate(
        &self,
        text: &str,
        target_language: &str,
        model: &str,
    ) -> Result<String, TranslationServiceError> {
        (**self).translate(text, target_language, model).await
    }

    async fn translate_with_usage(
        &self,
        text: &str,
        target_language: &str,
        model: &str,
    ) -> Result<TranslatedText, TranslationServiceError> {
        (**self)
            .translate_with_usage(text, target_language, model)
            .await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
