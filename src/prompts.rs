//! System prompt for LLM-backed translation.
//!
//! Callers can override the default via
//! [`crate::config::TranslationConfig::system_prompt`]; the constant here is
//! used only when no override is provided.

/// Placeholder replaced with the target language.
pub const LANGUAGE_PLACEHOLDER: &str = "{language}";

/// Default system prompt for translating one paragraph.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional translator. \
Translate the following text to {language}. \
Preserve formatting and maintain the same tone and style. \
Output ONLY the translated text, without quotes, notes or explanations.";

/// Render a system prompt template for `target_language`.
pub fn system_prompt(template: Option<&str>, target_language: &str) -> String {
    template
        .unwrap_or(DEFAULT_SYSTEM_PROMPT)
        .replace(LANGUAGE_PLACEHOLDER, target_language.trim())
}
