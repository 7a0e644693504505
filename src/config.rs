//! Configuration types for document translation.
//!
//! All run behaviour is controlled through [`TranslationConfig`], built via
//! its [`TranslationConfigBuilder`]. Every knob lives in one struct so a
//! config can be shared across tasks, logged, and compared between runs.

use crate::document::RunFormat;
use crate::error::DocTransError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Default model identifier, also part of every cache key.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Default target language.
pub const DEFAULT_TARGET_LANGUAGE: &str = "Spanish";

/// Configuration for one translation run.
///
/// Built via [`TranslationConfig::builder()`] or using
/// [`TranslationConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_doctrans::{ConcurrencyMode, StyleFilter, TranslationConfig};
///
/// let config = TranslationConfig::builder()
///     .target_language("French")
///     .style_filter(StyleFilter::only(["Normal", "Body Text"]))
///     .concurrency(ConcurrencyMode::Bounded(8))
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct TranslationConfig {
    /// Language the document is translated into, e.g. "Spanish". Default: "Spanish".
    pub target_language: String,

    /// LLM model identifier. Default: "gpt-4.1-nano".
    ///
    /// The model is part of the cache key: switching models never serves a
    /// translation produced by another one.
    pub model: String,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Which paragraph styles are translated. Default: only "Normal".
    pub style_filter: StyleFilter,

    /// Consult and populate the translation cache. Default: true.
    pub use_cache: bool,

    /// Abort the run when the cache cannot be opened. Default: false.
    ///
    /// When false an unusable cache degrades to no-cache operation with a
    /// warning: every lookup misses and every store is dropped.
    pub cache_required: bool,

    /// SQLite file backing the cache.
    /// Default: the platform cache dir (`dirs::cache_dir()`) + `edgequake-doctrans/translations.sqlite3`.
    pub cache_path: PathBuf,

    /// Drop every cached translation for `target_language` before the run. Default: false.
    pub clear_cache_first: bool,

    /// Remote call scheduling. Default: `Bounded(5)`.
    pub concurrency: ConcurrencyMode,

    /// Sampling temperature for the LLM completion. Default: 0.3.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per unit. Default: 4096.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient LLM failure. Default: 3.
    ///
    /// Permanent errors (bad API key, rejected content) are not retried.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 1000.
    pub retry_backoff_ms: u64,

    /// Per-LLM-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Custom system prompt; `{language}` is replaced by the target language.
    /// If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Formatting applied to an inserted translation when its source
    /// paragraph has no runs. Default: no explicit formatting.
    pub default_run_format: RunFormat,

    /// Optional progress callback for per-unit status updates.
    pub progress_callback: Option<ProgressCallback>,

    /// Run-level cancellation. Once cancelled no new remote call is issued.
    pub cancellation: Option<CancellationToken>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            target_language: DEFAULT_TARGET_LANGUAGE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            provider_name: None,
            provider: None,
            style_filter: StyleFilter::default(),
            use_cache: true,
            cache_required: false,
            cache_path: default_cache_path(),
            clear_cache_first: false,
            concurrency: ConcurrencyMode::default(),
            temperature: 0.3,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 1000,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            system_prompt: None,
            default_run_format: RunFormat::default(),
            progress_callback: None,
            cancellation: None,
        }
    }
}

impl fmt::Debug for TranslationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationConfig")
            .field("target_language", &self.target_language)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("style_filter", &self.style_filter)
            .field("use_cache", &self.use_cache)
            .field("cache_required", &self.cache_required)
            .field("cache_path", &self.cache_path)
            .field("clear_cache_first", &self.clear_cache_first)
            .field("concurrency", &self.concurrency)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .field("cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl TranslationConfig {
    /// Create a new builder for `TranslationConfig`.
    pub fn builder() -> TranslationConfigBuilder {
        TranslationConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`TranslationConfig`].
#[derive(Debug)]
pub struct TranslationConfigBuilder {
    config: TranslationConfig,
}

impl TranslationConfigBuilder {
    pub fn target_language(mut self, lang: impl Into<String>) -> Self {
        self.config.target_language = lang.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn style_filter(mut self, filter: StyleFilter) -> Self {
        self.config.style_filter = filter;
        self
    }

    pub fn use_cache(mut self, v: bool) -> Self {
        self.config.use_cache = v;
        self
    }

    pub fn cache_required(mut self, v: bool) -> Self {
        self.config.cache_required = v;
        self
    }

    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cache_path = path.into();
        self
    }

    pub fn clear_cache_first(mut self, v: bool) -> Self {
        self.config.clear_cache_first = v;
        self
    }

    /// No clamping: `Bounded(0)` is reported by [`build`](Self::build).
    pub fn concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.config.concurrency = mode;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t;
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn default_run_format(mut self, format: RunFormat) -> Self {
        self.config.default_run_format = format;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.config.cancellation = Some(token);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TranslationConfig, DocTransError> {
        let c = &self.config;
        if c.target_language.trim().is_empty() {
            return Err(DocTransError::InvalidConfig(
                "Target language must not be empty".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(DocTransError::InvalidConfig(
                "Model identifier must not be empty".into(),
            ));
        }
        c.concurrency.validate()?;
        if !(0.0..=2.0).contains(&c.temperature) {
            return Err(DocTransError::InvalidConfig(format!(
                "Temperature must be 0.0–2.0, got {}",
                c.temperature
            )));
        }
        if let StyleFilter::Only(styles) = &c.style_filter {
            if styles.is_empty() {
                return Err(DocTransError::InvalidConfig(
                    "Style filter names no styles; use StyleFilter::All to translate everything"
                        .into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which paragraph styles are eligible for translation.
///
/// Style names are matched exactly, as the document reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StyleFilter {
    /// Every style.
    All,
    /// Only the listed style names.
    Only(BTreeSet<String>),
}

impl Default for StyleFilter {
    fn default() -> Self {
        StyleFilter::only(["Normal"])
    }
}

impl StyleFilter {
    pub fn only<I, S>(styles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StyleFilter::Only(styles.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, style_name: &str) -> bool {
        match self {
            StyleFilter::All => true,
            StyleFilter::Only(set) => set.contains(style_name),
        }
    }

    /// Parse a CLI-style filter: `"all"` or a comma-separated style list
    /// such as `"Normal,Heading 1"`.
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(StyleFilter::All);
        }
        let styles: BTreeSet<String> = s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        if styles.is_empty() {
            return Err(format!("Invalid style filter: '{s}'"));
        }
        Ok(StyleFilter::Only(styles))
    }
}

impl fmt::Display for StyleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleFilter::All => f.write_str("all"),
            StyleFilter::Only(set) => {
                let names: Vec<&str> = set.iter().map(String::as_str).collect();
                f.write_str(&names.join(","))
            }
        }
    }
}

/// How remote translation calls are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcurrencyMode {
    /// One call at a time, in unit order.
    Sequential,
    /// At most `n` calls in flight.
    Bounded(usize),
}

impl Default for ConcurrencyMode {
    fn default() -> Self {
        ConcurrencyMode::Bounded(5)
    }
}

impl ConcurrencyMode {
    pub fn validate(&self) -> Result<(), DocTransError> {
        match self {
            ConcurrencyMode::Bounded(0) => Err(DocTransError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Number of calls allowed in flight.
    pub fn limit(&self) -> usize {
        match self {
            ConcurrencyMode::Sequential => 1,
            ConcurrencyMode::Bounded(n) => *n,
        }
    }
}

/// Default location of the SQLite cache file.
///
/// - **macOS**: `~/Library/Caches/edgequake-doctrans/translations.sqlite3`
/// - **Linux**: `~/.cache/edgequake-doctrans/translations.sqlite3`
/// - **Windows**: `%LOCALAPPDATA%\edgequake-doctrans\translations.sqlite3`
pub fn default_cache_path() -> PathBuf {
    let base = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir);
    base.join("edgequake-doctrans").join("translations.sqlite3")
}
