//! # edgequake-doctrans
//!
//! Translate styled-block documents with LLMs, inserting each translation as
//! a new paragraph directly below its source and keeping the source's style
//! and run formatting.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document
//!  │
//!  ├─ 1. Extract   paragraphs whose style passes the filter (cells included)
//!  ├─ 2. Cache     blake3(text, language, model) → SQLite
//!  ├─ 3. Dispatch  one LLM call per unique miss, bounded or sequential
//!  ├─ 4. Polish    strip fences, preambles, stray quotes
//!  ├─ 5. Mutate    insert each translation after its source block
//!  └─ 6. Report    cached / translated / failed counts + per-unit failures
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doctrans::{translate_file, TranslationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = TranslationConfig::builder()
//!         .target_language("French")
//!         .build()?;
//!     let run = translate_file("report.json", None, &config).await?;
//!     eprintln!(
//!         "{} units: {} cached, {} translated, {} failed → {}",
//!         run.report.total_units,
//!         run.report.cached,
//!         run.report.translated,
//!         run.report.failed,
//!         run.output_path.display()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Bring your own collaborators
//!
//! [`run`] works over any [`DocumentAccess`] implementation with any
//! [`TranslationService`] and [`TranslationCache`], so the pipeline can be
//! driven without a network or a file system.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doctrans` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-doctrans = { version = "0.1", default-features = false }
//! ```
//!
//! ## Re-running over translated output
//!
//! The pipeline is **not idempotent**: translations are inserted with their
//! source's style, so a second run over its own output translates both the
//! originals and the inserted blocks again. See [`pipeline::mutate`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod service;
pub mod stream;
pub mod translate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::{CacheEntry, CacheKey, MemoryCache, NoCache, SqliteCache, TranslationCache};
pub use config::{ConcurrencyMode, StyleFilter, TranslationConfig, TranslationConfigBuilder};
pub use document::{BlockId, BlockView, Document, DocumentAccess, RunFormat};
pub use error::{CacheError, DocTransError, DocumentError, TranslationServiceError, UnitError};
pub use output::{MutationSummary, OutcomeStatus, RunReport, TokenUsage, TranslationOutcome};
pub use pipeline::dispatch::{DispatchReport, Dispatcher};
pub use pipeline::extract::{extract_units, TranslatableUnit};
pub use pipeline::llm::LlmTranslator;
pub use progress::{NoopProgressCallback, ProgressCallback, TranslationProgressCallback};
pub use service::{TranslatedText, TranslationService};
pub use stream::{translate_stream, OutcomeStream};
pub use translate::{
    clear_all_caches, default_output_path, inspect, open_cache, resolve_service, run,
    translate_document, translate_file, translate_sync, FileRun,
};
