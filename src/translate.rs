//! Pipeline controller and file-level entry points.
//!
//! [`run`] is the core: extraction → dispatch → mutation over any
//! [`DocumentAccess`], with the service and cache passed in explicitly.
//! [`translate_document`] and [`translate_file`] build those collaborators
//! from a [`TranslationConfig`] for the common case.
//!
//! A run is fatal only when the document cannot be read at all or when a
//! mandatory cache is unavailable. Everything else is reported per unit in
//! the returned [`RunReport`].

use crate::cache::{NoCache, SqliteCache, TranslationCache};
use crate::config::TranslationConfig;
use crate::document::{Document, DocumentAccess};
use crate::error::{DocTransError, DocumentError};
use crate::output::RunReport;
use crate::pipeline::dispatch::Dispatcher;
use crate::pipeline::extract::{extract_units, TranslatableUnit};
use crate::pipeline::llm::LlmTranslator;
use crate::pipeline::{input, mutate};
use crate::service::TranslationService;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Translate `doc` in place.
///
/// # Returns
/// `Ok(RunReport)` whenever the run completed, even if some units failed
/// (check `report.failed` / `report.failures`, or call
/// [`RunReport::into_result`]).
///
/// # Errors
/// - [`DocTransError::DocumentUnreadable`]: the block tree cannot be walked;
///   no remote call has been made.
/// - [`DocTransError::CacheUnavailable`]: `clear_cache_first` failed and
///   `cache_required` is set.
/// - [`DocTransError::InvalidConfig`]: e.g. `Bounded(0)` concurrency.
pub async fn run<D: DocumentAccess + ?Sized>(
    doc: &mut D,
    config: &TranslationConfig,
    service: Arc<dyn TranslationService>,
    cache: Arc<dyn TranslationCache>,
) -> Result<RunReport, DocTransError> {
    let start = Instant::now();
    config.concurrency.validate()?;

    // ── Step 1: Extract units ────────────────────────────────────────────
    let units: Vec<TranslatableUnit> = extract_units(&*doc, &config.style_filter)?.collect();
    info!(
        "Extracted {} units (styles: {}) for translation into {}",
        units.len(),
        config.style_filter,
        config.target_language
    );

    // ── Step 2: Optional cache invalidation ──────────────────────────────
    if config.clear_cache_first {
        match cache.invalidate(&config.target_language) {
            Ok(n) => info!(
                "Cleared {} cached {} translations",
                n, config.target_language
            ),
            Err(e) if config.cache_required => {
                return Err(DocTransError::CacheUnavailable {
                    path: config.cache_path.clone(),
                    detail: e.to_string(),
                });
            }
            Err(e) => warn!("Could not clear cache: {}", e),
        }
    }

    // ── Step 3: Dispatch ─────────────────────────────────────────────────
    let dispatcher = Dispatcher::new(service, cache)
        .with_progress(config.progress_callback.clone())
        .with_cancellation(config.cancellation.clone());
    let dispatched = dispatcher
        .dispatch(
            &units,
            &config.target_language,
            &config.model,
            config.concurrency,
        )
        .await?;
    if dispatched.cancelled {
        warn!("Run cancelled; inserting the translations obtained so far");
    }

    // ── Step 4: Mutate ───────────────────────────────────────────────────
    let summary = mutate::apply(
        doc,
        &units,
        &dispatched.outcomes,
        &config.default_run_format,
    );
    debug!(
        "Mutation: {} inserted, {} skipped, {} failed",
        summary.inserted, summary.skipped, summary.failed
    );

    let mut report = RunReport::assemble(
        &dispatched.outcomes,
        summary,
        dispatched.remote_calls,
        dispatched.cancelled,
        start.elapsed().as_millis() as u64,
    );
    report.api_tokens = dispatched.api_tokens;
    report.cached_tokens = dispatched.cached_tokens;

    info!(
        "Translation complete: {} units, {} API calls, {} cache hits, {} failed, {}ms",
        report.total_units, report.remote_calls, report.cached, report.failed, report.duration_ms
    );
    info!(
        "Tokens: {} API + {} cached = {} total",
        report.api_tokens.completion_tokens,
        report.cached_tokens,
        report.api_tokens.completion_tokens + report.cached_tokens
    );

    Ok(report)
}

/// Translate an in-memory [`Document`], building the cache and service from
/// `config`.
pub async fn translate_document(
    doc: &mut Document,
    config: &TranslationConfig,
) -> Result<RunReport, DocTransError> {
    let cache = open_cache(config)?;
    let service = resolve_service(config)?;
    run(doc, config, service, cache).await
}

/// Where [`translate_file`] wrote the result, and how the run went.
#[derive(Debug, Clone)]
pub struct FileRun {
    pub output_path: PathBuf,
    pub report: RunReport,
}

/// Translate a document file or URL and write the result.
///
/// `output` defaults to `translated_<input name>` next to a local input (in
/// the current directory for URLs). The write is atomic (temp file + rename).
pub async fn translate_file(
    input_str: impl AsRef<str>,
    output: Option<&Path>,
    config: &TranslationConfig,
) -> Result<FileRun, DocTransError> {
    let input_str = input_str.as_ref();
    info!("Starting translation: {}", input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;

    // ── Step 2: Load document ────────────────────────────────────────────
    let mut doc = load_document(resolved.path())?;
    debug!("Loaded {} paragraphs", doc.paragraph_count());

    // ── Step 3: Translate ────────────────────────────────────────────────
    let report = translate_document(&mut doc, config).await?;

    // ── Step 4: Write output ─────────────────────────────────────────────
    let output_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(input_str));
    save_document(&doc, &output_path)?;
    info!("Wrote {}", output_path.display());

    Ok(FileRun {
        output_path,
        report,
    })
}

/// Synchronous wrapper around [`translate_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn translate_sync(
    input_str: impl AsRef<str>,
    output: Option<&Path>,
    config: &TranslationConfig,
) -> Result<FileRun, DocTransError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocTransError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(translate_file(input_str, output, config))
}

/// List the units a run would translate, without translating anything.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &TranslationConfig,
) -> Result<Vec<TranslatableUnit>, DocTransError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let doc = load_document(resolved.path())?;
    let units = extract_units(&doc, &config.style_filter)?.collect();
    Ok(units)
}

/// Remove every cached translation, for every language.
pub fn clear_all_caches(config: &TranslationConfig) -> Result<usize, DocTransError> {
    let cache = SqliteCache::open(&config.cache_path).map_err(|e| DocTransError::CacheUnavailable {
        path: config.cache_path.clone(),
        detail: e.to_string(),
    })?;
    cache
        .clear_all()
        .map_err(|e| DocTransError::CacheUnavailable {
            path: config.cache_path.clone(),
            detail: e.to_string(),
        })
}

/// `translated_<name>` next to a local input, or in the working directory
/// for a URL.
pub fn default_output_path(input_str: &str) -> PathBuf {
    let name = format!("translated_{}", input::file_name_of(input_str));
    if input::is_url(input_str) {
        return PathBuf::from(name);
    }
    match Path::new(input_str).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(name),
        _ => PathBuf::from(name),
    }
}

/// Open the cache described by `config`.
///
/// * `use_cache = false` → [`NoCache`].
/// * Storage fails and `cache_required` → [`DocTransError::CacheUnavailable`].
/// * Storage fails otherwise → warning, then [`NoCache`].
pub fn open_cache(config: &TranslationConfig) -> Result<Arc<dyn TranslationCache>, DocTransError> {
    if !config.use_cache {
        info!("Translation cache disabled");
        return Ok(Arc::new(NoCache));
    }

    match SqliteCache::open(&config.cache_path) {
        Ok(cache) => {
            debug!("Cache '{}' holds {} entries", cache.name(), cache.len());
            Ok(Arc::new(cache))
        }
        Err(e) if config.cache_required => Err(DocTransError::CacheUnavailable {
            path: config.cache_path.clone(),
            detail: e.to_string(),
        }),
        Err(e) => {
            warn!(
                "Translation cache at {} unavailable, continuing without it: {}",
                config.cache_path.display(),
                e
            );
            Ok(Arc::new(NoCache))
        }
    }
}

/// Build the LLM-backed translation service from `config`.
pub fn resolve_service(
    config: &TranslationConfig,
) -> Result<Arc<dyn TranslationService>, DocTransError> {
    let provider = resolve_provider(config)?;
    Ok(Arc::new(LlmTranslator::new(provider, config)))
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn load_document(path: &Path) -> Result<Document, DocTransError> {
    Document::load(path).map_err(|e| DocTransError::DocumentUnreadable {
        detail: e.to_string(),
    })
}

fn save_document(doc: &Document, path: &Path) -> Result<(), DocTransError> {
    doc.save(path).map_err(|e| match e {
        DocumentError::Io { source, .. } => DocTransError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        },
        other => DocTransError::Internal(other.to_string()),
    })
}

/// Instantiate a named provider with the given model.
fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, DocTransError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocTransError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model`.
/// 3. **`EDGEQUAKE_LLM_PROVIDER`** from the environment, with `config.model`.
/// 4. **`OPENAI_API_KEY`** present → OpenAI with `config.model`.
/// 5. **Auto-detect** via [`ProviderFactory::from_env`].
///
/// The model always comes from the config, since it is also part of every
/// cache key.
fn resolve_provider(config: &TranslationConfig) -> Result<Arc<dyn LLMProvider>, DocTransError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, &config.model);
    }

    if let Ok(prov) = std::env::var("EDGEQUAKE_LLM_PROVIDER") {
        if !prov.is_empty() {
            return create_provider(&prov, &config.model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", &config.model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocTransError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Details: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_path_next_to_input() {
        assert_eq!(
            default_output_path("/data/in/report.json"),
            PathBuf::from("/data/in/translated_report.json")
        );
        assert_eq!(
            default_output_path("report.json"),
            PathBuf::from("translated_report.json")
        );
        assert_eq!(
            default_output_path("https://example.com/docs/report.json"),
            PathBuf::from("translated_report.json")
        );
    }

    #[test]
    fn disabled_cache_is_no_cache() {
        let config = TranslationConfig::builder().use_cache(false).build().unwrap();
        let cache = open_cache(&config).unwrap();
        assert_eq!(cache.name(), "none");
    }

    #[test]
    fn broken_cache_degrades_or_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let bad_path = blocker.join("cache.sqlite3");

        let tolerant = TranslationConfig::builder()
            .cache_path(&bad_path)
            .build()
            .unwrap();
        assert_eq!(open_cache(&tolerant).unwrap().name(), "none");

        let strict = TranslationConfig::builder()
            .cache_path(&bad_path)
            .cache_required(true)
            .build()
            .unwrap();
        assert!(matches!(
            open_cache(&strict),
            Err(DocTransError::CacheUnavailable { .. })
        ));
    }

    #[test]
    fn sqlite_cache_opens_at_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = TranslationConfig::builder()
            .cache_path(dir.path().join("c").join("t.sqlite3"))
            .build()
            .unwrap();
        assert_eq!(open_cache(&config).unwrap().name(), "sqlite");
        assert_eq!(clear_all_caches(&config).unwrap(), 0);
    }

    #[tokio::test]
    async fn inspect_lists_units_without_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(
            &path,
            r#"{"body":[
                {"type":"paragraph","style":"Normal","runs":[{"text":"Hello"}]},
                {"type":"paragraph","style":"Heading 1","runs":[{"text":"Title"}]}
            ]}"#,
        )
        .unwrap();

        let config = TranslationConfig::default();
        let units = inspect(path.to_str().unwrap(), &config).await.unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].source_text, "Hello");
    }

    #[test]
    fn inspect_missing_file_is_fatal() {
        let config = TranslationConfig::default();
        let err = tokio_test::block_on(inspect("/nonexistent/doc.json", &config)).unwrap_err();
        assert!(matches!(err, DocTransError::FileNotFound { .. }));
    }
}
