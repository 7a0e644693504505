//! Integration tests for the translation pipeline.
//!
//! Every test runs against scripted in-process services, so no API key or
//! network access is needed:
//!
//!   cargo test --test pipeline

use async_trait::async_trait;
use edgequake_doctrans::document::{Block, Cell, Paragraph, Table};
use edgequake_doctrans::{
    run, BlockId, BlockView, CacheEntry, CacheError, CacheKey, ConcurrencyMode, DocTransError,
    Dispatcher, Document, DocumentAccess, DocumentError, MemoryCache, NoCache, OutcomeStatus,
    RunFormat, SqliteCache, StyleFilter, TokenUsage, TranslatableUnit, TranslatedText,
    TranslationCache, TranslationConfig, TranslationProgressCallback, TranslationService,
    TranslationServiceError, UnitError,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Tags each text with the target language after a text-dependent delay,
/// so bounded runs complete out of order.
struct Tagger {
    calls: AtomicUsize,
    fail_on: HashSet<String>,
}

impl Tagger {
    fn new() -> Arc<Self> {
        Self::failing_on(&[])
    }

    fn failing_on(texts: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_on: texts.iter().map(|t| t.to_string()).collect(),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationService for Tagger {
    async fn translate(
        &self,
        text: &str,
        target_language: &str,
        _model: &str,
    ) -> Result<String, TranslationServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Longer texts finish first.
        let delay = 40u64.saturating_sub(text.len() as u64 * 3);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        if self.fail_on.contains(text) {
            return Err(TranslationServiceError::Permanent("rejected".into()));
        }
        Ok(format!("{text} [{target_language}]"))
    }
}

fn tagged(text: &str, lang: &str) -> String {
    format!("{text} [{lang}]")
}

fn config(lang: &str, mode: ConcurrencyMode) -> TranslationConfig {
    TranslationConfig::builder()
        .target_language(lang)
        .model("test-model")
        .concurrency(mode)
        .build()
        .unwrap()
}

fn para(style: &str, text: &str) -> Block {
    Block::Paragraph(Paragraph::new(style, text))
}

fn texts(doc: &Document) -> Vec<String> {
    doc.paragraphs().map(|p| p.text()).collect()
}

fn styles(doc: &Document) -> Vec<String> {
    doc.paragraphs().map(|p| p.style.clone()).collect()
}

fn units(source: &[&str]) -> Vec<TranslatableUnit> {
    source
        .iter()
        .enumerate()
        .map(|(i, t)| TranslatableUnit {
            id: i + 1,
            style_name: "Normal".into(),
            source_text: t.to_string(),
            block: BlockId(i as u64),
        })
        .collect()
}

fn memory() -> Arc<dyn TranslationCache> {
    Arc::new(MemoryCache::new())
}

// ── Ordering ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_outcomes_follow_input_order_in_both_modes() {
    let source = ["a", "bb bb", "ccc ccc ccc", "d", "eeee eeee eeee eeee", "f f"];
    for mode in [ConcurrencyMode::Sequential, ConcurrencyMode::Bounded(4)] {
        let service = Tagger::new();
        let dispatcher = Dispatcher::new(service.clone(), memory());
        let outcomes = dispatcher
            .translate_units(&units(&source), "French", "test-model", mode)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), source.len(), "{mode:?}");
        for (i, (outcome, text)) in outcomes.iter().zip(source).enumerate() {
            assert_eq!(outcome.unit_id, i + 1, "{mode:?}");
            assert_eq!(outcome.status, OutcomeStatus::Success);
            assert_eq!(outcome.text(), Some(tagged(text, "French").as_str()));
        }
        assert_eq!(service.calls(), source.len());
    }
}

#[tokio::test]
async fn test_bounded_mode_inserts_in_document_order() {
    let mut doc = Document::new(vec![
        para("Normal", "first"),
        para("Normal", "the second paragraph is longer"),
        para("Normal", "3rd"),
    ]);
    let service = Tagger::new();
    let report = run(
        &mut doc,
        &config("German", ConcurrencyMode::Bounded(3)),
        service,
        memory(),
    )
    .await
    .unwrap();

    assert_eq!(report.inserted, 3);
    assert_eq!(
        texts(&doc),
        vec![
            "first".to_string(),
            tagged("first", "German"),
            "the second paragraph is longer".to_string(),
            tagged("the second paragraph is longer", "German"),
            "3rd".to_string(),
            tagged("3rd", "German"),
        ]
    );
}

/// Records call order and the peak number of overlapping calls.
#[derive(Default)]
struct Recorder {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl TranslationService for Recorder {
    async fn translate(
        &self,
        text: &str,
        _target_language: &str,
        _model: &str,
    ) -> Result<String, TranslationServiceError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.seen.lock().push(text.to_string());
        tokio::time::sleep(Duration::from_millis(5 + (text.len() as u64 % 4) * 5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(text.to_uppercase())
    }
}

#[tokio::test]
async fn test_bounded_mode_never_exceeds_limit() {
    let source: Vec<String> = (0..12).map(|i| format!("text number {i}")).collect();
    let refs: Vec<&str> = source.iter().map(String::as_str).collect();
    let service = Arc::new(Recorder::default());
    let dispatcher = Dispatcher::new(service.clone(), memory());

    let outcomes = dispatcher
        .translate_units(&units(&refs), "French", "m", ConcurrencyMode::Bounded(3))
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 12);
    let peak = service.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak in-flight calls was {peak}");
    assert!(peak > 1, "bounded mode ran strictly one at a time");
}

#[tokio::test]
async fn test_sequential_mode_calls_in_unit_order() {
    let source = ["zeta", "a", "mid length", "b", "the longest text of all"];
    let service = Arc::new(Recorder::default());
    let dispatcher = Dispatcher::new(service.clone(), memory());

    dispatcher
        .translate_units(&units(&source), "French", "m", ConcurrencyMode::Sequential)
        .await
        .unwrap();

    assert_eq!(service.peak.load(Ordering::SeqCst), 1);
    assert_eq!(*service.seen.lock(), source.map(String::from).to_vec());
}

// ── Deduplication and caching ────────────────────────────────────────────────

#[tokio::test]
async fn test_repeated_text_is_translated_once() {
    let mut doc = Document::new(vec![
        para("Normal", "Hello"),
        para("Normal", "Hello"),
        para("Normal", "Hello"),
    ]);
    let service = Tagger::new();
    let report = run(
        &mut doc,
        &config("Spanish", ConcurrencyMode::Bounded(3)),
        service.clone(),
        memory(),
    )
    .await
    .unwrap();

    assert_eq!(service.calls(), 1);
    assert_eq!(report.remote_calls, 1);
    assert_eq!(report.inserted, 3);
    assert_eq!(doc.paragraph_count(), 6);
}

#[tokio::test]
async fn test_style_filter_scenario_and_rerun() {
    let mut doc = Document::new(vec![
        para("Normal", "Hello"),
        para("Heading 1", "Title"),
        para("Normal", "World"),
    ]);
    let cache = memory();
    let cfg = config("Spanish", ConcurrencyMode::Bounded(5));

    let service = Tagger::new();
    let report = run(&mut doc, &cfg, service.clone(), Arc::clone(&cache))
        .await
        .unwrap();

    assert_eq!(report.total_units, 2);
    assert_eq!(service.calls(), 2);
    assert_eq!(report.inserted, 2);
    assert_eq!(
        texts(&doc),
        vec![
            "Hello".to_string(),
            tagged("Hello", "Spanish"),
            "Title".to_string(),
            "World".to_string(),
            tagged("World", "Spanish"),
        ]
    );
    assert_eq!(
        styles(&doc),
        vec!["Normal", "Normal", "Heading 1", "Normal", "Normal"]
    );

    // The inserted paragraphs are Normal too, so a second run picks them up.
    let service = Tagger::new();
    let report = run(&mut doc, &cfg, service.clone(), cache).await.unwrap();

    assert_eq!(report.total_units, 4);
    assert_eq!(report.cached, 2);
    assert_eq!(report.translated, 2);
    assert_eq!(service.calls(), 2);
    assert_eq!(report.inserted, 4);
    assert_eq!(doc.paragraph_count(), 9);
}

#[tokio::test]
async fn test_invalidate_forces_fresh_calls_for_that_language_only() {
    let cache = memory();
    let es = config("Spanish", ConcurrencyMode::Sequential);
    let fr = config("French", ConcurrencyMode::Sequential);

    for cfg in [&es, &fr] {
        let mut doc = Document::new(vec![para("Normal", "Hello")]);
        run(&mut doc, cfg, Tagger::new(), Arc::clone(&cache))
            .await
            .unwrap();
    }
    assert_eq!(cache.len(), 2);

    assert_eq!(cache.invalidate("spanish").unwrap(), 1);

    let service = Tagger::new();
    let mut doc = Document::new(vec![para("Normal", "Hello")]);
    run(&mut doc, &es, service.clone(), Arc::clone(&cache))
        .await
        .unwrap();
    assert_eq!(service.calls(), 1);

    let service = Tagger::new();
    let mut doc = Document::new(vec![para("Normal", "Hello")]);
    let report = run(&mut doc, &fr, service.clone(), cache).await.unwrap();
    assert_eq!(service.calls(), 0);
    assert_eq!(report.cached, 1);
}

#[tokio::test]
async fn test_clear_cache_first_in_config() {
    let cache = memory();
    let mut doc = Document::new(vec![para("Normal", "Hello")]);
    run(
        &mut doc,
        &config("Spanish", ConcurrencyMode::Sequential),
        Tagger::new(),
        Arc::clone(&cache),
    )
    .await
    .unwrap();

    let cfg = TranslationConfig::builder()
        .target_language("Spanish")
        .model("test-model")
        .clear_cache_first(true)
        .build()
        .unwrap();
    let service = Tagger::new();
    let mut doc = Document::new(vec![para("Normal", "Hello")]);
    let report = run(&mut doc, &cfg, service.clone(), cache).await.unwrap();

    assert_eq!(service.calls(), 1);
    assert_eq!(report.cached, 0);
}

#[tokio::test]
async fn test_sqlite_cache_persists_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.sqlite3");
    let cfg = config("Italian", ConcurrencyMode::Bounded(2));

    {
        let cache: Arc<dyn TranslationCache> = Arc::new(SqliteCache::open(&path).unwrap());
        let mut doc = Document::new(vec![para("Normal", "one"), para("Normal", "two")]);
        run(&mut doc, &cfg, Tagger::new(), cache).await.unwrap();
    }

    let cache = SqliteCache::open(&path).unwrap();
    let key = CacheKey::compute("one", "Italian", "test-model");
    let entry = cache.get(&key).unwrap().expect("entry survives reopen");
    assert_eq!(entry.translated_text, tagged("one", "Italian"));

    let service = Tagger::new();
    let mut doc = Document::new(vec![para("Normal", "one"), para("Normal", "two")]);
    let report = run(&mut doc, &cfg, service.clone(), Arc::new(cache))
        .await
        .unwrap();
    assert_eq!(service.calls(), 0);
    assert_eq!(report.cached, 2);
    assert_eq!(report.inserted, 2);
}

/// A cache whose reads always fail.
#[derive(Default)]
struct CorruptReads {
    stored: AtomicUsize,
}

impl TranslationCache for CorruptReads {
    fn get(&self, _key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        Err(CacheError::Corrupt("bad page".into()))
    }
    fn put(
        &self,
        _key: &CacheKey,
        _target_language: &str,
        _model: &str,
        _translated_text: &str,
        _completion_tokens: Option<u64>,
    ) -> Result<(), CacheError> {
        self.stored.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    fn invalidate(&self, _target_language: &str) -> Result<usize, CacheError> {
        Ok(0)
    }
    fn clear_all(&self) -> Result<usize, CacheError> {
        Ok(0)
    }
    fn len(&self) -> usize {
        0
    }
    fn name(&self) -> &str {
        "corrupt"
    }
}

#[tokio::test]
async fn test_unreadable_cache_entry_is_a_miss() {
    let cache = Arc::new(CorruptReads::default());
    let service = Tagger::new();
    let mut doc = Document::new(vec![para("Normal", "Hello")]);
    let report = run(
        &mut doc,
        &config("Spanish", ConcurrencyMode::Sequential),
        service.clone(),
        cache.clone(),
    )
    .await
    .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.translated, 1);
    assert_eq!(service.calls(), 1);
    assert_eq!(cache.stored.load(Ordering::SeqCst), 1);
    assert_eq!(texts(&doc)[1], tagged("Hello", "Spanish"));
}

#[tokio::test]
async fn test_runs_without_cache() {
    let mut doc = Document::new(vec![para("Normal", "x"), para("Normal", "y")]);
    let service = Tagger::new();
    let report = run(
        &mut doc,
        &config("Dutch", ConcurrencyMode::Bounded(2)),
        service.clone(),
        Arc::new(NoCache),
    )
    .await
    .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.cached, 0);
    assert_eq!(service.calls(), 2);
}

// ── Failure isolation ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_one_failed_unit_does_not_stop_the_rest() {
    let mut doc = Document::new(vec![
        para("Normal", "alpha"),
        para("Normal", "boom"),
        para("Normal", "gamma"),
        para("Normal", "delta"),
    ]);
    let cache = memory();
    let service = Tagger::failing_on(&["boom"]);
    let report = run(
        &mut doc,
        &config("Spanish", ConcurrencyMode::Bounded(4)),
        service,
        Arc::clone(&cache),
    )
    .await
    .unwrap();

    assert_eq!(report.total_units, 4);
    assert_eq!(report.inserted, 3);
    assert_eq!(report.failed, 1);
    assert!(!report.is_complete());
    assert!(matches!(
        report.failures.as_slice(),
        [UnitError::Permanent { unit: 2, .. }]
    ));
    assert!(report.retryable_units().is_empty());
    // "boom" is followed directly by the next source paragraph.
    assert_eq!(texts(&doc)[2], "boom");
    assert_eq!(texts(&doc)[3], "gamma");
    // Failures are never cached.
    assert_eq!(cache.len(), 3);

    let err = report.into_result().unwrap_err();
    assert!(matches!(
        err,
        DocTransError::PartialFailure {
            failed: 1,
            total: 4
        }
    ));
}

#[tokio::test]
async fn test_unreadable_document_makes_no_calls() {
    struct Broken;

    impl DocumentAccess for Broken {
        fn blocks(&self) -> Result<Box<dyn Iterator<Item = BlockView> + '_>, DocumentError> {
            Err(DocumentError::Unreadable("truncated archive".into()))
        }
        fn block(&self, id: BlockId) -> Result<BlockView, DocumentError> {
            Err(DocumentError::StaleBlock { id })
        }
        fn insert_after(
            &mut self,
            anchor: BlockId,
            _style_name: &str,
            _text: &str,
            _format: &RunFormat,
        ) -> Result<BlockId, DocumentError> {
            Err(DocumentError::StaleBlock { id: anchor })
        }
    }

    let service = Tagger::new();
    let err = run(
        &mut Broken,
        &config("Spanish", ConcurrencyMode::Sequential),
        service.clone(),
        memory(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, DocTransError::DocumentUnreadable { .. }));
    assert_eq!(service.calls(), 0);
}

// ── Configuration edge cases ─────────────────────────────────────────────────

#[tokio::test]
async fn test_zero_bound_is_rejected() {
    let dispatcher = Dispatcher::new(Tagger::new(), memory());
    let err = dispatcher
        .translate_units(&units(&["a"]), "Spanish", "m", ConcurrencyMode::Bounded(0))
        .await
        .unwrap_err();
    assert!(matches!(err, DocTransError::InvalidConfig(_)));
}

#[tokio::test]
async fn test_empty_document_is_a_no_op() {
    let mut doc = Document::new(vec![para("Heading 1", "Only a title")]);
    let service = Tagger::new();
    let report = run(
        &mut doc,
        &config("Spanish", ConcurrencyMode::Bounded(2)),
        service.clone(),
        memory(),
    )
    .await
    .unwrap();

    assert_eq!(report.total_units, 0);
    assert_eq!(report.inserted, 0);
    assert_eq!(service.calls(), 0);
    assert_eq!(doc.paragraph_count(), 1);
}

#[tokio::test]
async fn test_all_styles_includes_table_cells() {
    let mut doc = Document::new(vec![
        para("Title", "Report"),
        Block::Table(Table {
            rows: vec![vec![Cell {
                paragraphs: vec![Paragraph::new("Table Text", "cell")],
            }]],
        }),
    ]);
    let cfg = TranslationConfig::builder()
        .target_language("Spanish")
        .model("test-model")
        .style_filter(StyleFilter::All)
        .build()
        .unwrap();

    let report = run(&mut doc, &cfg, Tagger::new(), memory()).await.unwrap();

    assert_eq!(report.inserted, 2);
    match &doc.body[2] {
        Block::Table(t) => {
            let cell: Vec<String> = t.rows[0][0].paragraphs.iter().map(|p| p.text()).collect();
            assert_eq!(cell, vec!["cell".to_string(), tagged("cell", "Spanish")]);
        }
        other => panic!("expected table, got {other:?}"),
    }
}

// ── Cancellation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_cancelled_run_issues_no_calls() {
    let token = CancellationToken::new();
    token.cancel();
    let cfg = TranslationConfig::builder()
        .target_language("Spanish")
        .model("test-model")
        .cancellation(token)
        .build()
        .unwrap();

    let mut doc = Document::new(vec![para("Normal", "a"), para("Normal", "b")]);
    let service = Tagger::new();
    let report = run(&mut doc, &cfg, service.clone(), memory()).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(service.calls(), 0);
    assert_eq!(report.inserted, 0);
    assert_eq!(report.failed, 2);
    assert_eq!(report.retryable_units(), vec![1, 2]);
    assert_eq!(doc.paragraph_count(), 2);
}

/// Cancels the run from inside the call for `trigger`, after answering it.
struct CancelOn {
    trigger: &'static str,
    token: CancellationToken,
    calls: AtomicUsize,
}

#[async_trait]
impl TranslationService for CancelOn {
    async fn translate(
        &self,
        text: &str,
        target_language: &str,
        _model: &str,
    ) -> Result<String, TranslationServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text == self.trigger {
            self.token.cancel();
        }
        Ok(tagged(text, target_language))
    }
}

#[tokio::test]
async fn test_cancel_mid_run_keeps_obtained_translations() {
    let token = CancellationToken::new();
    let service = Arc::new(CancelOn {
        trigger: "second",
        token: token.clone(),
        calls: AtomicUsize::new(0),
    });
    let cfg = TranslationConfig::builder()
        .target_language("Spanish")
        .model("test-model")
        .concurrency(ConcurrencyMode::Sequential)
        .cancellation(token)
        .build()
        .unwrap();

    let mut doc = Document::new(vec![
        para("Normal", "first"),
        para("Normal", "second"),
        para("Normal", "third"),
        para("Normal", "fourth"),
    ]);
    let report = run(&mut doc, &cfg, service.clone(), memory()).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.translated, 2);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.retryable_units(), vec![3, 4]);
    assert_eq!(
        texts(&doc),
        vec![
            "first".to_string(),
            tagged("first", "Spanish"),
            "second".to_string(),
            tagged("second", "Spanish"),
            "third".to_string(),
            "fourth".to_string(),
        ]
    );
}

// ── Output cleanup ───────────────────────────────────────────────────────────

struct Fixed(&'static str);

#[async_trait]
impl TranslationService for Fixed {
    async fn translate(
        &self,
        _text: &str,
        _target_language: &str,
        _model: &str,
    ) -> Result<String, TranslationServiceError> {
        Ok(self.0.to_string())
    }
}

#[tokio::test]
async fn test_translated_label_survives_cleanup() {
    let translation = "Translation: the process of rendering text in another language.";
    let dispatcher = Dispatcher::new(Arc::new(Fixed(translation)), memory());
    let outcomes = dispatcher
        .translate_units(
            &units(&["Traducción: el proceso de verter un texto a otra lengua."]),
            "English",
            "m",
            ConcurrencyMode::Sequential,
        )
        .await
        .unwrap();

    assert_eq!(outcomes[0].text(), Some(translation));
}

// ── Token accounting ─────────────────────────────────────────────────────────

/// Reports 10 prompt and 5 completion tokens per call.
struct Metered;

#[async_trait]
impl TranslationService for Metered {
    async fn translate(
        &self,
        text: &str,
        target_language: &str,
        _model: &str,
    ) -> Result<String, TranslationServiceError> {
        Ok(tagged(text, target_language))
    }

    async fn translate_with_usage(
        &self,
        text: &str,
        target_language: &str,
        model: &str,
    ) -> Result<TranslatedText, TranslationServiceError> {
        Ok(TranslatedText {
            text: self.translate(text, target_language, model).await?,
            usage: Some(TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
            }),
        })
    }
}

#[tokio::test]
async fn test_tokens_split_between_api_and_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.sqlite3");
    let cfg = config("Spanish", ConcurrencyMode::Bounded(2));
    let fresh = || Document::new(vec![para("Normal", "one"), para("Normal", "two")]);

    let cache: Arc<dyn TranslationCache> = Arc::new(SqliteCache::open(&path).unwrap());
    let report = run(&mut fresh(), &cfg, Arc::new(Metered), Arc::clone(&cache))
        .await
        .unwrap();
    assert_eq!(
        report.api_tokens,
        TokenUsage {
            prompt_tokens: 20,
            completion_tokens: 10,
        }
    );
    assert_eq!(report.cached_tokens, 0);

    let report = run(&mut fresh(), &cfg, Arc::new(Metered), cache)
        .await
        .unwrap();
    assert_eq!(report.api_tokens, TokenUsage::default());
    assert_eq!(report.cached_tokens, 10);
    assert_eq!(report.cached, 2);
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Counting {
    started: AtomicUsize,
    completed: AtomicUsize,
    errors: AtomicUsize,
    finished_with: AtomicUsize,
}

impl TranslationProgressCallback for Counting {
    fn on_unit_start(&self, _unit_id: usize, _total: usize) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_unit_complete(&self, _unit_id: usize, _total: usize, _status: OutcomeStatus) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_unit_error(&self, _unit_id: usize, _total: usize, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
    fn on_run_complete(&self, _total: usize, success_count: usize) {
        self.finished_with.store(success_count, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_progress_events_cover_every_unit() {
    let progress = Arc::new(Counting::default());
    let cfg = TranslationConfig::builder()
        .target_language("Spanish")
        .model("test-model")
        .progress_callback(progress.clone())
        .build()
        .unwrap();

    let mut doc = Document::new(vec![
        para("Normal", "one"),
        para("Normal", "boom"),
        para("Normal", "three"),
    ]);
    run(&mut doc, &cfg, Tagger::failing_on(&["boom"]), memory())
        .await
        .unwrap();

    assert_eq!(progress.started.load(Ordering::SeqCst), 3);
    assert_eq!(progress.completed.load(Ordering::SeqCst), 2);
    assert_eq!(progress.errors.load(Ordering::SeqCst), 1);
    assert_eq!(progress.finished_with.load(Ordering::SeqCst), 2);
}
