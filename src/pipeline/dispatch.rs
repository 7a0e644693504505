//! Dispatch: resolve every unit against the cache, translate the misses
//! under a concurrency bound, and hand back one outcome per unit in unit
//! order.
//!
//! ## Flow
//!
//! 1. **Plan** (synchronous). Compute each unit's [`CacheKey`] and look it
//!    up. Hits become `CachedHit` outcomes immediately. Misses are grouped by
//!    key in first-occurrence order, so a text that appears five times costs
//!    one remote call.
//! 2. **Translate**. Each group is one remote call. `Bounded(n)` keeps at
//!    most `n` calls in flight via `buffer_unordered`; `Sequential` awaits
//!    them one by one in unit order. A successful, non-empty translation is
//!    stored in the cache before its outcomes are emitted.
//! 3. **Reassemble**. Outcomes arrive in completion order and are slotted
//!    back by input position.
//!
//! Failures are isolated: a failed group yields `Failed` outcomes for its
//! members and nothing else is affected. No retries happen here; that is the
//! translation service's business.

use crate::cache::{CacheKey, TranslationCache};
use crate::config::ConcurrencyMode;
use crate::error::{DocTransError, UnitError};
use crate::output::{OutcomeStatus, TokenUsage, TranslationOutcome};
use crate::pipeline::extract::TranslatableUnit;
use crate::pipeline::postprocess;
use crate::progress::ProgressCallback;
use crate::service::TranslationService;
use futures::stream::{self, Stream, StreamExt};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcomes tagged with the position of their unit in the input slice.
pub(crate) type PositionedStream =
    Pin<Box<dyn Stream<Item = (usize, TranslationOutcome)> + Send>>;

/// Result of one dispatch.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// One outcome per input unit, in input order.
    pub outcomes: Vec<TranslationOutcome>,
    /// Remote calls actually issued.
    pub remote_calls: usize,
    /// Whether cancellation prevented at least one remote call.
    pub cancelled: bool,
    /// Tokens reported for the remote calls.
    pub api_tokens: TokenUsage,
    /// Completion tokens recorded with the cache hits.
    pub cached_tokens: u64,
}

/// Resolves units to translations. Cheap to clone; holds only `Arc`s.
#[derive(Clone)]
pub struct Dispatcher {
    service: Arc<dyn TranslationService>,
    cache: Arc<dyn TranslationCache>,
    progress: Option<ProgressCallback>,
    cancellation: Option<CancellationToken>,
}

impl Dispatcher {
    pub fn new(service: Arc<dyn TranslationService>, cache: Arc<dyn TranslationCache>) -> Self {
        Self {
            service,
            cache,
            progress: None,
            cancellation: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, token: Option<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// Translate `units`, returning exactly one outcome per unit in input order.
    pub async fn translate_units(
        &self,
        units: &[TranslatableUnit],
        target_language: &str,
        model: &str,
        mode: ConcurrencyMode,
    ) -> Result<Vec<TranslationOutcome>, DocTransError> {
        Ok(self
            .dispatch(units, target_language, model, mode)
            .await?
            .outcomes)
    }

    /// Like [`translate_units`](Self::translate_units), with call statistics.
    ///
    /// Errors only on invalid configuration (`Bounded(0)`).
    pub async fn dispatch(
        &self,
        units: &[TranslatableUnit],
        target_language: &str,
        model: &str,
        mode: ConcurrencyMode,
    ) -> Result<DispatchReport, DocTransError> {
        mode.validate()?;
        if units.is_empty() {
            return Ok(DispatchReport::default());
        }

        if let Some(cb) = &self.progress {
            cb.on_run_start(units.len());
        }

        let (mut stream, ctx) = self.positioned_stream(units, target_language, model, mode)?;

        let mut slots: Vec<Option<TranslationOutcome>> = vec![None; units.len()];
        while let Some((pos, outcome)) = stream.next().await {
            slots[pos] = Some(outcome);
        }

        // Every position is filled by the stream; the fallback keeps the
        // one-outcome-per-unit contract even if that ever stops being true.
        let outcomes: Vec<TranslationOutcome> = slots
            .into_iter()
            .zip(units)
            .map(|(slot, unit)| {
                slot.unwrap_or_else(|| {
                    TranslationOutcome::failed(UnitError::Cancelled { unit: unit.id })
                })
            })
            .collect();

        let cancelled = outcomes
            .iter()
            .any(|o| matches!(o.error, Some(UnitError::Cancelled { .. })));
        let succeeded = outcomes
            .iter()
            .filter(|o| o.status != OutcomeStatus::Failed)
            .count();

        if let Some(cb) = &self.progress {
            cb.on_run_complete(units.len(), succeeded);
        }

        Ok(DispatchReport {
            outcomes,
            remote_calls: ctx.remote_calls.load(Ordering::SeqCst),
            cancelled,
            api_tokens: ctx.api_tokens(),
            cached_tokens: ctx.cached_tokens.load(Ordering::SeqCst),
        })
    }

    /// Plan the run and build the completion-order stream.
    pub(crate) fn positioned_stream(
        &self,
        units: &[TranslatableUnit],
        target_language: &str,
        model: &str,
        mode: ConcurrencyMode,
    ) -> Result<(PositionedStream, Arc<DispatchContext>), DocTransError> {
        mode.validate()?;

        let ctx = Arc::new(DispatchContext {
            service: Arc::clone(&self.service),
            cache: Arc::clone(&self.cache),
            progress: self.progress.clone(),
            cancellation: self.cancellation.clone(),
            target_language: target_language.to_string(),
            model: model.to_string(),
            total: units.len(),
            remote_calls: AtomicUsize::new(0),
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
            cached_tokens: AtomicU64::new(0),
        });

        let (hits, groups) = ctx.plan(units);
        info!(
            "Dispatching {} units: {} cached, {} unique texts to translate ({:?})",
            units.len(),
            hits.len(),
            groups.len(),
            mode
        );

        let worker_ctx = Arc::clone(&ctx);
        let remote: Pin<Box<dyn Stream<Item = Vec<(usize, TranslationOutcome)>> + Send>> =
            match mode {
                ConcurrencyMode::Sequential => Box::pin(
                    stream::iter(groups).then(move |g| run_group(Arc::clone(&worker_ctx), g)),
                ),
                ConcurrencyMode::Bounded(_) => Box::pin(
                    stream::iter(groups)
                        .map(move |g| run_group(Arc::clone(&worker_ctx), g))
                        .buffer_unordered(mode.limit()),
                ),
            };

        let s = stream::iter(hits).chain(remote.flat_map(stream::iter));
        Ok((Box::pin(s), ctx))
    }
}

/// Units that share one cache key and therefore one remote call.
struct MissGroup {
    key: CacheKey,
    text: String,
    /// `(position in input, unit id)`
    members: Vec<(usize, usize)>,
}

pub(crate) struct DispatchContext {
    service: Arc<dyn TranslationService>,
    cache: Arc<dyn TranslationCache>,
    progress: Option<ProgressCallback>,
    cancellation: Option<CancellationToken>,
    target_language: String,
    model: String,
    total: usize,
    pub(crate) remote_calls: AtomicUsize,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    cached_tokens: AtomicU64,
}

impl DispatchContext {
    fn plan(&self, units: &[TranslatableUnit]) -> (Vec<(usize, TranslationOutcome)>, Vec<MissGroup>) {
        let mut hits = Vec::new();
        let mut groups: Vec<MissGroup> = Vec::new();
        let mut by_key: HashMap<CacheKey, usize> = HashMap::new();

        for (pos, unit) in units.iter().enumerate() {
            let key = CacheKey::compute(&unit.source_text, &self.target_language, &self.model);

            match self.cache.get(&key) {
                Ok(Some(entry)) => {
                    debug!("Unit {}: cache hit", unit.id);
                    if let Some(n) = entry.completion_tokens {
                        self.cached_tokens.fetch_add(n, Ordering::SeqCst);
                    }
                    self.complete(unit.id, OutcomeStatus::CachedHit);
                    hits.push((pos, TranslationOutcome::cached(unit.id, entry.translated_text)));
                    continue;
                }
                Ok(None) => {}
                Err(e) => warn!("Unit {}: cache lookup failed, treating as miss: {}", unit.id, e),
            }

            match by_key.entry(key) {
                Entry::Occupied(slot) => groups[*slot.get()].members.push((pos, unit.id)),
                Entry::Vacant(slot) => {
                    slot.insert(groups.len());
                    groups.push(MissGroup {
                        key,
                        text: unit.source_text.clone(),
                        members: vec![(pos, unit.id)],
                    });
                }
            }
        }

        (hits, groups)
    }

    fn api_tokens(&self) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens.load(Ordering::SeqCst),
            completion_tokens: self.completion_tokens.load(Ordering::SeqCst),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    fn complete(&self, unit_id: usize, status: OutcomeStatus) {
        if let Some(cb) = &self.progress {
            cb.on_unit_complete(unit_id, self.total, status);
        }
    }

    fn fail(&self, error: UnitError) -> TranslationOutcome {
        if let Some(cb) = &self.progress {
            cb.on_unit_error(error.unit(), self.total, &error.to_string());
        }
        TranslationOutcome::failed(error)
    }
}

/// One remote call serving every member of `group`.
async fn run_group(ctx: Arc<DispatchContext>, group: MissGroup) -> Vec<(usize, TranslationOutcome)> {
    if ctx.is_cancelled() {
        debug!("Cancelled before dispatching {} unit(s)", group.members.len());
        return group
            .members
            .iter()
            .map(|&(pos, id)| (pos, ctx.fail(UnitError::Cancelled { unit: id })))
            .collect();
    }

    if let Some(cb) = &ctx.progress {
        for &(_, id) in &group.members {
            cb.on_unit_start(id, ctx.total);
        }
    }

    ctx.remote_calls.fetch_add(1, Ordering::SeqCst);
    let result = ctx
        .service
        .translate_with_usage(&group.text, &ctx.target_language, &ctx.model)
        .await;

    match result {
        Ok(raw) => {
            if let Some(usage) = raw.usage {
                ctx.prompt_tokens
                    .fetch_add(usage.prompt_tokens, Ordering::SeqCst);
                ctx.completion_tokens
                    .fetch_add(usage.completion_tokens, Ordering::SeqCst);
            }
            let text = postprocess::clean_translation(&group.text, &raw.text);
            if text.is_empty() {
                warn!("Empty translation for unit(s) {:?}", unit_ids(&group));
                return group
                    .members
                    .iter()
                    .map(|&(pos, id)| (pos, ctx.fail(UnitError::EmptyResult { unit: id })))
                    .collect();
            }

            if let Err(e) = ctx
                .cache
                .put(
                    &group.key,
                    &ctx.target_language,
                    &ctx.model,
                    &text,
                    raw.usage.map(|u| u.completion_tokens),
                )
            {
                warn!("Could not cache translation of unit(s) {:?}: {}", unit_ids(&group), e);
            }

            group
                .members
                .iter()
                .map(|&(pos, id)| {
                    ctx.complete(id, OutcomeStatus::Success);
                    (pos, TranslationOutcome::success(id, text.clone()))
                })
                .collect()
        }
        Err(e) => {
            warn!("Translation failed for unit(s) {:?}: {}", unit_ids(&group), e);
            group
                .members
                .iter()
                .map(|&(pos, id)| (pos, ctx.fail(UnitError::from_service(id, &e))))
                .collect()
        }
    }
}

fn unit_ids(group: &MissGroup) -> Vec<usize> {
    group.members.iter().map(|&(_, id)| id).collect()
}
