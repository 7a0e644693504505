//! Streaming translation API: emit outcomes as they complete.
//!
//! Unlike [`crate::translate::run`], which returns after the document has
//! been mutated, [`translate_stream`] yields [`TranslationOutcome`] items as
//! each unit resolves: cache hits first, then remote results in completion
//! order. In bounded mode units may arrive out of order (sort by `unit_id`
//! if order matters). The document is only read, never modified.
//!
//! Every translation obtained this way is cached, so a later
//! [`crate::translate::run`] on the same document inserts them without
//! further remote calls.

use crate::cache::TranslationCache;
use crate::config::TranslationConfig;
use crate::document::DocumentAccess;
use crate::error::DocTransError;
use crate::output::{OutcomeStatus, TranslationOutcome};
use crate::pipeline::dispatch::Dispatcher;
use crate::pipeline::extract::{extract_units, TranslatableUnit};
use crate::service::TranslationService;
use futures::future;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-unit outcomes.
pub type OutcomeStream = Pin<Box<dyn Stream<Item = TranslationOutcome> + Send>>;

/// Extract the units of `doc` and stream their outcomes as they are ready.
///
/// # Returns
/// - `Ok((units, stream))`: the extracted units (for lookup by `unit_id`)
///   and a stream yielding exactly one outcome per unit.
/// - `Err(DocTransError)`: the document is unreadable or the config invalid.
pub fn translate_stream<D: DocumentAccess + ?Sized>(
    doc: &D,
    config: &TranslationConfig,
    service: Arc<dyn TranslationService>,
    cache: Arc<dyn TranslationCache>,
) -> Result<(Vec<TranslatableUnit>, OutcomeStream), DocTransError> {
    let units: Vec<TranslatableUnit> = extract_units(doc, &config.style_filter)?.collect();
    info!(
        "Streaming {} units into {} ({})",
        units.len(),
        config.target_language,
        config.model
    );

    config.concurrency.validate()?;
    let dispatcher = Dispatcher::new(service, cache)
        .with_progress(config.progress_callback.clone())
        .with_cancellation(config.cancellation.clone());

    // Same run-level events as `Dispatcher::dispatch`; the closing one fires
    // once the stream is drained.
    let progress = config
        .progress_callback
        .clone()
        .filter(|_| !units.is_empty());
    if let Some(cb) = &progress {
        cb.on_run_start(units.len());
    }

    let (positioned, _ctx) = dispatcher.positioned_stream(
        &units,
        &config.target_language,
        &config.model,
        config.concurrency,
    )?;

    let Some(progress) = progress else {
        let outcomes: OutcomeStream = Box::pin(positioned.map(|(_, outcome)| outcome));
        return Ok((units, outcomes));
    };

    let total = units.len();
    let succeeded = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&succeeded);
    let outcomes = positioned.map(move |(_, outcome)| {
        if outcome.status != OutcomeStatus::Failed {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        outcome
    });
    let finish = stream::once(async move {
        progress.on_run_complete(total, succeeded.load(Ordering::SeqCst));
    })
    .filter_map(|()| future::ready(None::<TranslationOutcome>));

    let outcomes: OutcomeStream = Box::pin(outcomes.chain(finish));
    Ok((units, outcomes))
}
