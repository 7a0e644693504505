//! Mutation: write each resolved translation into the document right after
//! its source block.
//!
//! The new block takes the source block's style name and the formatting of
//! its first run (or the configured default when the source has no runs).
//! Source blocks are never modified or removed.
//!
//! Insertion points are the [`BlockId`](crate::document::BlockId) handles
//! captured at extraction time, so earlier insertions never shift later
//! targets.
//!
//! **Not idempotent.** Translations are inserted with the source style, so
//! running the pipeline again over its own output extracts the original
//! blocks *and* the inserted ones and appends another round of translations.
//! Callers who re-run over a translated document must narrow the style
//! filter themselves.

use crate::document::{DocumentAccess, RunFormat};
use crate::error::UnitError;
use crate::output::{MutationSummary, OutcomeStatus, TranslationOutcome};
use crate::pipeline::extract::TranslatableUnit;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Apply `outcomes` to `doc`.
///
/// Outcomes are matched to units by `unit_id` and processed in the order
/// given. Each failed insertion is recorded and the remaining ones proceed.
pub fn apply<D: DocumentAccess + ?Sized>(
    doc: &mut D,
    units: &[TranslatableUnit],
    outcomes: &[TranslationOutcome],
    default_format: &RunFormat,
) -> MutationSummary {
    let by_id: HashMap<usize, &TranslatableUnit> = units.iter().map(|u| (u.id, u)).collect();
    let mut summary = MutationSummary::default();

    for outcome in outcomes {
        let text = match (outcome.status, outcome.text()) {
            (OutcomeStatus::Failed, _) | (_, None) => {
                summary.skipped += 1;
                continue;
            }
            (_, Some(text)) => text,
        };

        let Some(unit) = by_id.get(&outcome.unit_id) else {
            record(&mut summary, outcome.unit_id, "no unit with this id".to_string());
            continue;
        };

        let format = match doc.block(unit.block) {
            Ok(view) => view.first_run.unwrap_or_else(|| default_format.clone()),
            Err(e) => {
                record(&mut summary, unit.id, e.to_string());
                continue;
            }
        };

        match doc.insert_after(unit.block, &unit.style_name, text, &format) {
            Ok(new_id) => {
                debug!("Unit {}: inserted {} after {}", unit.id, new_id, unit.block);
                summary.inserted += 1;
            }
            Err(e) => record(&mut summary, unit.id, e.to_string()),
        }
    }

    summary
}

fn record(summary: &mut MutationSummary, unit: usize, detail: String) {
    warn!("Unit {}: insertion failed: {}", unit, detail);
    summary.failed += 1;
    summary.errors.push(UnitError::Mutation { unit, detail });
}
