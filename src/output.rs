//! Result types: per-unit outcomes, the mutation summary and the run report.

use crate::error::{DocTransError, UnitError};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Tokens reported by the model provider for one or more calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.completion_tokens += rhs.completion_tokens;
    }
}

/// How a unit was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Translated by a remote call during this run.
    Success,
    /// Served from the cache; no remote call.
    CachedHit,
    /// No translation; see [`TranslationOutcome::error`].
    Failed,
}

/// Per-unit result of the dispatcher. Exactly one per submitted unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationOutcome {
    pub unit_id: usize,
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<UnitError>,
}

impl TranslationOutcome {
    pub fn success(unit_id: usize, text: impl Into<String>) -> Self {
        Self {
            unit_id,
            status: OutcomeStatus::Success,
            translated_text: Some(text.into()),
            error: None,
        }
    }

    pub fn cached(unit_id: usize, text: impl Into<String>) -> Self {
        Self {
            unit_id,
            status: OutcomeStatus::CachedHit,
            translated_text: Some(text.into()),
            error: None,
        }
    }

    pub fn failed(error: UnitError) -> Self {
        Self {
            unit_id: error.unit(),
            status: OutcomeStatus::Failed,
            translated_text: None,
            error: Some(error),
        }
    }

    /// The translation, when the unit did not fail.
    pub fn text(&self) -> Option<&str> {
        match self.status {
            OutcomeStatus::Failed => None,
            _ => self.translated_text.as_deref(),
        }
    }
}

/// What the mutator did to the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationSummary {
    /// New blocks written into the document.
    pub inserted: usize,
    /// Units with a `Failed` outcome; nothing was attempted for them.
    pub skipped: usize,
    /// Units whose translation could not be inserted.
    pub failed: usize,
    /// One [`UnitError::Mutation`] per insertion failure.
    pub errors: Vec<UnitError>,
}

/// Aggregate result of one pipeline run.
///
/// The run itself succeeded whenever a report is returned; unit failures are
/// listed in [`failures`](Self::failures) so a caller can retry only those.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Units extracted from the document.
    pub total_units: usize,
    /// Units served from the cache.
    pub cached: usize,
    /// Units translated by a remote call in this run.
    pub translated: usize,
    /// Units with a `Failed` outcome plus units whose insertion failed.
    pub failed: usize,
    /// Remote translation requests issued (after in-run de-duplication).
    pub remote_calls: usize,
    /// Blocks inserted into the document.
    pub inserted: usize,
    /// Translations obtained but not inserted.
    pub insert_failed: usize,
    /// Whether the run was cancelled before every unit was dispatched.
    pub cancelled: bool,
    /// Every per-unit failure, ordered by unit id.
    pub failures: Vec<UnitError>,
    /// Tokens spent on remote calls in this run (0 when the service does
    /// not report usage).
    pub api_tokens: TokenUsage,
    /// Completion tokens the cache hits originally cost, i.e. what the cache
    /// saved this run.
    pub cached_tokens: u64,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
}

impl RunReport {
    pub(crate) fn assemble(
        outcomes: &[TranslationOutcome],
        summary: MutationSummary,
        remote_calls: usize,
        cancelled: bool,
        duration_ms: u64,
    ) -> Self {
        let count = |s: OutcomeStatus| outcomes.iter().filter(|o| o.status == s).count();

        let mut failures: Vec<UnitError> = outcomes
            .iter()
            .filter_map(|o| o.error.clone())
            .chain(summary.errors)
            .collect();
        failures.sort_by_key(UnitError::unit);

        Self {
            total_units: outcomes.len(),
            cached: count(OutcomeStatus::CachedHit),
            translated: count(OutcomeStatus::Success),
            failed: count(OutcomeStatus::Failed) + summary.failed,
            remote_calls,
            inserted: summary.inserted,
            insert_failed: summary.failed,
            cancelled,
            failures,
            api_tokens: TokenUsage::default(),
            cached_tokens: 0,
            duration_ms,
        }
    }

    /// `true` when no unit failed at any stage.
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }

    /// Unit ids worth submitting again (excludes permanent service errors).
    pub fn retryable_units(&self) -> Vec<usize> {
        self.failures
            .iter()
            .filter(|e| e.is_retryable())
            .map(UnitError::unit)
            .collect()
    }

    /// Treat any unit failure as an error.
    pub fn into_result(self) -> Result<RunReport, DocTransError> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(DocTransError::PartialFailure {
                failed: self.failed,
                total: self.total_units,
            })
        }
    }
}
