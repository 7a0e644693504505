//! Progress-callback trait for per-unit translation events.
//!
//! Inject an [`Arc<dyn TranslationProgressCallback>`] via
//! [`crate::config::TranslationConfigBuilder::progress_callback`] to receive
//! events as the dispatcher resolves each unit.
//!
//! # Example
//!
//! ```rust
//! use edgequake_doctrans::{OutcomeStatus, TranslationConfig, TranslationProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     cached: AtomicUsize,
//! }
//!
//! impl TranslationProgressCallback for CountingCallback {
//!     fn on_unit_complete(&self, unit_id: usize, total_units: usize, status: OutcomeStatus) {
//!         if status == OutcomeStatus::CachedHit {
//!             self.cached.fetch_add(1, Ordering::SeqCst);
//!         }
//!         eprintln!("unit {}/{}: {:?}", unit_id, total_units, status);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { cached: AtomicUsize::new(0) });
//!
//! let config = TranslationConfig::builder()
//!     .progress_callback(counter as Arc<dyn TranslationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::OutcomeStatus;
use std::sync::Arc;

/// Called by the dispatcher as it resolves each unit.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// In bounded mode `on_unit_start`, `on_unit_complete` and `on_unit_error`
/// may be called concurrently. Implementations must protect shared mutable
/// state (e.g. `Mutex`, `AtomicUsize`).
pub trait TranslationProgressCallback: Send + Sync {
    /// Called once after extraction, before any cache lookup.
    fn on_run_start(&self, total_units: usize) {
        let _ = total_units;
    }

    /// Called just before the remote request for a unit is sent.
    /// Cache hits never see this event.
    fn on_unit_start(&self, unit_id: usize, total_units: usize) {
        let _ = (unit_id, total_units);
    }

    /// Called when a unit resolves to a translation (fresh or cached).
    fn on_unit_complete(&self, unit_id: usize, total_units: usize, status: OutcomeStatus) {
        let _ = (unit_id, total_units, status);
    }

    /// Called when a unit fails (service error, empty result, cancellation).
    fn on_unit_error(&self, unit_id: usize, total_units: usize, error: &str) {
        let _ = (unit_id, total_units, error);
    }

    /// Called once after every unit has an outcome.
    fn on_run_complete(&self, total_units: usize, success_count: usize) {
        let _ = (total_units, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl TranslationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::TranslationConfig`].
pub type ProgressCallback = Arc<dyn TranslationProgressCallback>;
