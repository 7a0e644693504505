//! Error types for the edgequake-doctrans library.
//!
//! Errors are split by blast radius:
//!
//! * [`DocTransError`] is **fatal**: the run cannot proceed at all (document
//!   unreadable, cache mandatory but down, provider not configured). Returned
//!   as `Err(DocTransError)` from the top-level `translate*` functions.
//!
//! * [`UnitError`] is **non-fatal**: one unit failed (service error, empty
//!   response, stale block on insertion) while its siblings are fine. Stored
//!   inside [`crate::output::TranslationOutcome`] and
//!   [`crate::output::RunReport::failures`] so callers can retry only the
//!   failed subset.
//!
//! The collaborator layers have their own narrow error types:
//! [`TranslationServiceError`] for the remote translator, [`DocumentError`]
//! for document access and [`CacheError`] for cache storage.

use crate::document::BlockId;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-doctrans library.
///
/// Unit-level failures use [`UnitError`] and never escalate here.
#[derive(Debug, Error)]
pub enum DocTransError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Document errors ───────────────────────────────────────────────────
    /// The document could not be read or its block tree could not be walked.
    /// Raised before any remote call is made.
    #[error("Document is unreadable: {detail}")]
    DocumentUnreadable { detail: String },

    // ── Cache errors ──────────────────────────────────────────────────────
    /// The cache is configured as mandatory and its storage cannot be used.
    #[error("Translation cache unavailable at '{path}': {detail}\nPass --no-cache to run without it.")]
    CacheUnavailable { path: PathBuf, detail: String },

    // ── Service errors ────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Some units succeeded but at least one failed.
    ///
    /// Returned by [`crate::output::RunReport::into_result`] when the caller
    /// wants to treat any unit failure as an error.
    #[error("{failed}/{total} units failed during translation")]
    PartialFailure { failed: usize, total: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or dispatcher validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single unit.
///
/// `unit` is the unit's ordinal id as assigned by the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum UnitError {
    /// The service failed with an error a later run may not hit again.
    #[error("Unit {unit}: transient translation error: {detail}")]
    Transient { unit: usize, detail: String },

    /// The service rejected the request; retrying will not help.
    #[error("Unit {unit}: permanent translation error: {detail}")]
    Permanent { unit: usize, detail: String },

    /// The service answered but the cleaned translation was empty.
    #[error("Unit {unit}: translation service returned an empty result")]
    EmptyResult { unit: usize },

    /// The run was cancelled before this unit was dispatched.
    #[error("Unit {unit}: cancelled before dispatch")]
    Cancelled { unit: usize },

    /// The translation was obtained but could not be inserted.
    #[error("Unit {unit}: could not insert translation: {detail}")]
    Mutation { unit: usize, detail: String },
}

impl UnitError {
    /// The ordinal id of the unit this error belongs to.
    pub fn unit(&self) -> usize {
        match self {
            UnitError::Transient { unit, .. }
            | UnitError::Permanent { unit, .. }
            | UnitError::EmptyResult { unit }
            | UnitError::Cancelled { unit }
            | UnitError::Mutation { unit, .. } => *unit,
        }
    }

    /// Whether re-running the failed unit has a reasonable chance to succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, UnitError::Permanent { .. })
    }

    pub(crate) fn from_service(unit: usize, err: &TranslationServiceError) -> Self {
        match err {
            TranslationServiceError::Transient(detail) => UnitError::Transient {
                unit,
                detail: detail.clone(),
            },
            TranslationServiceError::Permanent(detail) => UnitError::Permanent {
                unit,
                detail: detail.clone(),
            },
        }
    }
}

/// Failure reported by a [`crate::service::TranslationService`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationServiceError {
    /// Network blip, rate limit, timeout: a caller policy may retry.
    #[error("transient: {0}")]
    Transient(String),

    /// Authentication failure, rejected content, malformed request.
    #[error("permanent: {0}")]
    Permanent(String),
}

impl TranslationServiceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TranslationServiceError::Transient(_))
    }
}

/// Failure reported by a [`crate::document::DocumentAccess`] implementation.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The handle does not name a block of this document.
    #[error("block {id} does not exist in this document")]
    StaleBlock { id: BlockId },

    /// The underlying store cannot be read.
    #[error("document store is unreadable: {0}")]
    Unreadable(String),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed document JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure reported by a [`crate::cache::TranslationCache`] backend.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Storage could not be opened or created.
    #[error("cache storage unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be decoded.
    #[error("cache entry is corrupt: {0}")]
    Corrupt(String),

    /// Any other backend failure.
    #[error("cache storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
            | rusqlite::Error::Utf8Error(..) => CacheError::Corrupt(e.to_string()),
            rusqlite::Error::SqliteFailure(ref code, _)
                if code.code == rusqlite::ErrorCode::DatabaseCorrupt
                    || code.code == rusqlite::ErrorCode::NotADatabase =>
            {
                CacheError::Corrupt(e.to_string())
            }
            other => CacheError::Storage(other.to_string()),
        }
    }
}
