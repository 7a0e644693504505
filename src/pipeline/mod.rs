//! Pipeline stages for document translation.
//!
//! Each submodule implements exactly one step, so each is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ dispatch ──▶ mutate
//! (URL/path)  (units)    (cache + llm + postprocess)  (insert blocks)
//! ```
//!
//! 1. [`input`]    canonicalise the user-supplied path or URL to a local file
//! 2. [`extract`]  select styled, non-blank blocks as translatable units
//! 3. [`dispatch`] cache lookups, de-duplicated remote calls under a
//!    concurrency bound, order-preserving reassembly
//! 4. [`llm`]      drive the LLM call with retry/backoff; the only stage with
//!    network I/O
//! 5. [`postprocess`] deterministic cleanup of model quirks
//! 6. [`mutate`]   insert each translation after its source block

pub mod dispatch;
pub mod extract;
pub mod input;
pub mod llm;
pub mod mutate;
pub mod postprocess;
