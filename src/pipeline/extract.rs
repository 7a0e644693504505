//! Unit extraction: select the blocks that will be translated.
//!
//! A block becomes a unit iff its style passes the [`StyleFilter`] and its
//! text is non-empty after trimming. Whitespace-only blocks are skipped
//! silently. Traversal is read-only and follows document order, table cells
//! included.

use crate::config::StyleFilter;
use crate::document::{BlockId, BlockView, DocumentAccess};
use crate::error::DocTransError;
use serde::Serialize;

/// One translatable block. Immutable once extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslatableUnit {
    /// 1-indexed ordinal among the extracted units.
    pub id: usize,
    pub style_name: String,
    /// The block's text with surrounding whitespace removed. This is what is
    /// sent for translation and what the cache key is computed from.
    pub source_text: String,
    /// Handle of the source block; stays valid across insertions.
    pub block: BlockId,
}

/// Lazy iterator over the units of a document.
///
/// Call [`extract_units`] again to restart from the top.
pub struct Units<'a> {
    blocks: Box<dyn Iterator<Item = BlockView> + 'a>,
    filter: &'a StyleFilter,
    next_id: usize,
}

impl Iterator for Units<'_> {
    type Item = TranslatableUnit;

    fn next(&mut self) -> Option<TranslatableUnit> {
        for view in self.blocks.by_ref() {
            if !self.filter.matches(&view.style_name) {
                continue;
            }
            let text = view.text.trim();
            if text.is_empty() {
                continue;
            }
            self.next_id += 1;
            return Some(TranslatableUnit {
                id: self.next_id,
                style_name: view.style_name,
                source_text: text.to_string(),
                block: view.id,
            });
        }
        None
    }
}

/// Start a traversal of `doc`.
///
/// Fails only when the document cannot be enumerated at all.
pub fn extract_units<'a, D: DocumentAccess + ?Sized>(
    doc: &'a D,
    filter: &'a StyleFilter,
) -> Result<Units<'a>, DocTransError> {
    let blocks = doc
        .blocks()
        .map_err(|e| DocTransError::DocumentUnreadable {
            detail: e.to_string(),
        })?;
    Ok(Units {
        blocks,
        filter,
        next_id: 0,
    })
}
