//! Document access: the block tree the pipeline reads from and writes into.
//!
//! The pipeline never touches a file format directly. It talks to the
//! [`DocumentAccess`] trait, which exposes exactly three capabilities:
//! enumerate styled blocks in document order, look one block up by handle,
//! and insert a new block right after an existing one.
//!
//! [`Document`] is the in-tree implementation: a JSON-serialisable model of
//! a styled-block document (paragraphs with runs, plus tables whose cells hold
//! paragraphs). Converting to and from a concrete office format is left to
//! whoever produces the JSON.
//!
//! ```json
//! {
//!   "body": [
//!     { "type": "paragraph", "style": "Heading 1", "runs": [{ "text": "Intro", "bold": true }] },
//!     { "type": "paragraph", "style": "Normal",    "runs": [{ "text": "Hello world" }] },
//!     { "type": "table", "rows": [[ { "paragraphs": [ { "style": "Normal", "runs": [{ "text": "cell" }] } ] } ]] }
//!   ]
//! }
//! ```
//!
//! Block ids are assigned when the document is loaded and are never reused,
//! so a [`BlockId`] captured before an insertion still names the same
//! paragraph afterwards.

use crate::error::DocumentError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;

/// Stable handle to one paragraph of a document.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BlockId(pub u64);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Character formatting carried by a run.
///
/// `None` means "inherit from the paragraph style", matching how office
/// formats leave unset attributes to the style sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunFormat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size_pt: Option<f32>,
    /// Hex RGB, e.g. `"1F3864"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Read-only snapshot of one block, as seen by the extractor and mutator.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockView {
    pub id: BlockId,
    pub style_name: String,
    /// Concatenation of every run's text.
    pub text: String,
    /// Formatting of the first run, `None` when the paragraph has no runs.
    pub first_run: Option<RunFormat>,
}

/// Capability interface the pipeline needs from a document.
pub trait DocumentAccess {
    /// Every block in document traversal order.
    ///
    /// Calling this again restarts the traversal from the top.
    fn blocks(&self) -> Result<Box<dyn Iterator<Item = BlockView> + '_>, DocumentError>;

    /// Look up a single block by handle.
    fn block(&self, id: BlockId) -> Result<BlockView, DocumentError>;

    /// Insert a new single-run block immediately after `anchor` and return
    /// its handle. The anchor itself is left untouched.
    fn insert_after(
        &mut self,
        anchor: BlockId,
        style_name: &str,
        text: &str,
        format: &RunFormat,
    ) -> Result<BlockId, DocumentError>;
}

// ── JSON document model ──────────────────────────────────────────────────

/// A styled-block document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub body: Vec<Block>,
    #[serde(skip)]
    next_id: u64,
}

/// A top-level body element.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
    #[serde(skip)]
    pub id: BlockId,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default)]
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub text: String,
    #[serde(flatten)]
    pub format: RunFormat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
}

fn default_style() -> String {
    "Normal".to_string()
}

impl Paragraph {
    /// Build a paragraph with a single unformatted run. The id is assigned
    /// when the paragraph becomes part of a [`Document`].
    pub fn new(style: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: BlockId::default(),
            style: style.into(),
            runs: vec![Run {
                text: text.into(),
                format: RunFormat::default(),
            }],
        }
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    fn view(&self) -> BlockView {
        BlockView {
            id: self.id,
            style_name: self.style.clone(),
            text: self.text(),
            first_run: self.runs.first().map(|r| r.format.clone()),
        }
    }
}

impl Block {
    fn paragraphs(&self) -> Box<dyn Iterator<Item = &Paragraph> + '_> {
        match self {
            Block::Paragraph(p) => Box::new(std::iter::once(p)),
            Block::Table(t) => Box::new(
                t.rows
                    .iter()
                    .flatten()
                    .flat_map(|cell| cell.paragraphs.iter()),
            ),
        }
    }
}

impl Document {
    /// Build a document from body blocks, assigning fresh ids.
    pub fn new(body: Vec<Block>) -> Self {
        let mut doc = Self { body, next_id: 0 };
        doc.assign_ids();
        doc
    }

    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let mut doc: Document = serde_json::from_str(json)?;
        doc.assign_ids();
        Ok(doc)
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read and parse a document file.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let raw = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Write the document atomically: a temp file next to `path` is renamed
    /// over it, so readers never observe a half-written document.
    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let io_err = |source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(io_err)?;

        let json = self.to_json()?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    /// All paragraphs, including those inside table cells, in document order.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> + '_ {
        self.body.iter().flat_map(Block::paragraphs)
    }

    /// Number of paragraphs, table cells included.
    pub fn paragraph_count(&self) -> usize {
        self.paragraphs().count()
    }

    fn assign_ids(&mut self) {
        let mut next = self.next_id;
        for block in &mut self.body {
            match block {
                Block::Paragraph(p) => {
                    p.id = BlockId(next);
                    next += 1;
                }
                Block::Table(t) => {
                    for p in t
                        .rows
                        .iter_mut()
                        .flatten()
                        .flat_map(|c| c.paragraphs.iter_mut())
                    {
                        p.id = BlockId(next);
                        next += 1;
                    }
                }
            }
        }
        self.next_id = next;
    }

    fn allocate_id(&mut self) -> BlockId {
        let id = BlockId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl DocumentAccess for Document {
    fn blocks(&self) -> Result<Box<dyn Iterator<Item = BlockView> + '_>, DocumentError> {
        Ok(Box::new(self.paragraphs().map(Paragraph::view)))
    }

    fn block(&self, id: BlockId) -> Result<BlockView, DocumentError> {
        self.paragraphs()
            .find(|p| p.id == id)
            .map(Paragraph::view)
            .ok_or(DocumentError::StaleBlock { id })
    }

    fn insert_after(
        &mut self,
        anchor: BlockId,
        style_name: &str,
        text: &str,
        format: &RunFormat,
    ) -> Result<BlockId, DocumentError> {
        // Locate first so a stale anchor does not burn an id.
        let mut slot: Option<(usize, Option<(usize, usize, usize)>)> = None;
        'search: for (bi, block) in self.body.iter().enumerate() {
            match block {
                Block::Paragraph(p) if p.id == anchor => {
                    slot = Some((bi, None));
                    break 'search;
                }
                Block::Paragraph(_) => {}
                Block::Table(t) => {
                    for (ri, row) in t.rows.iter().enumerate() {
                        for (ci, cell) in row.iter().enumerate() {
                            if let Some(pi) = cell.paragraphs.iter().position(|p| p.id == anchor) {
                                slot = Some((bi, Some((ri, ci, pi))));
                                break 'search;
                            }
                        }
                    }
                }
            }
        }
        let (bi, in_cell) = slot.ok_or(DocumentError::StaleBlock { id: anchor })?;

        let id = self.allocate_id();
        let paragraph = Paragraph {
            id,
            style: style_name.to_string(),
            runs: vec![Run {
                text: text.to_string(),
                format: format.clone(),
            }],
        };

        match in_cell {
            None => self.body.insert(bi + 1, Block::Paragraph(paragraph)),
            Some((ri, ci, pi)) => match &mut self.body[bi] {
                Block::Table(t) => t.rows[ri][ci].paragraphs.insert(pi + 1, paragraph),
                Block::Paragraph(_) => return Err(DocumentError::StaleBlock { id: anchor }),
            },
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document::from_json(
            r#"{
              "body": [
                { "type": "paragraph", "style": "Heading 1", "runs": [{ "text": "Title", "bold": true }] },
                { "type": "paragraph", "runs": [{ "text": "Hello " }, { "text": "world", "italic": true }] },
                { "type": "table", "rows": [[
                  { "paragraphs": [{ "style": "Normal", "runs": [{ "text": "a" }] }] },
                  { "paragraphs": [{ "style": "Normal", "runs": [{ "text": "b" }] }] }
                ]] },
                { "type": "paragraph", "style": "Normal", "runs": [] }
              ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn blocks_follow_document_order_including_cells() {
        let doc = sample();
        let texts: Vec<String> = doc.blocks().unwrap().map(|b| b.text).collect();
        assert_eq!(texts, vec!["Title", "Hello world", "a", "b", ""]);
    }

    #[test]
    fn missing_style_defaults_to_normal() {
        let doc = sample();
        let second = doc.blocks().unwrap().nth(1).unwrap();
        assert_eq!(second.style_name, "Normal");
    }

    #[test]
    fn first_run_format_is_exposed() {
        let doc = sample();
        let title = doc.blocks().unwrap().next().unwrap();
        assert_eq!(title.first_run.unwrap().bold, Some(true));
        let empty = doc.blocks().unwrap().last().unwrap();
        assert!(empty.first_run.is_none());
    }

    #[test]
    fn ids_are_unique() {
        let doc = sample();
        let mut ids: Vec<BlockId> = doc.blocks().unwrap().map(|b| b.id).collect();
        let n = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), n);
    }

    #[test]
    fn insert_after_body_paragraph() {
        let mut doc = sample();
        let anchor = doc.blocks().unwrap().nth(1).unwrap().id;
        let fmt = RunFormat {
            italic: Some(true),
            ..Default::default()
        };
        let new_id = doc.insert_after(anchor, "Normal", "Hola mundo", &fmt).unwrap();

        let views: Vec<BlockView> = doc.blocks().unwrap().collect();
        assert_eq!(views[1].id, anchor);
        assert_eq!(views[1].text, "Hello world");
        assert_eq!(views[2].id, new_id);
        assert_eq!(views[2].text, "Hola mundo");
        assert_eq!(views[2].first_run.as_ref().unwrap().italic, Some(true));
    }

    #[test]
    fn insert_after_cell_paragraph_stays_in_cell() {
        let mut doc = sample();
        let anchor = doc.blocks().unwrap().nth(2).unwrap().id;
        doc.insert_after(anchor, "Normal", "A", &RunFormat::default())
            .unwrap();

        let texts: Vec<String> = doc.blocks().unwrap().map(|b| b.text).collect();
        assert_eq!(texts, vec!["Title", "Hello world", "a", "A", "b", ""]);
        match &doc.body[2] {
            Block::Table(t) => assert_eq!(t.rows[0][0].paragraphs.len(), 2),
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn handles_survive_earlier_insertions() {
        let mut doc = sample();
        let views: Vec<BlockView> = doc.blocks().unwrap().collect();
        let first = views[0].id;
        let second = views[1].id;

        doc.insert_after(first, "Heading 1", "Titulo", &RunFormat::default())
            .unwrap();
        doc.insert_after(second, "Normal", "Hola mundo", &RunFormat::default())
            .unwrap();

        let texts: Vec<String> = doc.blocks().unwrap().map(|b| b.text).collect();
        assert_eq!(
            texts,
            vec!["Title", "Titulo", "Hello world", "Hola mundo", "a", "b", ""]
        );
    }

    #[test]
    fn stale_anchor_is_rejected() {
        let mut doc = sample();
        let err = doc
            .insert_after(BlockId(999), "Normal", "x", &RunFormat::default())
            .unwrap_err();
        assert!(matches!(err, DocumentError::StaleBlock { id } if id == BlockId(999)));
        assert!(doc.block(BlockId(999)).is_err());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            Document::from_json("{ not json"),
            Err(DocumentError::Json(_))
        ));
    }

    #[test]
    fn save_then_load_keeps_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("doc.json");

        let mut doc = sample();
        let anchor = doc.blocks().unwrap().nth(1).unwrap().id;
        doc.insert_after(anchor, "Normal", "Hola mundo", &RunFormat::default())
            .unwrap();
        doc.save(&path).unwrap();

        let loaded = Document::load(&path).unwrap();
        let texts: Vec<String> = loaded.blocks().unwrap().map(|b| b.text).collect();
        assert_eq!(
            texts,
            vec!["Title", "Hello world", "Hola mundo", "a", "b", ""]
        );
        assert_eq!(loaded.paragraph_count(), 6);
    }
}
