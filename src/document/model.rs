//! Document model types shared across the pipeline
//!
//! The editing engine owns the real document representation; this module
//! only defines the shapes exchanged over the engine boundary.

use crate::core::types::SectionId;
use serde::{Deserialize, Serialize};

/// One paragraph of document text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Engine-assigned paragraph identifier
    pub id: String,
    /// Plain text content
    pub text: String,
}

impl Paragraph {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// One entry of the document outline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionInfo {
    pub id: SectionId,
    pub title: String,
}

impl SectionInfo {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: SectionId::new(id),
            title: title.into(),
        }
    }
}

/// Extracted context for one section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionContext {
    /// Paragraphs directly under the section heading
    pub own_paragraphs: Vec<Paragraph>,
    /// Paragraphs of all nested subsections
    pub subtree_paragraphs: Vec<Paragraph>,
}

/// A reference to a paragraph relative to the current reading position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParagraphRef {
    Current,
    Previous,
    Next,
    /// 1-based position within the section
    Nth(usize),
}

/// A single proposed document mutation
///
/// Ops are produced by the edit primitive and applied (or previewed) by the
/// bridge. They are deliberately small: the engine interprets them against
/// its own representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DocOp {
    /// Replace a paragraph's full text
    ReplaceParagraph { paragraph_id: String, text: String },
    /// Insert a new paragraph at the end of a section
    AppendParagraph { section_id: SectionId, text: String },
    /// Mark one term inside a paragraph as key content
    MarkTerm { paragraph_id: String, term: String },
}

impl DocOp {
    /// The paragraph this op touches, if it targets one directly
    pub fn paragraph_id(&self) -> Option<&str> {
        match self {
            DocOp::ReplaceParagraph { paragraph_id, .. } => Some(paragraph_id),
            DocOp::MarkTerm { paragraph_id, .. } => Some(paragraph_id),
            DocOp::AppendParagraph { .. } => None,
        }
    }
}
