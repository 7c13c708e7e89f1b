//! Document engine boundary
//!
//! The real editing engine lives outside this crate. The bridge talks to it
//! through `DocumentEngine`: context extraction, one edit-primitive entry
//! point, and raw op application. The primitive decides for itself whether
//! its result can be applied immediately or needs human confirmation.

use crate::core::error::Result;
use crate::core::types::{DocumentId, SectionId};
use crate::document::model::{DocOp, ParagraphRef, SectionContext, SectionInfo};
use serde::{Deserialize, Serialize};

/// What a primitive operates on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveTarget {
    Document,
    Section(SectionId),
}

impl PrimitiveTarget {
    pub fn section_id(&self) -> Option<&SectionId> {
        match self {
            PrimitiveTarget::Section(id) => Some(id),
            PrimitiveTarget::Document => None,
        }
    }
}

/// The edit operation a primitive is asked to perform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrimitiveOp {
    /// Rewrite all paragraphs of the target section
    RewriteSection {
        /// Optional style hint ("more formal", "shorter")
        style: Option<String>,
    },
    /// Rewrite a single paragraph of the target section
    RewriteParagraph {
        reference: ParagraphRef,
        style: Option<String>,
    },
    /// Condense the target section into a closing summary paragraph
    SummarizeSection,
    /// Condense the whole document
    SummarizeDocument,
    /// Mark the given terms as key content; empty means "pick key points"
    HighlightTerms { terms: Vec<String> },
}

impl PrimitiveOp {
    /// Short stable name used in history and log lines
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveOp::RewriteSection { .. } => "rewrite_section",
            PrimitiveOp::RewriteParagraph { .. } => "rewrite_paragraph",
            PrimitiveOp::SummarizeSection => "summarize_section",
            PrimitiveOp::SummarizeDocument => "summarize_document",
            PrimitiveOp::HighlightTerms { .. } => "highlight_terms",
        }
    }
}

/// One call into the edit primitive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimitiveRequest {
    pub target: PrimitiveTarget,
    pub op: PrimitiveOp,
    /// Present when re-invoking after a clarify round-trip
    pub clarify_choice: Option<String>,
}

/// How the primitive answered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PrimitiveOutcome {
    /// The mutation has already been applied
    Applied { ops: Vec<DocOp>, message: String },
    /// The mutation is computed but held for confirmation
    Preview { proposed_ops: Vec<DocOp>, summary: String },
    /// The primitive needs a disambiguation before it can proceed
    Clarify {
        field: String,
        question: String,
        options: Vec<String>,
    },
}

/// Capability interface to the document editing engine
pub trait DocumentEngine {
    /// Identifier of the open document
    fn document_id(&self) -> DocumentId;

    /// False while the editor model is still loading
    fn is_ready(&self) -> bool;

    /// Ordered section outline
    fn outline(&self) -> Vec<SectionInfo>;

    /// Extract the paragraphs of one section
    fn extract_section_context(&self, section_id: &SectionId) -> Result<SectionContext>;

    /// Run one edit primitive
    fn run_primitive(&mut self, request: &PrimitiveRequest) -> Result<PrimitiveOutcome>;

    /// Apply previously-computed ops; returns false if the engine rejected them
    fn apply_ops(&mut self, ops: &[DocOp]) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_op_names() {
        assert_eq!(PrimitiveOp::SummarizeSection.name(), "summarize_section");
        assert_eq!(
            PrimitiveOp::HighlightTerms { terms: vec![] }.name(),
            "highlight_terms"
        );
    }

    #[test]
    fn test_target_section_id() {
        let target = PrimitiveTarget::Section(SectionId::new("s3"));
        assert_eq!(target.section_id().unwrap().as_str(), "s3");
        assert!(PrimitiveTarget::Document.section_id().is_none());
    }
}
