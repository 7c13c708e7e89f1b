//! Deterministic in-memory document engine
//!
//! Stands in for the real editing engine in the REPL and in integration
//! tests. Edits are simple text transforms; response modes are configurable
//! per primitive so confirmation flows can be exercised without an editor.

use crate::core::error::{DraftError, Result};
use crate::core::types::{DocumentId, SectionId};
use crate::document::engine::{
    DocumentEngine, PrimitiveOp, PrimitiveOutcome, PrimitiveRequest, PrimitiveTarget,
};
use crate::document::model::{DocOp, Paragraph, ParagraphRef, SectionContext, SectionInfo};
use ahash::AHashMap;

/// Whether a primitive applies its result directly or holds it for review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponsePolicy {
    #[default]
    AutoApply,
    Preview,
}

struct Section {
    info: SectionInfo,
    paragraphs: Vec<Paragraph>,
}

/// In-memory document with deterministic edit primitives
pub struct InMemoryDocument {
    id: DocumentId,
    ready: bool,
    sections: Vec<Section>,
    policies: AHashMap<&'static str, ResponsePolicy>,
    forced_error: Option<String>,
    next_paragraph_seq: usize,
}

impl InMemoryDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: DocumentId::new(id),
            ready: true,
            sections: Vec::new(),
            policies: AHashMap::new(),
            forced_error: None,
            next_paragraph_seq: 0,
        }
    }

    /// Add a section with the given paragraph texts
    pub fn with_section(
        mut self,
        id: impl Into<String>,
        title: impl Into<String>,
        paragraphs: &[&str],
    ) -> Self {
        let section_id = SectionId::new(id);
        let paragraphs = paragraphs
            .iter()
            .map(|text| {
                self.next_paragraph_seq += 1;
                Paragraph::new(format!("p{}", self.next_paragraph_seq), *text)
            })
            .collect();
        self.sections.push(Section {
            info: SectionInfo {
                id: section_id,
                title: title.into(),
            },
            paragraphs,
        });
        self
    }

    /// Force the next `run_primitive` call to fail with the given message
    pub fn force_error(&mut self, message: impl Into<String>) {
        self.forced_error = Some(message.into());
    }

    /// Override the response policy for one primitive kind
    pub fn set_policy(&mut self, op_name: &'static str, policy: ResponsePolicy) {
        self.policies.insert(op_name, policy);
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Look up a paragraph's current text (test helper)
    pub fn paragraph_text(&self, paragraph_id: &str) -> Option<&str> {
        self.sections
            .iter()
            .flat_map(|s| s.paragraphs.iter())
            .find(|p| p.id == paragraph_id)
            .map(|p| p.text.as_str())
    }

    fn section(&self, id: &SectionId) -> Result<&Section> {
        self.sections
            .iter()
            .find(|s| &s.info.id == id)
            .ok_or_else(|| DraftError::SectionNotFound(id.to_string()))
    }

    fn policy_for(&self, op: &PrimitiveOp) -> ResponsePolicy {
        self.policies.get(op.name()).copied().unwrap_or_default()
    }

    fn rewrite_text(text: &str, style: Option<&str>) -> String {
        match style {
            Some(s) if s.contains("short") || s.contains('短') => {
                let cut = text
                    .char_indices()
                    .find(|(_, c)| matches!(c, '.' | '。' | '!' | '?'))
                    .map(|(i, c)| i + c.len_utf8())
                    .unwrap_or(text.len());
                text[..cut].to_string()
            }
            Some(s) => format!("{} ({})", text, s),
            None => format!("{} (revised)", text),
        }
    }

    fn compute_ops(&self, request: &PrimitiveRequest) -> Result<ComputedEdit> {
        match &request.op {
            PrimitiveOp::RewriteSection { style } => {
                let section_id = self.require_section(&request.target)?;
                let section = self.section(&section_id)?;
                let ops = section
                    .paragraphs
                    .iter()
                    .map(|p| DocOp::ReplaceParagraph {
                        paragraph_id: p.id.clone(),
                        text: Self::rewrite_text(&p.text, style.as_deref()),
                    })
                    .collect();
                Ok(ComputedEdit::Ops(ops, format!("Rewrote \"{}\"", section.info.title)))
            }
            PrimitiveOp::RewriteParagraph { reference, style } => {
                let section_id = self.require_section(&request.target)?;
                let section = self.section(&section_id)?;
                let paragraph = match self.resolve_paragraph(section, *reference, request) {
                    Ok(p) => p,
                    Err(clarify) => return Ok(*clarify),
                };
                let op = DocOp::ReplaceParagraph {
                    paragraph_id: paragraph.id.clone(),
                    text: Self::rewrite_text(&paragraph.text, style.as_deref()),
                };
                Ok(ComputedEdit::Ops(
                    vec![op],
                    format!("Rewrote one paragraph of \"{}\"", section.info.title),
                ))
            }
            PrimitiveOp::SummarizeSection => {
                let section_id = self.require_section(&request.target)?;
                let section = self.section(&section_id)?;
                let op = DocOp::AppendParagraph {
                    section_id: section_id.clone(),
                    text: format!(
                        "Summary: {} paragraphs on {}.",
                        section.paragraphs.len(),
                        section.info.title
                    ),
                };
                Ok(ComputedEdit::Ops(
                    vec![op],
                    format!("Summarized \"{}\"", section.info.title),
                ))
            }
            PrimitiveOp::SummarizeDocument => {
                let last = self
                    .sections
                    .last()
                    .ok_or_else(|| DraftError::EngineError("document has no sections".into()))?;
                let op = DocOp::AppendParagraph {
                    section_id: last.info.id.clone(),
                    text: format!("Document summary: {} sections.", self.sections.len()),
                };
                Ok(ComputedEdit::Ops(vec![op], "Summarized the document".into()))
            }
            PrimitiveOp::HighlightTerms { terms } => {
                let section_id = self.require_section(&request.target)?;
                let section = self.section(&section_id)?;
                let mut ops = Vec::new();
                if terms.is_empty() {
                    // No explicit terms: mark the first long word of each paragraph
                    for p in &section.paragraphs {
                        if let Some(word) =
                            p.text.split_whitespace().find(|w| w.chars().count() >= 4)
                        {
                            ops.push(DocOp::MarkTerm {
                                paragraph_id: p.id.clone(),
                                term: word.to_string(),
                            });
                        }
                    }
                } else {
                    for term in terms {
                        for p in section.paragraphs.iter().filter(|p| p.text.contains(term)) {
                            ops.push(DocOp::MarkTerm {
                                paragraph_id: p.id.clone(),
                                term: term.clone(),
                            });
                        }
                    }
                }
                Ok(ComputedEdit::Ops(
                    ops,
                    format!("Marked key content in \"{}\"", section.info.title),
                ))
            }
        }
    }

    fn require_section(&self, target: &PrimitiveTarget) -> Result<SectionId> {
        match target {
            PrimitiveTarget::Section(id) => {
                // Fail early for unknown sections
                self.section(id)?;
                Ok(id.clone())
            }
            PrimitiveTarget::Document => Err(DraftError::EngineError(
                "section-scoped primitive invoked with document target".into(),
            )),
        }
    }

    /// Resolve a paragraph reference, or produce the clarify outcome asking
    /// which paragraph was meant.
    fn resolve_paragraph<'a>(
        &self,
        section: &'a Section,
        reference: ParagraphRef,
        request: &PrimitiveRequest,
    ) -> std::result::Result<&'a Paragraph, Box<ComputedEdit>> {
        if let Some(choice) = &request.clarify_choice {
            if let Some(p) = section.paragraphs.iter().find(|p| &p.id == choice) {
                return Ok(p);
            }
            // Unrecognized choice: ask again
            return Err(Box::new(self.clarify_paragraph(section)));
        }

        match reference {
            ParagraphRef::Nth(n) if n >= 1 && n <= section.paragraphs.len() => {
                Ok(&section.paragraphs[n - 1])
            }
            ParagraphRef::Current if section.paragraphs.len() == 1 => Ok(&section.paragraphs[0]),
            // No cursor position is tracked here, so relative references are
            // ambiguous whenever the section has more than one paragraph.
            _ => Err(Box::new(self.clarify_paragraph(section))),
        }
    }

    fn clarify_paragraph(&self, section: &Section) -> ComputedEdit {
        ComputedEdit::Clarify {
            field: "paragraph".into(),
            question: format!(
                "Which paragraph of \"{}\" should be rewritten?",
                section.info.title
            ),
            options: section.paragraphs.iter().map(|p| p.id.clone()).collect(),
        }
    }
}

enum ComputedEdit {
    Ops(Vec<DocOp>, String),
    Clarify {
        field: String,
        question: String,
        options: Vec<String>,
    },
}

impl DocumentEngine for InMemoryDocument {
    fn document_id(&self) -> DocumentId {
        self.id.clone()
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn outline(&self) -> Vec<SectionInfo> {
        self.sections.iter().map(|s| s.info.clone()).collect()
    }

    fn extract_section_context(&self, section_id: &SectionId) -> Result<SectionContext> {
        let section = self.section(section_id)?;
        Ok(SectionContext {
            own_paragraphs: section.paragraphs.clone(),
            // Flat section list: no nesting
            subtree_paragraphs: Vec::new(),
        })
    }

    fn run_primitive(&mut self, request: &PrimitiveRequest) -> Result<PrimitiveOutcome> {
        if let Some(message) = self.forced_error.take() {
            return Err(DraftError::EngineError(message));
        }

        match self.compute_ops(request)? {
            ComputedEdit::Clarify {
                field,
                question,
                options,
            } => Ok(PrimitiveOutcome::Clarify {
                field,
                question,
                options,
            }),
            ComputedEdit::Ops(ops, message) => match self.policy_for(&request.op) {
                ResponsePolicy::Preview => Ok(PrimitiveOutcome::Preview {
                    proposed_ops: ops,
                    summary: message,
                }),
                ResponsePolicy::AutoApply => {
                    self.apply_ops(&ops)?;
                    Ok(PrimitiveOutcome::Applied { ops, message })
                }
            },
        }
    }

    fn apply_ops(&mut self, ops: &[DocOp]) -> Result<bool> {
        // Validate every target before mutating anything
        for op in ops {
            match op {
                DocOp::ReplaceParagraph { paragraph_id, .. }
                | DocOp::MarkTerm { paragraph_id, .. } => {
                    if self.paragraph_text(paragraph_id).is_none() {
                        return Ok(false);
                    }
                }
                DocOp::AppendParagraph { section_id, .. } => {
                    if self.section(section_id).is_err() {
                        return Ok(false);
                    }
                }
            }
        }

        for op in ops {
            match op {
                DocOp::ReplaceParagraph { paragraph_id, text } => {
                    for section in &mut self.sections {
                        if let Some(p) =
                            section.paragraphs.iter_mut().find(|p| &p.id == paragraph_id)
                        {
                            p.text = text.clone();
                        }
                    }
                }
                DocOp::AppendParagraph { section_id, text } => {
                    self.next_paragraph_seq += 1;
                    let paragraph = Paragraph::new(format!("p{}", self.next_paragraph_seq), text);
                    if let Some(section) =
                        self.sections.iter_mut().find(|s| &s.info.id == section_id)
                    {
                        section.paragraphs.push(paragraph);
                    }
                }
                DocOp::MarkTerm { paragraph_id, term } => {
                    for section in &mut self.sections {
                        if let Some(p) =
                            section.paragraphs.iter_mut().find(|p| &p.id == paragraph_id)
                        {
                            p.text = p.text.replace(term.as_str(), &format!("**{}**", term));
                        }
                    }
                }
            }
        }
        Ok(true)
    }
}
