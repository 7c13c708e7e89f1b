//! Parse and validate the generation service's two-block output
//!
//! The service is instructed to emit an `[action]` block holding one line of
//! JSON and a `[reply]` block holding natural-language text. Real model
//! output malforms both often enough that every failure here degrades to a
//! chat reply; nothing in this module panics or returns an error across the
//! turn boundary.

use crate::core::types::SectionId;
use crate::document::model::ParagraphRef;
use serde::{Deserialize, Serialize};

/// Outcome of protocol extraction and validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    /// Action block present, well-formed, and schema-valid
    Ok,
    /// No action block in the output
    Missing,
    /// Action block present but its payload is not valid JSON
    Malformed,
    /// Payload parsed but failed schema validation
    Invalid,
}

/// A section reference as the protocol allows it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionRef {
    Explicit(SectionId),
    /// Sentinel: whatever section the user is focused on
    Current,
    /// Sentinel: let target resolution pick
    Auto,
}

impl SectionRef {
    fn from_raw(raw: &str) -> Self {
        match raw {
            "current" => SectionRef::Current,
            "auto" => SectionRef::Auto,
            other => SectionRef::Explicit(SectionId::new(other)),
        }
    }
}

/// A validated edit request, one variant per protocol action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditIntent {
    RewriteSection {
        section: SectionRef,
        style: Option<String>,
    },
    RewriteParagraph {
        section: SectionRef,
        reference: ParagraphRef,
        style: Option<String>,
    },
    SummarizeSection {
        section: SectionRef,
    },
    SummarizeDocument,
    HighlightTerms {
        section: SectionRef,
        terms: Vec<String>,
    },
}

impl EditIntent {
    /// Stable action name as it appears on the wire
    pub fn action_name(&self) -> &'static str {
        match self {
            EditIntent::RewriteSection { .. } => "rewrite_section",
            EditIntent::RewriteParagraph { .. } => "rewrite_paragraph",
            EditIntent::SummarizeSection { .. } => "summarize_section",
            EditIntent::SummarizeDocument => "summarize_document",
            EditIntent::HighlightTerms { .. } => "highlight_terms",
        }
    }

    /// The section reference, for actions that carry one
    pub fn section(&self) -> Option<&SectionRef> {
        match self {
            EditIntent::RewriteSection { section, .. }
            | EditIntent::RewriteParagraph { section, .. }
            | EditIntent::SummarizeSection { section }
            | EditIntent::HighlightTerms { section, .. } => Some(section),
            EditIntent::SummarizeDocument => None,
        }
    }
}

/// Validated description of what the model decided the user wants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    Chat,
    Edit(EditIntent),
}

impl Intent {
    /// True only for edit actions currently wired into the bridge.
    ///
    /// Actions the grammar recognizes but execution does not yet cover must
    /// validate and then degrade to a descriptive chat reply.
    pub fn is_executable(&self) -> bool {
        matches!(
            self,
            Intent::Edit(EditIntent::RewriteSection { .. })
                | Intent::Edit(EditIntent::SummarizeSection { .. })
        )
    }
}

/// One parsed generation-service response
#[derive(Debug, Clone)]
pub struct ModelOutput {
    pub intent: Option<Intent>,
    pub reply_text: String,
    pub raw_text: String,
    pub parse_status: ParseStatus,
}

// Loose wire shapes; validation turns these into `Intent`.
#[derive(Debug, Deserialize)]
struct RawAction {
    mode: Option<String>,
    action: Option<String>,
    target: Option<RawTarget>,
    #[serde(default)]
    params: RawParams,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    scope: Option<String>,
    section_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawParams {
    paragraph_reference: Option<String>,
    paragraph_index: Option<usize>,
    style: Option<String>,
    terms: Option<Vec<String>>,
}

/// Decode raw model output into a reply plus an optional validated intent
pub fn parse_output(raw: &str) -> ModelOutput {
    let action_payload = extract_block(raw, "action");
    let reply_text = match extract_block(raw, "reply") {
        Some(reply) if !reply.is_empty() => reply.to_string(),
        _ => fallback_reply(raw),
    };

    let (intent, parse_status) = match action_payload {
        None => (None, ParseStatus::Missing),
        Some(payload) => match serde_json::from_str::<RawAction>(payload) {
            Err(e) => {
                tracing::debug!(error = %e, "action payload is not valid JSON");
                (None, ParseStatus::Malformed)
            }
            Ok(raw_action) => match validate(raw_action) {
                Ok(intent) => (Some(intent), ParseStatus::Ok),
                Err(reason) => {
                    tracing::debug!(%reason, "action payload failed validation");
                    (None, ParseStatus::Invalid)
                }
            },
        },
    };

    ModelOutput {
        intent,
        reply_text,
        raw_text: raw.to_string(),
        parse_status,
    }
}

fn validate(raw: RawAction) -> Result<Intent, String> {
    let mode = raw.mode.as_deref().unwrap_or("");
    match mode {
        "chat" => return Ok(Intent::Chat),
        "edit" => {}
        other => return Err(format!("unknown mode '{}'", other)),
    }

    let action = raw
        .action
        .as_deref()
        .ok_or_else(|| "edit mode without action".to_string())?;

    let target = raw.target.as_ref();
    let scope = target.and_then(|t| t.scope.as_deref()).unwrap_or("");
    if !matches!(scope, "document" | "section") {
        return Err(format!("unknown target scope '{}'", scope));
    }

    let section = || -> Result<SectionRef, String> {
        let id = target
            .and_then(|t| t.section_id.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("action '{}' requires a section id", action))?;
        Ok(SectionRef::from_raw(id))
    };

    let intent = match action {
        "rewrite_section" => EditIntent::RewriteSection {
            section: section()?,
            style: raw.params.style,
        },
        "rewrite_paragraph" => EditIntent::RewriteParagraph {
            section: section()?,
            reference: paragraph_reference(&raw.params)?,
            style: raw.params.style,
        },
        "summarize_section" => EditIntent::SummarizeSection { section: section()? },
        "summarize_document" => EditIntent::SummarizeDocument,
        "highlight_terms" => EditIntent::HighlightTerms {
            section: section()?,
            terms: raw.params.terms.unwrap_or_default(),
        },
        other => return Err(format!("unknown action '{}'", other)),
    };

    Ok(Intent::Edit(intent))
}

fn paragraph_reference(params: &RawParams) -> Result<ParagraphRef, String> {
    match params.paragraph_reference.as_deref() {
        None | Some("current") => Ok(ParagraphRef::Current),
        Some("previous") => Ok(ParagraphRef::Previous),
        Some("next") => Ok(ParagraphRef::Next),
        Some("nth") => match params.paragraph_index {
            Some(n) if n >= 1 => Ok(ParagraphRef::Nth(n)),
            _ => Err("nth paragraph reference requires paragraph_index >= 1".into()),
        },
        Some(other) => Err(format!("unknown paragraph reference '{}'", other)),
    }
}

/// Reply fallback when no reply block exists: the raw text with the action
/// block and any stray delimiters stripped.
fn fallback_reply(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let without_action = match block_span(raw, "action") {
        Some(span) => {
            text.push_str(&raw[..span.start]);
            text.push_str(&raw[span.end..]);
            text
        }
        None => raw.to_string(),
    };

    let mut cleaned = without_action;
    for tag in ["[action]", "[/action]", "[reply]", "[/reply]"] {
        while let Some(pos) = find_tag(&cleaned, tag, 0) {
            cleaned.replace_range(pos..pos + tag.len(), "");
        }
    }
    cleaned.trim().to_string()
}

/// First-match, case-insensitive block extraction; a missing close tag
/// consumes the rest of the text.
fn extract_block<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    block_span(raw, name).map(|span| raw[span.body_start..span.body_end].trim())
}

struct BlockSpan {
    /// Start of the open tag
    start: usize,
    body_start: usize,
    body_end: usize,
    /// End of the close tag (end of text when the close tag is missing)
    end: usize,
}

fn block_span(raw: &str, name: &str) -> Option<BlockSpan> {
    let open = format!("[{}]", name);
    let close = format!("[/{}]", name);
    let start = find_tag(raw, &open, 0)?;
    let body_start = start + open.len();
    match find_tag(raw, &close, body_start) {
        Some(pos) => Some(BlockSpan {
            start,
            body_start,
            body_end: pos,
            end: pos + close.len(),
        }),
        None => Some(BlockSpan {
            start,
            body_start,
            body_end: raw.len(),
            end: raw.len(),
        }),
    }
}

/// ASCII case-insensitive substring search. Tags are pure ASCII, so every
/// match starts and ends on a char boundary.
fn find_tag(haystack: &str, tag: &str, from: usize) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let tag_bytes = tag.as_bytes();
    if from + tag_bytes.len() > bytes.len() {
        return None;
    }
    (from..=bytes.len() - tag_bytes.len())
        .find(|&i| bytes[i..i + tag_bytes.len()].eq_ignore_ascii_case(tag_bytes))
}
