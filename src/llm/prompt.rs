//! Assemble prompts for the generation service
//!
//! Builds a document-state summary that helps the model pick the right
//! action and target, then wraps it with the protocol instructions. The
//! summary is bounded by config so arbitrarily long documents cannot blow
//! up the prompt.

use crate::core::config::AssistantConfig;
use crate::document::engine::DocumentEngine;
use crate::document::model::{Paragraph, SectionInfo};
use crate::llm::client::ChatMessage;
use crate::session::SessionState;

/// Document context for one prompt
pub struct DocumentContext {
    pub document_id: String,
    pub outline: Vec<SectionInfo>,
    pub outline_truncated: bool,
    /// Title and paragraphs of the focused section, when one is focused
    pub focused: Option<FocusedSection>,
    pub selected_text: Option<String>,
    pub language: String,
    /// Short descriptions of recently applied edits, newest last
    pub recent_actions: Vec<String>,
}

pub struct FocusedSection {
    pub title: String,
    pub paragraphs: Vec<Paragraph>,
    pub subtree_paragraph_count: usize,
}

impl DocumentContext {
    /// Gather context from the engine and session
    ///
    /// Focused-section extraction and the behavior summary are best-effort:
    /// their failure degrades the prompt, never the turn.
    pub fn from_engine(
        engine: &impl DocumentEngine,
        session: &SessionState,
        recent_actions: &[String],
        config: &AssistantConfig,
    ) -> Self {
        let full_outline = engine.outline();
        let outline_truncated = full_outline.len() > config.max_outline_sections;
        let outline: Vec<_> = full_outline
            .iter()
            .take(config.max_outline_sections)
            .cloned()
            .collect();

        let focused = session.focused_section().and_then(|section_id| {
            let title = full_outline
                .iter()
                .find(|s| &s.id == section_id)
                .map(|s| s.title.clone())?;
            match engine.extract_section_context(section_id) {
                Ok(context) => Some(FocusedSection {
                    title,
                    paragraphs: context
                        .own_paragraphs
                        .iter()
                        .take(config.max_context_paragraphs)
                        .map(|p| Paragraph {
                            id: p.id.clone(),
                            text: truncate_chars(&p.text, config.max_paragraph_chars),
                        })
                        .collect(),
                    subtree_paragraph_count: context.subtree_paragraphs.len(),
                }),
                Err(e) => {
                    tracing::warn!(section = %section_id, error = %e, "focused-section extraction failed; prompting without it");
                    None
                }
            }
        });

        Self {
            document_id: engine.document_id().to_string(),
            outline,
            outline_truncated,
            focused,
            selected_text: session.selected_text.clone(),
            language: session.preferences.language.clone(),
            recent_actions: recent_actions.to_vec(),
        }
    }

    /// Render the context as prompt text
    pub fn summary(&self) -> String {
        let mut s = String::new();

        s.push_str(&format!("Document: {}\n", self.document_id));
        s.push_str("Outline (by position):\n");
        for (i, section) in self.outline.iter().enumerate() {
            s.push_str(&format!("{}. {} [id: {}]\n", i + 1, section.title, section.id));
        }
        if self.outline_truncated {
            s.push_str("(outline truncated)\n");
        }

        if let Some(focused) = &self.focused {
            s.push_str(&format!("\nFocused section: {}\n", focused.title));
            for p in &focused.paragraphs {
                s.push_str(&format!("[{}] {}\n", p.id, p.text));
            }
            if focused.subtree_paragraph_count > 0 {
                s.push_str(&format!(
                    "({} more paragraphs in subsections)\n",
                    focused.subtree_paragraph_count
                ));
            }
        }

        if let Some(selected) = &self.selected_text {
            s.push_str(&format!("\nSelected text: {}\n", selected));
        }

        if !self.recent_actions.is_empty() {
            s.push_str("\nRecent edits:\n");
            for action in &self.recent_actions {
                s.push_str(&format!("- {}\n", action));
            }
        }

        s.push_str(&format!("\nReply language: {}\n", self.language));
        s
    }
}

/// Build the outbound message list for one turn
pub fn build_messages(context: &DocumentContext, user_text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(RESOLVE_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "CONTEXT:\n{}\nUSER REQUEST:\n{}\n\nRespond with the [action] and [reply] blocks:",
            context.summary(),
            user_text
        )),
    ]
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}…", cut)
}

/// System prompt teaching the two-block protocol
const RESOLVE_SYSTEM_PROMPT: &str = r#"You are the editing assistant for a long structured document.
Decide whether the user wants a concrete document edit or a conversation, then
ALWAYS answer with exactly two blocks.

[action]
One line of JSON:
{"mode": "chat" | "edit",
 "action": "rewrite_section" | "rewrite_paragraph" | "summarize_section" | "summarize_document" | "highlight_terms",
 "target": {"scope": "document" | "section", "section_id": "<id>" | "current" | "auto"},
 "params": {"style": "...", "paragraph_reference": "current|previous|next|nth", "paragraph_index": N, "terms": ["..."]}}
[/action]
[reply]
A short natural-language reply for the user, in their language.
[/reply]

Rules:
- mode "chat" when no edit is wanted; omit action/target/params then.
- Section actions need a section_id: use an outline id, or "current" for the
  focused section, or "auto" if the request clearly implies one.
- Positional references ("chapter 2", "第一章") refer to outline POSITION.
- Never invent section ids that are not in the outline.

Examples:
"polish the methods section" ->
[action]{"mode":"edit","action":"rewrite_section","target":{"scope":"section","section_id":"auto"},"params":{"style":"polish"}}[/action]
[reply]I'll polish the methods section.[/reply]
"what does this document argue?" ->
[action]{"mode":"chat"}[/action]
[reply]The document argues that...[/reply]
"把这一节总结一下" ->
[action]{"mode":"edit","action":"summarize_section","target":{"scope":"section","section_id":"current"}}[/action]
[reply]好的，我来总结这一节。[/reply]
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DocumentId;
    use crate::document::memory::InMemoryDocument;
    use crate::core::types::SectionId;

    fn engine() -> InMemoryDocument {
        InMemoryDocument::new("doc-1")
            .with_section("s1", "Introduction", &["Opening words."])
            .with_section("s2", "Methods", &["First method.", "Second method."])
    }

    #[test]
    fn test_summary_lists_outline_positions() {
        let engine = engine();
        let session = SessionState::new(DocumentId::new("doc-1"));
        let context =
            DocumentContext::from_engine(&engine, &session, &[], &AssistantConfig::default());
        let summary = context.summary();
        assert!(summary.contains("1. Introduction [id: s1]"));
        assert!(summary.contains("2. Methods [id: s2]"));
    }

    #[test]
    fn test_summary_includes_focused_paragraphs() {
        let engine = engine();
        let mut session = SessionState::new(DocumentId::new("doc-1"));
        session.focus_section(SectionId::new("s2"));
        let context =
            DocumentContext::from_engine(&engine, &session, &[], &AssistantConfig::default());
        let summary = context.summary();
        assert!(summary.contains("Focused section: Methods"));
        assert!(summary.contains("First method."));
    }

    #[test]
    fn test_outline_truncation() {
        let mut engine = InMemoryDocument::new("doc-big");
        for i in 0..50 {
            engine = engine.with_section(format!("s{}", i), format!("Section {}", i), &["x"]);
        }
        let session = SessionState::new(DocumentId::new("doc-big"));
        let mut config = AssistantConfig::default();
        config.max_outline_sections = 10;
        let context = DocumentContext::from_engine(&engine, &session, &[], &config);
        assert_eq!(context.outline.len(), 10);
        assert!(context.outline_truncated);
        assert!(context.summary().contains("(outline truncated)"));
    }

    #[test]
    fn test_build_messages_shape() {
        let engine = engine();
        let session = SessionState::new(DocumentId::new("doc-1"));
        let context =
            DocumentContext::from_engine(&engine, &session, &[], &AssistantConfig::default());
        let messages = build_messages(&context, "rewrite the intro");
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.contains("rewrite the intro"));
        assert!(messages[0].content.contains("[action]"));
    }

    #[test]
    fn test_paragraph_truncation() {
        assert_eq!(truncate_chars("short", 10), "short");
        let long = "a".repeat(20);
        let cut = truncate_chars(&long, 10);
        assert!(cut.starts_with("aaaaaaaaaa"));
        assert!(cut.ends_with('…'));
    }
}
