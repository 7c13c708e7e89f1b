//! Keyword/phrase rule matcher
//!
//! The cheap tier of the resolution cascade: decide from phrase membership
//! plus current focus whether a command is obvious enough to execute
//! without calling the generation service. Everything here is deterministic
//! and side-effect free given (text, session).
//!
//! The refinement marker list below is the single follow-up policy for the
//! whole pipeline; the orchestrator reuses `is_refinement` instead of
//! keeping its own list.

use crate::core::types::{DocumentId, SectionId};
use crate::document::model::SectionInfo;
use crate::session::SessionState;
use serde::{Deserialize, Serialize};

/// Coarse category assigned to user text before full resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoughKind {
    Rewrite,
    Summarize,
    Translate,
    Expand,
    Highlight,
    Unknown,
}

/// How sure the rule path is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    High,
    Low,
}

/// What a matched command operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandScope {
    Document,
    Section,
    Selection,
}

/// One primitive-sized step of a matched command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStepKind {
    Rewrite,
    Summarize,
    Highlight,
}

/// The matched command itself; compound phrasing merges into one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Single(CommandStepKind),
    Compound(Vec<CommandStepKind>),
}

impl CommandKind {
    pub fn steps(&self) -> Vec<CommandStepKind> {
        match self {
            CommandKind::Single(step) => vec![*step],
            CommandKind::Compound(steps) => steps.clone(),
        }
    }
}

/// Free-form options attached to a matched command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOptions {
    /// Style hint for rewrites ("shorter", "more formal")
    pub style: Option<String>,
    /// Explicit highlight terms, when the phrasing names them
    pub terms: Vec<String>,
    /// Selected text for selection-scoped commands
    pub selected_text: Option<String>,
}

/// The rule path's equivalent of a validated intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub command: CommandKind,
    pub scope: CommandScope,
    pub document_id: DocumentId,
    pub section_id: Option<SectionId>,
    pub section_title: Option<String>,
    /// Positional reference ("第一章", "chapter 2"), 1-based, resolved
    /// against the outline by the orchestrator
    pub section_ordinal: Option<usize>,
    pub options: CommandOptions,
    pub confidence: Confidence,
    pub rough_kind: RoughKind,
}

// Keyword tables. Priority order matters: rewrite-like phrasing outranks
// generic highlight words so a rewrite never collapses into a
// highlight-only action.
const REWRITE_WORDS: &[&str] = &[
    "rewrite", "rephrase", "revise", "polish", "reword", "改写", "重写", "润色", "修改", "改",
];
const SUMMARIZE_WORDS: &[&str] = &["summarize", "summary", "总结", "概括", "摘要"];
const TRANSLATE_WORDS: &[&str] = &["translate", "翻译"];
const EXPAND_WORDS: &[&str] = &["expand", "elaborate", "flesh out", "扩写", "扩充", "展开"];
const HIGHLIGHT_WORDS: &[&str] = &["highlight", "mark", "key point", "标记", "重点", "标注"];

const REFINEMENT_MARKERS: &[&str] = &[
    "again",
    "make it",
    "more formal",
    "more casual",
    "shorter",
    "longer",
    "instead",
    "再",
    "更",
    "一点",
    "还是",
];

fn contains_any(lower: &str, words: &[&str]) -> bool {
    words.iter().any(|w| lower.contains(w))
}

/// Classify user text into a coarse category. Pure; first rule in priority
/// order wins when several match.
pub fn classify(text: &str) -> RoughKind {
    let lower = text.to_lowercase();
    if contains_any(&lower, REWRITE_WORDS) {
        RoughKind::Rewrite
    } else if contains_any(&lower, SUMMARIZE_WORDS) {
        RoughKind::Summarize
    } else if contains_any(&lower, TRANSLATE_WORDS) {
        RoughKind::Translate
    } else if contains_any(&lower, EXPAND_WORDS) {
        RoughKind::Expand
    } else if contains_any(&lower, HIGHLIGHT_WORDS) {
        RoughKind::Highlight
    } else {
        RoughKind::Unknown
    }
}

/// Continuation/refinement phrasing ("again", "再改短一点")
pub fn is_refinement(text: &str) -> bool {
    let lower = text.to_lowercase();
    contains_any(&lower, REFINEMENT_MARKERS)
}

/// Style hint extracted from refinement phrasing
pub fn refinement_style(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    if lower.contains("shorter") || lower.contains('短') {
        Some("shorter".into())
    } else if lower.contains("longer") || lower.contains('长') {
        Some("longer".into())
    } else if lower.contains("formal") || lower.contains("正式") {
        Some("more formal".into())
    } else if lower.contains("casual") || lower.contains("口语") {
        Some("more casual".into())
    } else {
        None
    }
}

/// Parse a positional section reference out of free text, 1-based.
///
/// Recognizes "第N章/节/部分" (digits or simple Chinese numerals),
/// "chapter N" / "section N" / "part N", and "first..tenth section".
pub fn parse_section_ordinal(text: &str) -> Option<usize> {
    let lower = text.to_lowercase();

    if let Some(pos) = lower.find('第') {
        let rest = &lower[pos + '第'.len_utf8()..];
        if rest.chars().any(|c| matches!(c, '章' | '节' | '部')) {
            let numeral: String = rest
                .chars()
                .take_while(|c| !matches!(c, '章' | '节' | '部'))
                .collect();
            if let Some(n) = parse_numeral(numeral.trim()) {
                return Some(n);
            }
        }
    }

    for marker in ["chapter ", "section ", "part "] {
        if let Some(pos) = lower.find(marker) {
            let digits: String = lower[pos + marker.len()..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if let Ok(n) = digits.parse::<usize>() {
                if n >= 1 {
                    return Some(n);
                }
            }
        }
    }

    const ORDINAL_WORDS: [(&str, usize); 10] = [
        ("first", 1),
        ("second", 2),
        ("third", 3),
        ("fourth", 4),
        ("fifth", 5),
        ("sixth", 6),
        ("seventh", 7),
        ("eighth", 8),
        ("ninth", 9),
        ("tenth", 10),
    ];
    let names_a_section =
        lower.contains("section") || lower.contains("chapter") || lower.contains("part");
    if names_a_section {
        for (word, n) in ORDINAL_WORDS {
            if lower.contains(word) {
                return Some(n);
            }
        }
    }

    None
}

fn parse_numeral(s: &str) -> Option<usize> {
    if let Ok(n) = s.parse::<usize>() {
        return (n >= 1).then_some(n);
    }
    match s {
        "一" => Some(1),
        "二" => Some(2),
        "三" => Some(3),
        "四" => Some(4),
        "五" => Some(5),
        "六" => Some(6),
        "七" => Some(7),
        "八" => Some(8),
        "九" => Some(9),
        "十" => Some(10),
        _ => None,
    }
}

/// Resolve a section reference against the outline: exact id first, then
/// positional index. Never matches by title.
pub fn resolve_section_reference(reference: &str, outline: &[SectionInfo]) -> Option<SectionId> {
    let trimmed = reference.trim();
    if let Some(section) = outline.iter().find(|s| s.id.as_str() == trimmed) {
        return Some(section.id.clone());
    }
    let position = parse_section_ordinal(trimmed)?;
    outline.get(position - 1).map(|s| s.id.clone())
}

/// Match user text against the rule cascade.
///
/// Returns a high-confidence command only when the target is unambiguous;
/// anything uncertain falls through to the protocol path (None or a
/// low-confidence command the orchestrator will not execute directly).
pub fn match_rules(text: &str, session: &SessionState) -> Option<ResolvedCommand> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_lowercase();

    // Refinement is checked first: it overrides scope inference by reusing
    // the last edit's section.
    if is_refinement(trimmed) {
        if let Some(last) = &session.last_edit {
            let step = match classify(trimmed) {
                RoughKind::Rewrite => Some(CommandStepKind::Rewrite),
                RoughKind::Summarize => Some(CommandStepKind::Summarize),
                RoughKind::Highlight => Some(CommandStepKind::Highlight),
                // "make it shorter" names no action; continue the last one
                RoughKind::Unknown => step_for_action(&last.action),
                RoughKind::Translate | RoughKind::Expand => None,
            };
            if let Some(step) = step {
                tracing::debug!(section = %last.section_id, "refinement matched; reusing last edit target");
                return Some(ResolvedCommand {
                    command: CommandKind::Single(step),
                    scope: CommandScope::Section,
                    document_id: session.document_id.clone(),
                    section_id: Some(last.section_id.clone()),
                    section_title: None,
                    section_ordinal: None,
                    options: CommandOptions {
                        style: refinement_style(trimmed),
                        ..Default::default()
                    },
                    confidence: Confidence::High,
                    rough_kind: classify(trimmed),
                });
            }
        }
    }

    // Compound phrasing: rewrite + mark-key-content in one clause becomes
    // one command with ordered steps, not two commands.
    let wants_rewrite = contains_any(&lower, REWRITE_WORDS);
    let wants_highlight = contains_any(&lower, HIGHLIGHT_WORDS);
    let wants_summary = contains_any(&lower, SUMMARIZE_WORDS);
    if wants_rewrite && wants_highlight {
        let mut steps = vec![CommandStepKind::Rewrite, CommandStepKind::Highlight];
        if wants_summary {
            steps.push(CommandStepKind::Summarize);
        }
        return build_section_command(
            CommandKind::Compound(steps),
            RoughKind::Rewrite,
            trimmed,
            session,
        );
    }

    match classify(trimmed) {
        RoughKind::Rewrite => {
            if let Some(selected) = selection_target(session) {
                return Some(selection_command(
                    CommandStepKind::Rewrite,
                    RoughKind::Rewrite,
                    trimmed,
                    selected,
                    session,
                ));
            }
            build_section_command(
                CommandKind::Single(CommandStepKind::Rewrite),
                RoughKind::Rewrite,
                trimmed,
                session,
            )
        }
        RoughKind::Highlight => build_section_command(
            CommandKind::Single(CommandStepKind::Highlight),
            RoughKind::Highlight,
            trimmed,
            session,
        ),
        RoughKind::Summarize => {
            if let Some(command) = build_section_command(
                CommandKind::Single(CommandStepKind::Summarize),
                RoughKind::Summarize,
                trimmed,
                session,
            ) {
                return Some(command);
            }
            // Document-scoped summarize is plausible but not a sure thing
            Some(ResolvedCommand {
                command: CommandKind::Single(CommandStepKind::Summarize),
                scope: CommandScope::Document,
                document_id: session.document_id.clone(),
                section_id: None,
                section_title: None,
                section_ordinal: None,
                options: CommandOptions::default(),
                confidence: Confidence::Low,
                rough_kind: RoughKind::Summarize,
            })
        }
        // Recognized but not rule-executable; let the protocol path decide
        RoughKind::Translate | RoughKind::Expand | RoughKind::Unknown => None,
    }
}

/// Section-scoped command when a target is resolvable: focused section or a
/// positional reference in the text itself.
fn build_section_command(
    command: CommandKind,
    rough_kind: RoughKind,
    text: &str,
    session: &SessionState,
) -> Option<ResolvedCommand> {
    let ordinal = parse_section_ordinal(text);
    let section_id = match ordinal {
        Some(_) => None,
        None => session.focused_section().cloned(),
    };
    if ordinal.is_none() && section_id.is_none() {
        return None;
    }

    Some(ResolvedCommand {
        command,
        scope: CommandScope::Section,
        document_id: session.document_id.clone(),
        section_id,
        section_title: None,
        section_ordinal: ordinal,
        options: CommandOptions {
            style: refinement_style(text),
            ..Default::default()
        },
        confidence: Confidence::High,
        rough_kind,
    })
}

fn selection_target(session: &SessionState) -> Option<String> {
    let selected = session.selected_text.as_ref()?;
    // A selection command still needs a section to edit within
    session.focused_section()?;
    Some(selected.clone())
}

fn selection_command(
    step: CommandStepKind,
    rough_kind: RoughKind,
    text: &str,
    selected: String,
    session: &SessionState,
) -> ResolvedCommand {
    ResolvedCommand {
        command: CommandKind::Single(step),
        scope: CommandScope::Selection,
        document_id: session.document_id.clone(),
        section_id: session.focused_section().cloned(),
        section_title: None,
        section_ordinal: None,
        options: CommandOptions {
            style: refinement_style(text),
            selected_text: Some(selected),
            ..Default::default()
        },
        confidence: Confidence::High,
        rough_kind,
    }
}

fn step_for_action(action: &str) -> Option<CommandStepKind> {
    match action {
        "rewrite_section" | "rewrite_paragraph" => Some(CommandStepKind::Rewrite),
        "summarize_section" | "summarize_document" => Some(CommandStepKind::Summarize),
        "highlight_terms" => Some(CommandStepKind::Highlight),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionState {
        SessionState::new(DocumentId::new("doc-1"))
    }

    #[test]
    fn test_classify_priority_rewrite_over_highlight() {
        // Phrasing that mentions both must classify as rewrite
        assert_eq!(classify("rewrite this and highlight the key point"), RoughKind::Rewrite);
        assert_eq!(classify("改写并标记重点"), RoughKind::Rewrite);
    }

    #[test]
    fn test_classify_categories() {
        assert_eq!(classify("please summarize the intro"), RoughKind::Summarize);
        assert_eq!(classify("translate to english"), RoughKind::Translate);
        assert_eq!(classify("expand on this idea"), RoughKind::Expand);
        assert_eq!(classify("highlight throughput"), RoughKind::Highlight);
        assert_eq!(classify("what's the weather"), RoughKind::Unknown);
    }

    #[test]
    fn test_empty_text_matches_nothing() {
        assert!(match_rules("", &session()).is_none());
        assert!(match_rules("   \n", &session()).is_none());
    }

    #[test]
    fn test_no_target_no_match() {
        // Rewrite with no focus, no ordinal, no selection
        assert!(match_rules("rewrite it", &session()).is_none());
    }

    #[test]
    fn test_focused_section_gives_high_confidence() {
        let mut s = session();
        s.focus_section(SectionId::new("s3"));
        let cmd = match_rules("润色一下", &s).unwrap();
        assert_eq!(cmd.confidence, Confidence::High);
        assert_eq!(cmd.section_id, Some(SectionId::new("s3")));
        assert_eq!(cmd.command, CommandKind::Single(CommandStepKind::Rewrite));
    }

    #[test]
    fn test_ordinal_reference_captured() {
        let cmd = match_rules("改写第一章", &session()).unwrap();
        assert_eq!(cmd.section_ordinal, Some(1));
        assert_eq!(cmd.confidence, Confidence::High);
        assert!(cmd.section_id.is_none());
    }

    #[test]
    fn test_compound_rewrite_and_highlight_is_one_command() {
        let mut s = session();
        s.focus_section(SectionId::new("s1"));
        let cmd = match_rules("改写并标记重点", &s).unwrap();
        match cmd.command {
            CommandKind::Compound(steps) => {
                assert_eq!(
                    steps,
                    vec![CommandStepKind::Rewrite, CommandStepKind::Highlight]
                );
            }
            other => panic!("expected compound, got {:?}", other),
        }
    }

    #[test]
    fn test_refinement_reuses_last_edit_section() {
        let mut s = session();
        s.record_edit(SectionId::new("s2"), "rewrite_section");
        let cmd = match_rules("再改短一点", &s).unwrap();
        assert_eq!(cmd.section_id, Some(SectionId::new("s2")));
        assert_eq!(cmd.options.style.as_deref(), Some("shorter"));
        assert_eq!(cmd.confidence, Confidence::High);
    }

    #[test]
    fn test_refinement_without_history_falls_through() {
        // "make it shorter" with no last edit: no rule match
        assert!(match_rules("make it shorter", &session()).is_none());
    }

    #[test]
    fn test_refinement_unknown_action_continues_last_task() {
        let mut s = session();
        s.record_edit(SectionId::new("s4"), "summarize_section");
        let cmd = match_rules("again please", &s).unwrap();
        assert_eq!(cmd.command, CommandKind::Single(CommandStepKind::Summarize));
        assert_eq!(cmd.section_id, Some(SectionId::new("s4")));
    }

    #[test]
    fn test_document_summarize_is_low_confidence() {
        let cmd = match_rules("summarize the whole thing", &session()).unwrap();
        assert_eq!(cmd.confidence, Confidence::Low);
        assert_eq!(cmd.scope, CommandScope::Document);
    }

    #[test]
    fn test_selection_command() {
        let mut s = session();
        s.focus_section(SectionId::new("s1"));
        s.selected_text = Some("the selected clause".into());
        let cmd = match_rules("rephrase this", &s).unwrap();
        assert_eq!(cmd.scope, CommandScope::Selection);
        assert_eq!(
            cmd.options.selected_text.as_deref(),
            Some("the selected clause")
        );
    }

    #[test]
    fn test_ordinal_parsing() {
        assert_eq!(parse_section_ordinal("第一章"), Some(1));
        assert_eq!(parse_section_ordinal("改写第三节"), Some(3));
        assert_eq!(parse_section_ordinal("第2章"), Some(2));
        assert_eq!(parse_section_ordinal("rewrite chapter 4"), Some(4));
        assert_eq!(parse_section_ordinal("the second section"), Some(2));
        assert_eq!(parse_section_ordinal("no reference here"), None);
        assert_eq!(parse_section_ordinal("第十章"), Some(10));
    }

    #[test]
    fn test_resolve_reference_by_position_not_title() {
        let outline = vec![
            SectionInfo::new("intro", "第一章 绪论"),
            SectionInfo::new("background", "背景"),
            SectionInfo::new("methods", "方法"),
            SectionInfo::new("results", "结果"),
            SectionInfo::new("conclusion", "结论"),
        ];
        // Positional: first section, even though a later title could match
        assert_eq!(
            resolve_section_reference("第一章", &outline),
            Some(SectionId::new("intro"))
        );
        assert_eq!(
            resolve_section_reference("第五章", &outline),
            Some(SectionId::new("conclusion"))
        );
        assert_eq!(resolve_section_reference("第六章", &outline), None);
        // Exact id wins
        assert_eq!(
            resolve_section_reference("methods", &outline),
            Some(SectionId::new("methods"))
        );
    }
}
