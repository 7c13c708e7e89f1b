//! Resolution orchestrator
//!
//! Coordinates one user turn end to end: rule matching first, then the
//! protocol path through the generation service, then execution via the
//! bridge. Every failure is folded into the returned `TurnResult`; nothing
//! escapes the turn boundary as an error. This type also owns the four
//! entry points a presentation layer needs: `run_turn`,
//! `apply_preview_result`, `cancel_preview_result`, `resolve_clarification`.

use crate::bridge::{
    plan_from_command, plan_from_intent, ExecutionBridge, ExecutionPlan, ExecutionResult,
};
use crate::core::config::AssistantConfig;
use crate::core::types::{PendingId, SectionId, SnapshotId};
use crate::document::engine::DocumentEngine;
use crate::document::model::SectionInfo;
use crate::llm::client::ChatService;
use crate::llm::prompt::{build_messages, DocumentContext};
use crate::llm::protocol::{parse_output, EditIntent, Intent, ParseStatus, SectionRef};
use crate::matcher::{self, Confidence, ResolvedCommand};
use crate::pending::PendingPayload;
use crate::session::SessionState;
use serde::{Deserialize, Serialize};

/// Categorized turn failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    NoDocument,
    EditorNotReady,
    SectionBusy,
    LlmCallFailed,
    IntentMissing,
    IntentMalformed,
    IntentInvalid,
    UnresolvableTarget,
    SectionNotFound,
    EditExecutionFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoDocument => "no-document",
            ErrorCode::EditorNotReady => "editor-not-ready",
            ErrorCode::SectionBusy => "section-busy",
            ErrorCode::LlmCallFailed => "llm-call-failed",
            ErrorCode::IntentMissing => "intent-missing",
            ErrorCode::IntentMalformed => "intent-malformed",
            ErrorCode::IntentInvalid => "intent-invalid",
            ErrorCode::UnresolvableTarget => "unresolvable-target",
            ErrorCode::SectionNotFound => "section-not-found",
            ErrorCode::EditExecutionFailed => "edit-execution-failed",
        }
    }
}

/// Outcome of one user turn
#[derive(Debug)]
pub struct TurnResult {
    /// Always populated, even on failure
    pub reply_text: String,
    pub intent: Option<Intent>,
    /// True when an edit was applied this turn
    pub executed: bool,
    pub edit_result: Option<ExecutionResult>,
    pub error_code: Option<ErrorCode>,
    pub error_message: Option<String>,
}

impl TurnResult {
    fn chat(reply_text: impl Into<String>, intent: Option<Intent>) -> Self {
        Self {
            reply_text: reply_text.into(),
            intent,
            executed: false,
            edit_result: None,
            error_code: None,
            error_message: None,
        }
    }

    fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            reply_text: apology(&message),
            intent: None,
            executed: false,
            edit_result: None,
            error_code: Some(code),
            error_message: Some(message),
        }
    }
}

fn apology(detail: &str) -> String {
    format!("Sorry, I couldn't do that: {}", detail)
}

/// A reply only counts when it has visible content
fn non_empty_reply(reply: String) -> Option<String> {
    if reply.trim().is_empty() {
        None
    } else {
        Some(reply)
    }
}

/// Central coordinator for the resolution cascade
pub struct Orchestrator<E: DocumentEngine, C: ChatService> {
    engine: Option<E>,
    chat: Option<C>,
    session: Option<SessionState>,
    bridge: ExecutionBridge,
    config: AssistantConfig,
    /// Short descriptions of recent applied edits for the behavior summary
    recent_actions: Vec<String>,
    /// Same-section overlap guard; held only while a command executes
    running_section: Option<SectionId>,
}

impl<E: DocumentEngine, C: ChatService> Orchestrator<E, C> {
    pub fn new(config: AssistantConfig) -> Self {
        let bridge = ExecutionBridge::new(&config);
        Self {
            engine: None,
            chat: None,
            session: None,
            bridge,
            config,
            recent_actions: Vec::new(),
            running_section: None,
        }
    }

    pub fn with_chat(mut self, chat: C) -> Self {
        self.chat = Some(chat);
        self
    }

    /// Attach a document. Switching documents resets the session,
    /// including the last-edit memory.
    pub fn open_document(&mut self, engine: E) {
        let document_id = engine.document_id();
        match &mut self.session {
            Some(session) if session.document_id != document_id => {
                session.switch_document(document_id)
            }
            Some(_) => {}
            None => self.session = Some(SessionState::new(document_id)),
        }
        self.engine = Some(engine);
    }

    pub fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut SessionState> {
        self.session.as_mut()
    }

    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut E> {
        self.engine.as_mut()
    }

    /// Run one user turn through the cascade.
    pub async fn run_turn(&mut self, text: &str) -> TurnResult {
        let Self {
            engine,
            chat,
            session,
            bridge,
            config,
            recent_actions,
            running_section,
        } = self;

        let Some(engine) = engine.as_mut() else {
            return TurnResult::error(ErrorCode::NoDocument, "no document is open");
        };
        if !engine.is_ready() {
            return TurnResult::error(ErrorCode::EditorNotReady, "the editor is still loading");
        }

        let session = session.get_or_insert_with(|| SessionState::new(engine.document_id()));
        if session.document_id != engine.document_id() {
            session.switch_document(engine.document_id());
        }

        // Tier 1: the rule matcher. High confidence skips the LLM entirely.
        if let Some(command) = matcher::match_rules(text, session) {
            if command.confidence == Confidence::High {
                tracing::info!(kind = ?command.rough_kind, "rule match; fast path");
                return execute_command(
                    engine,
                    bridge,
                    session,
                    recent_actions,
                    running_section,
                    config,
                    &command,
                );
            }
        }

        // Tier 2: the protocol path.
        let Some(chat) = chat.as_ref() else {
            return TurnResult::error(ErrorCode::LlmCallFailed, "generation service not configured");
        };

        let context = DocumentContext::from_engine(engine, session, recent_actions, config);
        let messages = build_messages(&context, text);
        let raw = match chat.chat(&messages).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "generation service call failed");
                return TurnResult::error(ErrorCode::LlmCallFailed, e.to_string());
            }
        };

        let output = parse_output(&raw);
        // Stripping a reply-less response can leave nothing for the user;
        // the turn still needs a populated reply either way.
        let reply_text = non_empty_reply(output.reply_text);
        let parse_error = match output.parse_status {
            ParseStatus::Ok => None,
            ParseStatus::Missing => Some(ErrorCode::IntentMissing),
            ParseStatus::Malformed => Some(ErrorCode::IntentMalformed),
            ParseStatus::Invalid => Some(ErrorCode::IntentInvalid),
        };
        if let Some(code) = parse_error {
            // A parse problem degrades the turn to chat; the reply still
            // reaches the user.
            return TurnResult {
                reply_text: reply_text
                    .unwrap_or_else(|| apology("the response could not be interpreted")),
                intent: None,
                executed: false,
                edit_result: None,
                error_code: Some(code),
                error_message: Some(format!("action block {}", code.as_str())),
            };
        }

        let chat_reply =
            || reply_text.clone().unwrap_or_else(|| "Sorry, I don't have a response for that.".into());

        let intent = match output.intent {
            Some(intent) => intent,
            None => return TurnResult::chat(chat_reply(), None),
        };

        if !intent.is_executable() {
            // Chat mode, or a recognized action not yet wired for execution
            return TurnResult::chat(chat_reply(), Some(intent));
        }

        let Intent::Edit(edit) = &intent else {
            return TurnResult::chat(chat_reply(), Some(intent));
        };

        let outline = engine.outline();
        let section_id = match resolve_intent_target(edit, text, session, &outline, config) {
            Ok(section_id) => section_id,
            Err(result) => return result,
        };

        let plan = match plan_from_intent(edit, section_id.as_ref()) {
            Ok(plan) => plan,
            Err(e) => return TurnResult::error(ErrorCode::UnresolvableTarget, e.to_string()),
        };

        let mut result = execute_plan(
            engine,
            bridge,
            session,
            recent_actions,
            running_section,
            config,
            section_id,
            &plan,
        );
        // The model's reply is the user-facing text unless execution failed
        // (the failure message wins) or the reply was empty (the execution
        // result's own message is better than silence).
        if result.error_code.is_none() {
            if let Some(reply) = reply_text {
                result.reply_text = reply;
            }
        }
        result.intent = Some(intent);
        result
    }

    /// Apply a previously previewed edit.
    pub fn apply_preview_result(&mut self, id: PendingId) -> bool {
        let Self { engine, bridge, .. } = self;
        let Some(engine) = engine.as_mut() else {
            return false;
        };
        // The recorded action must be the primitive's own name so that
        // refinement phrasing ("again") can continue it via the rule path.
        let recorded = bridge.registry().get(id).map(|p| {
            let action = match &p.payload {
                PendingPayload::Preview { action, .. } => action.clone(),
                PendingPayload::Clarify { request, .. } => request.op.name().to_string(),
            };
            (p.section_id.clone(), action)
        });
        let applied = bridge.apply_preview(engine, id);
        if applied {
            if let (Some(session), Some((Some(section), action))) =
                (self.session.as_mut(), recorded)
            {
                tracing::debug!(section = %section, %action, "preview applied");
                session.record_edit(section, action);
            }
        }
        applied
    }

    /// Drop a previewed edit without touching the document.
    pub fn cancel_preview_result(&mut self, id: PendingId) -> bool {
        self.bridge.cancel_preview(id)
    }

    /// Answer a clarify question; re-executes the primitive with the choice.
    pub fn resolve_clarification(&mut self, id: PendingId, choice: &str) -> ExecutionResult {
        let Self { engine, bridge, .. } = self;
        let Some(engine) = engine.as_mut() else {
            return ExecutionResult::failure("no document is open");
        };
        let section = bridge.registry().get(id).and_then(|p| p.section_id.clone());
        let result = bridge.resolve_clarify(engine, id, choice);
        if result.applied {
            if let (Some(session), Some(section)) = (self.session.as_mut(), section) {
                let action = result
                    .steps
                    .first()
                    .map(|s| s.action.clone())
                    .unwrap_or_else(|| "edit".into());
                session.record_edit(section, action);
            }
        }
        result
    }

    /// Reverse an applied edit from its undo snapshot.
    pub fn undo_edit(&mut self, snapshot_id: SnapshotId) -> bool {
        let Self { engine, bridge, .. } = self;
        let Some(engine) = engine.as_mut() else {
            return false;
        };
        bridge.undo(engine, snapshot_id)
    }

    pub fn bridge(&self) -> &ExecutionBridge {
        &self.bridge
    }
}

/// Execute a rule-matched command: resolve its target, then run the plan.
#[allow(clippy::too_many_arguments)]
fn execute_command<E: DocumentEngine>(
    engine: &mut E,
    bridge: &mut ExecutionBridge,
    session: &mut SessionState,
    recent_actions: &mut Vec<String>,
    running_section: &mut Option<SectionId>,
    config: &AssistantConfig,
    command: &ResolvedCommand,
) -> TurnResult {
    let outline = engine.outline();
    let section_id = match (&command.section_id, command.section_ordinal) {
        (Some(id), _) => Some(id.clone()),
        (None, Some(position)) => match outline.get(position - 1) {
            Some(section) => Some(section.id.clone()),
            None => {
                return TurnResult::error(
                    ErrorCode::SectionNotFound,
                    format!("the document has no section {}", position),
                )
            }
        },
        (None, None) => None,
    };

    let plan = match plan_from_command(command, section_id.as_ref()) {
        Ok(plan) => plan,
        Err(e) => return TurnResult::error(ErrorCode::UnresolvableTarget, e.to_string()),
    };

    execute_plan(
        engine,
        bridge,
        session,
        recent_actions,
        running_section,
        config,
        section_id,
        &plan,
    )
}

/// Run a plan under the same-section guard and fold the outcome into a
/// turn result, updating follow-up state only on applied edits.
#[allow(clippy::too_many_arguments)]
fn execute_plan<E: DocumentEngine>(
    engine: &mut E,
    bridge: &mut ExecutionBridge,
    session: &mut SessionState,
    recent_actions: &mut Vec<String>,
    running_section: &mut Option<SectionId>,
    config: &AssistantConfig,
    section_id: Option<SectionId>,
    plan: &ExecutionPlan,
) -> TurnResult {
    if plan.steps.len() > config.max_compound_steps {
        return TurnResult::error(
            ErrorCode::EditExecutionFailed,
            format!("the request expands to more than {} steps", config.max_compound_steps),
        );
    }

    if let (Some(target), Some(running)) = (&section_id, running_section.as_ref()) {
        if target == running {
            return TurnResult::error(
                ErrorCode::SectionBusy,
                "another edit is already running on that section",
            );
        }
    }

    *running_section = section_id.clone();
    let result = bridge.execute(engine, plan);
    // Guaranteed cleanup: the guard never outlives the command
    *running_section = None;

    if result.applied {
        if let Some(section) = &section_id {
            // A failed edit must not poison follow-up resolution, so this
            // happens only when something actually landed.
            session.record_edit(section.clone(), plan.label.clone());
        }
        recent_actions.push(format!("{} ({})", plan.label, result.message));
        let cap = config.max_behavior_events;
        if recent_actions.len() > cap {
            let excess = recent_actions.len() - cap;
            recent_actions.drain(..excess);
        }
    }

    if !result.success {
        let detail = result
            .error
            .clone()
            .unwrap_or_else(|| "edit execution failed".into());
        return TurnResult {
            reply_text: apology(&detail),
            intent: None,
            executed: result.applied,
            edit_result: Some(result),
            error_code: Some(ErrorCode::EditExecutionFailed),
            error_message: Some(detail),
        };
    }

    TurnResult {
        reply_text: result.message.clone(),
        intent: None,
        executed: result.applied,
        edit_result: Some(result),
        error_code: None,
        error_message: None,
    }
}

/// Resolve an intent's section target: explicit reference first, then the
/// session focus, then the last-edit fallback. Follow-up phrasing keeps the
/// sentinel `current` meaningful even without a focused section.
fn resolve_intent_target(
    edit: &EditIntent,
    text: &str,
    session: &SessionState,
    outline: &[SectionInfo],
    config: &AssistantConfig,
) -> Result<Option<SectionId>, TurnResult> {
    let Some(reference) = edit.section() else {
        // Document-scoped action
        return Ok(None);
    };

    let fallback = |code: ErrorCode, detail: String| -> Result<Option<SectionId>, TurnResult> {
        Err(TurnResult::error(code, detail))
    };

    match reference {
        SectionRef::Explicit(id) => {
            match matcher::resolve_section_reference(id.as_str(), outline) {
                Some(resolved) => Ok(Some(resolved)),
                None => fallback(
                    ErrorCode::SectionNotFound,
                    format!("no section matches \"{}\"", id),
                ),
            }
        }
        SectionRef::Current => {
            if let Some(focus) = session.focused_section() {
                return Ok(Some(focus.clone()));
            }
            // Without a focused section, the last edit stands in for
            // `current`: unconditionally inside the recency window, and even
            // past it when the phrasing is clearly a follow-up.
            if let Some(last) = &session.last_edit {
                let recent = session.recent_edit(config.follow_up_window_ms).is_some();
                if recent || matcher::is_refinement(text) {
                    return Ok(Some(last.section_id.clone()));
                }
            }
            fallback(
                ErrorCode::UnresolvableTarget,
                "no section is in focus and there is no recent edit to continue".into(),
            )
        }
        SectionRef::Auto => {
            if let Some(focus) = session.focused_section() {
                return Ok(Some(focus.clone()));
            }
            if let Some(last) = session.recent_edit(config.follow_up_window_ms) {
                return Ok(Some(last.section_id.clone()));
            }
            match outline.first() {
                Some(section) => Ok(Some(section.id.clone())),
                None => fallback(
                    ErrorCode::UnresolvableTarget,
                    "the document has no sections".into(),
                ),
            }
        }
    }
}
