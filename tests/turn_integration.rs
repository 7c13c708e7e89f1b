//! End-to-end turns through the resolution cascade

mod common;

use common::{demo_document, orchestrator_with, protocol_reply, ScriptedChat};
use draftpilot::core::config::AssistantConfig;
use draftpilot::core::types::SectionId;
use draftpilot::document::engine::DocumentEngine;
use draftpilot::document::memory::InMemoryDocument;
use draftpilot::llm::protocol::Intent;
use draftpilot::orchestrator::{ErrorCode, Orchestrator};

#[tokio::test]
async fn test_no_document_reports_error() {
    let mut orchestrator: Orchestrator<InMemoryDocument, ScriptedChat> =
        Orchestrator::new(AssistantConfig::default());
    let result = orchestrator.run_turn("改写第一章").await;
    assert_eq!(result.error_code, Some(ErrorCode::NoDocument));
    assert!(!result.executed);
    assert!(!result.reply_text.is_empty());
}

#[tokio::test]
async fn test_not_ready_editor_reports_error() {
    let mut engine = demo_document();
    engine.set_ready(false);
    let mut orchestrator = orchestrator_with(ScriptedChat::new(), engine);
    let result = orchestrator.run_turn("改写第一章").await;
    assert_eq!(result.error_code, Some(ErrorCode::EditorNotReady));
}

#[tokio::test]
async fn test_positional_chapter_reference_resolves_first_section() {
    // "第一章" resolves by outline position; the chat service is never
    // consulted (an empty script would fail the turn if it were).
    let mut orchestrator = orchestrator_with(ScriptedChat::new(), demo_document());
    let result = orchestrator.run_turn("帮我改写第一章").await;

    assert!(result.executed, "expected an applied edit: {:?}", result);
    assert!(result.error_code.is_none());
    let engine = orchestrator.engine().unwrap();
    assert!(engine.paragraph_text("p1").unwrap().contains("(revised)"));
    let session = orchestrator.session().unwrap();
    assert_eq!(
        session.last_edit.as_ref().map(|e| &e.section_id),
        Some(&SectionId::new("s1"))
    );
}

#[tokio::test]
async fn test_out_of_range_chapter_reports_section_not_found() {
    let mut orchestrator = orchestrator_with(ScriptedChat::new(), demo_document());
    let result = orchestrator.run_turn("改写第九章").await;
    assert_eq!(result.error_code, Some(ErrorCode::SectionNotFound));
    assert!(!result.executed);
}

#[tokio::test]
async fn test_rewrite_previous_paragraph_without_context_is_unresolvable() {
    // No focus and no edit history: the model resolves "上一段" to the
    // `current` sentinel, which has nothing to bind to.
    let chat = ScriptedChat::new().reply(protocol_reply(
        r#"{"mode":"edit","action":"rewrite_section","target":{"scope":"section","section_id":"current"}}"#,
        "我来改写当前段落。",
    ));
    let mut orchestrator = orchestrator_with(chat, demo_document());
    let result = orchestrator.run_turn("帮我改写上一段").await;

    assert_eq!(result.error_code, Some(ErrorCode::UnresolvableTarget));
    assert!(!result.executed);
    let engine = orchestrator.engine().unwrap();
    assert!(!engine.paragraph_text("p1").unwrap().contains("revised"));
}

#[tokio::test]
async fn test_follow_up_reuses_last_edit_section() {
    let mut orchestrator = orchestrator_with(ScriptedChat::new(), demo_document());

    let first = orchestrator.run_turn("总结第二章").await;
    assert!(first.executed);
    assert_eq!(
        orchestrator
            .session()
            .unwrap()
            .last_edit
            .as_ref()
            .map(|e| &e.section_id),
        Some(&SectionId::new("s2"))
    );

    // "再改短一点" names no section; it continues on s2 with a shorter style.
    let second = orchestrator.run_turn("再改短一点").await;
    assert!(second.executed, "follow-up should apply: {:?}", second);
    let engine = orchestrator.engine().unwrap();
    assert_eq!(engine.paragraph_text("p2").unwrap(), "Alpha sentence.");
}

#[tokio::test]
async fn test_compound_rewrite_and_highlight_runs_both_steps() {
    let mut orchestrator = orchestrator_with(ScriptedChat::new(), demo_document());
    let result = orchestrator.run_turn("改写第一章并标记重点").await;

    assert!(result.executed);
    let edit = result.edit_result.unwrap();
    assert_eq!(edit.steps.len(), 2);
    assert!(edit.steps.iter().all(|s| s.applied));

    let engine = orchestrator.engine().unwrap();
    let text = engine.paragraph_text("p1").unwrap();
    assert!(text.contains("(revised)"), "rewrite step missing: {}", text);
    assert!(text.contains("**"), "highlight step missing: {}", text);
}

#[tokio::test]
async fn test_chat_mode_reply_passes_through() {
    let chat = ScriptedChat::new().reply(protocol_reply(
        r#"{"mode":"chat"}"#,
        "这篇文档主要讨论解析策略。",
    ));
    let mut orchestrator = orchestrator_with(chat, demo_document());
    let result = orchestrator.run_turn("这篇文档讲了什么？").await;

    assert!(result.error_code.is_none());
    assert!(!result.executed);
    assert_eq!(result.reply_text, "这篇文档主要讨论解析策略。");
    assert_eq!(result.intent, Some(Intent::Chat));
}

#[tokio::test]
async fn test_missing_action_block_degrades_to_chat() {
    let chat = ScriptedChat::new().reply("Just prose, no blocks at all.");
    let mut orchestrator = orchestrator_with(chat, demo_document());
    let result = orchestrator.run_turn("do something unusual").await;

    assert_eq!(result.error_code, Some(ErrorCode::IntentMissing));
    assert!(!result.executed);
    assert_eq!(result.reply_text, "Just prose, no blocks at all.");
}

#[tokio::test]
async fn test_malformed_action_payload_degrades_to_chat() {
    let chat = ScriptedChat::new().reply(protocol_reply("not json", "Here is prose instead."));
    let mut orchestrator = orchestrator_with(chat, demo_document());
    let result = orchestrator.run_turn("do something unusual").await;
    assert_eq!(result.error_code, Some(ErrorCode::IntentMalformed));
    assert_eq!(result.reply_text, "Here is prose instead.");
}

#[tokio::test]
async fn test_reply_less_malformed_action_still_answers() {
    // The whole response is one broken action block; stripping it leaves
    // nothing, so the turn substitutes an apology instead of going silent.
    let chat = ScriptedChat::new().reply("[action]{not json[/action]");
    let mut orchestrator = orchestrator_with(chat, demo_document());
    let result = orchestrator.run_turn("do something unusual").await;

    assert_eq!(result.error_code, Some(ErrorCode::IntentMalformed));
    assert!(!result.executed);
    assert!(!result.reply_text.is_empty(), "turn went silent: {:?}", result);
}

#[tokio::test]
async fn test_reply_less_executed_action_keeps_result_message() {
    // A valid action with no prose around it: the edit applies and the
    // execution result's own message stands in for the missing reply.
    let chat = ScriptedChat::new().reply(
        r#"[action]{"mode":"edit","action":"summarize_section","target":{"scope":"section","section_id":"s3"}}[/action]"#,
    );
    let mut orchestrator = orchestrator_with(chat, demo_document());
    let result = orchestrator.run_turn("总结一下最后那部分好吗").await;

    assert!(result.executed, "expected applied edit: {:?}", result);
    assert!(result.error_code.is_none());
    assert!(!result.reply_text.is_empty(), "turn went silent: {:?}", result);
    let engine = orchestrator.engine().unwrap();
    let context = engine
        .extract_section_context(&SectionId::new("s3"))
        .unwrap();
    assert!(context.own_paragraphs.last().unwrap().text.starts_with("Summary:"));
}

#[tokio::test]
async fn test_invalid_action_schema_degrades_to_chat() {
    let chat = ScriptedChat::new().reply(protocol_reply(
        r#"{"mode":"edit","action":"delete_everything"}"#,
        "I can't do that.",
    ));
    let mut orchestrator = orchestrator_with(chat, demo_document());
    let result = orchestrator.run_turn("do something unusual").await;
    assert_eq!(result.error_code, Some(ErrorCode::IntentInvalid));
    assert!(!result.executed);
}

#[tokio::test]
async fn test_llm_failure_reports_call_failed() {
    let chat = ScriptedChat::new().failing("connection refused");
    let mut orchestrator = orchestrator_with(chat, demo_document());
    let result = orchestrator.run_turn("do something unusual").await;
    assert_eq!(result.error_code, Some(ErrorCode::LlmCallFailed));
}

#[tokio::test]
async fn test_missing_chat_service_reports_call_failed() {
    let mut orchestrator: Orchestrator<InMemoryDocument, ScriptedChat> =
        Orchestrator::new(AssistantConfig::default());
    orchestrator.open_document(demo_document());
    let result = orchestrator.run_turn("do something unusual").await;
    assert_eq!(result.error_code, Some(ErrorCode::LlmCallFailed));
}

#[tokio::test]
async fn test_unwired_action_validates_but_degrades_to_chat() {
    // highlight_terms parses and validates, but only section rewrite and
    // summarize are wired for execution.
    let chat = ScriptedChat::new().reply(protocol_reply(
        r#"{"mode":"edit","action":"highlight_terms","target":{"scope":"section","section_id":"s1"},"params":{"terms":["Opening"]}}"#,
        "I would mark \"Opening\" in the intro.",
    ));
    let mut orchestrator = orchestrator_with(chat, demo_document());
    let result = orchestrator.run_turn("mark the word Opening in the intro").await;

    assert!(result.error_code.is_none());
    assert!(!result.executed);
    assert!(result.intent.is_some());
    let engine = orchestrator.engine().unwrap();
    assert!(!engine.paragraph_text("p1").unwrap().contains("**"));
}

#[tokio::test]
async fn test_protocol_summarize_with_explicit_section_executes() {
    let chat = ScriptedChat::new().reply(protocol_reply(
        r#"{"mode":"edit","action":"summarize_section","target":{"scope":"section","section_id":"s3"}}"#,
        "结论部分的总结已经加上。",
    ));
    // "总结一下最后那部分" has no ordinal and no focus, so the rule tier
    // yields only a low-confidence document command and defers to the model.
    let mut orchestrator = orchestrator_with(chat, demo_document());
    let result = orchestrator.run_turn("总结一下最后那部分好吗").await;

    assert!(result.executed, "expected applied edit: {:?}", result);
    assert_eq!(result.reply_text, "结论部分的总结已经加上。");
    let engine = orchestrator.engine().unwrap();
    let context = engine
        .extract_section_context(&SectionId::new("s3"))
        .unwrap();
    assert_eq!(context.own_paragraphs.len(), 2);
    assert!(context.own_paragraphs[1].text.starts_with("Summary:"));
}

#[tokio::test]
async fn test_failed_edit_preserves_follow_up_state() {
    let mut orchestrator = orchestrator_with(ScriptedChat::new(), demo_document());

    let first = orchestrator.run_turn("总结第二章").await;
    assert!(first.executed);

    orchestrator.engine_mut().unwrap().force_error("engine down");
    let second = orchestrator.run_turn("改写第一章").await;
    assert_eq!(second.error_code, Some(ErrorCode::EditExecutionFailed));
    assert!(!second.executed);

    // The failure must not overwrite the last-edit memory.
    assert_eq!(
        orchestrator
            .session()
            .unwrap()
            .last_edit
            .as_ref()
            .map(|e| &e.section_id),
        Some(&SectionId::new("s2"))
    );

    // And the guard is released: the next turn runs normally.
    let third = orchestrator.run_turn("改写第一章").await;
    assert!(third.executed, "guard not released: {:?}", third);
}

#[tokio::test]
async fn test_switching_documents_clears_edit_history() {
    let mut orchestrator = orchestrator_with(ScriptedChat::new(), demo_document());
    let first = orchestrator.run_turn("改写第一章").await;
    assert!(first.executed);
    assert!(orchestrator.session().unwrap().last_edit.is_some());

    orchestrator.open_document(
        InMemoryDocument::new("other-doc").with_section("a1", "Alpha", &["Text."]),
    );
    let session = orchestrator.session().unwrap();
    assert_eq!(session.document_id.as_str(), "other-doc");
    assert!(session.last_edit.is_none());
}
