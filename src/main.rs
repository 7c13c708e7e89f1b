//! Draftpilot - Entry Point
//!
//! Interactive shell for the editing assistant. Opens a demo document,
//! wires up the LLM client when credentials are present, and routes each
//! input line through the resolution cascade. Pending previews and clarify
//! questions are answered with the `apply`, `cancel`, and `resolve`
//! commands.

use clap::Parser;
use draftpilot::core::config::AssistantConfig;
use draftpilot::core::error::Result;
use draftpilot::core::types::{PendingId, SnapshotId};
use draftpilot::document::engine::DocumentEngine;
use draftpilot::document::memory::InMemoryDocument;
use draftpilot::llm::client::LlmClient;
use draftpilot::orchestrator::Orchestrator;

use std::io::{self, Write};
use std::str::FromStr;
use tokio::runtime::Runtime;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "draftpilot", about = "Natural-language document editing assistant")]
struct Args {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<String>,

    /// Preview section rewrites instead of applying them directly
    #[arg(long)]
    preview_rewrites: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "draftpilot=debug".into()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    tracing::info!("Draftpilot starting...");

    let rt = Runtime::new()?;

    let mut orchestrator: Orchestrator<InMemoryDocument, LlmClient> =
        Orchestrator::new(config);
    let llm_available = match LlmClient::from_env() {
        Ok(client) => {
            orchestrator = orchestrator.with_chat(client);
            true
        }
        Err(_) => {
            tracing::warn!("LLM_API_KEY not set - only keyword commands will work");
            false
        }
    };

    orchestrator.open_document(demo_document(args.preview_rewrites));

    println!("\n=== DRAFTPILOT ===");
    println!("Natural-language editing over an in-memory demo document");
    println!();
    println!("Commands:");
    println!("  outline                - Show the document outline");
    println!("  show <section-id>      - Print a section's paragraphs");
    println!("  focus <section-id>     - Focus a section for follow-ups");
    println!("  apply <pending-id>     - Apply a previewed edit");
    println!("  cancel <pending-id>    - Discard a previewed edit");
    println!("  resolve <id> <choice>  - Answer a clarify question");
    println!("  undo <snapshot-id>     - Reverse an applied edit");
    println!("  quit / q               - Exit");
    if llm_available {
        println!("  <any text>             - Natural-language editing request");
    } else {
        println!("  <any text>             - Keyword commands only (no API key)");
    }
    println!();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "q" {
            break;
        }

        let mut parts = input.splitn(3, ' ');
        let head = parts.next().unwrap_or_default();
        match head {
            "outline" => {
                if let Some(engine) = orchestrator.engine() {
                    for (i, section) in engine.outline().iter().enumerate() {
                        println!("  {}. {} [id: {}]", i + 1, section.title, section.id);
                    }
                }
            }
            "show" => match parts.next() {
                Some(id) => show_section(&orchestrator, id),
                None => println!("usage: show <section-id>"),
            },
            "focus" => match parts.next() {
                Some(id) => {
                    if let Some(session) = orchestrator.session_mut() {
                        session.focus_section(draftpilot::core::types::SectionId::new(id));
                        println!("focused {}", id);
                    }
                }
                None => println!("usage: focus <section-id>"),
            },
            "apply" => match parse_pending_id(parts.next()) {
                Some(id) => {
                    let applied = orchestrator.apply_preview_result(id);
                    println!("{}", if applied { "applied" } else { "nothing to apply" });
                }
                None => println!("usage: apply <pending-id>"),
            },
            "cancel" => match parse_pending_id(parts.next()) {
                Some(id) => {
                    let canceled = orchestrator.cancel_preview_result(id);
                    println!("{}", if canceled { "canceled" } else { "nothing to cancel" });
                }
                None => println!("usage: cancel <pending-id>"),
            },
            "resolve" => match (parse_pending_id(parts.next()), parts.next()) {
                (Some(id), Some(choice)) => {
                    let result = orchestrator.resolve_clarification(id, choice);
                    println!("{}", result.message);
                }
                _ => println!("usage: resolve <pending-id> <choice>"),
            },
            "undo" => match parts.next().and_then(|s| Uuid::from_str(s).ok()) {
                Some(uuid) => {
                    let undone = orchestrator.undo_edit(SnapshotId(uuid));
                    println!("{}", if undone { "undone" } else { "nothing to undo" });
                }
                None => println!("usage: undo <snapshot-id>"),
            },
            _ => {
                let result = rt.block_on(orchestrator.run_turn(input));
                println!("{}", result.reply_text);
                if let Some(code) = result.error_code {
                    println!("  [{}]", code.as_str());
                }
                if let Some(edit) = &result.edit_result {
                    if let Some(pending) = edit.pending_id {
                        println!("  pending: {}", pending);
                    }
                    for step in &edit.steps {
                        if let Some(snapshot) = step.snapshot_id {
                            println!("  undo with: undo {}", snapshot);
                        }
                    }
                }
            }
        }
    }

    println!("Goodbye.");
    Ok(())
}

fn load_config(path: Option<&str>) -> Result<AssistantConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Ok(AssistantConfig::from_toml_str(&raw)?)
        }
        None => Ok(AssistantConfig::default()),
    }
}

fn parse_pending_id(arg: Option<&str>) -> Option<PendingId> {
    arg.and_then(|s| Uuid::from_str(s).ok()).map(PendingId)
}

fn demo_document(preview_rewrites: bool) -> InMemoryDocument {
    let mut doc = InMemoryDocument::new("demo-doc")
        .with_section(
            "s1",
            "引言",
            &[
                "本文介绍一套将自然语言请求映射为文档编辑操作的方法。",
                "我们先给出总体架构，再逐一说明各个组成部分。",
            ],
        )
        .with_section(
            "s2",
            "系统设计",
            &[
                "系统由规则匹配器、协议解析器和执行桥三部分组成。",
                "规则匹配器优先处理高置信度的关键词命令。",
                "协议解析器负责解析模型输出中的结构化动作块。",
            ],
        )
        .with_section(
            "s3",
            "结论",
            &["实验表明分层级联的解析策略兼顾了速度与覆盖面。"],
        );
    if preview_rewrites {
        doc.set_policy(
            "rewrite_section",
            draftpilot::document::memory::ResponsePolicy::Preview,
        );
    }
    doc
}

fn show_section<C: draftpilot::llm::client::ChatService>(
    orchestrator: &Orchestrator<InMemoryDocument, C>,
    id: &str,
) {
    let Some(engine) = orchestrator.engine() else {
        println!("no document open");
        return;
    };
    match engine.extract_section_context(&draftpilot::core::types::SectionId::new(id)) {
        Ok(context) => {
            for paragraph in &context.own_paragraphs {
                println!("  [{}] {}", paragraph.id, paragraph.text);
            }
        }
        Err(e) => println!("  {}", e),
    }
}
