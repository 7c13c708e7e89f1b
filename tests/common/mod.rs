//! Shared test support: a scripted chat service and a standard document.

use draftpilot::core::config::AssistantConfig;
use draftpilot::core::error::{DraftError, Result};
use draftpilot::document::memory::InMemoryDocument;
use draftpilot::llm::client::{ChatMessage, ChatService};
use draftpilot::orchestrator::Orchestrator;
use std::collections::VecDeque;
use std::sync::Mutex;

enum Scripted {
    Reply(String),
    Failure(String),
}

/// Chat service that replays canned responses in order
pub struct ScriptedChat {
    script: Mutex<VecDeque<Scripted>>,
}

impl ScriptedChat {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
        }
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Reply(text.into()));
        self
    }

    pub fn failing(self, message: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Failure(message.into()));
        self
    }
}

impl ChatService for ScriptedChat {
    async fn chat(&self, _messages: &[ChatMessage]) -> Result<String> {
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Reply(text)) => Ok(text),
            Some(Scripted::Failure(message)) => Err(DraftError::LlmError(message)),
            None => Err(DraftError::LlmError("scripted chat exhausted".into())),
        }
    }
}

/// Wrap an action payload and reply in the two-block wire format
pub fn protocol_reply(action_json: &str, reply: &str) -> String {
    format!("[action]{}[/action]\n[reply]{}[/reply]", action_json, reply)
}

/// Three sections; paragraph ids run p1..p4 in declaration order.
pub fn demo_document() -> InMemoryDocument {
    InMemoryDocument::new("demo-doc")
        .with_section("s1", "引言", &["Opening line. More detail here."])
        .with_section("s2", "系统设计", &["Alpha sentence. Beta sentence.", "Gamma only."])
        .with_section("s3", "结论", &["Final remarks."])
}

pub fn orchestrator_with(
    chat: ScriptedChat,
    engine: InMemoryDocument,
) -> Orchestrator<InMemoryDocument, ScriptedChat> {
    let mut orchestrator = Orchestrator::new(AssistantConfig::default()).with_chat(chat);
    orchestrator.open_document(engine);
    orchestrator
}
