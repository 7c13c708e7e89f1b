//! Generation-service integration
//!
//! Client seam, prompt assembly, and the two-block protocol parser:
//! raw model text -> ModelOutput { reply, Intent?, parse status }.

pub mod client;
pub mod prompt;
pub mod protocol;

pub use client::{ChatMessage, ChatService, LlmClient, Role};
pub use prompt::{build_messages, DocumentContext};
pub use protocol::{parse_output, EditIntent, Intent, ModelOutput, ParseStatus, SectionRef};
