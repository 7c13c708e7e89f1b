//! Draftpilot - Natural-language document editing assistant core
//!
//! Resolves free-form user requests against an open document through a
//! tiered cascade: a keyword rule matcher, a structured LLM protocol, and a
//! plain-chat fallback. Resolved edits run through an execution bridge that
//! handles preview/clarify confirmation flows and undo snapshots.

pub mod bridge;
pub mod core;
pub mod document;
pub mod llm;
pub mod matcher;
pub mod orchestrator;
pub mod pending;
pub mod session;
