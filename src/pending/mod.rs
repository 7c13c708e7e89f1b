//! Registry of in-flight confirmations
//!
//! Holds exactly the preview/clarify results awaiting a human decision,
//! keyed by an opaque id. Entries are created by the execution bridge and
//! consumed later through the orchestrator's apply/cancel/resolve entry
//! points. A given id exists in at most one of the two modes at a time;
//! the single map makes that structural.

use crate::core::types::{now_ms, MessageId, PendingId, SectionId, TimestampMs};
use crate::document::engine::PrimitiveRequest;
use crate::document::model::DocOp;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    Preview,
    Clarify,
}

/// Mode-specific payload of a pending entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PendingPayload {
    Preview {
        /// Primitive name, kept so applying the preview records the real
        /// action for follow-up resolution
        action: String,
        proposed_ops: Vec<DocOp>,
        summary: String,
    },
    Clarify {
        /// The request to re-invoke once the user picks an option
        request: PrimitiveRequest,
        field: String,
        question: String,
        options: Vec<String>,
        /// Clarify round-trips already taken for this step
        depth: u32,
    },
}

impl PendingPayload {
    pub fn mode(&self) -> ResponseMode {
        match self {
            PendingPayload::Preview { .. } => ResponseMode::Preview,
            PendingPayload::Clarify { .. } => ResponseMode::Clarify,
        }
    }
}

/// One in-flight confirmation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingResult {
    pub id: PendingId,
    pub section_id: Option<SectionId>,
    pub payload: PendingPayload,
    pub created_at_ms: TimestampMs,
    /// The action message in the conversation this entry belongs to
    pub related_message_id: MessageId,
}

impl PendingResult {
    pub fn new(
        section_id: Option<SectionId>,
        payload: PendingPayload,
        related_message_id: MessageId,
    ) -> Self {
        Self {
            id: PendingId::new(),
            section_id,
            payload,
            created_at_ms: now_ms(),
            related_message_id,
        }
    }

    pub fn response_mode(&self) -> ResponseMode {
        self.payload.mode()
    }

    /// Serialized form of the held execution result
    pub fn serialized(&self) -> String {
        serde_json::to_string(&self.payload).unwrap_or_default()
    }
}

/// In-memory store of pending confirmations
#[derive(Debug, Default)]
pub struct PendingRegistry {
    entries: AHashMap<PendingId, PendingResult>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entry and return its id
    pub fn add(&mut self, pending: PendingResult) -> PendingId {
        let id = pending.id;
        self.entries.insert(id, pending);
        id
    }

    pub fn get(&self, id: PendingId) -> Option<&PendingResult> {
        self.entries.get(&id)
    }

    /// Remove unconditionally; a missing id is a no-op
    pub fn remove(&mut self, id: PendingId) -> Option<PendingResult> {
        self.entries.remove(&id)
    }

    /// Remove the entry only if it is in the expected mode.
    ///
    /// A mode mismatch means the caller hit the wrong entry point (apply on
    /// a clarify, resolve on a preview); the entry stays untouched.
    pub fn take(&mut self, id: PendingId, mode: ResponseMode) -> Option<PendingResult> {
        match self.entries.get(&id) {
            Some(entry) if entry.response_mode() == mode => self.entries.remove(&id),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preview_entry() -> PendingResult {
        PendingResult::new(
            Some(SectionId::new("s1")),
            PendingPayload::Preview {
                action: "rewrite_section".into(),
                proposed_ops: vec![DocOp::ReplaceParagraph {
                    paragraph_id: "p1".into(),
                    text: "new".into(),
                }],
                summary: "one replacement".into(),
            },
            MessageId::new(),
        )
    }

    #[test]
    fn test_add_get_remove() {
        let mut registry = PendingRegistry::new();
        let id = registry.add(preview_entry());
        assert!(registry.get(id).is_some());
        assert!(registry.remove(id).is_some());
        assert!(registry.get(id).is_none());
    }

    #[test]
    fn test_double_remove_is_noop() {
        let mut registry = PendingRegistry::new();
        let id = registry.add(preview_entry());
        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
    }

    #[test]
    fn test_take_checks_mode() {
        let mut registry = PendingRegistry::new();
        let id = registry.add(preview_entry());
        // Wrong entry point leaves the entry alone
        assert!(registry.take(id, ResponseMode::Clarify).is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.take(id, ResponseMode::Preview).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_entries_are_independent() {
        let mut registry = PendingRegistry::new();
        let first = registry.add(preview_entry());
        let second = registry.add(preview_entry());
        registry.remove(second);
        assert!(registry.get(first).is_some());
    }

    #[test]
    fn test_serialized_payload_roundtrips() {
        let entry = preview_entry();
        let json = entry.serialized();
        let back: PendingPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.mode(), ResponseMode::Preview);
    }
}
