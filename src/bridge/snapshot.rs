//! Undo snapshots
//!
//! A snapshot captures a section's paragraphs before any mutation touches
//! them. Snapshots live in memory until explicitly discarded and can be
//! turned back into replace-ops to reverse the edit.

use crate::core::error::Result;
use crate::core::types::{now_ms, DocumentId, SectionId, SnapshotId, TimestampMs};
use crate::document::engine::DocumentEngine;
use crate::document::model::{DocOp, Paragraph};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Captured pre-edit state of one section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditSnapshot {
    pub id: SnapshotId,
    pub document_id: DocumentId,
    pub section_id: SectionId,
    pub created_at_ms: TimestampMs,
    pub captured_paragraphs: Vec<Paragraph>,
}

impl EditSnapshot {
    /// Ops that restore the captured text
    pub fn restore_ops(&self) -> Vec<DocOp> {
        self.captured_paragraphs
            .iter()
            .map(|p| DocOp::ReplaceParagraph {
                paragraph_id: p.id.clone(),
                text: p.text.clone(),
            })
            .collect()
    }
}

/// In-memory snapshot storage
#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: AHashMap<SnapshotId, EditSnapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture a section's current paragraphs
    pub fn capture<E: DocumentEngine>(
        &mut self,
        engine: &E,
        section_id: &SectionId,
    ) -> Result<SnapshotId> {
        let context = engine.extract_section_context(section_id)?;
        let snapshot = EditSnapshot {
            id: SnapshotId::new(),
            document_id: engine.document_id(),
            section_id: section_id.clone(),
            created_at_ms: now_ms(),
            captured_paragraphs: context.own_paragraphs,
        };
        let id = snapshot.id;
        self.snapshots.insert(id, snapshot);
        Ok(id)
    }

    pub fn get(&self, id: SnapshotId) -> Option<&EditSnapshot> {
        self.snapshots.get(&id)
    }

    pub fn discard(&mut self, id: SnapshotId) -> Option<EditSnapshot> {
        self.snapshots.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
