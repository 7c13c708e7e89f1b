//! Per-document session state
//!
//! One `SessionState` exists per active document. The orchestrator mutates
//! it in place; switching documents discards it, including the last-edit
//! memory that drives follow-up resolution.

use crate::core::types::{now_ms, DocumentId, SectionId, TimestampMs};
use serde::{Deserialize, Serialize};

/// What the user is currently looking at
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FocusScope {
    #[default]
    WholeDocument,
    Section(SectionId),
}

/// Reply verbosity preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    Terse,
    #[default]
    Normal,
    Detailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreferences {
    /// BCP 47-ish language tag for replies ("en", "zh")
    pub language: String,
    pub verbosity: Verbosity,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            language: "en".into(),
            verbosity: Verbosity::Normal,
        }
    }
}

/// Memory of the most recent successfully-applied edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastEditContext {
    pub section_id: SectionId,
    /// Primitive name, e.g. "rewrite_section"
    pub action: String,
    pub timestamp_ms: TimestampMs,
}

/// Session record for one active document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub document_id: DocumentId,
    pub focus: FocusScope,
    /// Text currently selected in the editor, if any
    pub selected_text: Option<String>,
    pub preferences: UserPreferences,
    /// Name of the last task the user asked for, applied or not
    pub last_task: Option<String>,
    pub last_edit: Option<LastEditContext>,
}

impl SessionState {
    pub fn new(document_id: DocumentId) -> Self {
        Self {
            document_id,
            focus: FocusScope::WholeDocument,
            selected_text: None,
            preferences: UserPreferences::default(),
            last_task: None,
            last_edit: None,
        }
    }

    /// The focused section, if focus is narrower than the whole document
    pub fn focused_section(&self) -> Option<&SectionId> {
        match &self.focus {
            FocusScope::Section(id) => Some(id),
            FocusScope::WholeDocument => None,
        }
    }

    pub fn focus_section(&mut self, section_id: SectionId) {
        self.focus = FocusScope::Section(section_id);
    }

    pub fn focus_document(&mut self) {
        self.focus = FocusScope::WholeDocument;
    }

    /// Record a successfully-applied edit for follow-up resolution
    pub fn record_edit(&mut self, section_id: SectionId, action: impl Into<String>) {
        let action = action.into();
        self.last_task = Some(action.clone());
        self.last_edit = Some(LastEditContext {
            section_id,
            action,
            timestamp_ms: now_ms(),
        });
    }

    /// The last edit, if it happened within the follow-up window
    pub fn recent_edit(&self, window_ms: u64) -> Option<&LastEditContext> {
        let edit = self.last_edit.as_ref()?;
        if now_ms().saturating_sub(edit.timestamp_ms) <= window_ms {
            Some(edit)
        } else {
            None
        }
    }

    /// Reset for a newly-opened document; clears follow-up memory
    pub fn switch_document(&mut self, document_id: DocumentId) {
        let preferences = self.preferences.clone();
        *self = Self::new(document_id);
        self.preferences = preferences;
    }
}
