//! Execution bridge
//!
//! Maps a resolved command or intent to document-edit primitives, takes an
//! undo snapshot first, and interprets the primitive's response mode:
//! auto-apply records history, preview and clarify park a PendingResult for
//! a later human decision. Nothing in here propagates an error across the
//! turn boundary; every failure becomes a failure result.

pub mod plan;
pub mod snapshot;

pub use plan::{plan_from_command, plan_from_intent, ExecutionPlan, PlanStep};
pub use snapshot::{EditSnapshot, SnapshotStore};

use crate::core::config::AssistantConfig;
use crate::core::types::{MessageId, PendingId, SnapshotId};
use crate::document::engine::{DocumentEngine, PrimitiveOutcome, PrimitiveRequest};
use crate::document::model::DocOp;
use crate::pending::{PendingPayload, PendingRegistry, PendingResult, ResponseMode};
use serde::{Deserialize, Serialize};

/// How an execution round completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    AutoApply,
    Preview,
    Clarify,
}

/// Per-step outcome within one plan
#[derive(Debug, Clone)]
pub struct StepReport {
    /// Primitive name
    pub action: String,
    pub mode: Option<ExecutionMode>,
    pub applied: bool,
    pub ops: Vec<DocOp>,
    /// Undo handle, when pre-edit capture succeeded
    pub snapshot_id: Option<SnapshotId>,
    pub pending_id: Option<PendingId>,
    pub message: String,
    pub error: Option<String>,
}

/// Aggregate outcome of executing one plan
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub response_mode: Option<ExecutionMode>,
    pub applied: bool,
    pub doc_ops: Vec<DocOp>,
    /// Open clarify questions, when the primitive could not proceed
    pub uncertainties: Vec<String>,
    pub error: Option<String>,
    pub pending_id: Option<PendingId>,
    pub message: String,
    pub steps: Vec<StepReport>,
}

impl ExecutionResult {
    /// A result for failures that happen before any step runs
    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            response_mode: None,
            applied: false,
            doc_ops: Vec::new(),
            uncertainties: Vec::new(),
            error: Some(message.clone()),
            pending_id: None,
            message,
            steps: Vec::new(),
        }
    }

    fn from_steps(steps: Vec<StepReport>) -> Self {
        let applied = steps.iter().any(|s| s.applied);
        let doc_ops = steps
            .iter()
            .filter(|s| s.applied)
            .flat_map(|s| s.ops.iter().cloned())
            .collect();
        let uncertainties: Vec<String> = steps
            .iter()
            .filter(|s| s.mode == Some(ExecutionMode::Clarify))
            .map(|s| s.message.clone())
            .collect();
        let error = steps.iter().find_map(|s| s.error.clone());
        let pending_id = steps.iter().find_map(|s| s.pending_id);
        // The plan halts on the first preview/clarify, so the last step
        // carries the round's overall response mode.
        let response_mode = steps.last().and_then(|s| s.mode);
        let message = steps
            .iter()
            .map(|s| s.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            success: !steps.is_empty() && error.is_none(),
            response_mode,
            applied,
            doc_ops,
            uncertainties,
            error,
            pending_id,
            message,
            steps,
        }
    }
}

/// Bridge between resolved edits and the document engine
pub struct ExecutionBridge {
    snapshots: SnapshotStore,
    registry: PendingRegistry,
    max_clarify_depth: u32,
}

impl ExecutionBridge {
    pub fn new(config: &AssistantConfig) -> Self {
        Self {
            snapshots: SnapshotStore::new(),
            registry: PendingRegistry::new(),
            max_clarify_depth: config.max_clarify_depth,
        }
    }

    pub fn registry(&self) -> &PendingRegistry {
        &self.registry
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// Execute a plan step by step.
    ///
    /// The plan halts at the first preview or clarify (the remaining steps
    /// would otherwise race an unconfirmed mutation). A failed step is
    /// reported and execution continues; already-applied steps stay applied
    /// and remain independently undoable through their own snapshots.
    pub fn execute<E: DocumentEngine>(
        &mut self,
        engine: &mut E,
        plan: &ExecutionPlan,
    ) -> ExecutionResult {
        let message_id = MessageId::new();
        let mut steps = Vec::new();
        for step in &plan.steps {
            let request = PrimitiveRequest {
                target: step.target.clone(),
                op: step.op.clone(),
                clarify_choice: None,
            };
            let report = self.run_request(engine, request, message_id, 0);
            let awaiting = matches!(
                report.mode,
                Some(ExecutionMode::Preview) | Some(ExecutionMode::Clarify)
            );
            steps.push(report);
            if awaiting {
                break;
            }
        }
        let result = ExecutionResult::from_steps(steps);
        tracing::info!(
            label = %plan.label,
            success = result.success,
            mode = ?result.response_mode,
            "plan executed"
        );
        result
    }

    fn run_request<E: DocumentEngine>(
        &mut self,
        engine: &mut E,
        request: PrimitiveRequest,
        message_id: MessageId,
        depth: u32,
    ) -> StepReport {
        let action = request.op.name().to_string();

        // Best-effort pre-edit capture. Failure only disables undo.
        let snapshot_id = match request.target.section_id() {
            Some(section_id) => match self.snapshots.capture(engine, section_id) {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!(section = %section_id, error = %e, "snapshot capture failed; undo disabled for this step");
                    None
                }
            },
            None => None,
        };

        let outcome = match engine.run_primitive(&request) {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Some(id) = snapshot_id {
                    self.snapshots.discard(id);
                }
                return StepReport {
                    action,
                    mode: None,
                    applied: false,
                    ops: Vec::new(),
                    snapshot_id: None,
                    pending_id: None,
                    message: format!("Edit failed: {}", e),
                    error: Some(e.to_string()),
                };
            }
        };

        match outcome {
            PrimitiveOutcome::Applied { ops, message } => StepReport {
                action,
                mode: Some(ExecutionMode::AutoApply),
                applied: true,
                ops,
                snapshot_id,
                pending_id: None,
                message,
                error: None,
            },
            PrimitiveOutcome::Preview {
                proposed_ops,
                summary,
            } => {
                // Nothing changed yet; the capture is retaken at apply time
                if let Some(id) = snapshot_id {
                    self.snapshots.discard(id);
                }
                let pending = PendingResult::new(
                    request.target.section_id().cloned(),
                    PendingPayload::Preview {
                        action: action.clone(),
                        proposed_ops,
                        summary: summary.clone(),
                    },
                    message_id,
                );
                let pending_id = self.registry.add(pending);
                StepReport {
                    action,
                    mode: Some(ExecutionMode::Preview),
                    applied: false,
                    ops: Vec::new(),
                    snapshot_id: None,
                    pending_id: Some(pending_id),
                    message: summary,
                    error: None,
                }
            }
            PrimitiveOutcome::Clarify {
                field,
                question,
                options,
            } => {
                if let Some(id) = snapshot_id {
                    self.snapshots.discard(id);
                }
                if depth >= self.max_clarify_depth {
                    tracing::warn!(action = %action, depth, "clarify limit reached; failing the step");
                    return StepReport {
                        action,
                        mode: None,
                        applied: false,
                        ops: Vec::new(),
                        snapshot_id: None,
                        pending_id: None,
                        message: "Could not resolve the request after repeated clarifications"
                            .into(),
                        error: Some("clarification limit reached".into()),
                    };
                }
                let pending = PendingResult::new(
                    request.target.section_id().cloned(),
                    PendingPayload::Clarify {
                        request: PrimitiveRequest {
                            clarify_choice: None,
                            ..request
                        },
                        field,
                        question: question.clone(),
                        options,
                        depth,
                    },
                    message_id,
                );
                let pending_id = self.registry.add(pending);
                StepReport {
                    action,
                    mode: Some(ExecutionMode::Clarify),
                    applied: false,
                    ops: Vec::new(),
                    snapshot_id: None,
                    pending_id: Some(pending_id),
                    message: question,
                    error: None,
                }
            }
        }
    }

    /// Apply a held preview. The entry is consumed either way.
    pub fn apply_preview<E: DocumentEngine>(&mut self, engine: &mut E, id: PendingId) -> bool {
        let Some(pending) = self.registry.take(id, ResponseMode::Preview) else {
            return false;
        };
        let PendingPayload::Preview { proposed_ops, .. } = pending.payload else {
            return false;
        };

        // Capture now: the document is about to change
        if let Some(section_id) = &pending.section_id {
            if let Err(e) = self.snapshots.capture(engine, section_id) {
                tracing::warn!(section = %section_id, error = %e, "snapshot capture failed; undo disabled for this apply");
            }
        }

        match engine.apply_ops(&proposed_ops) {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!(pending = %id, "engine rejected preview ops");
                false
            }
            Err(e) => {
                tracing::warn!(pending = %id, error = %e, "applying preview failed");
                false
            }
        }
    }

    /// Drop a held preview without touching the document. Safe to call
    /// twice; the second call finds nothing and is a no-op.
    pub fn cancel_preview(&mut self, id: PendingId) -> bool {
        match self.registry.take(id, ResponseMode::Preview) {
            Some(pending) => {
                tracing::info!(
                    pending = %id,
                    message = ?pending.related_message_id,
                    "preview canceled; action message marked reverted"
                );
                true
            }
            None => false,
        }
    }

    /// Resolve a clarify entry with the user's choice and re-run the
    /// primitive. The new outcome goes through the same three-way branch;
    /// a primitive that keeps asking is cut off by the depth guard.
    pub fn resolve_clarify<E: DocumentEngine>(
        &mut self,
        engine: &mut E,
        id: PendingId,
        choice: &str,
    ) -> ExecutionResult {
        let Some(pending) = self.registry.take(id, ResponseMode::Clarify) else {
            return ExecutionResult::failure("no such clarification");
        };
        let PendingPayload::Clarify { request, depth, .. } = pending.payload else {
            return ExecutionResult::failure("no such clarification");
        };

        let request = PrimitiveRequest {
            clarify_choice: Some(choice.to_string()),
            ..request
        };
        let report = self.run_request(engine, request, pending.related_message_id, depth + 1);
        ExecutionResult::from_steps(vec![report])
    }

    /// Reverse an applied edit from its snapshot, consuming the snapshot.
    pub fn undo<E: DocumentEngine>(&mut self, engine: &mut E, snapshot_id: SnapshotId) -> bool {
        let Some(snapshot) = self.snapshots.get(snapshot_id) else {
            return false;
        };
        let ops = snapshot.restore_ops();
        match engine.apply_ops(&ops) {
            Ok(true) => {
                self.snapshots.discard(snapshot_id);
                true
            }
            Ok(false) | Err(_) => {
                tracing::warn!(snapshot = %snapshot_id, "undo failed to apply");
                false
            }
        }
    }
}
