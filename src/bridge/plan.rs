//! Turn resolved commands and intents into primitive-step plans
//!
//! Both resolution paths (rule matcher and protocol) end in the same
//! shape: an ordered list of primitive requests under one logical action.
//! Target sections must already be resolved; a plan never carries an
//! unresolved reference.

use crate::core::error::{DraftError, Result};
use crate::core::types::SectionId;
use crate::document::engine::{PrimitiveOp, PrimitiveTarget};
use crate::document::model::ParagraphRef;
use crate::llm::protocol::EditIntent;
use crate::matcher::{CommandKind, CommandScope, CommandStepKind, ResolvedCommand};

/// One primitive invocation within a plan
#[derive(Debug, Clone)]
pub struct PlanStep {
    pub target: PrimitiveTarget,
    pub op: PrimitiveOp,
}

/// An ordered sequence of steps under one logical action
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Stable label for history and log lines, e.g. "rewrite_section+highlight_terms"
    pub label: String,
    pub steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    fn new(steps: Vec<PlanStep>) -> Self {
        let label = steps
            .iter()
            .map(|s| s.op.name())
            .collect::<Vec<_>>()
            .join("+");
        Self { label, steps }
    }

    /// The single section this plan touches, when all steps agree
    pub fn section_id(&self) -> Option<&SectionId> {
        self.steps.first().and_then(|s| s.target.section_id())
    }
}

/// Build a plan from a rule-matched command.
///
/// `section_id` is the orchestrator-resolved target (focus, ordinal, or
/// last-edit fallback already applied); section-scoped steps fail without it.
pub fn plan_from_command(
    command: &ResolvedCommand,
    section_id: Option<&SectionId>,
) -> Result<ExecutionPlan> {
    let need_section = || {
        section_id.cloned().ok_or_else(|| {
            DraftError::InvalidCommand("section-scoped step without a section".into())
        })
    };

    let mut steps = Vec::new();
    for step in command.command.steps() {
        let (target, op) = match step {
            CommandStepKind::Rewrite => {
                let op = if command.scope == CommandScope::Selection {
                    // Selections edit a single paragraph; the primitive
                    // clarifies if the cursor position is ambiguous.
                    PrimitiveOp::RewriteParagraph {
                        reference: ParagraphRef::Current,
                        style: command.options.style.clone(),
                    }
                } else {
                    PrimitiveOp::RewriteSection {
                        style: command.options.style.clone(),
                    }
                };
                (PrimitiveTarget::Section(need_section()?), op)
            }
            CommandStepKind::Summarize => {
                if command.scope == CommandScope::Document {
                    (PrimitiveTarget::Document, PrimitiveOp::SummarizeDocument)
                } else {
                    (
                        PrimitiveTarget::Section(need_section()?),
                        PrimitiveOp::SummarizeSection,
                    )
                }
            }
            CommandStepKind::Highlight => (
                PrimitiveTarget::Section(need_section()?),
                PrimitiveOp::HighlightTerms {
                    terms: command.options.terms.clone(),
                },
            ),
        };
        steps.push(PlanStep { target, op });
    }

    Ok(ExecutionPlan::new(steps))
}

/// Build a plan from a validated protocol intent.
///
/// `section_id` is the resolved target for section-scoped actions; the
/// caller has already mapped sentinels and ordinals to a real section.
pub fn plan_from_intent(intent: &EditIntent, section_id: Option<&SectionId>) -> Result<ExecutionPlan> {
    let section = || -> Result<PrimitiveTarget> {
        section_id
            .cloned()
            .map(PrimitiveTarget::Section)
            .ok_or_else(|| {
                DraftError::InvalidCommand("section-scoped intent without a section".into())
            })
    };

    let step = match intent {
        EditIntent::RewriteSection { style, .. } => PlanStep {
            target: section()?,
            op: PrimitiveOp::RewriteSection {
                style: style.clone(),
            },
        },
        EditIntent::RewriteParagraph {
            reference, style, ..
        } => PlanStep {
            target: section()?,
            op: PrimitiveOp::RewriteParagraph {
                reference: *reference,
                style: style.clone(),
            },
        },
        EditIntent::SummarizeSection { .. } => PlanStep {
            target: section()?,
            op: PrimitiveOp::SummarizeSection,
        },
        EditIntent::SummarizeDocument => PlanStep {
            target: PrimitiveTarget::Document,
            op: PrimitiveOp::SummarizeDocument,
        },
        EditIntent::HighlightTerms { terms, .. } => PlanStep {
            target: section()?,
            op: PrimitiveOp::HighlightTerms {
                terms: terms.clone(),
            },
        },
    };

    Ok(ExecutionPlan::new(vec![step]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DocumentId;
    use crate::llm::protocol::SectionRef;
    use crate::matcher::{CommandOptions, Confidence, RoughKind};

    fn command(kind: CommandKind, scope: CommandScope) -> ResolvedCommand {
        ResolvedCommand {
            command: kind,
            scope,
            document_id: DocumentId::new("doc-1"),
            section_id: None,
            section_title: None,
            section_ordinal: None,
            options: CommandOptions::default(),
            confidence: Confidence::High,
            rough_kind: RoughKind::Rewrite,
        }
    }

    #[test]
    fn test_compound_plan_orders_steps() {
        let cmd = command(
            CommandKind::Compound(vec![CommandStepKind::Rewrite, CommandStepKind::Highlight]),
            CommandScope::Section,
        );
        let section = SectionId::new("s1");
        let plan = plan_from_command(&cmd, Some(&section)).unwrap();
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.label, "rewrite_section+highlight_terms");
        assert!(matches!(plan.steps[0].op, PrimitiveOp::RewriteSection { .. }));
        assert!(matches!(plan.steps[1].op, PrimitiveOp::HighlightTerms { .. }));
    }

    #[test]
    fn test_section_step_without_section_fails() {
        let cmd = command(
            CommandKind::Single(CommandStepKind::Rewrite),
            CommandScope::Section,
        );
        assert!(plan_from_command(&cmd, None).is_err());
    }

    #[test]
    fn test_document_summarize_needs_no_section() {
        let cmd = command(
            CommandKind::Single(CommandStepKind::Summarize),
            CommandScope::Document,
        );
        let plan = plan_from_command(&cmd, None).unwrap();
        assert!(matches!(plan.steps[0].op, PrimitiveOp::SummarizeDocument));
        assert_eq!(plan.steps[0].target, PrimitiveTarget::Document);
    }

    #[test]
    fn test_selection_rewrite_targets_paragraph() {
        let cmd = command(
            CommandKind::Single(CommandStepKind::Rewrite),
            CommandScope::Selection,
        );
        let section = SectionId::new("s2");
        let plan = plan_from_command(&cmd, Some(&section)).unwrap();
        assert!(matches!(
            plan.steps[0].op,
            PrimitiveOp::RewriteParagraph { .. }
        ));
    }

    #[test]
    fn test_plan_from_intent() {
        let intent = EditIntent::SummarizeSection {
            section: SectionRef::Current,
        };
        let section = SectionId::new("s1");
        let plan = plan_from_intent(&intent, Some(&section)).unwrap();
        assert_eq!(plan.label, "summarize_section");
        assert_eq!(plan.section_id(), Some(&section));
    }

    #[test]
    fn test_intent_plan_without_section_fails() {
        let intent = EditIntent::RewriteSection {
            section: SectionRef::Auto,
            style: None,
        };
        assert!(plan_from_intent(&intent, None).is_err());
    }
}
