//! Document model and the engine boundary
//!
//! Shapes exchanged with the external editing engine, the `DocumentEngine`
//! capability trait, and a deterministic in-memory engine for tests and
//! the REPL.

pub mod engine;
pub mod memory;
pub mod model;

pub use engine::{
    DocumentEngine, PrimitiveOp, PrimitiveOutcome, PrimitiveRequest, PrimitiveTarget,
};
pub use memory::{InMemoryDocument, ResponsePolicy};
pub use model::{DocOp, Paragraph, ParagraphRef, SectionContext, SectionInfo};
