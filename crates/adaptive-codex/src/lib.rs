//! The codex envelope tree and its schema-driven validator.

pub mod envelope;
pub mod schema;

pub use envelope::{Concept, EnvelopeError};
pub use schema::{ConceptDefinition, Schema, SchemaError, TraitDefinition, TraitValueType};
