//! # Adaptive Plan Compiler
//!
//! Compiles an `AdaptiveFixture` authoring-intent envelope into a
//! content-hashed adaptive plan package through a three-stage pipeline.
//!
//! ## Pipeline Architecture
//!
//! ```text
//! AdaptiveFixture (codex envelope)
//!     ↓
//! [Intent compiler]          → CompiledRequest (Stage A context, objective/optimization/override profiles)
//!     ↓
//! [Stage A: policy evaluation]  → selected actions, graph delta (ReplaceAll/Add/Remove)
//!     ↓
//! [Stage B: constrained scoring] → selected candidate, applied relaxation cascade
//!     ↓
//! [Stage C: packaging]       → AdaptivePlanPackage (content-hashed) + AdaptiveDecisionReport
//! ```
//!
//! ## Module Organization
//!
//! Stage A is additionally gated by a SHACL oracle (pre- and
//! post-validation of the working graph); graph ingestion comes from a
//! fixture-subset Turtle parser; a separate, orthogonal conformance layer
//! asserts graph-level invariants (NFC, no blank nodes, canonical
//! serialization, scoped hashing) against a CSV-driven fixture matrix.

pub mod error;
pub mod ns;

pub mod intent;
pub mod stage_a;
pub mod stage_b;
pub mod stage_c;

pub mod shacl;
pub mod turtle;

pub mod config;
pub mod discovery;
pub mod telemetry;

pub mod conformance;
pub mod pipeline;
pub mod schemas;
pub mod vectors;

pub mod cli;

pub use error::{
    CodexError, CompileError, ConfigError, ConformanceError, GraphError, PipelineError,
    StageAError, StageBError, StageCError,
};
pub use intent::{compile_fixture, CompiledRequest};
pub use pipeline::{run_end_to_end, run_stage_a, run_stage_b, PipelineOutcome};
pub use stage_a::StageAOutcome;
pub use stage_b::StageBOutcome;
pub use stage_c::StageCOutcome;

pub use config::{LoggingConfig, PipelineConfig};
