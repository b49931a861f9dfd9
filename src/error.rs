//! Per-layer error taxonomy (§7), aggregated behind [`PipelineError`] for the
//! CLI binary. Stage evaluators themselves never return these for
//! domain-level rule violations -- those collapse into the stage's own
//! `status=error` result, per the fail-closed contract. These types cover
//! genuine structural/harness failures: malformed turtle, malformed
//! envelopes, unreadable fixtures, bad configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("turtle parse error: {0}")]
    Parse(String),
    #[error(transparent)]
    Term(#[from] adaptive_term::TermError),
}

#[derive(Debug, Error)]
pub enum CodexError {
    #[error(transparent)]
    Envelope(#[from] adaptive_codex::EnvelopeError),
    #[error(transparent)]
    Schema(#[from] adaptive_codex::SchemaError),
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{0}")]
    Structural(String),
}

/// Harness-level faults loading a Stage A vector or invocation -- never
/// returned for a domain-level policy evaluation failure, which collapses
/// into the stage's own `status=error` result instead.
#[derive(Debug, Error)]
pub enum StageAError {
    #[error("{0}")]
    Fixture(String),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Codex(#[from] CodexError),
}

#[derive(Debug, Error)]
pub enum StageBError {
    #[error("{0}")]
    Fixture(String),
    #[error(transparent)]
    Codex(#[from] CodexError),
}

#[derive(Debug, Error)]
pub enum StageCError {
    #[error("{0}")]
    Fixture(String),
    #[error(transparent)]
    Codex(#[from] CodexError),
}

#[derive(Debug, Error)]
pub enum ConformanceError {
    #[error("{0}")]
    Fixture(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Figment(#[from] figment::Error),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Codex(#[from] CodexError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    StageA(#[from] StageAError),
    #[error(transparent)]
    StageB(#[from] StageBError),
    #[error(transparent)]
    StageC(#[from] StageCError),
    #[error(transparent)]
    Conformance(#[from] ConformanceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
