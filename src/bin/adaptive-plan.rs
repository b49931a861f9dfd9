//! `adaptive-plan` CLI binary: compiles adaptive authoring intents through
//! the three-stage evaluation pipeline, or runs the vector/procedural
//! conformance harnesses.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin adaptive-plan -- compile fixture.cdx --output compiled.cdx
//! cargo run --bin adaptive-plan -- run-pipeline-vectors vectors/
//! ```

fn main() {
    std::process::exit(adaptive_plan::cli::run());
}
