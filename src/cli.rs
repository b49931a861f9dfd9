//! The `adaptive-plan` command-line surface: a `clap` derive
//! `Parser`/`Subcommand` binary exposing each pipeline stage as its own
//! subcommand, plus the vector and procedural-conformance runners.

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::PipelineConfig;
use crate::conformance;
use crate::discovery;
use crate::intent;
use crate::pipeline;
use crate::schemas;
use crate::stage_a;
use crate::stage_b;
use crate::stage_c;
use crate::telemetry;
use crate::vectors::{self, VectorRunReport};
use adaptive_codex::Concept;

#[derive(Parser)]
#[command(name = "adaptive-plan")]
#[command(about = "Compiles adaptive authoring intents into content-hashed adaptive plans")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Overrides fixture-root discovery (defaults to walking up to a `.git` ancestor).
    #[arg(long, global = true)]
    pub fixture_root: Option<PathBuf>,

    /// Overrides the default `config.toml` location.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides the configured logging level (e.g. `debug`, `info`, `warn`).
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compiles an `AdaptiveFixture` envelope into a `CompiledAdaptiveRequest`.
    Compile {
        fixture: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Evaluates Stage A over a compiled request and a policy graph.
    EvaluateStageA {
        compiled: PathBuf,
        graph: PathBuf,
        #[arg(long, default_value = "")]
        shapes: PathBuf,
        #[arg(long, default_value = "")]
        ontology: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Evaluates Stage B over a compiled request and a candidate set.
    EvaluateStageB {
        compiled: PathBuf,
        candidates: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Emits the Stage C package and decision report from Stage A/B results.
    EmitStageC {
        compiled: PathBuf,
        stage_a: PathBuf,
        stage_b: PathBuf,
        #[arg(long = "package-output")]
        package_output: PathBuf,
        #[arg(long = "decision-report-output")]
        decision_report_output: PathBuf,
    },
    /// Runs every `PolicyVector` `.cdx` file in a directory against Stage A.
    RunPolicyVectors { dir: PathBuf },
    /// Runs every `StageBVector` `.cdx` file in a directory against Stage B.
    RunStageBVectors { dir: PathBuf },
    /// Runs every `StageCVector` `.cdx` file in a directory against Stage C.
    RunStageCVectors { dir: PathBuf },
    /// Runs every `AdaptivePipelineVector` `.cdx` file in a directory end-to-end.
    RunPipelineVectors { dir: PathBuf },
    /// Runs the procedural-conformance suite from a `fixture-coverage.csv`.
    RunProcConformance { csv: PathBuf },
}

/// CLI-level exit codes: `0` success, `1` any vector/conformance failure or
/// missing vectors, `2` malformed invocations (bad arguments, unreadable
/// files before any evaluation begins).
pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_MALFORMED: i32 = 2;

fn read_to_string_or_exit(path: &std::path::Path) -> Result<String, i32> {
    fs::read_to_string(path).map_err(|e| {
        eprintln!("cannot read '{}': {e}", path.display());
        EXIT_MALFORMED
    })
}

fn parse_concept_or_exit(path: &std::path::Path) -> Result<Concept, i32> {
    let text = read_to_string_or_exit(path)?;
    Concept::parse(&text).map_err(|e| {
        eprintln!("cannot parse '{}': {e}", path.display());
        EXIT_MALFORMED
    })
}

fn write_output_or_exit(path: &std::path::Path, concept: &Concept) -> Result<(), i32> {
    fs::write(path, concept.render()).map_err(|e| {
        eprintln!("cannot write '{}': {e}", path.display());
        EXIT_MALFORMED
    })
}

fn report_vector_run(kind: &str, report: &VectorRunReport) -> i32 {
    for outcome in &report.outcomes {
        if outcome.passed {
            println!("[PASS] {kind}: {}", outcome.id);
        } else {
            eprintln!("[FAIL] {kind}: {}: {}", outcome.id, outcome.detail);
        }
    }
    if report.outcomes.is_empty() {
        eprintln!("No {kind} files found (.cdx).");
        return EXIT_FAILURE;
    }
    let failures = report.failure_count();
    if failures > 0 {
        eprintln!("{kind} run failed with {failures} failing vector(s).");
        EXIT_FAILURE
    } else {
        println!("All {kind} passed.");
        EXIT_OK
    }
}

/// Parses arguments and runs the requested subcommand, returning the
/// process exit code.
pub fn run() -> i32 {
    let cli = Cli::parse();

    let mut config = match cli.config.as_deref().map(PipelineConfig::from_file).unwrap_or_else(PipelineConfig::load) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("cannot load configuration: {e}");
            return EXIT_MALFORMED;
        }
    };
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    telemetry::init(&config.logging);

    let repo_root = discovery::discover_repo_root(&std::env::current_dir().unwrap_or_default());
    let fixture_root = cli.fixture_root.unwrap_or_else(|| config.fixture_root.clone());

    match dispatch(cli.command, &config, &repo_root, &fixture_root) {
        Ok(code) => code,
        Err(code) => code,
    }
}

fn dispatch(command: Commands, config: &PipelineConfig, repo_root: &std::path::Path, fixture_root: &std::path::Path) -> Result<i32, i32> {
    match command {
        Commands::Compile { fixture, output } => {
            let fixture_concept = parse_concept_or_exit(&fixture)?;
            let compiled = intent::compile_fixture(&fixture_concept).map_err(|e| {
                eprintln!("compile failed: {e}");
                EXIT_MALFORMED
            })?;
            write_output_or_exit(&output, &intent::render_compiled_request(&compiled))?;
            Ok(EXIT_OK)
        }
        Commands::EvaluateStageA { compiled, graph, shapes, ontology, output } => {
            let compiled_concept = parse_concept_or_exit(&compiled)?;
            let compiled_req = intent::parse_compiled_request(&compiled_concept).map_err(|e| {
                eprintln!("malformed compiled request: {e}");
                EXIT_MALFORMED
            })?;
            let graph_text = read_to_string_or_exit(&graph)?;
            let shapes_text = if shapes.as_os_str().is_empty() { String::new() } else { read_to_string_or_exit(&shapes)? };
            let ontology_text = if ontology.as_os_str().is_empty() { String::new() } else { read_to_string_or_exit(&ontology)? };

            let outcome = pipeline::run_stage_a(&graph_text, &shapes_text, &ontology_text, &compiled_req).map_err(|e| {
                eprintln!("stage A harness error: {e}");
                EXIT_MALFORMED
            })?;
            let rendered = stage_a::render_result(&outcome);
            schemas::validate_stage_a_result(&rendered).map_err(|e| {
                eprintln!("[stage-a-schema-error] {e}");
                EXIT_MALFORMED
            })?;
            write_output_or_exit(&output, &rendered)?;
            Ok(EXIT_OK)
        }
        Commands::EvaluateStageB { compiled, candidates, output } => {
            let compiled_concept = parse_concept_or_exit(&compiled)?;
            let compiled_req = intent::parse_compiled_request(&compiled_concept).map_err(|e| {
                eprintln!("malformed compiled request: {e}");
                EXIT_MALFORMED
            })?;
            let candidates_concept = parse_concept_or_exit(&candidates)?;
            let outcome = pipeline::run_stage_b(&compiled_req, &candidates_concept).map_err(|e| {
                eprintln!("stage B harness error: {e}");
                EXIT_MALFORMED
            })?;
            let rendered = stage_b::render_result(&outcome);
            schemas::validate_stage_b_result(&rendered).map_err(|e| {
                eprintln!("[stage-b-schema-error] {e}");
                EXIT_MALFORMED
            })?;
            write_output_or_exit(&output, &rendered)?;
            Ok(EXIT_OK)
        }
        Commands::EmitStageC { compiled, stage_a: stage_a_path, stage_b: stage_b_path, package_output, decision_report_output } => {
            let compiled_concept = parse_concept_or_exit(&compiled)?;
            let compiled_req = intent::parse_compiled_request(&compiled_concept).map_err(|e| {
                eprintln!("malformed compiled request: {e}");
                EXIT_MALFORMED
            })?;
            let stage_a_concept = parse_concept_or_exit(&stage_a_path)?;
            let stage_a_outcome = stage_a::parse_result(&stage_a_concept).map_err(|e| {
                eprintln!("malformed Stage A result: {e}");
                EXIT_MALFORMED
            })?;
            let stage_b_concept = parse_concept_or_exit(&stage_b_path)?;
            let stage_b_outcome = stage_b::parse_result(&stage_b_concept).map_err(|e| {
                eprintln!("malformed Stage B result: {e}");
                EXIT_MALFORMED
            })?;

            let outcome = stage_c::emit(&compiled_req, &stage_a_outcome, &stage_b_outcome, &config.workshop_version);
            if let Some(package) = &outcome.package {
                schemas::validate_adaptive_plan_package(package).map_err(|e| {
                    eprintln!("[stage-c-schema-error] {e}");
                    EXIT_MALFORMED
                })?;
            }
            schemas::validate_adaptive_decision_report(&outcome.report).map_err(|e| {
                eprintln!("[stage-c-schema-error] {e}");
                EXIT_MALFORMED
            })?;
            if let Some(package) = &outcome.package {
                write_output_or_exit(&package_output, package)?;
            }
            write_output_or_exit(&decision_report_output, &outcome.report)?;
            Ok(EXIT_OK)
        }
        Commands::RunPolicyVectors { dir } => {
            let report = vectors::run_policy_vectors(&dir, repo_root, fixture_root).map_err(|e| {
                eprintln!("cannot read vector directory '{}': {e}", dir.display());
                EXIT_MALFORMED
            })?;
            Ok(report_vector_run("policy vector", &report))
        }
        Commands::RunStageBVectors { dir } => {
            let report = vectors::run_stage_b_vectors(&dir).map_err(|e| {
                eprintln!("cannot read vector directory '{}': {e}", dir.display());
                EXIT_MALFORMED
            })?;
            Ok(report_vector_run("stage B vector", &report))
        }
        Commands::RunStageCVectors { dir } => {
            let report = vectors::run_stage_c_vectors(&dir).map_err(|e| {
                eprintln!("cannot read vector directory '{}': {e}", dir.display());
                EXIT_MALFORMED
            })?;
            Ok(report_vector_run("stage C vector", &report))
        }
        Commands::RunPipelineVectors { dir } => {
            let report = vectors::run_pipeline_vectors(&dir, repo_root, fixture_root).map_err(|e| {
                eprintln!("cannot read vector directory '{}': {e}", dir.display());
                EXIT_MALFORMED
            })?;
            Ok(report_vector_run("pipeline vector", &report))
        }
        Commands::RunProcConformance { csv } => {
            let report = conformance::run_fixture_coverage(&csv, repo_root, fixture_root).map_err(|e| {
                eprintln!("cannot run procedural conformance suite: {e}");
                EXIT_MALFORMED
            })?;
            for failure in &report.failures {
                eprintln!("[FAIL] {failure}");
            }
            if report.failures.is_empty() {
                println!("All {} procedural clauses passed.", report.passed_clauses);
                Ok(EXIT_OK)
            } else {
                eprintln!(
                    "Procedural conformance run failed: {}/{} clauses passed.",
                    report.passed_clauses, report.total_clauses
                );
                Ok(EXIT_FAILURE)
            }
        }
    }
}
