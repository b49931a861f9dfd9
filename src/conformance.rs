//! Procedural conformance checks (not the evaluation pipeline itself): an
//! orthogonal layer that asserts graph-level invariants -- no implicit
//! semantics, materialized defaults, NFC, no blank nodes, canonical
//! serialization, scoped hashing, and the combined SHACL validation
//! contract -- hold for a positive fixture and fail for its paired negative
//! fixture. Driven by a `fixture-coverage.csv` of `(clause_id, enforcement,
//! positive_fixture, negative_fixture)` rows; only `enforcement=PROC` rows
//! are processed here (the rest are asserted by other means outside this
//! crate).

use std::fs;
use std::path::Path;

use serde::Deserialize;

use adaptive_term::{canonical, Graph, Iri};

use crate::error::ConformanceError;
use crate::ns;
use crate::shacl::{self, Inference};
use crate::discovery;
use crate::turtle::parse_turtle;

#[derive(Debug, Clone, Deserialize)]
struct ConformanceCase {
    kind: String,
    input: String,
    #[serde(default)]
    expected: Option<String>,
    #[serde(default)]
    composition: Option<String>,
    #[serde(default)]
    shapes: Option<String>,
    #[serde(default)]
    ontology: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct CoverageRow {
    clause_id: String,
    enforcement: String,
    positive_fixture: String,
    negative_fixture: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConformanceRunReport {
    pub total_clauses: usize,
    pub passed_clauses: usize,
    pub failures: Vec<String>,
}

fn load_graph(repo_root: &Path, fixture_root: &Path, relative: &str) -> Result<Graph, ConformanceError> {
    let path = discovery::resolve_fixture_path(repo_root, fixture_root, relative);
    let text = fs::read_to_string(&path).map_err(|e| ConformanceError::Fixture(format!("cannot read '{}': {e}", path.display())))?;
    parse_turtle(&text).map_err(|e| ConformanceError::Fixture(format!("cannot parse turtle fixture '{}': {e}", path.display())))
}

fn load_text(repo_root: &Path, fixture_root: &Path, relative: &str) -> Result<String, ConformanceError> {
    let path = discovery::resolve_fixture_path(repo_root, fixture_root, relative);
    fs::read_to_string(&path).map_err(|e| ConformanceError::Fixture(format!("cannot read '{}': {e}", path.display())))
}

fn load_case(repo_root: &Path, fixture_root: &Path, relative: &str) -> Result<ConformanceCase, ConformanceError> {
    let path = discovery::resolve_fixture_path(repo_root, fixture_root, relative);
    let text = fs::read_to_string(&path).map_err(|e| ConformanceError::Fixture(format!("cannot read '{}': {e}", path.display())))?;
    serde_json::from_str(&text).map_err(ConformanceError::from)
}

fn no_implicit_semantics(graph: &Graph) -> bool {
    graph.iter().all(|t| !ns::FORBIDDEN_IMPLICIT_PROPERTIES.contains(&t.predicate.as_str()))
}

fn defaults_materialized(graph: &Graph) -> bool {
    for stroke in graph.subjects_of_type(&Iri::from(ns::STROKE)) {
        if graph.objects(&stroke, &Iri::from(ns::STROKE_WIDTH)).next().is_none() {
            return false;
        }
    }
    for grid in graph.subjects_of_type(&Iri::from(ns::BASELINE_GRID)) {
        if graph.objects(&grid, &Iri::from(ns::BASELINE_STEP)).next().is_none() {
            return false;
        }
    }
    true
}

/// Runs the single check named by `case.kind` against its fixture graph,
/// returning whether the graph satisfies the check.
fn run_check(repo_root: &Path, fixture_root: &Path, case: &ConformanceCase) -> Result<bool, ConformanceError> {
    match case.kind.as_str() {
        "no_implicit_semantics" => {
            let graph = load_graph(repo_root, fixture_root, &case.input)?;
            Ok(no_implicit_semantics(&graph))
        }
        "defaults_materialized" => {
            let graph = load_graph(repo_root, fixture_root, &case.input)?;
            Ok(defaults_materialized(&graph))
        }
        "nfc" => {
            let graph = load_graph(repo_root, fixture_root, &case.input)?;
            Ok(canonical::is_nfc_graph(&graph))
        }
        "no_blank_nodes" => {
            let graph = load_graph(repo_root, fixture_root, &case.input)?;
            Ok(!canonical::has_blank_node(&graph))
        }
        "canonical_serialization" => {
            let graph = load_graph(repo_root, fixture_root, &case.input)?;
            let expected_path = case
                .expected
                .as_deref()
                .ok_or_else(|| ConformanceError::Fixture("canonical_serialization case is missing 'expected'".to_string()))?;
            let expected_text = load_text(repo_root, fixture_root, expected_path)?;
            match canonical::canonical_bytes(&graph) {
                Ok(bytes) => Ok(String::from_utf8(bytes).is_ok_and(|text| text == expected_text)),
                Err(_) => Ok(false),
            }
        }
        "scoped_hash" => {
            let graph = load_graph(repo_root, fixture_root, &case.input)?;
            let composition = case
                .composition
                .as_deref()
                .ok_or_else(|| ConformanceError::Fixture("scoped_hash case is missing 'composition'".to_string()))?;
            let expected = case
                .expected
                .as_deref()
                .ok_or_else(|| ConformanceError::Fixture("scoped_hash case is missing 'expected'".to_string()))?;
            let scoped = canonical::scoped_subgraph(&graph, &Iri::from(composition), &Iri::from(ns::OWNED_BY));
            match canonical::graph_hash(&scoped) {
                Ok(hash) => Ok(hash == expected),
                Err(_) => Ok(false),
            }
        }
        "validation_contract" => {
            let graph = load_graph(repo_root, fixture_root, &case.input)?;
            let shapes_rel = case
                .shapes
                .as_deref()
                .ok_or_else(|| ConformanceError::Fixture("validation_contract case is missing 'shapes'".to_string()))?;
            let ontology_rel = case
                .ontology
                .as_deref()
                .ok_or_else(|| ConformanceError::Fixture("validation_contract case is missing 'ontology'".to_string()))?;
            let shapes = load_graph(repo_root, fixture_root, shapes_rel)?;
            let ontology = load_graph(repo_root, fixture_root, ontology_rel)?;

            let structural_ok = no_implicit_semantics(&graph)
                && defaults_materialized(&graph)
                && canonical::is_nfc_graph(&graph)
                && !canonical::has_blank_node(&graph);
            if !structural_ok {
                return Ok(false);
            }
            Ok(shacl::validate_graph(&graph, &shapes, &ontology, Inference::Rdfs).conforms)
        }
        other => Err(ConformanceError::Fixture(format!("unrecognized conformance check kind '{other}'"))),
    }
}

/// Runs every `enforcement=PROC` row of `fixture-coverage.csv`, asserting the
/// positive fixture passes its check and the negative fixture fails it.
pub fn run_fixture_coverage(csv_path: &Path, repo_root: &Path, fixture_root: &Path) -> Result<ConformanceRunReport, ConformanceError> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut report = ConformanceRunReport::default();

    for record in reader.deserialize() {
        let row: CoverageRow = record?;
        if row.enforcement != "PROC" {
            continue;
        }
        report.total_clauses += 1;

        let positive_case = match load_case(repo_root, fixture_root, &row.positive_fixture) {
            Ok(case) => case,
            Err(e) => {
                report.failures.push(format!("{}: malformed positive fixture: {e}", row.clause_id));
                continue;
            }
        };
        let negative_case = match load_case(repo_root, fixture_root, &row.negative_fixture) {
            Ok(case) => case,
            Err(e) => {
                report.failures.push(format!("{}: malformed negative fixture: {e}", row.clause_id));
                continue;
            }
        };

        let positive_result = run_check(repo_root, fixture_root, &positive_case);
        let negative_result = run_check(repo_root, fixture_root, &negative_case);

        match (positive_result, negative_result) {
            (Ok(true), Ok(false)) => report.passed_clauses += 1,
            (Ok(pos), Ok(neg)) => {
                report.failures.push(format!("{}: expected (positive=true, negative=false), got ({pos}, {neg})", row.clause_id));
            }
            (Err(e), _) => report.failures.push(format!("{}: positive fixture harness error: {e}", row.clause_id)),
            (_, Err(e)) => report.failures.push(format!("{}: negative fixture harness error: {e}", row.clause_id)),
        }
    }

    Ok(report)
}
