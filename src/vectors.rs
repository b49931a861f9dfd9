//! `.cdx` test-vector runners for Stage A, Stage B, Stage C and full
//! end-to-end pipeline vectors. Each runner iterates a directory of vector
//! files in sorted order, evaluates the vector's inputs through the
//! pipeline, and compares the result against the vector's embedded
//! expectation.

use std::fs;
use std::path::Path;

use adaptive_codex::Concept;
use adaptive_term::{Iri, Term};

use crate::discovery;
use crate::intent;
use crate::pipeline;
use crate::schemas;
use crate::shacl::{self, Inference};
use crate::stage_a;
use crate::stage_b;
use crate::stage_c;
use crate::turtle::parse_turtle;

/// One vector's outcome: whether it matched its expectation, and a detail
/// string used for the `[FAIL]` diagnostic when it didn't.
pub struct VectorOutcome {
    pub id: String,
    pub passed: bool,
    pub detail: String,
}

/// Aggregate result of running every `.cdx` vector in a directory.
pub struct VectorRunReport {
    pub outcomes: Vec<VectorOutcome>,
}

impl VectorRunReport {
    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.passed).count()
    }
}

fn sorted_vector_files(dir: &Path) -> std::io::Result<Vec<std::path::PathBuf>> {
    let mut files: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "cdx"))
        .collect();
    files.sort();
    Ok(files)
}

fn read_concept(path: &Path) -> Result<Concept, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("cannot read '{}': {e}", path.display()))?;
    Concept::parse(&text).map_err(|e| format!("cannot parse '{}': {e}", path.display()))
}

fn optional_text(repo_root: &Path, fixture_root: &Path, relative: Option<&str>) -> Result<String, String> {
    match relative {
        None | Some("") => Ok(String::new()),
        Some(relative) => {
            let path = discovery::resolve_fixture_path(repo_root, fixture_root, relative);
            fs::read_to_string(&path).map_err(|e| format!("cannot read '{}': {e}", path.display()))
        }
    }
}

fn context_entries_from(root: &Concept) -> Result<Vec<intent::ContextEntry>, String> {
    root.children_named("ContextEntry")
        .map(|c| {
            Ok(intent::ContextEntry {
                key: c.trait_value("key").ok_or("ContextEntry missing 'key'")?.to_string(),
                kind: c.trait_value("type").ok_or("ContextEntry missing 'type'")?.to_string(),
                value: c.trait_value("value").ok_or("ContextEntry missing 'value'")?.to_string(),
            })
        })
        .collect()
}

/// Runs every `PolicyVector` `.cdx` file in `dir`: parses the embedded
/// graph/composition/context, evaluates Stage A, and compares the outcome
/// against the vector's expected `StageAResult`.
pub fn run_policy_vectors(dir: &Path, repo_root: &Path, fixture_root: &Path) -> std::io::Result<VectorRunReport> {
    let mut outcomes = Vec::new();
    for path in sorted_vector_files(dir)? {
        let name = path.file_name().unwrap_or_default().to_string_lossy().to_string();
        outcomes.push(run_one_policy_vector(&path, repo_root, fixture_root).unwrap_or_else(|detail| VectorOutcome {
            id: name,
            passed: false,
            detail,
        }));
    }
    Ok(VectorRunReport { outcomes })
}

fn run_one_policy_vector(path: &Path, repo_root: &Path, fixture_root: &Path) -> Result<VectorOutcome, String> {
    let root = read_concept(path)?;
    if root.name != "PolicyVector" {
        return Err(format!("expected root concept 'PolicyVector', found '{}'", root.name));
    }
    let id = root.trait_value("id").unwrap_or_default().to_string();
    let graph_file = root.trait_value("graphFile").ok_or("PolicyVector missing 'graphFile'")?;
    let composition_iri = root.trait_value("compositionIri").ok_or("PolicyVector missing 'compositionIri'")?.to_string();
    let view_iri = root.trait_value("viewIri").map(str::to_string);

    let graph_text = optional_text(repo_root, fixture_root, Some(graph_file))?;
    let shapes_text = optional_text(repo_root, fixture_root, root.trait_value("shapesFile"))?;
    let ontology_text = optional_text(repo_root, fixture_root, root.trait_value("ontologyFile"))?;
    let context = context_entries_from(&root)?;

    let expected = root.first_child_named("StageAResult").ok_or("PolicyVector missing expected 'StageAResult'")?;
    let expected_outcome = stage_a::parse_result(expected).map_err(|e| e.to_string())?;

    let graph = parse_turtle(&graph_text).map_err(|e| e.to_string())?;
    let shapes = parse_turtle(&shapes_text).map_err(|e| e.to_string())?;
    let ontology = parse_turtle(&ontology_text).map_err(|e| e.to_string())?;

    let actual = if !shacl::validate_graph(&graph, &shapes, &ontology, Inference::Rdfs).conforms {
        stage_a::StageAOutcome { status: "EVALUATION_ERROR", selected_actions: Vec::new(), delta_remove: Vec::new(), delta_add: Vec::new() }
    } else {
        let composition = Term::Iri(Iri::new(composition_iri));
        let view = view_iri.map(|v| Term::Iri(Iri::new(v)));
        let (outcome, mutated) = stage_a::evaluate(&graph, &composition, view.as_ref(), &context);
        if outcome.status == "ok" {
            let conforms = mutated
                .map(|m| shacl::validate_graph(&m, &shapes, &ontology, Inference::Rdfs).conforms)
                .unwrap_or(false);
            if conforms {
                outcome
            } else {
                stage_a::StageAOutcome { status: "EVALUATION_ERROR", selected_actions: Vec::new(), delta_remove: Vec::new(), delta_add: Vec::new() }
            }
        } else {
            outcome
        }
    };

    if actual.status != expected_outcome.status {
        return Ok(VectorOutcome {
            id,
            passed: false,
            detail: format!("status mismatch expected={} actual={}", expected_outcome.status, actual.status),
        });
    }
    if actual.status == "ok" {
        if actual.selected_actions != expected_outcome.selected_actions {
            return Ok(VectorOutcome { id, passed: false, detail: "selected_actions mismatch".to_string() });
        }
        if actual.delta_remove != expected_outcome.delta_remove || actual.delta_add != expected_outcome.delta_add {
            return Ok(VectorOutcome { id, passed: false, detail: "delta mismatch".to_string() });
        }
    }
    if let Err(e) = schemas::validate_stage_a_result(&stage_a::render_result(&actual)) {
        return Ok(VectorOutcome { id, passed: false, detail: format!("schema validation failed: {e}") });
    }
    Ok(VectorOutcome { id, passed: true, detail: String::new() })
}

/// Runs every `StageBVector` `.cdx` file in `dir`: parses the embedded
/// optimization/override profile and candidate set, evaluates Stage B, and
/// compares the outcome against the vector's expected `StageBResult`.
pub fn run_stage_b_vectors(dir: &Path) -> std::io::Result<VectorRunReport> {
    let mut outcomes = Vec::new();
    for path in sorted_vector_files(dir)? {
        let name = path.file_name().unwrap_or_default().to_string_lossy().to_string();
        outcomes.push(run_one_stage_b_vector(&path).unwrap_or_else(|detail| VectorOutcome { id: name, passed: false, detail }));
    }
    Ok(VectorRunReport { outcomes })
}

fn run_one_stage_b_vector(path: &Path) -> Result<VectorOutcome, String> {
    let root = read_concept(path)?;
    if root.name != "StageBVector" {
        return Err(format!("expected root concept 'StageBVector', found '{}'", root.name));
    }
    let id = root.trait_value("id").unwrap_or_default().to_string();

    let compiled_root = root.first_child_named("CompiledAdaptiveRequest").ok_or("StageBVector missing 'CompiledAdaptiveRequest'")?;
    let compiled = intent::parse_compiled_request(compiled_root).map_err(|e| e.to_string())?;
    let candidates_root = root.first_child_named("StageBCandidates").ok_or("StageBVector missing 'StageBCandidates'")?;
    let candidates = stage_b::parse_candidates(candidates_root).map_err(|e| e.to_string())?;
    let expected = root.first_child_named("StageBResult").ok_or("StageBVector missing expected 'StageBResult'")?;
    let expected_outcome = stage_b::parse_result(expected).map_err(|e| e.to_string())?;

    let actual = stage_b::evaluate(&compiled.optimization_profile, compiled.override_set.as_ref(), &candidates);

    if actual.status != expected_outcome.status {
        return Ok(VectorOutcome {
            id,
            passed: false,
            detail: format!("status mismatch expected={} actual={}", expected_outcome.status, actual.status),
        });
    }
    if actual.status == "ok" {
        if actual.selected_candidate != expected_outcome.selected_candidate {
            return Ok(VectorOutcome { id, passed: false, detail: "selected_candidate mismatch".to_string() });
        }
        if actual.selected_score != expected_outcome.selected_score {
            return Ok(VectorOutcome { id, passed: false, detail: "selected_score mismatch".to_string() });
        }
        if actual.applied_relaxations.len() != expected_outcome.applied_relaxations.len() {
            return Ok(VectorOutcome { id, passed: false, detail: "applied_relaxations length mismatch".to_string() });
        }
    }
    if let Err(e) = schemas::validate_stage_b_result(&stage_b::render_result(&actual)) {
        return Ok(VectorOutcome { id, passed: false, detail: format!("schema validation failed: {e}") });
    }
    Ok(VectorOutcome { id, passed: true, detail: String::new() })
}

fn error_report_status(report: &Concept) -> (String, Option<String>) {
    (
        report.trait_value("status").unwrap_or_default().to_string(),
        report.trait_value("failedStage").map(str::to_string),
    )
}

/// Runs every `StageCVector` `.cdx` file in `dir`: takes pre-computed Stage
/// A/B outcomes, emits Stage C, and compares the resulting decision
/// report's status (and, on success, its linkage to the package) against
/// the vector's expectation.
pub fn run_stage_c_vectors(dir: &Path) -> std::io::Result<VectorRunReport> {
    let mut outcomes = Vec::new();
    for path in sorted_vector_files(dir)? {
        let name = path.file_name().unwrap_or_default().to_string_lossy().to_string();
        outcomes.push(run_one_stage_c_vector(&path).unwrap_or_else(|detail| VectorOutcome { id: name, passed: false, detail }));
    }
    Ok(VectorRunReport { outcomes })
}

fn run_one_stage_c_vector(path: &Path) -> Result<VectorOutcome, String> {
    let root = read_concept(path)?;
    if root.name != "StageCVector" {
        return Err(format!("expected root concept 'StageCVector', found '{}'", root.name));
    }
    let id = root.trait_value("id").unwrap_or_default().to_string();
    let workshop_version = root.trait_value("workshopVersion").unwrap_or("1.0.0");

    let compiled_root = root.first_child_named("CompiledAdaptiveRequest").ok_or("StageCVector missing 'CompiledAdaptiveRequest'")?;
    let compiled = intent::parse_compiled_request(compiled_root).map_err(|e| e.to_string())?;
    let stage_a_root = root.first_child_named("StageAResult").ok_or("StageCVector missing input 'StageAResult'")?;
    let stage_a_outcome = stage_a::parse_result(stage_a_root).map_err(|e| e.to_string())?;
    let stage_b_root = root.first_child_named("StageBResult").ok_or("StageCVector missing input 'StageBResult'")?;
    let stage_b_outcome = stage_b::parse_result(stage_b_root).map_err(|e| e.to_string())?;

    let expect = root.first_child_named("Expect").ok_or("StageCVector missing 'Expect'")?;
    let expected_status = expect.trait_value("status").ok_or("Expect missing 'status'")?;
    let expected_failed_stage = expect.trait_value("failedStage");

    let outcome = stage_c::emit(&compiled, &stage_a_outcome, &stage_b_outcome, workshop_version);
    let (actual_status, actual_failed_stage) = error_report_status(&outcome.report);

    if actual_status != expected_status {
        return Ok(VectorOutcome {
            id,
            passed: false,
            detail: format!("status mismatch expected={expected_status} actual={actual_status}"),
        });
    }
    if expected_status == "error" && actual_failed_stage.as_deref() != expected_failed_stage {
        return Ok(VectorOutcome {
            id,
            passed: false,
            detail: format!("failedStage mismatch expected={expected_failed_stage:?} actual={actual_failed_stage:?}"),
        });
    }
    if expected_status == "ok" {
        let package = outcome.package.ok_or("expected a package on status=ok but none was emitted")?;
        if package.trait_value("packageContentHash") != outcome.report.trait_value("adaptivePlanPackageContentHash") {
            return Ok(VectorOutcome { id, passed: false, detail: "package/report hash linkage mismatch".to_string() });
        }
        if let Err(e) = schemas::validate_adaptive_plan_package(&package) {
            return Ok(VectorOutcome { id, passed: false, detail: format!("schema validation failed: {e}") });
        }
    }
    if let Err(e) = schemas::validate_adaptive_decision_report(&outcome.report) {
        return Ok(VectorOutcome { id, passed: false, detail: format!("schema validation failed: {e}") });
    }
    Ok(VectorOutcome { id, passed: true, detail: String::new() })
}

/// Runs every `AdaptivePipelineVector` `.cdx` file in `dir`: compiles the
/// embedded fixture, runs the full pipeline, and compares the final
/// decision report's status against the vector's expectation.
pub fn run_pipeline_vectors(dir: &Path, repo_root: &Path, fixture_root: &Path) -> std::io::Result<VectorRunReport> {
    let mut outcomes = Vec::new();
    for path in sorted_vector_files(dir)? {
        let name = path.file_name().unwrap_or_default().to_string_lossy().to_string();
        outcomes.push(run_one_pipeline_vector(&path, repo_root, fixture_root).unwrap_or_else(|detail| VectorOutcome {
            id: name,
            passed: false,
            detail,
        }));
    }
    Ok(VectorRunReport { outcomes })
}

fn run_one_pipeline_vector(path: &Path, repo_root: &Path, fixture_root: &Path) -> Result<VectorOutcome, String> {
    let root = read_concept(path)?;
    if root.name != "AdaptivePipelineVector" {
        return Err(format!("expected root concept 'AdaptivePipelineVector', found '{}'", root.name));
    }
    let id = root.trait_value("id").unwrap_or_default().to_string();
    let workshop_version = root.trait_value("workshopVersion").unwrap_or("1.0.0");

    let graph_text = optional_text(repo_root, fixture_root, root.trait_value("graphFile"))?;
    let shapes_text = optional_text(repo_root, fixture_root, root.trait_value("shapesFile"))?;
    let ontology_text = optional_text(repo_root, fixture_root, root.trait_value("ontologyFile"))?;

    let fixture = root.first_child_named("AdaptiveFixture").ok_or("AdaptivePipelineVector missing 'AdaptiveFixture'")?;
    let compiled = intent::compile_fixture(fixture).map_err(|e| e.to_string())?;
    let candidates_root = root.first_child_named("StageBCandidates").ok_or("AdaptivePipelineVector missing 'StageBCandidates'")?;

    let expect = root.first_child_named("Expect").ok_or("AdaptivePipelineVector missing 'Expect'")?;
    let expected_status = expect.trait_value("status").ok_or("Expect missing 'status'")?;

    let outcome = pipeline::run_end_to_end(&compiled, &graph_text, &shapes_text, &ontology_text, candidates_root, workshop_version)
        .map_err(|e| e.to_string())?;
    let (actual_status, _) = error_report_status(&outcome.stage_c.report);

    if actual_status != expected_status {
        return Ok(VectorOutcome {
            id,
            passed: false,
            detail: format!("status mismatch expected={expected_status} actual={actual_status}"),
        });
    }
    if let Some(package) = &outcome.stage_c.package {
        if let Err(e) = schemas::validate_adaptive_plan_package(package) {
            return Ok(VectorOutcome { id, passed: false, detail: format!("schema validation failed: {e}") });
        }
    }
    if let Err(e) = schemas::validate_adaptive_decision_report(&outcome.stage_c.report) {
        return Ok(VectorOutcome { id, passed: false, detail: format!("schema validation failed: {e}") });
    }
    Ok(VectorOutcome { id, passed: true, detail: String::new() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ns;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut f = fs::File::create(dir.join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn policy_vector_matches_ok_outcome() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(
            tmp.path(),
            "graph.ttl",
            &format!(
                r#"@prefix wd: <{WD}> .
                @prefix gd: <{GD}> .
                wd:comp1 a wd:Composition .
                wd:p1 a wd:Policy ;
                    wd:appliesTo wd:comp1 ;
                    wd:enabled true ;
                    wd:priority 10 ;
                    wd:conflictStrategy wd:ErrorOnConflict ;
                    wd:condition wd:c1 ;
                    wd:action wd:a1 .
                wd:c1 wd:contextKey gd:ViewportWidthPx ;
                    wd:operator wd:OpGte ;
                    wd:conditionValue "600"^^<{XSD_INT}> .
                wd:a1 a wd:Action ;
                    wd:mode wd:ReplaceAll ;
                    wd:targetNode wd:comp1 ;
                    wd:targetProperty wd:strokeWidth ;
                    wd:actionValue "4"^^<{XSD_INT}> ."#,
                WD = ns::WD,
                GD = ns::GD,
                XSD_INT = ns::XSD_INTEGER,
            ),
        );

        let expected = Concept::new("StageAResult")
            .with_trait("status", "ok")
            .with_child(Concept::new("SelectedAction").with_trait("actionIri", &format!("{}a1", ns::WD)))
            .with_child(
                Concept::new("Delta").with_child(
                    Concept::new("Add").with_trait(
                        "triple",
                        &format!("<{0}comp1> <{0}strokeWidth> \"4\"^^<{1}> .", ns::WD, ns::XSD_INTEGER),
                    ),
                ),
            );
        let vector = Concept::new("PolicyVector")
            .with_trait("id", "pv-001")
            .with_trait("graphFile", "graph.ttl")
            .with_trait("compositionIri", &format!("{}comp1", ns::WD))
            .with_child(Concept::new("ContextEntry").with_trait("key", ns::VIEWPORT_WIDTH_PX).with_trait("type", "integer").with_trait("value", "1200"))
            .with_child(expected);
        write_file(tmp.path(), "vector.cdx", &vector.render());

        let report = run_policy_vectors(tmp.path(), tmp.path(), tmp.path()).unwrap();
        assert_eq!(report.failure_count(), 0, "{}", report.outcomes[0].detail);
    }

    #[test]
    fn missing_vector_directory_surfaces_as_io_error() {
        let result = run_stage_b_vectors(Path::new("/nonexistent/path/for/vectors"));
        assert!(result.is_err());
    }
}
