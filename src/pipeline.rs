//! End-to-end pipeline driver: compiles a fixture, evaluates Stage A under
//! pre/post SHACL validation, evaluates Stage B, and emits the Stage C
//! package and decision report. This is the one place both the CLI's direct
//! per-stage subcommands and the vector runners call through, so a
//! hand-stepped `compile` -> `evaluate-stage-a` -> `evaluate-stage-b` ->
//! `emit-stage-c` invocation and a one-shot vector run agree on exactly the
//! same semantics.

use adaptive_codex::Concept;
use adaptive_term::{Iri, Term};

use crate::error::{GraphError, PipelineError};
use crate::intent::CompiledRequest;
use crate::shacl::{self, Inference};
use crate::stage_a::{self, StageAOutcome};
use crate::stage_b::{self, StageBOutcome};
use crate::stage_c::{self, StageCOutcome};
use crate::turtle::parse_turtle;

const EVALUATION_ERROR: &str = "EVALUATION_ERROR";

fn errored_stage_a() -> StageAOutcome {
    StageAOutcome { status: EVALUATION_ERROR, selected_actions: Vec::new(), delta_remove: Vec::new(), delta_add: Vec::new() }
}

fn errored_stage_b() -> StageBOutcome {
    StageBOutcome { status: EVALUATION_ERROR, selected_candidate: None, selected_score: None, applied_relaxations: Vec::new() }
}

pub struct PipelineOutcome {
    pub stage_a: StageAOutcome,
    pub stage_b: StageBOutcome,
    pub stage_c: StageCOutcome,
}

/// Runs Stage A under the pre/post-SHACL validation contract that
/// [`stage_a::evaluate`] itself leaves to its caller: the input graph must
/// conform before evaluation runs at all, and the mutated graph must conform
/// after. Either violation folds into the same `status=error` outcome a
/// Stage A evaluation fault produces -- SHACL non-conformance is never
/// surfaced as a distinct error shape.
pub fn run_stage_a(
    graph_text: &str,
    shapes_text: &str,
    ontology_text: &str,
    compiled: &CompiledRequest,
) -> Result<StageAOutcome, PipelineError> {
    let graph = parse_turtle(graph_text)?;
    let shapes = parse_turtle(shapes_text)?;
    let ontology = parse_turtle(ontology_text)?;

    if !shacl::validate_graph(&graph, &shapes, &ontology, Inference::Rdfs).conforms {
        return Ok(errored_stage_a());
    }

    let composition = Term::Iri(Iri::new(compiled.composition_iri.clone()));
    let view = compiled.view_iri.as_ref().map(|v| Term::Iri(Iri::new(v.clone())));
    let (outcome, mutated) = stage_a::evaluate(&graph, &composition, view.as_ref(), &compiled.context);

    if outcome.status != "ok" {
        return Ok(outcome);
    }
    let mutated = mutated.ok_or_else(|| GraphError::Parse("Stage A reported success with no mutated graph".to_string()))?;
    if !shacl::validate_graph(&mutated, &shapes, &ontology, Inference::Rdfs).conforms {
        return Ok(errored_stage_a());
    }
    Ok(outcome)
}

/// Runs Stage B over a `StageBCandidates` concept tree, folding candidate
/// parse failures into the same `status=error` outcome a scoring fault
/// produces.
pub fn run_stage_b(compiled: &CompiledRequest, candidates_root: &Concept) -> Result<StageBOutcome, PipelineError> {
    let candidates = match stage_b::parse_candidates(candidates_root) {
        Ok(candidates) => candidates,
        Err(_) => return Ok(errored_stage_b()),
    };
    Ok(stage_b::evaluate(&compiled.optimization_profile, compiled.override_set.as_ref(), &candidates))
}

/// Runs the full pipeline: Stage A (with its SHACL contract), Stage B if
/// Stage A succeeded, then Stage C packaging. Stage B is skipped (folded to
/// its own error outcome) whenever Stage A did not succeed, matching Stage
/// C's fail-closed emission contract.
pub fn run_end_to_end(
    compiled: &CompiledRequest,
    graph_text: &str,
    shapes_text: &str,
    ontology_text: &str,
    candidates_root: &Concept,
    workshop_version: &str,
) -> Result<PipelineOutcome, PipelineError> {
    let stage_a = run_stage_a(graph_text, shapes_text, ontology_text, compiled)?;
    let stage_b = if stage_a.status == "ok" { run_stage_b(compiled, candidates_root)? } else { errored_stage_b() };
    let stage_c = stage_c::emit(compiled, &stage_a, &stage_b, workshop_version);
    Ok(PipelineOutcome { stage_a, stage_b, stage_c })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{ObjectiveProfile, OptimizationProfile};
    use crate::ns;

    fn compiled() -> CompiledRequest {
        CompiledRequest {
            intent_id: "urn:intent:editorial-hero-adapt-001".to_string(),
            target_foundry: "paperhat".to_string(),
            policy_set_ref: "urn:policyset:hero".to_string(),
            composition_iri: format!("{}comp1", ns::WD),
            view_iri: None,
            context: vec![crate::intent::ContextEntry {
                key: ns::VIEWPORT_WIDTH_PX.to_string(),
                kind: "integer".to_string(),
                value: "1200".to_string(),
            }],
            context_ext: Vec::new(),
            objective_profile: ObjectiveProfile {
                profile_id: "urn:obj:hero".to_string(),
                primary_objective: "readability".to_string(),
                secondary_objective: None,
                density_goal: None,
                motion_goal: None,
                brand_expression_goal: None,
                localization_goal: None,
                precedence_profile: None,
                priority_weights: Vec::new(),
            },
            optimization_profile: OptimizationProfile {
                profile_id: "urn:opt:hero".to_string(),
                solver_mode: None,
                quantization_mode: None,
                reflow_mode: None,
                relaxation_strategy: None,
                satisfice_threshold: None,
                hard_constraints: Vec::new(),
                soft_terms: Vec::new(),
                relaxation_rules: Vec::new(),
            },
            override_set: None,
        }
    }

    fn graph_text() -> String {
        format!(
            r#"@prefix wd: <{WD}> .
            wd:comp1 a wd:Composition .
            wd:p1 a wd:Policy ;
                wd:appliesTo wd:comp1 ;
                wd:enabled true ;
                wd:priority 10 ;
                wd:conflictStrategy wd:ErrorOnConflict ;
                wd:condition wd:c1 ;
                wd:action wd:a1 .
            wd:c1 wd:contextKey wd:ViewportWidthPx ;
                wd:operator wd:OpGte ;
                wd:conditionValue "600"^^<{XSD_INT}> .
            wd:a1 a wd:Action ;
                wd:mode wd:ReplaceAll ;
                wd:targetNode wd:comp1 ;
                wd:targetProperty wd:strokeWidth ;
                wd:actionValue "4"^^<{XSD_INT}> ."#,
            WD = ns::WD,
            XSD_INT = ns::XSD_INTEGER,
        )
    }

    #[test]
    fn stage_a_runs_clean_with_conforming_empty_shapes() {
        let outcome = run_stage_a(&graph_text(), "", "", &compiled()).unwrap();
        assert_eq!(outcome.status, "ok");
        assert_eq!(outcome.selected_actions.len(), 1);
    }

    #[test]
    fn missing_stage_b_candidates_concept_fails_closed() {
        let bad_root = Concept::new("NotStageBCandidates");
        let outcome = run_stage_b(&compiled(), &bad_root).unwrap();
        assert_eq!(outcome.status, EVALUATION_ERROR);
    }

    #[test]
    fn end_to_end_skips_stage_b_when_stage_a_fails() {
        let mut request = compiled();
        request.context.clear();
        let empty_candidates = Concept::new("StageBCandidates");
        let outcome = run_end_to_end(&request, &graph_text(), "", "", &empty_candidates, "1.0.0").unwrap();
        assert_eq!(outcome.stage_a.status, EVALUATION_ERROR);
        assert_eq!(outcome.stage_b.status, EVALUATION_ERROR);
        assert!(outcome.stage_c.package.is_none());
    }
}
