//! Stage C: deterministic packaging of a Stage A + Stage B outcome into a
//! content-hashed plan package and its linked decision report. On any
//! upstream failure only an error decision report is produced; a package is
//! never emitted unless both prior stages succeeded.

use adaptive_codex::Concept;
use adaptive_term::{sha256_hex, Iri};

use crate::intent::CompiledRequest;
use crate::stage_a::StageAOutcome;
use crate::stage_b::StageBOutcome;

pub struct StageCOutcome {
    pub package: Option<Concept>,
    pub report: Concept,
}

fn render_error_report(failed_stage: &str) -> Concept {
    Concept::new("AdaptiveDecisionReport")
        .with_trait("status", "error")
        .with_trait("error", "EVALUATION_ERROR")
        .with_trait("failedStage", failed_stage)
}

/// Emits the Stage C package and decision report for a completed Stage
/// A/B evaluation. Returns only an error report (no package) if either
/// upstream stage failed.
pub fn emit(compiled: &CompiledRequest, stage_a: &StageAOutcome, stage_b: &StageBOutcome, workshop_version: &str) -> StageCOutcome {
    let span = tracing::info_span!("stage_c", intent_id = %compiled.intent_id);
    let _guard = span.enter();

    if stage_a.status != "ok" {
        tracing::info!(status = "error", failed_stage = "stageA", "stage_c complete");
        return StageCOutcome { package: None, report: render_error_report("stageA") };
    }
    if stage_b.status != "ok" {
        tracing::info!(status = "error", failed_stage = "stageB", "stage_c complete");
        return StageCOutcome { package: None, report: render_error_report("stageB") };
    }

    let selected_candidate = stage_b.selected_candidate.as_deref().unwrap_or_default();
    let selected_score = stage_b.selected_score.as_deref().unwrap_or_default();

    let projection_identifier = format!(
        "urn:projection:adaptive-plan:{}:{}",
        compiled.target_foundry,
        Iri::new(compiled.intent_id.clone()).last_colon_segment()
    );
    let projection_definition_closure_hash = sha256_hex(b"projection-definition:adaptive-plan-projection:1.0.0");
    let parameter_hash = sha256_hex(
        format!(
            "intentId={};targetFoundry={};policySetRef={};compositionIri={}",
            compiled.intent_id, compiled.target_foundry, compiled.policy_set_ref, compiled.composition_iri
        )
        .as_bytes(),
    );

    let mut fields = vec![
        format!("projection={projection_identifier}"),
        format!("selectedCandidate={selected_candidate}"),
        format!("selectedScore={selected_score}"),
    ];
    if !stage_b.applied_relaxations.is_empty() {
        let actions: Vec<&str> = stage_b.applied_relaxations.iter().map(|r| r.relaxation_action.as_deref().unwrap_or_default()).collect();
        fields.push(format!("relaxation={}", actions.join("+")));
    } else if !stage_a.selected_actions.is_empty() || !stage_a.delta_remove.is_empty() || !stage_a.delta_add.is_empty() {
        fields.push(format!(
            "actionCount={};deltaRemoveCount={};deltaAddCount={}",
            stage_a.selected_actions.len(),
            stage_a.delta_remove.len(),
            stage_a.delta_add.len()
        ));
    }
    let payload_canonical_bytes = fields.join(";");
    let payload_content_hash = sha256_hex(payload_canonical_bytes.as_bytes());

    let package_seed = [
        workshop_version,
        &projection_definition_closure_hash,
        &projection_identifier,
        &parameter_hash,
        &payload_content_hash,
    ]
    .join("|");
    let package_content_hash = sha256_hex(package_seed.as_bytes());
    let closure_hash = sha256_hex(format!("closure|{package_seed}").as_bytes());

    let payload_record = Concept::new("AdaptivePlanPayloadRecord")
        .with_trait("projectionIdentifier", &projection_identifier)
        .with_trait("projectionDefinitionClosureHash", &projection_definition_closure_hash)
        .with_trait("parameterHash", &parameter_hash)
        .with_trait("payloadContentHash", &payload_content_hash)
        .with_trait("payloadCanonicalBytes", &payload_canonical_bytes);

    let package = Concept::new("AdaptivePlanPackage")
        .with_trait("workshopVersion", workshop_version)
        .with_trait("closureHash", &closure_hash)
        .with_trait("projectionDefinitionClosureHash", &projection_definition_closure_hash)
        .with_trait("contentHashAlgorithm", "SHA256")
        .with_trait("packageContentHash", &package_content_hash)
        .with_child(payload_record);

    let report = Concept::new("AdaptiveDecisionReport")
        .with_trait("status", "ok")
        .with_trait("adaptivePlanPackageContentHash", &package_content_hash)
        .with_child(crate::stage_a::render_result(stage_a))
        .with_child(crate::stage_b::render_result(stage_b));

    tracing::info!(status = "ok", package_content_hash = %package_content_hash, "stage_c complete");
    StageCOutcome { package: Some(package), report }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{ObjectiveProfile, OptimizationProfile};

    fn compiled() -> CompiledRequest {
        CompiledRequest {
            intent_id: "urn:intent:editorial-hero-adapt-001".to_string(),
            target_foundry: "paperhat".to_string(),
            policy_set_ref: "urn:policyset:hero".to_string(),
            composition_iri: "urn:comp:hero".to_string(),
            view_iri: None,
            context: Vec::new(),
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

    #[test]
    fn empty_stage_a_omits_action_and_relaxation_fields() {
        let stage_a = StageAOutcome { status: "ok", selected_actions: Vec::new(), delta_remove: Vec::new(), delta_add: Vec::new() };
        let stage_b =
            StageBOutcome { status: "ok", selected_candidate: Some("candA".to_string()), selected_score: Some("0.9".to_string()), applied_relaxations: Vec::new() };
        let outcome = emit(&compiled(), &stage_a, &stage_b, "1.0.0");
        let package = outcome.package.expect("package expected on success");
        let payload = package.first_child_named("AdaptivePlanPayloadRecord").unwrap();
        let bytes = payload.trait_value("payloadCanonicalBytes").unwrap();
        assert!(!bytes.contains("relaxation="));
        assert!(!bytes.contains("actionCount="));
    }

    #[test]
    fn stage_a_failure_yields_error_report_with_no_package() {
        let stage_a = StageAOutcome { status: "EVALUATION_ERROR", selected_actions: Vec::new(), delta_remove: Vec::new(), delta_add: Vec::new() };
        let stage_b = StageBOutcome { status: "EVALUATION_ERROR", selected_candidate: None, selected_score: None, applied_relaxations: Vec::new() };
        let outcome = emit(&compiled(), &stage_a, &stage_b, "1.0.0");
        assert!(outcome.package.is_none());
        assert_eq!(outcome.report.trait_value("failedStage"), Some("stageA"));
    }

    #[test]
    fn package_and_report_hashes_are_linked_on_success() {
        let stage_a = StageAOutcome { status: "ok", selected_actions: Vec::new(), delta_remove: Vec::new(), delta_add: Vec::new() };
        let stage_b =
            StageBOutcome { status: "ok", selected_candidate: Some("candA".to_string()), selected_score: Some("0.9".to_string()), applied_relaxations: Vec::new() };
        let outcome = emit(&compiled(), &stage_a, &stage_b, "1.0.0");
        let package = outcome.package.unwrap();
        assert_eq!(package.trait_value("packageContentHash"), outcome.report.trait_value("adaptivePlanPackageContentHash"));
    }
}
