//! Embedded schema documents for every output artifact the pipeline emits,
//! and the validation entry points the CLI and vector runners call before
//! accepting a rendered envelope. Grounded on
//! `notes/workshop/design/compiler-mapping/scripts/validate_output_schema.py`
//! under `original_source/`: every rendered artifact is checked against its
//! declared schema at the same point `emit_adaptive_plan.py` and
//! `evaluate_stage_b.py` call `validate_rendered_cdx_against_schema` --
//! right after rendering, before the artifact is written or compared.
//!
//! The schema documents themselves live under `schema/` at the workspace
//! root and are embedded at compile time rather than resolved against
//! `PipelineConfig::schema_root` at runtime, so a malformed or missing
//! filesystem schema can never silently disable validation.

use std::sync::OnceLock;

use adaptive_codex::{Concept, Schema};

use crate::error::CodexError;

const STAGE_A_RESULT: &str = include_str!("../schema/stage-a-result.schema.cdx");
const STAGE_B_RESULT: &str = include_str!("../schema/stage-b-result.schema.cdx");
const ADAPTIVE_PLAN_PACKAGE: &str = include_str!("../schema/adaptive-plan-package.schema.cdx");
const ADAPTIVE_DECISION_REPORT: &str = include_str!("../schema/adaptive-decision-report.schema.cdx");

fn load(text: &str) -> Schema {
    let root = Concept::parse(text).expect("embedded schema document is well-formed codex XML");
    Schema::from_concept(&root).expect("embedded schema document parses as a valid Schema")
}

macro_rules! cached_schema {
    ($fn_name:ident, $source:ident) => {
        fn $fn_name() -> &'static Schema {
            static SCHEMA: OnceLock<Schema> = OnceLock::new();
            SCHEMA.get_or_init(|| load($source))
        }
    };
}

cached_schema!(stage_a_result_schema, STAGE_A_RESULT);
cached_schema!(stage_b_result_schema, STAGE_B_RESULT);
cached_schema!(adaptive_plan_package_schema, ADAPTIVE_PLAN_PACKAGE);
cached_schema!(adaptive_decision_report_schema, ADAPTIVE_DECISION_REPORT);

/// Validates a rendered `StageAResult` against its declared schema.
pub fn validate_stage_a_result(rendered: &Concept) -> Result<(), CodexError> {
    Ok(stage_a_result_schema().validate(rendered)?)
}

/// Validates a rendered `StageBResult` against its declared schema.
pub fn validate_stage_b_result(rendered: &Concept) -> Result<(), CodexError> {
    Ok(stage_b_result_schema().validate(rendered)?)
}

/// Validates a rendered `AdaptivePlanPackage` against its declared schema.
pub fn validate_adaptive_plan_package(rendered: &Concept) -> Result<(), CodexError> {
    Ok(adaptive_plan_package_schema().validate(rendered)?)
}

/// Validates a rendered `AdaptiveDecisionReport` against its declared schema.
pub fn validate_adaptive_decision_report(rendered: &Concept) -> Result<(), CodexError> {
    Ok(adaptive_decision_report_schema().validate(rendered)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage_a::{self, StageAOutcome};
    use crate::stage_b::{self, StageBOutcome};
    use crate::stage_c;
    use crate::intent::{CompiledRequest, ObjectiveProfile, OptimizationProfile, RelaxationRule};

    #[test]
    fn embedded_schemas_parse() {
        stage_a_result_schema();
        stage_b_result_schema();
        adaptive_plan_package_schema();
        adaptive_decision_report_schema();
    }

    #[test]
    fn stage_a_ok_result_validates() {
        let outcome = StageAOutcome {
            status: "ok",
            selected_actions: vec!["urn:action:a1".to_string()],
            delta_remove: Vec::new(),
            delta_add: vec!["<urn:s> <urn:p> \"4\"^^<urn:xsd:integer> .".to_string()],
        };
        assert!(validate_stage_a_result(&stage_a::render_result(&outcome)).is_ok());
    }

    #[test]
    fn stage_a_error_result_validates() {
        let outcome = StageAOutcome { status: "EVALUATION_ERROR", selected_actions: Vec::new(), delta_remove: Vec::new(), delta_add: Vec::new() };
        assert!(validate_stage_a_result(&stage_a::render_result(&outcome)).is_ok());
    }

    #[test]
    fn stage_b_ok_result_validates() {
        let outcome = StageBOutcome {
            status: "ok",
            selected_candidate: Some("urn:candidate:a".to_string()),
            selected_score: Some("0.9".to_string()),
            applied_relaxations: vec![RelaxationRule {
                relax_order: 1,
                relax_weight_class: None,
                relaxation_action: Some("widenThreshold".to_string()),
            }],
        };
        assert!(validate_stage_b_result(&stage_b::render_result(&outcome)).is_ok());
    }

    #[test]
    fn stage_c_package_and_report_validate() {
        let compiled = CompiledRequest {
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
        };
        let stage_a = StageAOutcome { status: "ok", selected_actions: Vec::new(), delta_remove: Vec::new(), delta_add: Vec::new() };
        let stage_b = StageBOutcome {
            status: "ok",
            selected_candidate: Some("urn:candidate:a".to_string()),
            selected_score: Some("0.9".to_string()),
            applied_relaxations: Vec::new(),
        };
        let outcome = stage_c::emit(&compiled, &stage_a, &stage_b, "1.0.0");
        let package = outcome.package.expect("package expected on success");
        assert!(validate_adaptive_plan_package(&package).is_ok());
        assert!(validate_adaptive_decision_report(&outcome.report).is_ok());
    }

    #[test]
    fn stage_c_error_report_validates() {
        let compiled_outcome = StageAOutcome { status: "EVALUATION_ERROR", selected_actions: Vec::new(), delta_remove: Vec::new(), delta_add: Vec::new() };
        let stage_b = StageBOutcome { status: "EVALUATION_ERROR", selected_candidate: None, selected_score: None, applied_relaxations: Vec::new() };
        let compiled = CompiledRequest {
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
        };
        let outcome = stage_c::emit(&compiled, &compiled_outcome, &stage_b, "1.0.0");
        assert!(outcome.package.is_none());
        assert!(validate_adaptive_decision_report(&outcome.report).is_ok());
    }
}
