//! Compiles an `AdaptiveFixture` envelope into a `CompiledAdaptiveRequest`
//! envelope: derives the Stage A context vector from the viewport/device
//! profile, carries the Stage B objective/optimization/override profiles
//! through in their sorted canonical order, and cross-checks every profile
//! reference.

use rust_decimal::{Decimal, RoundingStrategy};

use adaptive_codex::Concept;

use crate::error::CompileError;

const OBJECTIVE_PRIORITY_WEIGHTS: &[(&str, &str)] = &[("must", "1.0"), ("prefer", "0.7"), ("neutral", "0.4")];
const SOFT_TERM_WEIGHTS: &[(&str, &str)] =
    &[("critical", "1.0"), ("high", "0.75"), ("medium", "0.5"), ("low", "0.25")];
const OVERRIDE_PRIORITY_RANKS: &[(&str, i64)] = &[("critical", 4), ("high", 3), ("medium", 2), ("low", 1)];

#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub key: String,
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct PriorityWeight {
    pub field: String,
    pub weight: String,
}

#[derive(Debug, Clone)]
pub struct ObjectiveProfile {
    pub profile_id: String,
    pub primary_objective: String,
    pub secondary_objective: Option<String>,
    pub density_goal: Option<String>,
    pub motion_goal: Option<String>,
    pub brand_expression_goal: Option<String>,
    pub localization_goal: Option<String>,
    pub precedence_profile: Option<String>,
    pub priority_weights: Vec<PriorityWeight>,
}

#[derive(Debug, Clone, Default)]
pub struct HardConstraint {
    pub key: Option<String>,
    pub scope: Option<String>,
    pub target_ref: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SoftTerm {
    pub key: Option<String>,
    pub scope: Option<String>,
    pub target_ref: Option<String>,
    pub weight_class: String,
    pub weight: String,
}

#[derive(Debug, Clone)]
pub struct RelaxationRule {
    pub relax_order: i64,
    pub relax_weight_class: Option<String>,
    pub relaxation_action: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OptimizationProfile {
    pub profile_id: String,
    pub solver_mode: Option<String>,
    pub quantization_mode: Option<String>,
    pub reflow_mode: Option<String>,
    pub relaxation_strategy: Option<String>,
    pub satisfice_threshold: Option<String>,
    pub hard_constraints: Vec<HardConstraint>,
    pub soft_terms: Vec<SoftTerm>,
    pub relaxation_rules: Vec<RelaxationRule>,
}

#[derive(Debug, Clone, Default)]
pub struct OverrideConstraint {
    pub override_kind: Option<String>,
    pub target_ref: String,
    pub target_property: Option<String>,
    pub override_value: Option<String>,
    pub override_priority: Option<String>,
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OverrideSet {
    pub override_set_id: String,
    pub override_mode: Option<String>,
    pub constraints: Vec<OverrideConstraint>,
}

#[derive(Debug, Clone)]
pub struct CompiledRequest {
    pub intent_id: String,
    pub target_foundry: String,
    pub policy_set_ref: String,
    pub composition_iri: String,
    pub view_iri: Option<String>,
    pub context: Vec<ContextEntry>,
    pub context_ext: Vec<ContextEntry>,
    pub objective_profile: ObjectiveProfile,
    pub optimization_profile: OptimizationProfile,
    pub override_set: Option<OverrideSet>,
}

fn require_child<'a>(node: &'a Concept, name: &str) -> Result<&'a Concept, CompileError> {
    node.first_child_named(name)
        .ok_or_else(|| CompileError::Structural(format!("missing required child '{name}'")))
}

fn require_trait<'a>(node: &'a Concept, name: &str) -> Result<&'a str, CompileError> {
    node.trait_value(name)
        .ok_or_else(|| CompileError::Structural(format!("missing required trait '{name}' on {}", node.name)))
}

fn normalize_token(raw: &str) -> Result<String, CompileError> {
    let stripped = raw.strip_prefix('$').unwrap_or(raw);
    if stripped.is_empty() {
        return Err(CompileError::Structural(format!("token '{raw}' has no content after its '$' marker")));
    }
    Ok(stripped.to_string())
}

fn require_token(node: &Concept, name: &str) -> Result<String, CompileError> {
    normalize_token(require_trait(node, name)?)
}

fn optional_token(node: &Concept, name: &str) -> Result<Option<String>, CompileError> {
    node.trait_value(name).map(normalize_token).transpose()
}

fn require_iri(node: &Concept, name: &str) -> Result<String, CompileError> {
    let value = require_trait(node, name)?;
    if value.is_empty() || !value.contains(':') {
        return Err(CompileError::Structural(format!("trait '{name}' is not a valid IRI reference: '{value}'")));
    }
    Ok(value.to_string())
}

fn optional_iri(node: &Concept, name: &str) -> Result<Option<String>, CompileError> {
    match node.trait_value(name) {
        Some(value) => {
            if value.is_empty() || !value.contains(':') {
                return Err(CompileError::Structural(format!("trait '{name}' is not a valid IRI reference")));
            }
            Ok(Some(value.to_string()))
        }
        None => Ok(None),
    }
}

fn require_int(node: &Concept, name: &str) -> Result<i64, CompileError> {
    require_trait(node, name)?
        .parse::<i64>()
        .map_err(|_| CompileError::Structural(format!("trait '{name}' is not an integer")))
}

fn require_decimal(node: &Concept, name: &str) -> Result<Decimal, CompileError> {
    require_trait(node, name)?
        .parse::<Decimal>()
        .map_err(|_| CompileError::Structural(format!("trait '{name}' is not a decimal")))
}

fn optional_decimal(node: &Concept, name: &str) -> Result<Option<Decimal>, CompileError> {
    match node.trait_value(name) {
        Some(value) => value
            .parse::<Decimal>()
            .map(Some)
            .map_err(|_| CompileError::Structural(format!("trait '{name}' is not a decimal"))),
        None => Ok(None),
    }
}

fn lookup<'a>(table: &'a [(&'a str, &'a str)], key: &str) -> Option<&'a str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Quantizes `value` to 6 fractional digits with banker's rounding, returning
/// a fixed-point (never trimmed) decimal string.
fn quantize_ratio(value: Decimal) -> String {
    value.round_dp_with_strategy(6, RoundingStrategy::MidpointNearestEven).to_string()
}

fn compile_stage_a_context(profile: &Concept) -> Result<Vec<ContextEntry>, CompileError> {
    let mut entries = Vec::new();

    let width = profile.trait_value("viewportWidthPx").map(|_| require_int(profile, "viewportWidthPx")).transpose()?;
    let height = profile.trait_value("viewportHeightPx").map(|_| require_int(profile, "viewportHeightPx")).transpose()?;

    if let Some(width) = width {
        entries.push(ContextEntry {
            key: crate::ns::VIEWPORT_WIDTH_PX.to_string(),
            kind: "integer".to_string(),
            value: width.to_string(),
        });
    }
    if let Some(height) = height {
        entries.push(ContextEntry {
            key: crate::ns::VIEWPORT_HEIGHT_PX.to_string(),
            kind: "integer".to_string(),
            value: height.to_string(),
        });
    }
    if let (Some(width), Some(height)) = (width, height) {
        let width = Decimal::from(width);
        let height = Decimal::from(height);
        if height <= Decimal::ZERO {
            return Err(CompileError::Structural("viewportHeightPx must be positive to derive an aspect ratio".to_string()));
        }
        entries.push(ContextEntry {
            key: crate::ns::VIEWPORT_ASPECT_RATIO.to_string(),
            kind: "decimal".to_string(),
            value: quantize_ratio(width / height),
        });
        let orientation = match width.cmp(&height) {
            std::cmp::Ordering::Greater => "landscape",
            std::cmp::Ordering::Less => "portrait",
            std::cmp::Ordering::Equal => "square",
        };
        entries.push(ContextEntry {
            key: crate::ns::VIEWPORT_ORIENTATION.to_string(),
            kind: "string".to_string(),
            value: orientation.to_string(),
        });
    }

    if let Some(device_class) = optional_token(profile, "deviceClass")? {
        entries.push(ContextEntry { key: crate::ns::DEVICE_CLASS.to_string(), kind: "string".to_string(), value: device_class });
    }

    if let Some(motion) = profile.trait_value("motionPreference") {
        let reduced = match normalize_token(motion)?.as_str() {
            "reduce" => true,
            "noPreference" => false,
            other => {
                return Err(CompileError::Structural(format!("unrecognized motionPreference token '{other}'")));
            }
        };
        entries.push(ContextEntry {
            key: crate::ns::REDUCED_MOTION_PREFERENCE.to_string(),
            kind: "boolean".to_string(),
            value: reduced.to_string(),
        });
    }

    entries.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(entries)
}

fn compile_stage_b_context_ext(profile: &Concept) -> Result<Vec<ContextEntry>, CompileError> {
    let mut entries = Vec::new();

    if let Some(zoom) = optional_decimal(profile, "zoomLevel")? {
        entries.push(ContextEntry { key: "zoomLevel".to_string(), kind: "decimal".to_string(), value: zoom.to_string() });
    }

    for key in [
        "inputModality",
        "contrastPreference",
        "colorSchemePreference",
        "language",
        "region",
        "scriptDirection",
        "networkClass",
        "interactionMode",
    ] {
        if let Some(value) = optional_token(profile, key)? {
            entries.push(ContextEntry { key: key.to_string(), kind: "string".to_string(), value });
        }
    }

    entries.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(entries)
}

fn compile_objective_profile(node: &Concept) -> Result<ObjectiveProfile, CompileError> {
    let profile_id = require_iri(node, "profileId")?;
    let primary_objective = require_token(node, "primaryObjective")?;

    let mut priority_weights = Vec::new();
    for (field, trait_name) in
        [("readability", "readabilityPriority"), ("accessibility", "accessibilityPriority"), ("performance", "performancePriority")]
    {
        if let Some(token) = optional_token(node, trait_name)? {
            let weight = lookup(OBJECTIVE_PRIORITY_WEIGHTS, &token)
                .ok_or_else(|| CompileError::Structural(format!("unrecognized objective priority token '{token}'")))?;
            priority_weights.push(PriorityWeight { field: field.to_string(), weight: weight.to_string() });
        }
    }
    priority_weights.sort_by(|a, b| a.field.cmp(&b.field));

    Ok(ObjectiveProfile {
        profile_id,
        primary_objective,
        secondary_objective: optional_token(node, "secondaryObjective")?,
        density_goal: optional_token(node, "densityGoal")?,
        motion_goal: optional_token(node, "motionGoal")?,
        brand_expression_goal: optional_token(node, "brandExpressionGoal")?,
        localization_goal: optional_token(node, "localizationGoal")?,
        precedence_profile: optional_token(node, "precedenceProfile")?,
        priority_weights,
    })
}

fn compile_optimization_profile(node: &Concept) -> Result<OptimizationProfile, CompileError> {
    let profile_id = require_iri(node, "profileId")?;

    let mut hard_constraints: Vec<HardConstraint> = node
        .children_named("OptimizationHardConstraint")
        .map(|child| {
            Ok(HardConstraint {
                key: optional_token(child, "constraintKey")?,
                scope: optional_token(child, "constraintScope")?,
                target_ref: optional_iri(child, "targetRef")?,
                value: child.trait_value("constraintValue").map(str::to_string),
            })
        })
        .collect::<Result<_, CompileError>>()?;
    hard_constraints.sort_by(|a, b| {
        (a.key.as_deref().unwrap_or(""), a.scope.as_deref().unwrap_or(""), a.target_ref.as_deref().unwrap_or(""), a.value.as_deref().unwrap_or(""))
            .cmp(&(b.key.as_deref().unwrap_or(""), b.scope.as_deref().unwrap_or(""), b.target_ref.as_deref().unwrap_or(""), b.value.as_deref().unwrap_or("")))
    });

    let mut soft_terms: Vec<SoftTerm> = node
        .children_named("OptimizationSoftTerm")
        .map(|child| {
            let weight_class = require_token(child, "weightClass")?;
            let weight = lookup(SOFT_TERM_WEIGHTS, &weight_class)
                .ok_or_else(|| CompileError::Structural(format!("unrecognized soft term weight class '{weight_class}'")))?;
            Ok(SoftTerm {
                key: optional_token(child, "termKey")?,
                scope: optional_token(child, "termScope")?,
                target_ref: optional_iri(child, "targetRef")?,
                weight_class,
                weight: weight.to_string(),
            })
        })
        .collect::<Result<_, CompileError>>()?;
    soft_terms.sort_by(|a, b| {
        (a.key.as_deref().unwrap_or(""), a.scope.as_deref().unwrap_or(""), a.target_ref.as_deref().unwrap_or(""), a.weight_class.as_str())
            .cmp(&(b.key.as_deref().unwrap_or(""), b.scope.as_deref().unwrap_or(""), b.target_ref.as_deref().unwrap_or(""), b.weight_class.as_str()))
    });

    let mut relaxation_rules: Vec<RelaxationRule> = node
        .children_named("RelaxationRule")
        .map(|child| {
            Ok(RelaxationRule {
                relax_order: require_int(child, "relaxOrder")?,
                relax_weight_class: optional_token(child, "relaxWeightClass")?,
                relaxation_action: optional_token(child, "relaxationAction")?,
            })
        })
        .collect::<Result<_, CompileError>>()?;
    relaxation_rules.sort_by(|a, b| {
        (a.relax_order, a.relax_weight_class.as_deref().unwrap_or(""), a.relaxation_action.as_deref().unwrap_or(""))
            .cmp(&(b.relax_order, b.relax_weight_class.as_deref().unwrap_or(""), b.relaxation_action.as_deref().unwrap_or("")))
    });

    Ok(OptimizationProfile {
        profile_id,
        solver_mode: optional_token(node, "solverMode")?,
        quantization_mode: optional_token(node, "quantizationMode")?,
        reflow_mode: optional_token(node, "reflowMode")?,
        relaxation_strategy: optional_token(node, "relaxationStrategy")?,
        satisfice_threshold: optional_decimal(node, "satisficeThreshold")?.map(|d| d.to_string()),
        hard_constraints,
        soft_terms,
        relaxation_rules,
    })
}

fn compile_override_set(node: &Concept) -> Result<OverrideSet, CompileError> {
    let override_set_id = require_iri(node, "overrideSetId")?;
    let override_mode = optional_token(node, "overrideMode")?;

    let mut constraints: Vec<OverrideConstraint> = node
        .children_named("OverrideConstraint")
        .map(|child| {
            Ok(OverrideConstraint {
                override_kind: optional_token(child, "overrideKind")?,
                target_ref: require_iri(child, "targetRef")?,
                target_property: optional_token(child, "targetProperty")?,
                override_value: child.trait_value("overrideValue").map(str::to_string),
                override_priority: optional_token(child, "overridePriority")?,
                expires_at: child.trait_value("expiresAt").map(str::to_string),
            })
        })
        .collect::<Result<_, CompileError>>()?;

    let priority_rank = |c: &OverrideConstraint| -> i64 {
        c.override_priority.as_deref().and_then(|p| OVERRIDE_PRIORITY_RANKS.iter().find(|(k, _)| *k == p)).map_or(0, |(_, r)| *r)
    };
    constraints.sort_by(|a, b| {
        (-priority_rank(a), a.target_ref.as_str(), a.override_kind.as_deref().unwrap_or(""))
            .cmp(&(-priority_rank(b), b.target_ref.as_str(), b.override_kind.as_deref().unwrap_or("")))
    });

    Ok(OverrideSet { override_set_id, override_mode, constraints })
}

/// Compiles an `AdaptiveFixture` concept tree into a [`CompiledRequest`].
pub fn compile_fixture(fixture: &Concept) -> Result<CompiledRequest, CompileError> {
    let intent = require_child(fixture, "AdaptiveIntent")?;
    let context_profile = require_child(fixture, "AdaptiveContextProfile")?;
    let objective_profile_node = require_child(fixture, "AdaptiveObjectiveProfile")?;
    let optimization_profile_node = require_child(fixture, "AdaptiveOptimizationProfile")?;
    let override_set_node = fixture.first_child_named("AdaptiveOverrideSet");

    let intent_id = require_iri(intent, "intentId")?;
    let composition_iri = require_iri(intent, "compositionRef")?;
    let view_iri = optional_iri(intent, "viewRef")?;
    let context_profile_ref = require_iri(intent, "contextProfileRef")?;
    let objective_profile_ref = require_iri(intent, "objectiveProfileRef")?;
    let optimization_profile_ref = require_iri(intent, "optimizationProfileRef")?;
    let policy_set_ref = require_iri(intent, "policySetRef")?;
    let target_foundry = require_token(intent, "targetFoundry")?;
    let override_set_ref = optional_iri(intent, "overrideSetRef")?;

    let profile_id = require_iri(context_profile, "profileId")?;
    if context_profile_ref != profile_id {
        return Err(CompileError::Structural("contextProfileRef does not match the context profile's profileId".to_string()));
    }

    let objective_profile = compile_objective_profile(objective_profile_node)?;
    if objective_profile_ref != objective_profile.profile_id {
        return Err(CompileError::Structural("objectiveProfileRef does not match the objective profile's profileId".to_string()));
    }

    let optimization_profile = compile_optimization_profile(optimization_profile_node)?;
    if optimization_profile_ref != optimization_profile.profile_id {
        return Err(CompileError::Structural("optimizationProfileRef does not match the optimization profile's profileId".to_string()));
    }

    let override_set = match override_set_node {
        Some(node) => {
            let set = compile_override_set(node)?;
            let expected = override_set_ref
                .ok_or_else(|| CompileError::Structural("AdaptiveIntent is missing overrideSetRef but an override set is present".to_string()))?;
            if expected != set.override_set_id {
                return Err(CompileError::Structural("overrideSetRef does not match the override set's overrideSetId".to_string()));
            }
            Some(set)
        }
        None => None,
    };

    Ok(CompiledRequest {
        intent_id,
        target_foundry,
        policy_set_ref,
        composition_iri,
        view_iri,
        context: compile_stage_a_context(context_profile)?,
        context_ext: compile_stage_b_context_ext(context_profile)?,
        objective_profile,
        optimization_profile,
        override_set,
    })
}

fn render_context_entry(tag: &str, entry: &ContextEntry) -> Concept {
    Concept::new(tag).with_trait("key", &entry.key).with_trait("type", &entry.kind).with_trait("value", &entry.value)
}

/// Renders a [`CompiledRequest`] into its `CompiledAdaptiveRequest` concept tree.
pub fn render_compiled_request(req: &CompiledRequest) -> Concept {
    let mut stage_a =
        Concept::new("StageA").with_trait("compositionIri", &req.composition_iri);
    if let Some(view_iri) = &req.view_iri {
        stage_a = stage_a.with_trait("viewIri", view_iri);
    }
    for entry in &req.context {
        stage_a = stage_a.with_child(render_context_entry("ContextEntry", entry));
    }

    let mut objective = Concept::new("ObjectiveProfile")
        .with_trait("profileId", &req.objective_profile.profile_id)
        .with_trait("primaryObjective", &req.objective_profile.primary_objective);
    for (field, value) in [
        ("secondaryObjective", &req.objective_profile.secondary_objective),
        ("densityGoal", &req.objective_profile.density_goal),
        ("motionGoal", &req.objective_profile.motion_goal),
        ("brandExpressionGoal", &req.objective_profile.brand_expression_goal),
        ("localizationGoal", &req.objective_profile.localization_goal),
        ("precedenceProfile", &req.objective_profile.precedence_profile),
    ] {
        if let Some(value) = value {
            objective = objective.with_trait(field, value);
        }
    }
    for weight in &req.objective_profile.priority_weights {
        objective = objective.with_child(Concept::new("PriorityWeight").with_trait("field", &weight.field).with_trait("weight", &weight.weight));
    }

    let mut optimization = Concept::new("OptimizationProfile").with_trait("profileId", &req.optimization_profile.profile_id);
    for (field, value) in [
        ("solverMode", &req.optimization_profile.solver_mode),
        ("quantizationMode", &req.optimization_profile.quantization_mode),
        ("reflowMode", &req.optimization_profile.reflow_mode),
        ("relaxationStrategy", &req.optimization_profile.relaxation_strategy),
        ("satisficeThreshold", &req.optimization_profile.satisfice_threshold),
    ] {
        if let Some(value) = value {
            optimization = optimization.with_trait(field, value);
        }
    }
    for hc in &req.optimization_profile.hard_constraints {
        let mut child = Concept::new("HardConstraint");
        if let Some(v) = &hc.key {
            child = child.with_trait("constraintKey", v);
        }
        if let Some(v) = &hc.scope {
            child = child.with_trait("constraintScope", v);
        }
        if let Some(v) = &hc.target_ref {
            child = child.with_trait("targetRef", v);
        }
        if let Some(v) = &hc.value {
            child = child.with_trait("constraintValue", v);
        }
        optimization = optimization.with_child(child);
    }
    for st in &req.optimization_profile.soft_terms {
        let mut child = Concept::new("SoftTerm").with_trait("weightClass", &st.weight_class).with_trait("weight", &st.weight);
        if let Some(v) = &st.key {
            child = child.with_trait("termKey", v);
        }
        if let Some(v) = &st.scope {
            child = child.with_trait("termScope", v);
        }
        if let Some(v) = &st.target_ref {
            child = child.with_trait("targetRef", v);
        }
        optimization = optimization.with_child(child);
    }
    for rule in &req.optimization_profile.relaxation_rules {
        let mut child = Concept::new("RelaxationRule").with_trait("relaxOrder", rule.relax_order.to_string());
        if let Some(v) = &rule.relax_weight_class {
            child = child.with_trait("relaxWeightClass", v);
        }
        if let Some(v) = &rule.relaxation_action {
            child = child.with_trait("relaxationAction", v);
        }
        optimization = optimization.with_child(child);
    }

    let mut stage_b = Concept::new("StageB");
    for entry in &req.context_ext {
        stage_b = stage_b.with_child(render_context_entry("ContextExtEntry", entry));
    }
    stage_b = stage_b.with_child(objective).with_child(optimization);
    if let Some(override_set) = &req.override_set {
        let mut override_concept = Concept::new("OverrideSet").with_trait("overrideSetId", &override_set.override_set_id);
        if let Some(mode) = &override_set.override_mode {
            override_concept = override_concept.with_trait("overrideMode", mode);
        }
        for constraint in &override_set.constraints {
            let mut child = Concept::new("OverrideConstraint").with_trait("targetRef", &constraint.target_ref);
            if let Some(v) = &constraint.override_kind {
                child = child.with_trait("overrideKind", v);
            }
            if let Some(v) = &constraint.target_property {
                child = child.with_trait("targetProperty", v);
            }
            if let Some(v) = &constraint.override_value {
                child = child.with_trait("overrideValue", v);
            }
            if let Some(v) = &constraint.override_priority {
                child = child.with_trait("overridePriority", v);
            }
            if let Some(v) = &constraint.expires_at {
                child = child.with_trait("expiresAt", v);
            }
            override_concept = override_concept.with_child(child);
        }
        stage_b = stage_b.with_child(override_concept);
    }

    Concept::new("CompiledAdaptiveRequest")
        .with_trait("intentId", &req.intent_id)
        .with_trait("targetFoundry", &req.target_foundry)
        .with_trait("policySetRef", &req.policy_set_ref)
        .with_child(stage_a)
        .with_child(stage_b)
}

fn parse_context_entries(parent: &Concept, tag: &str) -> Result<Vec<ContextEntry>, CompileError> {
    parent
        .children_named(tag)
        .map(|c| {
            Ok(ContextEntry {
                key: require_trait(c, "key")?.to_string(),
                kind: require_trait(c, "type")?.to_string(),
                value: require_trait(c, "value")?.to_string(),
            })
        })
        .collect()
}

fn parse_objective_profile(node: &Concept) -> Result<ObjectiveProfile, CompileError> {
    let priority_weights = node
        .children_named("PriorityWeight")
        .map(|c| {
            Ok(PriorityWeight { field: require_trait(c, "field")?.to_string(), weight: require_trait(c, "weight")?.to_string() })
        })
        .collect::<Result<_, CompileError>>()?;

    Ok(ObjectiveProfile {
        profile_id: require_trait(node, "profileId")?.to_string(),
        primary_objective: require_trait(node, "primaryObjective")?.to_string(),
        secondary_objective: node.trait_value("secondaryObjective").map(str::to_string),
        density_goal: node.trait_value("densityGoal").map(str::to_string),
        motion_goal: node.trait_value("motionGoal").map(str::to_string),
        brand_expression_goal: node.trait_value("brandExpressionGoal").map(str::to_string),
        localization_goal: node.trait_value("localizationGoal").map(str::to_string),
        precedence_profile: node.trait_value("precedenceProfile").map(str::to_string),
        priority_weights,
    })
}

fn parse_optimization_profile(node: &Concept) -> Result<OptimizationProfile, CompileError> {
    let hard_constraints = node
        .children_named("HardConstraint")
        .map(|c| HardConstraint {
            key: c.trait_value("constraintKey").map(str::to_string),
            scope: c.trait_value("constraintScope").map(str::to_string),
            target_ref: c.trait_value("targetRef").map(str::to_string),
            value: c.trait_value("constraintValue").map(str::to_string),
        })
        .collect();

    let soft_terms = node
        .children_named("SoftTerm")
        .map(|c| {
            Ok(SoftTerm {
                key: c.trait_value("termKey").map(str::to_string),
                scope: c.trait_value("termScope").map(str::to_string),
                target_ref: c.trait_value("targetRef").map(str::to_string),
                weight_class: require_trait(c, "weightClass")?.to_string(),
                weight: require_trait(c, "weight")?.to_string(),
            })
        })
        .collect::<Result<_, CompileError>>()?;

    let relaxation_rules = node
        .children_named("RelaxationRule")
        .map(|c| {
            Ok(RelaxationRule {
                relax_order: require_int(c, "relaxOrder")?,
                relax_weight_class: c.trait_value("relaxWeightClass").map(str::to_string),
                relaxation_action: c.trait_value("relaxationAction").map(str::to_string),
            })
        })
        .collect::<Result<_, CompileError>>()?;

    Ok(OptimizationProfile {
        profile_id: require_trait(node, "profileId")?.to_string(),
        solver_mode: node.trait_value("solverMode").map(str::to_string),
        quantization_mode: node.trait_value("quantizationMode").map(str::to_string),
        reflow_mode: node.trait_value("reflowMode").map(str::to_string),
        relaxation_strategy: node.trait_value("relaxationStrategy").map(str::to_string),
        satisfice_threshold: node.trait_value("satisficeThreshold").map(str::to_string),
        hard_constraints,
        soft_terms,
        relaxation_rules,
    })
}

fn parse_override_set(node: &Concept) -> Result<OverrideSet, CompileError> {
    let constraints = node
        .children_named("OverrideConstraint")
        .map(|c| {
            Ok(OverrideConstraint {
                override_kind: c.trait_value("overrideKind").map(str::to_string),
                target_ref: require_trait(c, "targetRef")?.to_string(),
                target_property: c.trait_value("targetProperty").map(str::to_string),
                override_value: c.trait_value("overrideValue").map(str::to_string),
                override_priority: c.trait_value("overridePriority").map(str::to_string),
                expires_at: c.trait_value("expiresAt").map(str::to_string),
            })
        })
        .collect::<Result<_, CompileError>>()?;

    Ok(OverrideSet {
        override_set_id: require_trait(node, "overrideSetId")?.to_string(),
        override_mode: node.trait_value("overrideMode").map(str::to_string),
        constraints,
    })
}

/// Parses a previously rendered `CompiledAdaptiveRequest` concept tree back
/// into a [`CompiledRequest`] -- the inverse of [`render_compiled_request`].
/// Used by the CLI and vector runners to re-load a `compile` command's
/// output without re-deriving it from the original fixture.
pub fn parse_compiled_request(root: &Concept) -> Result<CompiledRequest, CompileError> {
    if root.name != "CompiledAdaptiveRequest" {
        return Err(CompileError::Structural(format!(
            "expected root concept 'CompiledAdaptiveRequest', found '{}'",
            root.name
        )));
    }

    let stage_a = require_child(root, "StageA")?;
    let stage_b = require_child(root, "StageB")?;

    Ok(CompiledRequest {
        intent_id: require_trait(root, "intentId")?.to_string(),
        target_foundry: require_trait(root, "targetFoundry")?.to_string(),
        policy_set_ref: require_trait(root, "policySetRef")?.to_string(),
        composition_iri: require_trait(stage_a, "compositionIri")?.to_string(),
        view_iri: stage_a.trait_value("viewIri").map(str::to_string),
        context: parse_context_entries(stage_a, "ContextEntry")?,
        context_ext: parse_context_entries(stage_b, "ContextExtEntry")?,
        objective_profile: parse_objective_profile(require_child(stage_b, "ObjectiveProfile")?)?,
        optimization_profile: parse_optimization_profile(require_child(stage_b, "OptimizationProfile")?)?,
        override_set: stage_b.first_child_named("OverrideSet").map(parse_override_set).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fixture() -> Concept {
        Concept::new("AdaptiveFixture").with_child(
            Concept::new("AdaptiveIntent")
                .with_trait("intentId", "urn:intent:hero-001")
                .with_trait("compositionRef", "urn:comp:hero")
                .with_trait("contextProfileRef", "urn:ctx:hero")
                .with_trait("objectiveProfileRef", "urn:obj:hero")
                .with_trait("optimizationProfileRef", "urn:opt:hero")
                .with_trait("policySetRef", "urn:policyset:hero")
                .with_trait("targetFoundry", "$paperhat"),
        )
        .with_child(
            Concept::new("AdaptiveContextProfile")
                .with_trait("profileId", "urn:ctx:hero")
                .with_trait("viewportWidthPx", "1600")
                .with_trait("viewportHeightPx", "900")
                .with_trait("deviceClass", "$desktop")
                .with_trait("motionPreference", "$reduce"),
        )
        .with_child(
            Concept::new("AdaptiveObjectiveProfile")
                .with_trait("profileId", "urn:obj:hero")
                .with_trait("primaryObjective", "$readability")
                .with_trait("readabilityPriority", "$must"),
        )
        .with_child(Concept::new("AdaptiveOptimizationProfile").with_trait("profileId", "urn:opt:hero"))
    }

    #[test]
    fn compiles_viewport_derivations() {
        let compiled = compile_fixture(&sample_fixture()).unwrap();
        let aspect = compiled.context.iter().find(|e| e.key == crate::ns::VIEWPORT_ASPECT_RATIO).unwrap();
        assert_eq!(aspect.value, "1.777778");
        let orientation = compiled.context.iter().find(|e| e.key == crate::ns::VIEWPORT_ORIENTATION).unwrap();
        assert_eq!(orientation.value, "landscape");
        let motion = compiled.context.iter().find(|e| e.key == crate::ns::REDUCED_MOTION_PREFERENCE).unwrap();
        assert_eq!(motion.value, "true");
    }

    #[test]
    fn rejects_mismatched_cross_references() {
        let mut fixture = sample_fixture();
        fixture.children[0] = Concept::new("AdaptiveIntent")
            .with_trait("intentId", "urn:intent:hero-001")
            .with_trait("compositionRef", "urn:comp:hero")
            .with_trait("contextProfileRef", "urn:ctx:wrong")
            .with_trait("objectiveProfileRef", "urn:obj:hero")
            .with_trait("optimizationProfileRef", "urn:opt:hero")
            .with_trait("policySetRef", "urn:policyset:hero")
            .with_trait("targetFoundry", "$paperhat");
        assert!(compile_fixture(&fixture).is_err());
    }

    #[test]
    fn renders_back_a_parseable_document() {
        let compiled = compile_fixture(&sample_fixture()).unwrap();
        let rendered = render_compiled_request(&compiled).render();
        let parsed = Concept::parse(&rendered).unwrap();
        assert_eq!(parsed.name, "CompiledAdaptiveRequest");
    }

    #[test]
    fn parse_compiled_request_round_trips_through_rendering() {
        let compiled = compile_fixture(&sample_fixture()).unwrap();
        let concept = render_compiled_request(&compiled);
        let reparsed = parse_compiled_request(&concept).unwrap();
        assert_eq!(reparsed.intent_id, compiled.intent_id);
        assert_eq!(reparsed.composition_iri, compiled.composition_iri);
        assert_eq!(reparsed.context.len(), compiled.context.len());
        assert_eq!(reparsed.objective_profile.profile_id, compiled.objective_profile.profile_id);
        assert_eq!(reparsed.optimization_profile.profile_id, compiled.optimization_profile.profile_id);
    }
}
