//! Stage B: constrained multi-objective candidate selection.
//!
//! Filters the candidate set by an active hard-constraint key set, scores
//! the feasible survivors against an active weighted soft-term set, and
//! satisfices against an optional threshold. When no candidate both
//! qualifies and is feasible, the ordered relaxation cascade loosens the
//! active sets one rule at a time and the whole evaluation is retried from
//! feasibility. Every internal fault collapses to a single `status=error`
//! outcome, mirroring Stage A's contract.

use std::collections::{HashMap, HashSet};

use adaptive_codex::Concept;
use rust_decimal::Decimal;

use crate::error::StageBError;
use crate::intent::{OptimizationProfile, OverrideSet, RelaxationRule};
use crate::ns;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub hard_results: HashMap<String, bool>,
    pub soft_scores: HashMap<String, Decimal>,
    pub override_results: HashMap<(String, String), bool>,
}

#[derive(Debug, Clone)]
pub struct StageBOutcome {
    pub status: &'static str,
    pub selected_candidate: Option<String>,
    pub selected_score: Option<String>,
    pub applied_relaxations: Vec<RelaxationRule>,
}

const EVALUATION_ERROR: &str = "EVALUATION_ERROR";

struct Fault(String);
type Step<T> = Result<T, Fault>;

/// Parses a `StageBCandidates` concept tree into its candidate list.
pub fn parse_candidates(root: &Concept) -> Result<Vec<Candidate>, StageBError> {
    if root.name != "StageBCandidates" {
        return Err(StageBError::Fixture(format!(
            "expected root concept 'StageBCandidates', found '{}'",
            root.name
        )));
    }

    let mut candidates = Vec::new();
    for child in root.children_named("Candidate") {
        let id = child
            .trait_value("id")
            .ok_or_else(|| StageBError::Fixture("Candidate is missing required 'id' trait".to_string()))?
            .to_string();

        let mut hard_results = HashMap::new();
        for hr in child.children_named("HardResult") {
            let key = hr
                .trait_value("key")
                .ok_or_else(|| StageBError::Fixture(format!("candidate '{id}': HardResult missing 'key'")))?;
            let value = hr
                .trait_value("value")
                .ok_or_else(|| StageBError::Fixture(format!("candidate '{id}': HardResult missing 'value'")))?;
            hard_results.insert(key.to_string(), value == "true");
        }

        let mut soft_scores = HashMap::new();
        for sr in child.children_named("SoftScore") {
            let key = sr
                .trait_value("key")
                .ok_or_else(|| StageBError::Fixture(format!("candidate '{id}': SoftScore missing 'key'")))?;
            let raw = sr
                .trait_value("value")
                .ok_or_else(|| StageBError::Fixture(format!("candidate '{id}': SoftScore missing 'value'")))?;
            let value: Decimal = raw
                .parse()
                .map_err(|_| StageBError::Fixture(format!("candidate '{id}': SoftScore value '{raw}' is not a decimal")))?;
            soft_scores.insert(key.to_string(), value);
        }

        let mut override_results = HashMap::new();
        for orr in child.children_named("OverrideResult") {
            let kind = orr.trait_value("kind").unwrap_or_default().to_string();
            let target_ref = orr.trait_value("targetRef").unwrap_or_default().to_string();
            let value = orr
                .trait_value("value")
                .ok_or_else(|| StageBError::Fixture(format!("candidate '{id}': OverrideResult missing 'value'")))?;
            override_results.insert((kind, target_ref), value == "true");
        }

        candidates.push(Candidate { id, hard_results, soft_scores, override_results });
    }

    Ok(candidates)
}

struct ActiveSoftTerm {
    key: String,
    weight: Decimal,
    weight_class: String,
}

fn is_feasible(
    candidate: &Candidate,
    active_hard: &HashSet<String>,
    override_mode: Option<&str>,
    override_set: Option<&OverrideSet>,
) -> Step<bool> {
    for key in active_hard {
        match candidate.hard_results.get(key) {
            Some(true) => {}
            Some(false) => return Ok(false),
            None => return Err(Fault(format!("candidate '{}' has no hard result for '{key}'", candidate.id))),
        }
    }

    if override_mode == Some("strict") {
        if let Some(set) = override_set {
            for constraint in &set.constraints {
                let key = (constraint.override_kind.clone().unwrap_or_default(), constraint.target_ref.clone());
                match candidate.override_results.get(&key) {
                    Some(true) => {}
                    Some(false) => return Ok(false),
                    None => {
                        return Err(Fault(format!(
                            "candidate '{}' has no override result for ({}, {})",
                            candidate.id, key.0, key.1
                        )))
                    }
                }
            }
        }
    }

    Ok(true)
}

fn score_candidate(candidate: &Candidate, active_soft: &[ActiveSoftTerm], weight_sum: Decimal) -> Step<Decimal> {
    let mut total = Decimal::ZERO;
    for term in active_soft {
        let score = candidate
            .soft_scores
            .get(&term.key)
            .ok_or_else(|| Fault(format!("candidate '{}' has no soft score for '{}'", candidate.id, term.key)))?;
        if *score < Decimal::ZERO || *score > Decimal::ONE {
            return Err(Fault(format!("candidate '{}' soft score for '{}' is out of range [0,1]", candidate.id, term.key)));
        }
        total += term.weight * *score;
    }
    Ok(total / weight_sum)
}

fn apply_relaxation(
    rule: &RelaxationRule,
    active_hard: &mut HashSet<String>,
    active_soft: &mut Vec<ActiveSoftTerm>,
    threshold: &mut Option<Decimal>,
) -> Step<()> {
    let action = rule
        .relaxation_action
        .as_deref()
        .ok_or_else(|| Fault("relaxation rule is missing relaxationAction".to_string()))?;

    match action {
        "dropTerm" => {
            let class = rule
                .relax_weight_class
                .as_deref()
                .ok_or_else(|| Fault("dropTerm relaxation is missing relaxWeightClass".to_string()))?;
            let would_remain = active_soft.iter().any(|t| t.weight_class != class);
            if would_remain {
                active_soft.retain(|t| t.weight_class != class);
            }
            // else: deliberate silent no-op, see DESIGN.md.
        }
        "widenThreshold" => {
            if let Some(t) = threshold {
                *t = (*t - Decimal::new(1, 1)).max(Decimal::ZERO);
            }
            // else: silent no-op when no threshold was ever set.
        }
        "allowGroupSplit" => {
            active_hard.remove(ns::PRESERVE_GROUP_COHESION);
        }
        other => return Err(Fault(format!("unrecognized relaxation action '{other}'"))),
    }
    Ok(())
}

fn run(
    optimization: &OptimizationProfile,
    override_set: Option<&OverrideSet>,
    candidates: &[Candidate],
) -> Step<(String, Decimal, Vec<RelaxationRule>)> {
    if candidates.is_empty() {
        return Err(Fault("candidate set is empty".to_string()));
    }

    let mut active_hard: HashSet<String> = optimization
        .hard_constraints
        .iter()
        .map(|hc| hc.key.clone().ok_or_else(|| Fault("hard constraint is missing constraintKey".to_string())))
        .collect::<Result<_, Fault>>()?;

    let mut active_soft: Vec<ActiveSoftTerm> = optimization
        .soft_terms
        .iter()
        .map(|st| {
            let key = st.key.clone().ok_or_else(|| Fault("soft term is missing termKey".to_string()))?;
            let weight: Decimal = st
                .weight
                .parse()
                .map_err(|_| Fault(format!("soft term weight '{}' is not a decimal", st.weight)))?;
            Ok(ActiveSoftTerm { key, weight, weight_class: st.weight_class.clone() })
        })
        .collect::<Result<_, Fault>>()?;

    let mut threshold: Option<Decimal> = optimization
        .satisfice_threshold
        .as_deref()
        .map(|s| s.parse::<Decimal>().map_err(|_| Fault("satisficeThreshold is not a decimal".to_string())))
        .transpose()?;

    let override_mode = override_set.and_then(|o| o.override_mode.as_deref());

    let mut applied = Vec::new();
    let mut rule_idx = 0usize;

    loop {
        let mut feasible = Vec::new();
        for candidate in candidates {
            if is_feasible(candidate, &active_hard, override_mode, override_set)? {
                feasible.push(candidate);
            }
        }

        if !feasible.is_empty() {
            if active_soft.is_empty() {
                return Err(Fault("active soft term set is empty".to_string()));
            }
            let weight_sum: Decimal = active_soft.iter().map(|t| t.weight).sum();
            if weight_sum <= Decimal::ZERO {
                return Err(Fault("active soft term weights do not sum to a positive value".to_string()));
            }

            let mut scored = Vec::with_capacity(feasible.len());
            for candidate in &feasible {
                let score = score_candidate(candidate, &active_soft, weight_sum)?;
                scored.push((candidate.id.clone(), score));
            }

            let qualifying: Vec<(String, Decimal)> =
                scored.into_iter().filter(|(_, score)| threshold.is_none_or(|t| *score >= t)).collect();

            if !qualifying.is_empty() {
                let mut sorted = qualifying;
                sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                let (winner_id, winner_score) = sorted.into_iter().next().expect("non-empty checked above");
                return Ok((winner_id, winner_score, applied));
            }
        }

        if rule_idx >= optimization.relaxation_rules.len() {
            return Err(Fault("relaxation cascade exhausted without a feasible, qualifying candidate".to_string()));
        }
        let rule = optimization.relaxation_rules[rule_idx].clone();
        rule_idx += 1;
        apply_relaxation(&rule, &mut active_hard, &mut active_soft, &mut threshold)?;
        applied.push(rule);
    }
}

/// Evaluates Stage B over `candidates` using the optimization profile and
/// optional override set carried by the compiled request.
pub fn evaluate(optimization: &OptimizationProfile, override_set: Option<&OverrideSet>, candidates: &[Candidate]) -> StageBOutcome {
    let span = tracing::info_span!("stage_b", candidates = candidates.len());
    let _guard = span.enter();
    match run(optimization, override_set, candidates) {
        Ok((id, score, relaxations)) => {
            tracing::debug!(relaxations = relaxations.len(), selected = %id, "stage_b selected candidate");
            tracing::info!(status = "ok", "stage_b complete");
            StageBOutcome {
                status: "ok",
                selected_candidate: Some(id),
                selected_score: Some(score.normalize().to_string()),
                applied_relaxations: relaxations,
            }
        }
        Err(fault) => {
            tracing::info!(status = EVALUATION_ERROR, reason = %fault.0, "stage_b complete");
            StageBOutcome { status: EVALUATION_ERROR, selected_candidate: None, selected_score: None, applied_relaxations: Vec::new() }
        }
    }
}

/// Renders a [`StageBOutcome`] into its `StageBResult` concept tree.
pub fn render_result(outcome: &StageBOutcome) -> Concept {
    let mut root = Concept::new("StageBResult").with_trait("status", outcome.status);
    if let Some(candidate) = &outcome.selected_candidate {
        root = root.with_trait("selectedCandidate", candidate);
    }
    if let Some(score) = &outcome.selected_score {
        root = root.with_trait("selectedScore", score);
    }
    for rule in &outcome.applied_relaxations {
        let mut child = Concept::new("AppliedRelaxation").with_trait("relaxOrder", rule.relax_order.to_string());
        if let Some(class) = &rule.relax_weight_class {
            child = child.with_trait("relaxWeightClass", class);
        }
        if let Some(action) = &rule.relaxation_action {
            child = child.with_trait("relaxationAction", action);
        }
        root = root.with_child(child);
    }
    root
}

/// Parses a previously rendered `StageBResult` concept tree back into a
/// [`StageBOutcome`] -- the inverse of [`render_result`].
pub fn parse_result(root: &Concept) -> Result<StageBOutcome, StageBError> {
    if root.name != "StageBResult" {
        return Err(StageBError::Fixture(format!("expected root concept 'StageBResult', found '{}'", root.name)));
    }
    let status = match root.trait_value("status") {
        Some("ok") => "ok",
        Some(EVALUATION_ERROR) => EVALUATION_ERROR,
        other => return Err(StageBError::Fixture(format!("unrecognized StageBResult status '{other:?}'"))),
    };
    let selected_candidate = root.trait_value("selectedCandidate").map(str::to_string);
    let selected_score = root.trait_value("selectedScore").map(str::to_string);
    let applied_relaxations = root
        .children_named("AppliedRelaxation")
        .map(|c| {
            let relax_order = c
                .trait_value("relaxOrder")
                .ok_or_else(|| StageBError::Fixture("AppliedRelaxation is missing 'relaxOrder'".to_string()))?
                .parse()
                .map_err(|_| StageBError::Fixture("AppliedRelaxation 'relaxOrder' is not an integer".to_string()))?;
            Ok(RelaxationRule {
                relax_order,
                relax_weight_class: c.trait_value("relaxWeightClass").map(str::to_string),
                relaxation_action: c.trait_value("relaxationAction").map(str::to_string),
            })
        })
        .collect::<Result<_, StageBError>>()?;
    Ok(StageBOutcome { status, selected_candidate, selected_score, applied_relaxations })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{HardConstraint, SoftTerm};

    fn candidate(id: &str, hard_ok: bool, score: &str) -> Candidate {
        let mut hard_results = HashMap::new();
        hard_results.insert("hc1".to_string(), hard_ok);
        let mut soft_scores = HashMap::new();
        soft_scores.insert("st1".to_string(), score.parse().unwrap());
        Candidate { id: id.to_string(), hard_results, soft_scores, override_results: HashMap::new() }
    }

    fn profile(threshold: Option<&str>, rules: Vec<RelaxationRule>) -> OptimizationProfile {
        OptimizationProfile {
            profile_id: "urn:opt:p".to_string(),
            solver_mode: None,
            quantization_mode: None,
            reflow_mode: None,
            relaxation_strategy: None,
            satisfice_threshold: threshold.map(str::to_string),
            hard_constraints: vec![HardConstraint { key: Some("hc1".to_string()), ..Default::default() }],
            soft_terms: vec![SoftTerm {
                key: Some("st1".to_string()),
                scope: None,
                target_ref: None,
                weight_class: "high".to_string(),
                weight: "0.75".to_string(),
            }],
            relaxation_rules: rules,
        }
    }

    #[test]
    fn selects_highest_qualifying_score() {
        let opt = profile(None, Vec::new());
        let candidates = vec![candidate("a", true, "0.72"), candidate("b", true, "0.65")];
        let outcome = evaluate(&opt, None, &candidates);
        assert_eq!(outcome.status, "ok");
        assert_eq!(outcome.selected_candidate.as_deref(), Some("a"));
    }

    #[test]
    fn threshold_widening_relaxation_selects_best_after_one_rule() {
        let rule = RelaxationRule { relax_order: 1, relax_weight_class: None, relaxation_action: Some("widenThreshold".to_string()) };
        let opt = profile(Some("0.8"), vec![rule]);
        let candidates = vec![candidate("a", true, "0.72"), candidate("b", true, "0.65")];
        let outcome = evaluate(&opt, None, &candidates);
        assert_eq!(outcome.status, "ok");
        assert_eq!(outcome.selected_candidate.as_deref(), Some("a"));
        assert_eq!(outcome.selected_score.as_deref(), Some("0.72"));
        assert_eq!(outcome.applied_relaxations.len(), 1);
    }

    #[test]
    fn empty_candidate_set_fails_closed() {
        let opt = profile(None, Vec::new());
        let outcome = evaluate(&opt, None, &[]);
        assert_eq!(outcome.status, EVALUATION_ERROR);
    }

    #[test]
    fn exhausted_relaxation_cascade_fails_closed() {
        let opt = profile(Some("0.99"), Vec::new());
        let candidates = vec![candidate("a", true, "0.5")];
        let outcome = evaluate(&opt, None, &candidates);
        assert_eq!(outcome.status, EVALUATION_ERROR);
    }

    #[test]
    fn drop_term_noops_when_it_would_empty_active_terms() {
        let rule = RelaxationRule { relax_order: 1, relax_weight_class: Some("high".to_string()), relaxation_action: Some("dropTerm".to_string()) };
        let opt = profile(Some("0.99"), vec![rule]);
        let candidates = vec![candidate("a", true, "0.5")];
        let outcome = evaluate(&opt, None, &candidates);
        // dropTerm would empty the only active term, so it no-ops; threshold
        // stays unreachable and the cascade still exhausts.
        assert_eq!(outcome.status, EVALUATION_ERROR);
    }

    #[test]
    fn render_and_parse_round_trip() {
        let opt = profile(None, Vec::new());
        let candidates = vec![candidate("a", true, "0.72"), candidate("b", true, "0.65")];
        let outcome = evaluate(&opt, None, &candidates);
        let rendered = render_result(&outcome);
        let parsed = parse_result(&rendered).unwrap();
        assert_eq!(parsed.status, outcome.status);
        assert_eq!(parsed.selected_candidate, outcome.selected_candidate);
        assert_eq!(parsed.selected_score, outcome.selected_score);
    }
}
