//! Stage A: policy evaluation over an RDF composition/view graph.
//!
//! Collects the policies that apply to a composition (and optionally a
//! view), evaluates each policy's conditions against a context vector,
//! resolves conflicts between matched policies' actions, and applies the
//! winning actions as a delta on a local copy of the graph. Every internal
//! fault -- malformed policy shape, unresolved conflict, type mismatch --
//! collapses to a single `status=error` result; this function never panics
//! and never partially mutates the caller's graph.

use std::cmp::Ordering;
use std::collections::HashMap;

use adaptive_codex::Concept;
use adaptive_term::{canonical, Graph, Iri, Literal, Term, TypedValue};

use crate::error::StageAError;
use crate::intent::ContextEntry;
use crate::ns;

#[derive(Debug, Clone)]
pub struct StageAOutcome {
    pub status: &'static str,
    pub selected_actions: Vec<String>,
    pub delta_remove: Vec<String>,
    pub delta_add: Vec<String>,
}

const EVALUATION_ERROR: &str = "EVALUATION_ERROR";

struct Fault(String);

type Step<T> = Result<T, Fault>;

fn context_map(entries: &[ContextEntry]) -> HashMap<String, TypedValue> {
    entries
        .iter()
        .map(|e| {
            let value = match e.kind.as_str() {
                "integer" => TypedValue::Integer(e.value.parse().unwrap_or_default()),
                "decimal" => TypedValue::Decimal(e.value.parse().unwrap_or_default()),
                "boolean" => TypedValue::Boolean(e.value == "true"),
                _ => TypedValue::String(e.value.clone()),
            };
            (e.key.clone(), value)
        })
        .collect()
}

fn literal_to_typed_value(lit: &Literal) -> Step<TypedValue> {
    match lit.datatype.as_ref().map(Iri::as_str) {
        Some(ns::XSD_INTEGER) => {
            lit.lexical.parse::<i64>().map(TypedValue::Integer).map_err(|_| Fault(format!("invalid integer literal '{}'", lit.lexical)))
        }
        Some(ns::XSD_DECIMAL) => lit
            .lexical
            .parse::<rust_decimal::Decimal>()
            .map(TypedValue::Decimal)
            .map_err(|_| Fault(format!("invalid decimal literal '{}'", lit.lexical))),
        Some(ns::XSD_BOOLEAN) => match lit.lexical.as_str() {
            "true" => Ok(TypedValue::Boolean(true)),
            "false" => Ok(TypedValue::Boolean(false)),
            other => Err(Fault(format!("invalid boolean literal '{other}'"))),
        },
        _ => Ok(TypedValue::String(lit.lexical.clone())),
    }
}

fn term_to_typed_value(term: &Term) -> Step<TypedValue> {
    match term {
        Term::Iri(iri) => Ok(TypedValue::Iri(iri.clone())),
        Term::Literal(lit) => literal_to_typed_value(lit),
        Term::BlankNode(_) => Err(Fault("blank nodes cannot appear as typed values".to_string())),
    }
}

fn typed_value_to_term(value: &TypedValue) -> Term {
    match value {
        TypedValue::Iri(iri) => Term::Iri(iri.clone()),
        TypedValue::Integer(i) => Term::Literal(Literal::typed(i.to_string(), Iri::from(ns::XSD_INTEGER))),
        TypedValue::Decimal(d) => Term::Literal(Literal::typed(d.to_string(), Iri::from(ns::XSD_DECIMAL))),
        TypedValue::Boolean(b) => Term::Literal(Literal::typed(b.to_string(), Iri::from(ns::XSD_BOOLEAN))),
        TypedValue::String(s) => Term::Literal(Literal::plain(s.clone())),
    }
}

fn must_single_object<'a>(graph: &'a Graph, subject: &Term, predicate: &str, what: &str) -> Step<&'a Term> {
    let mut objects = graph.objects(subject, &Iri::from(predicate));
    let first = objects.next().ok_or_else(|| Fault(format!("{subject} is missing required '{what}'")))?;
    if objects.next().is_some() {
        return Err(Fault(format!("{subject} has more than one value for '{what}'")));
    }
    Ok(first)
}

fn single_typed_value(graph: &Graph, subject: &Term, predicate: &str, what: &str) -> Step<TypedValue> {
    term_to_typed_value(must_single_object(graph, subject, predicate, what)?)
}

struct PolicyInfo {
    policy: Term,
    priority: i64,
    specificity_rank: u8,
    strategy: String,
}

fn is_enabled(graph: &Graph, policy: &Term) -> Step<bool> {
    match must_single_object(graph, policy, ns::ENABLED, "enabled")? {
        Term::Literal(lit) => Ok(lit.lexical == "true"),
        other => Err(Fault(format!("{other} is not a valid boolean for 'enabled'"))),
    }
}

fn build_policy_info(graph: &Graph, policy: &Term, composition: &Term, view: Option<&Term>) -> Step<PolicyInfo> {
    let priority_value = single_typed_value(graph, policy, ns::PRIORITY, "priority")?;
    let priority = match priority_value {
        TypedValue::Integer(i) => i,
        other => return Err(Fault(format!("policy priority must be an integer, found {}", other.kind_name()))),
    };

    let strategy = match must_single_object(graph, policy, ns::CONFLICT_STRATEGY, "conflictStrategy")? {
        Term::Iri(iri) => iri.as_str().to_string(),
        other => return Err(Fault(format!("conflictStrategy must be an IRI, found {other}"))),
    };

    let applies_to = must_single_object(graph, policy, ns::APPLIES_TO, "appliesTo")?.clone();
    let specificity_rank = if Some(&applies_to) == view { 0 } else if &applies_to == composition { 1 } else { 1 };

    Ok(PolicyInfo { policy: policy.clone(), priority, specificity_rank, strategy })
}

fn evaluate_condition(graph: &Graph, condition: &Term, context: &HashMap<String, TypedValue>) -> Step<bool> {
    let context_key = match must_single_object(graph, condition, ns::CONTEXT_KEY, "contextKey")? {
        Term::Iri(iri) => iri.as_str().to_string(),
        other => return Err(Fault(format!("contextKey must be an IRI, found {other}"))),
    };
    let operator = match must_single_object(graph, condition, ns::OPERATOR, "operator")? {
        Term::Iri(iri) => iri.as_str().to_string(),
        other => return Err(Fault(format!("operator must be an IRI, found {other}"))),
    };
    let expected = single_typed_value(graph, condition, ns::CONDITION_VALUE, "conditionValue")?;

    let actual = context
        .get(&context_key)
        .ok_or_else(|| Fault(format!("context is missing required key '{context_key}'")))?;

    if operator == ns::OP_EQ {
        return Ok(actual.value_eq(&expected));
    }
    if operator == ns::OP_NE {
        return Ok(!actual.value_eq(&expected));
    }

    let (Some(lhs), Some(rhs)) = (actual.as_decimal(), expected.as_decimal()) else {
        return Err(Fault(format!(
            "condition on '{context_key}' compares non-numeric kinds {} and {} with an ordering operator",
            actual.kind_name(),
            expected.kind_name()
        )));
    };
    Ok(match operator.as_str() {
        ns::OP_LT => lhs < rhs,
        ns::OP_LTE => lhs <= rhs,
        ns::OP_GT => lhs > rhs,
        ns::OP_GTE => lhs >= rhs,
        other => return Err(Fault(format!("unrecognized condition operator '{other}'"))),
    })
}

fn policy_matches(graph: &Graph, policy: &Term, context: &HashMap<String, TypedValue>) -> Step<bool> {
    let conditions: Vec<&Term> = graph.objects(policy, &Iri::from(ns::CONDITION)).collect();
    if conditions.is_empty() {
        return Err(Fault(format!("{policy} has no conditions")));
    }
    for condition in conditions {
        if !evaluate_condition(graph, condition, context)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn collect_candidates(graph: &Graph, composition: &Term, view: Option<&Term>) -> Step<Vec<Term>> {
    let mut candidates: Vec<Term> =
        graph.subjects_with_predicate_object(&Iri::from(ns::APPLIES_TO), composition).cloned().collect();
    if let Some(view) = view {
        candidates.extend(graph.subjects_with_predicate_object(&Iri::from(ns::APPLIES_TO), view).cloned());
    }
    candidates.retain(|c| graph.has_type(c, &Iri::from(ns::POLICY)));

    let mut enabled = Vec::new();
    for candidate in candidates {
        if is_enabled(graph, &candidate)? {
            enabled.push(candidate);
        }
    }
    Ok(enabled)
}

struct ActionInfo {
    action: Term,
    mode: String,
    target_node: Term,
    target_property: Iri,
    value: TypedValue,
}

fn collect_ordered_actions(graph: &Graph, policies: &[PolicyInfo], context: &HashMap<String, TypedValue>) -> Step<Vec<ActionInfo>> {
    let mut ordered = Vec::new();
    for info in policies {
        if !policy_matches(graph, &info.policy, context)? {
            continue;
        }
        let mut actions: Vec<&Term> = graph.objects(&info.policy, &Iri::from(ns::ACTION_PRED)).collect();
        actions.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        for action in actions {
            if !graph.has_type(action, &Iri::from(ns::ACTION)) {
                return Err(Fault(format!("{action} is not typed as an Action")));
            }
            let mode = match must_single_object(graph, action, ns::MODE, "mode")? {
                Term::Iri(iri) => iri.as_str().to_string(),
                other => return Err(Fault(format!("mode must be an IRI, found {other}"))),
            };
            let target_node = must_single_object(graph, action, ns::TARGET_NODE, "targetNode")?.clone();
            let target_property = match must_single_object(graph, action, ns::TARGET_PROPERTY, "targetProperty")? {
                Term::Iri(iri) => iri.clone(),
                other => return Err(Fault(format!("targetProperty must be an IRI, found {other}"))),
            };
            let value = single_typed_value(graph, action, ns::ACTION_VALUE, "actionValue")?;
            ordered.push(ActionInfo { action: action.clone(), mode, target_node, target_property, value });
        }
    }
    Ok(ordered)
}

fn matched_policies<'a>(graph: &Graph, policies: &'a [PolicyInfo], context: &HashMap<String, TypedValue>) -> Step<Vec<&'a PolicyInfo>> {
    let mut matched = Vec::new();
    for info in policies {
        if policy_matches(graph, &info.policy, context)? {
            matched.push(info);
        }
    }
    Ok(matched)
}

fn resolve_conflicts(graph: &Graph, policies: &[PolicyInfo], context: &HashMap<String, TypedValue>) -> Step<Vec<ActionInfo>> {
    let matched = matched_policies(graph, policies, context)?;
    let strategies: std::collections::HashSet<&str> = matched.iter().map(|p| p.strategy.as_str()).collect();
    if strategies.len() > 1 {
        return Err(Fault("matched policies do not share a single conflictStrategy".to_string()));
    }
    let strategy = strategies.into_iter().next().unwrap_or(ns::STRATEGY_ERROR_ON_CONFLICT);

    let ordered = collect_ordered_actions(graph, policies, context)?;

    if strategy == ns::STRATEGY_ERROR_ON_CONFLICT {
        let mut seen: HashMap<(String, String), usize> = HashMap::new();
        for action in &ordered {
            let key = (action.target_node.to_string(), action.target_property.to_string());
            *seen.entry(key).or_insert(0) += 1;
        }
        if seen.values().any(|count| *count > 1) {
            return Err(Fault("conflicting actions target the same node/property under ErrorOnConflict".to_string()));
        }
        return Ok(ordered);
    }

    // FirstMatchWins / HigherPriorityWins: identical behavior -- policy
    // ordering already places the winning policy first, so keeping the
    // first action seen per (node, property) key resolves both the same way.
    let mut first_seen: HashMap<(String, String), usize> = HashMap::new();
    let mut kept = Vec::new();
    for action in ordered {
        let key = (action.target_node.to_string(), action.target_property.to_string());
        if first_seen.contains_key(&key) {
            continue;
        }
        first_seen.insert(key, kept.len());
        kept.push(action);
    }
    Ok(kept)
}

fn apply_actions(graph: &mut Graph, actions: &[ActionInfo]) -> Step<(Vec<String>, Vec<String>)> {
    let mut removed = Vec::new();
    let mut added = Vec::new();

    for action in actions {
        match action.mode.as_str() {
            m if m == ns::MODE_REPLACE_ALL => {
                for triple in graph.remove_all(&action.target_node, &action.target_property) {
                    removed.push(format!("{} .", canonical::render_triple(&triple)));
                }
                let value_term = typed_value_to_term(&action.value);
                let triple = adaptive_term::Triple::new(action.target_node.clone(), action.target_property.clone(), value_term);
                if graph.add(triple.clone()) {
                    added.push(format!("{} .", canonical::render_triple(&triple)));
                }
            }
            m if m == ns::MODE_ADD => {
                let value_term = typed_value_to_term(&action.value);
                let triple = adaptive_term::Triple::new(action.target_node.clone(), action.target_property.clone(), value_term);
                if graph.add(triple.clone()) {
                    added.push(format!("{} .", canonical::render_triple(&triple)));
                }
            }
            m if m == ns::MODE_REMOVE => {
                let value_term = typed_value_to_term(&action.value);
                let triple = adaptive_term::Triple::new(action.target_node.clone(), action.target_property.clone(), value_term);
                if graph.remove(&triple) {
                    removed.push(format!("{} .", canonical::render_triple(&triple)));
                }
            }
            other => return Err(Fault(format!("unrecognized action mode '{other}' on {}", action.action))),
        }
    }

    removed.sort();
    removed.dedup();
    added.sort();
    added.dedup();
    Ok((removed, added))
}

fn run(
    graph: &Graph,
    composition: &Term,
    view: Option<&Term>,
    context: &HashMap<String, TypedValue>,
) -> Step<(Graph, Vec<ActionInfo>, Vec<String>, Vec<String>)> {
    if !graph.has_type(composition, &Iri::from(ns::COMPOSITION)) {
        return Err(Fault(format!("{composition} is not typed as a Composition")));
    }
    if let Some(view) = view {
        if !graph.has_type(view, &Iri::from(ns::VIEW)) {
            return Err(Fault(format!("{view} is not typed as a View")));
        }
    }

    let candidates = collect_candidates(graph, composition, view)?;
    let mut policies = Vec::new();
    for candidate in &candidates {
        policies.push(build_policy_info(graph, candidate, composition, view)?);
    }
    policies.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.specificity_rank.cmp(&b.specificity_rank))
            .then(a.policy.to_string().cmp(&b.policy.to_string()))
    });

    let actions = resolve_conflicts(graph, &policies, context)?;

    let mut mutated = graph.clone();
    let (removed, added) = apply_actions(&mut mutated, &actions)?;

    Ok((mutated, actions, removed, added))
}

/// Evaluates Stage A. Pre/post-SHACL validation is the caller's
/// responsibility (it needs the shapes/ontology graphs this function does
/// not take); any validation failure should be folded into the same
/// `status=error` outcome this function itself produces on a Fault.
pub fn evaluate(
    graph: &Graph,
    composition: &Term,
    view: Option<&Term>,
    context_entries: &[ContextEntry],
) -> (StageAOutcome, Option<Graph>) {
    let span = tracing::info_span!("stage_a", composition = %composition, view = ?view.map(|v| v.to_string()));
    let _guard = span.enter();
    let context = context_map(context_entries);
    match run(graph, composition, view, &context) {
        Ok((mutated, actions, removed, added)) => {
            let selected_actions: Vec<String> = actions.iter().map(|a| a.action.to_string()).collect();
            tracing::debug!(
                actions = selected_actions.len(),
                removed = removed.len(),
                added = added.len(),
                "stage_a selected actions"
            );
            tracing::info!(status = "ok", "stage_a complete");
            (
                StageAOutcome { status: "ok", selected_actions, delta_remove: removed, delta_add: added },
                Some(mutated),
            )
        }
        Err(fault) => {
            tracing::info!(status = EVALUATION_ERROR, reason = %fault.0, "stage_a complete");
            (
                StageAOutcome { status: EVALUATION_ERROR, selected_actions: Vec::new(), delta_remove: Vec::new(), delta_add: Vec::new() },
                None,
            )
        }
    }
}

/// Renders a [`StageAOutcome`] into its `StageAResult` concept tree.
pub fn render_result(outcome: &StageAOutcome) -> Concept {
    let mut root = Concept::new("StageAResult").with_trait("status", outcome.status);
    for action in &outcome.selected_actions {
        root = root.with_child(Concept::new("SelectedAction").with_trait("actionIri", action));
    }
    let mut delta = Concept::new("Delta");
    for removed in &outcome.delta_remove {
        delta = delta.with_child(Concept::new("Remove").with_trait("triple", removed));
    }
    for added in &outcome.delta_add {
        delta = delta.with_child(Concept::new("Add").with_trait("triple", added));
    }
    root.with_child(delta)
}

/// Parses a previously rendered `StageAResult` concept tree back into a
/// [`StageAOutcome`] -- the inverse of [`render_result`].
pub fn parse_result(root: &Concept) -> Result<StageAOutcome, StageAError> {
    if root.name != "StageAResult" {
        return Err(StageAError::Fixture(format!("expected root concept 'StageAResult', found '{}'", root.name)));
    }
    let status = match root.trait_value("status") {
        Some("ok") => "ok",
        Some(EVALUATION_ERROR) => EVALUATION_ERROR,
        other => return Err(StageAError::Fixture(format!("unrecognized StageAResult status '{other:?}'"))),
    };
    let selected_actions = root
        .children_named("SelectedAction")
        .map(|c| {
            c.trait_value("actionIri")
                .map(str::to_string)
                .ok_or_else(|| StageAError::Fixture("SelectedAction is missing 'actionIri'".to_string()))
        })
        .collect::<Result<_, StageAError>>()?;
    let (delta_remove, delta_add) = match root.first_child_named("Delta") {
        Some(delta) => (
            delta.children_named("Remove").map(|c| c.trait_value("triple").unwrap_or_default().to_string()).collect(),
            delta.children_named("Add").map(|c| c.trait_value("triple").unwrap_or_default().to_string()).collect(),
        ),
        None => (Vec::new(), Vec::new()),
    };
    Ok(StageAOutcome { status, selected_actions, delta_remove, delta_add })
}

impl PartialEq for PolicyInfo {
    fn eq(&self, other: &Self) -> bool {
        self.policy == other.policy
    }
}

impl Eq for PolicyInfo {}

impl PartialOrd for PolicyInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PolicyInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then(self.specificity_rank.cmp(&other.specificity_rank))
            .then(self.policy.to_string().cmp(&other.policy.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turtle::parse_turtle;

    fn sample_graph() -> Graph {
        parse_turtle(&format!(
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
        ))
        .unwrap()
    }

    #[test]
    fn matching_policy_applies_its_action() {
        let graph = sample_graph();
        let composition = Term::Iri(Iri::from(format!("{}comp1", ns::WD)));
        let context = vec![ContextEntry { key: ns::VIEWPORT_WIDTH_PX.to_string(), kind: "integer".to_string(), value: "1200".to_string() }];
        let (outcome, mutated) = evaluate(&graph, &composition, None, &context);
        assert_eq!(outcome.status, "ok");
        assert_eq!(outcome.selected_actions.len(), 1);
        assert_eq!(outcome.delta_add.len(), 1);
        assert!(mutated.is_some());
    }

    #[test]
    fn missing_context_key_fails_closed() {
        let graph = sample_graph();
        let composition = Term::Iri(Iri::from(format!("{}comp1", ns::WD)));
        let (outcome, mutated) = evaluate(&graph, &composition, None, &[]);
        assert_eq!(outcome.status, EVALUATION_ERROR);
        assert!(mutated.is_none());
    }

    #[test]
    fn render_and_parse_round_trip() {
        let graph = sample_graph();
        let composition = Term::Iri(Iri::from(format!("{}comp1", ns::WD)));
        let context = vec![ContextEntry { key: ns::VIEWPORT_WIDTH_PX.to_string(), kind: "integer".to_string(), value: "1200".to_string() }];
        let (outcome, _) = evaluate(&graph, &composition, None, &context);
        let rendered = render_result(&outcome);
        let parsed = parse_result(&rendered).unwrap();
        assert_eq!(parsed.status, outcome.status);
        assert_eq!(parsed.selected_actions, outcome.selected_actions);
        assert_eq!(parsed.delta_add, outcome.delta_add);
    }
}
