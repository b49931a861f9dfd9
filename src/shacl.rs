//! A subset SHACL oracle: `sh:NodeShape`/`sh:PropertyShape` with
//! `sh:targetClass`, `sh:property`/`sh:path`, `sh:minCount`, `sh:datatype`,
//! and `sh:class`, with `rdfs:subClassOf` closure honored when `inference`
//! is requested. This is not a general SHACL engine -- every constraint
//! component outside this short list is simply never checked, matching the
//! subset of shapes this pipeline's fixtures actually declare.

use std::collections::{HashMap, HashSet};
use std::fmt;

use adaptive_term::{Graph, Iri, Term};

const SH_NODE_SHAPE: &str = "http://www.w3.org/ns/shacl#NodeShape";
const SH_TARGET_CLASS: &str = "http://www.w3.org/ns/shacl#targetClass";
const SH_PROPERTY: &str = "http://www.w3.org/ns/shacl#property";
const SH_PATH: &str = "http://www.w3.org/ns/shacl#path";
const SH_MIN_COUNT: &str = "http://www.w3.org/ns/shacl#minCount";
const SH_DATATYPE: &str = "http://www.w3.org/ns/shacl#datatype";
const SH_CLASS: &str = "http://www.w3.org/ns/shacl#class";
const RDFS_SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";

#[derive(Debug, Clone)]
pub struct ShaclViolation {
    pub focus_node: String,
    pub result_path: Option<String>,
    pub message: String,
}

impl fmt::Display for ShaclViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result_path {
            Some(path) => write!(f, "{}: {} ({})", self.focus_node, self.message, path),
            None => write!(f, "{}: {}", self.focus_node, self.message),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShaclReport {
    pub conforms: bool,
    pub violations: Vec<ShaclViolation>,
}

/// Whether `rdfs:subClassOf` inference is applied before shape matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inference {
    None,
    Rdfs,
}

/// Transitive `rdfs:subClassOf` closure: class -> set of ancestor classes
/// (the class itself is not included; callers check membership in both the
/// asserted type and this closure).
fn subclass_closure(ontology: &Graph) -> HashMap<String, HashSet<String>> {
    let mut direct: HashMap<String, HashSet<String>> = HashMap::new();
    for triple in ontology.iter() {
        if triple.predicate.as_str() != RDFS_SUBCLASS_OF {
            continue;
        }
        let (Term::Iri(child), Term::Iri(parent)) = (&triple.subject, &triple.object) else {
            continue;
        };
        direct.entry(child.as_str().to_string()).or_default().insert(parent.as_str().to_string());
    }

    let mut closure = direct.clone();
    loop {
        let mut changed = false;
        let snapshot = closure.clone();
        for (child, parents) in &snapshot {
            let mut additions = Vec::new();
            for parent in parents {
                if let Some(grandparents) = snapshot.get(parent) {
                    for gp in grandparents {
                        if !parents.contains(gp) {
                            additions.push(gp.clone());
                        }
                    }
                }
            }
            if !additions.is_empty() {
                let entry = closure.get_mut(child).unwrap();
                for gp in additions {
                    entry.insert(gp);
                }
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    closure
}

fn type_closure(node: &Term, data: &Graph, ancestors: &HashMap<String, HashSet<String>>) -> HashSet<String> {
    let mut types = HashSet::new();
    for obj in data.objects(node, &Iri::from(adaptive_term::RDF_TYPE)) {
        if let Term::Iri(iri) = obj {
            let name = iri.as_str().to_string();
            if let Some(parents) = ancestors.get(&name) {
                types.extend(parents.iter().cloned());
            }
            types.insert(name);
        }
    }
    types
}

fn distinct_subjects(data: &Graph) -> Vec<Term> {
    let mut seen = HashSet::new();
    let mut subjects = Vec::new();
    for triple in data.iter() {
        if let Term::Iri(iri) = &triple.subject {
            if seen.insert(iri.as_str().to_string()) {
                subjects.push(triple.subject.clone());
            }
        }
    }
    subjects
}

/// Validates `data` against `shapes`, with `ontology` supplying
/// `rdfs:subClassOf` edges when `inference` is [`Inference::Rdfs`].
pub fn validate_graph(data: &Graph, shapes: &Graph, ontology: &Graph, inference: Inference) -> ShaclReport {
    let ancestors = match inference {
        Inference::Rdfs => subclass_closure(ontology),
        Inference::None => HashMap::new(),
    };

    let subjects = distinct_subjects(data);
    let mut violations = Vec::new();

    for node_shape in shapes.subjects_of_type(&Iri::from(SH_NODE_SHAPE)) {
        for target_class in shapes.objects(&node_shape, &Iri::from(SH_TARGET_CLASS)) {
            let Term::Iri(target_class) = target_class else { continue };

            for data_node in &subjects {
                let closure = type_closure(data_node, data, &ancestors);
                if !closure.contains(target_class.as_str()) {
                    continue;
                }

                for property_shape in shapes.objects(&node_shape, &Iri::from(SH_PROPERTY)) {
                    let Term::Iri(_) = property_shape else { continue };
                    let Some(path) = shapes.objects(property_shape, &Iri::from(SH_PATH)).next() else {
                        continue;
                    };
                    let Term::Iri(path) = path else { continue };

                    let values: Vec<&Term> = data.objects(data_node, path).collect();

                    if let Some(min_count) = shapes.objects(property_shape, &Iri::from(SH_MIN_COUNT)).next() {
                        if let Term::Literal(lit) = min_count {
                            if let Ok(min) = lit.lexical.parse::<usize>() {
                                if values.len() < min {
                                    violations.push(ShaclViolation {
                                        focus_node: data_node.to_string(),
                                        result_path: Some(path.as_str().to_string()),
                                        message: format!(
                                            "expected at least {min} value(s), found {}",
                                            values.len()
                                        ),
                                    });
                                }
                            }
                        }
                    }

                    if let Some(datatype) = shapes.objects(property_shape, &Iri::from(SH_DATATYPE)).next() {
                        if let Term::Iri(expected_dt) = datatype {
                            for value in &values {
                                let actual = match value {
                                    Term::Literal(lit) => lit.datatype.as_ref(),
                                    _ => None,
                                };
                                if actual != Some(expected_dt) {
                                    violations.push(ShaclViolation {
                                        focus_node: data_node.to_string(),
                                        result_path: Some(path.as_str().to_string()),
                                        message: format!(
                                            "value {value} does not have datatype {expected_dt}"
                                        ),
                                    });
                                }
                            }
                        }
                    }

                    if let Some(class) = shapes.objects(property_shape, &Iri::from(SH_CLASS)).next() {
                        if let Term::Iri(expected_class) = class {
                            for value in &values {
                                let ok = type_closure(value, data, &ancestors).contains(expected_class.as_str());
                                if !ok {
                                    violations.push(ShaclViolation {
                                        focus_node: data_node.to_string(),
                                        result_path: Some(path.as_str().to_string()),
                                        message: format!("value {value} is not of class {expected_class}"),
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    let conforms = violations.is_empty();
    ShaclReport { conforms, violations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turtle::parse_turtle;

    #[test]
    fn reports_min_count_violation() {
        let data = parse_turtle(
            r#"@prefix wd: <https://paperhat.dev/ns/wd#> .
               wd:p1 a wd:Policy ."#,
        )
        .unwrap();
        let shapes = parse_turtle(
            r#"@prefix sh: <http://www.w3.org/ns/shacl#> .
               @prefix wd: <https://paperhat.dev/ns/wd#> .
               wd:PolicyShape a sh:NodeShape ;
                   sh:targetClass wd:Policy ;
                   sh:property wd:PolicyPriorityShape .
               wd:PolicyPriorityShape sh:path wd:priority ;
                   sh:minCount 1 ."#,
        )
        .unwrap();
        let ontology = Graph::new();

        let report = validate_graph(&data, &shapes, &ontology, Inference::Rdfs);
        assert!(!report.conforms);
        assert_eq!(report.violations.len(), 1);
    }

    #[test]
    fn honors_subclass_closure() {
        let data = parse_turtle(
            r#"@prefix wd: <https://paperhat.dev/ns/wd#> .
               wd:v1 a wd:View ."#,
        )
        .unwrap();
        let shapes = parse_turtle(
            r#"@prefix sh: <http://www.w3.org/ns/shacl#> .
               @prefix wd: <https://paperhat.dev/ns/wd#> .
               wd:CompositionShape a sh:NodeShape ;
                   sh:targetClass wd:Composition ."#,
        )
        .unwrap();
        let ontology = parse_turtle(
            r#"@prefix wd: <https://paperhat.dev/ns/wd#> .
               @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
               wd:View rdfs:subClassOf wd:Composition ."#,
        )
        .unwrap();

        let report = validate_graph(&data, &shapes, &ontology, Inference::Rdfs);
        assert!(report.conforms);
    }
}
