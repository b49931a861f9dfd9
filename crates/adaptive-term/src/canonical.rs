//! Canonical N-Triples serialization and SHA-256 derived hashing.
//!
//! Canonicalization is the single source of truth for determinism across
//! the whole pipeline: every hash Stage C emits ultimately rests on
//! [`canonical_bytes`] producing the same bytes for the same graph on any
//! run, on any host.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::error::TermError;
use crate::graph::Graph;
use crate::term::{Iri, Term, Triple};

fn term_is_nfc(term: &Term) -> bool {
    match term {
        Term::Iri(iri) => iri.is_nfc(),
        Term::Literal(lit) => lit.is_nfc(),
        Term::BlankNode(_) => true,
    }
}

pub fn is_nfc_graph(graph: &Graph) -> bool {
    graph
        .iter()
        .all(|t| term_is_nfc(&t.subject) && t.predicate.is_nfc() && term_is_nfc(&t.object))
}

pub fn has_blank_node(graph: &Graph) -> bool {
    graph.iter().any(|t| t.subject.is_blank() || t.object.is_blank())
}

/// `(0, iri, "", "")` for IRI objects, `(1, lexical, datatype, language)` for literals.
fn object_sort_key(term: &Term) -> (u8, String, String, String) {
    match term {
        Term::Iri(iri) => (0, iri.as_str().to_string(), String::new(), String::new()),
        Term::Literal(lit) => (
            1,
            lit.lexical.clone(),
            lit.datatype.as_ref().map_or_else(String::new, |d| d.as_str().to_string()),
            lit.language.clone().unwrap_or_default(),
        ),
        Term::BlankNode(id) => (2, id.clone(), String::new(), String::new()),
    }
}

fn subject_str(term: &Term) -> String {
    match term {
        Term::Iri(iri) => iri.as_str().to_string(),
        Term::BlankNode(id) => format!("_:{id}"),
        Term::Literal(_) => String::new(),
    }
}

fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}

fn render_term(term: &Term) -> String {
    match term {
        Term::Iri(iri) => format!("<{}>", iri.as_str()),
        Term::BlankNode(id) => format!("_:{id}"),
        Term::Literal(lit) => {
            let mut rendered = format!("\"{}\"", escape_literal(&lit.lexical));
            if let Some(language) = &lit.language {
                rendered.push('@');
                rendered.push_str(language);
            } else if let Some(datatype) = &lit.datatype {
                rendered.push_str("^^<");
                rendered.push_str(datatype.as_str());
                rendered.push('>');
            }
            rendered
        }
    }
}

/// Renders a single triple in N-Triples form, without its terminating `" .\n"`.
pub fn render_triple(triple: &Triple) -> String {
    format!(
        "{} <{}> {}",
        render_term(&triple.subject),
        triple.predicate.as_str(),
        render_term(&triple.object)
    )
}

/// Rejects non-NFC terms and blank nodes, sorts triples by
/// `(str(subject), str(predicate), objectKey)`, and emits N-Triples lines
/// terminated by `" .\n"`.
pub fn canonical_bytes(graph: &Graph) -> Result<Vec<u8>, TermError> {
    if !is_nfc_graph(graph) {
        return Err(TermError::NotNfc);
    }
    if has_blank_node(graph) {
        return Err(TermError::BlankNode);
    }

    let mut triples: Vec<&Triple> = graph.iter().collect();
    triples.sort_by(|a, b| {
        let key_a = (subject_str(&a.subject), a.predicate.as_str().to_string(), object_sort_key(&a.object));
        let key_b = (subject_str(&b.subject), b.predicate.as_str().to_string(), object_sort_key(&b.object));
        key_a.cmp(&key_b)
    });

    let mut out = String::new();
    for triple in triples {
        out.push_str(&render_triple(triple));
        out.push_str(" .\n");
    }
    Ok(out.into_bytes())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn graph_hash(graph: &Graph) -> Result<String, TermError> {
    Ok(sha256_hex(&canonical_bytes(graph)?))
}

/// The scoped subgraph for composition `C`: triples whose subject is `C`, or
/// any IRI `n` for which `(n, ownedBy, C)` holds in `graph`. Ownership is
/// single-hop -- chains of ownership are not followed.
pub fn scoped_subgraph(graph: &Graph, composition: &Iri, owned_by: &Iri) -> Graph {
    let mut in_scope: HashSet<String> = HashSet::new();
    in_scope.insert(composition.as_str().to_string());

    let composition_term = Term::Iri(composition.clone());
    for node in graph.subjects_with_predicate_object(owned_by, &composition_term) {
        if let Term::Iri(iri) = node {
            in_scope.insert(iri.as_str().to_string());
        }
    }

    let triples: Vec<Triple> = graph
        .iter()
        .filter(|t| matches!(&t.subject, Term::Iri(iri) if in_scope.contains(iri.as_str())))
        .cloned()
        .collect();
    Graph::from_triples(triples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Literal;

    fn iri(s: &str) -> Term {
        Term::Iri(Iri::from(s))
    }

    fn sample_graph() -> Graph {
        let mut g = Graph::new();
        g.add(Triple::new(iri("urn:b"), Iri::from("urn:p2"), Term::Literal(Literal::plain("x"))));
        g.add(Triple::new(iri("urn:a"), Iri::from("urn:p1"), Term::Literal(Literal::plain("y"))));
        g
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let g = sample_graph();
        let once = canonical_bytes(&g).unwrap();
        let g2 = Graph::from_triples(
            g.iter().cloned().collect::<Vec<_>>(),
        );
        let twice = canonical_bytes(&g2).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn sorts_by_subject_then_predicate_then_object() {
        let g = sample_graph();
        let bytes = canonical_bytes(&g).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("<urn:a>"));
        assert!(lines[1].starts_with("<urn:b>"));
    }

    #[test]
    fn rejects_blank_nodes() {
        let mut g = Graph::new();
        g.add(Triple::new(
            Term::BlankNode("b0".to_string()),
            Iri::from("urn:p"),
            Term::Literal(Literal::plain("x")),
        ));
        assert!(matches!(canonical_bytes(&g), Err(TermError::BlankNode)));
    }

    #[test]
    fn rejects_non_nfc_literal() {
        let mut g = Graph::new();
        // "e" + combining acute accent (U+0065 U+0301), not NFC-composed.
        g.add(Triple::new(iri("urn:a"), Iri::from("urn:p"), Term::Literal(Literal::plain("e\u{0301}"))));
        assert!(matches!(canonical_bytes(&g), Err(TermError::NotNfc)));
    }

    #[test]
    fn scoped_subgraph_is_single_hop() {
        let mut g = Graph::new();
        let owned_by = Iri::from("https://paperhat.dev/ns/wd#ownedBy");
        g.add(Triple::new(iri("urn:node1"), owned_by.clone(), iri("urn:comp")));
        g.add(Triple::new(iri("urn:node2"), owned_by.clone(), iri("urn:node1")));
        g.add(Triple::new(iri("urn:node1"), Iri::from("urn:p"), Term::Literal(Literal::plain("v"))));
        g.add(Triple::new(iri("urn:node2"), Iri::from("urn:p"), Term::Literal(Literal::plain("v2"))));

        let scoped = scoped_subgraph(&g, &Iri::from("urn:comp"), &owned_by);
        // node1 is directly owned by urn:comp; node2 is owned by node1, two hops
        // away from urn:comp, so it must not appear.
        let subjects: HashSet<String> = scoped
            .iter()
            .filter_map(|t| t.subject.as_iri().map(|i| i.as_str().to_string()))
            .collect();
        assert!(subjects.contains("urn:node1"));
        assert!(!subjects.contains("urn:node2"));
    }
}
