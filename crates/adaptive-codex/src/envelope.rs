//! The codex envelope: a small XML-shaped concept tree used for every
//! input and output artifact in this pipeline.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use quick_xml::escape::{escape, partial_escape};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed XML: {0}")]
    Xml(String),
    #[error("document has no root element")]
    NoRoot,
}

/// `(conceptName, traits, ordered children, optional textContent)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Concept {
    pub name: String,
    pub traits: BTreeMap<String, String>,
    pub children: Vec<Concept>,
    pub text_content: Option<String>,
}

impl Concept {
    pub fn new(name: impl Into<String>) -> Self {
        Concept { name: name.into(), traits: BTreeMap::new(), children: Vec::new(), text_content: None }
    }

    pub fn with_trait(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.traits.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: Concept) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = Some(text.into());
        self
    }

    pub fn trait_value(&self, key: &str) -> Option<&str> {
        self.traits.get(key).map(String::as_str)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Concept> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn first_child_named(&self, name: &str) -> Option<&Concept> {
        self.children_named(name).next()
    }

    /// Parses a complete codex XML document into its root [`Concept`].
    pub fn parse(xml: &str) -> Result<Concept, EnvelopeError> {
        let doc = roxmltree::Document::parse(xml).map_err(|e| EnvelopeError::Xml(e.to_string()))?;
        let root = doc.root_element();
        Ok(node_to_concept(root))
    }

    /// Renders this concept (as document root) to tab-indented XML terminated
    /// by a single trailing newline, matching the codex dialect's fixed shape.
    pub fn render(&self) -> String {
        let mut out = String::new();
        render_concept(self, 0, &mut out);
        out.push('\n');
        out
    }
}

fn node_to_concept(node: roxmltree::Node) -> Concept {
    let mut traits = BTreeMap::new();
    for attr in node.attributes() {
        traits.insert(attr.name().to_string(), attr.value().to_string());
    }

    let mut children = Vec::new();
    let mut text_content: Option<String> = None;
    for child in node.children() {
        if child.is_element() {
            children.push(node_to_concept(child));
        } else if child.is_text() {
            if let Some(text) = child.text() {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    text_content = Some(match text_content.take() {
                        Some(existing) => existing + trimmed,
                        None => trimmed.to_string(),
                    });
                }
            }
        }
    }

    Concept { name: node.tag_name().name().to_string(), traits, children, text_content }
}

fn render_concept(concept: &Concept, depth: usize, out: &mut String) {
    let indent = "\t".repeat(depth);
    out.push_str(&indent);
    out.push('<');
    out.push_str(&concept.name);
    for (key, value) in &concept.traits {
        let _ = write!(out, " {key}=\"{}\"", partial_escape(value.as_str()));
    }

    let has_children = !concept.children.is_empty();
    let has_text = concept.text_content.as_deref().is_some_and(|t| !t.is_empty());

    if !has_children && !has_text {
        out.push_str("/>\n");
        return;
    }

    out.push('>');
    if has_text && !has_children {
        out.push_str(&escape(concept.text_content.as_deref().unwrap_or_default()));
        out.push_str("</");
        out.push_str(&concept.name);
        out.push_str(">\n");
        return;
    }

    out.push('\n');
    for child in &concept.children {
        render_concept(child, depth + 1, out);
    }
    out.push_str(&indent);
    out.push_str("</");
    out.push_str(&concept.name);
    out.push_str(">\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_simple_tree() {
        let root = Concept::new("AdaptiveFixture")
            .with_trait("fixtureId", "f-001")
            .with_child(Concept::new("AdaptiveIntent").with_trait("intentId", "urn:intent:x"));

        let rendered = root.render();
        let parsed = Concept::parse(&rendered).unwrap();
        assert_eq!(parsed.name, "AdaptiveFixture");
        assert_eq!(parsed.trait_value("fixtureId"), Some("f-001"));
        assert_eq!(parsed.first_child_named("AdaptiveIntent").unwrap().trait_value("intentId"), Some("urn:intent:x"));
    }

    #[test]
    fn render_is_tab_indented_and_newline_terminated() {
        let root = Concept::new("Outer").with_child(Concept::new("Inner"));
        let rendered = root.render();
        assert!(rendered.contains("\t<Inner/>\n"));
        assert!(rendered.ends_with('\n'));
    }

    #[test]
    fn escapes_attribute_and_text_content() {
        let root = Concept::new("Note").with_trait("label", "a & b").with_text("<raw>");
        let rendered = root.render();
        assert!(rendered.contains("label=\"a &amp; b\""));
        assert!(rendered.contains("&lt;raw&gt;"));
    }
}
