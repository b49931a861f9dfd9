//! Schema model and schema-driven validator for the codex envelope dialect.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::envelope::Concept;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraitValueType {
    Text,
    IriReference,
    Boolean,
    Integer,
    Number,
    EnumeratedToken,
}

impl TraitValueType {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "Text" => Some(Self::Text),
            "IriReference" => Some(Self::IriReference),
            "Boolean" => Some(Self::Boolean),
            "Integer" => Some(Self::Integer),
            "Number" => Some(Self::Number),
            "EnumeratedToken" => Some(Self::EnumeratedToken),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TraitDefinition {
    pub name: String,
    pub default_value_type: Option<TraitValueType>,
    pub allowed_values: Option<BTreeSet<String>>,
}

/// Required/allowed traits and children for one concept. An empty allowed
/// set means "nothing additional is allowed", never "anything is allowed" --
/// this asymmetry is load-bearing for the validator below.
#[derive(Debug, Clone, Default)]
pub struct ConceptDefinition {
    pub name: String,
    pub required_traits: BTreeSet<String>,
    pub allowed_traits: BTreeSet<String>,
    pub required_children: BTreeSet<String>,
    pub allowed_children: BTreeSet<String>,
    pub forbids_content: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub concepts: BTreeMap<String, ConceptDefinition>,
    pub traits: BTreeMap<String, TraitDefinition>,
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("malformed schema document: {0}")]
    Malformed(String),
    #[error("unknown concept: {0}")]
    UnknownConcept(String),
    #[error("concept {concept}: missing required trait '{trait_name}'")]
    MissingRequiredTrait { concept: String, trait_name: String },
    #[error("concept {concept}: trait '{trait_name}' is not allowed here")]
    DisallowedTrait { concept: String, trait_name: String },
    #[error("trait '{0}' has no TraitDefinition")]
    UnknownTrait(String),
    #[error("concept {concept}: trait '{trait_name}' value '{value}' does not satisfy its declared type")]
    InvalidTraitValue { concept: String, trait_name: String, value: String },
    #[error("concept {concept}: missing required child '{child}'")]
    MissingRequiredChild { concept: String, child: String },
    #[error("concept {concept}: child '{child}' is not allowed here")]
    DisallowedChild { concept: String, child: String },
    #[error("concept {0}: text content is forbidden")]
    ForbiddenContent(String),
}

impl Schema {
    /// Parses a `Schema` root concept (as produced by [`Concept::parse`]) into
    /// a [`Schema`] model.
    pub fn from_concept(root: &Concept) -> Result<Schema, SchemaError> {
        if root.name != "Schema" {
            return Err(SchemaError::Malformed(format!("expected root concept 'Schema', got '{}'", root.name)));
        }

        let mut schema = Schema::default();
        for child in &root.children {
            match child.name.as_str() {
                "ConceptDefinition" => {
                    let def = parse_concept_definition(child)?;
                    schema.concepts.insert(def.name.clone(), def);
                }
                "TraitDefinition" => {
                    let def = parse_trait_definition(child)?;
                    schema.traits.insert(def.name.clone(), def);
                }
                other => {
                    return Err(SchemaError::Malformed(format!("unexpected schema child concept '{other}'")));
                }
            }
        }
        Ok(schema)
    }

    /// Recursively validates `root` against this schema.
    pub fn validate(&self, root: &Concept) -> Result<(), SchemaError> {
        let def = self
            .concepts
            .get(&root.name)
            .ok_or_else(|| SchemaError::UnknownConcept(root.name.clone()))?;

        for trait_name in root.traits.keys() {
            if !self.traits.contains_key(trait_name) {
                return Err(SchemaError::UnknownTrait(trait_name.clone()));
            }
            if !def.allowed_traits.contains(trait_name) {
                return Err(SchemaError::DisallowedTrait {
                    concept: root.name.clone(),
                    trait_name: trait_name.clone(),
                });
            }
        }

        for required in &def.required_traits {
            if !root.traits.contains_key(required) {
                return Err(SchemaError::MissingRequiredTrait {
                    concept: root.name.clone(),
                    trait_name: required.clone(),
                });
            }
        }

        for (trait_name, value) in &root.traits {
            let trait_def = &self.traits[trait_name];
            if !trait_value_satisfies(trait_def, value) {
                return Err(SchemaError::InvalidTraitValue {
                    concept: root.name.clone(),
                    trait_name: trait_name.clone(),
                    value: value.clone(),
                });
            }
        }

        let child_names: BTreeSet<&str> = root.children.iter().map(|c| c.name.as_str()).collect();
        for required in &def.required_children {
            if !child_names.contains(required.as_str()) {
                return Err(SchemaError::MissingRequiredChild {
                    concept: root.name.clone(),
                    child: required.clone(),
                });
            }
        }
        for child in &root.children {
            if !def.allowed_children.contains(&child.name) {
                return Err(SchemaError::DisallowedChild {
                    concept: root.name.clone(),
                    child: child.name.clone(),
                });
            }
        }

        if def.forbids_content {
            if let Some(text) = &root.text_content {
                if !text.is_empty() {
                    return Err(SchemaError::ForbiddenContent(root.name.clone()));
                }
            }
        }

        for child in &root.children {
            self.validate(child)?;
        }

        Ok(())
    }
}

fn trait_value_satisfies(def: &TraitDefinition, value: &str) -> bool {
    let Some(value_type) = def.default_value_type else {
        return true;
    };
    match value_type {
        TraitValueType::Text => true,
        TraitValueType::IriReference => !value.is_empty() && value.contains(':') && !value.chars().any(char::is_whitespace),
        TraitValueType::Boolean => value == "true" || value == "false",
        TraitValueType::Integer => is_integral_decimal(value),
        TraitValueType::Number => is_parsable_decimal(value),
        TraitValueType::EnumeratedToken => {
            let stripped = value.strip_prefix('$').unwrap_or(value);
            def.allowed_values.as_ref().is_some_and(|allowed| allowed.contains(stripped))
        }
    }
}

fn is_integral_decimal(value: &str) -> bool {
    let body = value.strip_prefix(['+', '-']).unwrap_or(value);
    !body.is_empty() && body.chars().all(|c| c.is_ascii_digit())
}

fn is_parsable_decimal(value: &str) -> bool {
    let body = value.strip_prefix(['+', '-']).unwrap_or(value);
    if body.is_empty() {
        return false;
    }
    let mut parts = body.splitn(2, '.');
    let integer_part = parts.next().unwrap_or("");
    let fractional_part = parts.next();
    if integer_part.is_empty() || !integer_part.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    match fractional_part {
        None => true,
        Some(frac) => !frac.is_empty() && frac.chars().all(|c| c.is_ascii_digit()),
    }
}

fn parse_concept_definition(node: &Concept) -> Result<ConceptDefinition, SchemaError> {
    let name = node
        .trait_value("concept")
        .ok_or_else(|| SchemaError::Malformed("ConceptDefinition missing 'concept' trait".to_string()))?
        .to_string();

    let mut def = ConceptDefinition { name, ..Default::default() };
    def.forbids_content = node.first_child_named("ForbidsContent").is_some();

    for child in node.children_named("RequiredTrait") {
        if let Some(name) = child.trait_value("name") {
            def.required_traits.insert(name.to_string());
        }
    }
    for child in node.children_named("AllowedTrait") {
        if let Some(name) = child.trait_value("name") {
            def.allowed_traits.insert(name.to_string());
        }
    }
    for child in node.children_named("RequiredChild") {
        if let Some(name) = child.trait_value("concept") {
            def.required_children.insert(name.to_string());
        }
    }
    for child in node.children_named("AllowedChild") {
        if let Some(name) = child.trait_value("concept") {
            def.allowed_children.insert(name.to_string());
        }
    }
    // Required implies allowed.
    def.allowed_traits.extend(def.required_traits.iter().cloned());
    def.allowed_children.extend(def.required_children.iter().cloned());

    Ok(def)
}

fn parse_trait_definition(node: &Concept) -> Result<TraitDefinition, SchemaError> {
    let name = node
        .trait_value("trait")
        .ok_or_else(|| SchemaError::Malformed("TraitDefinition missing 'trait' trait".to_string()))?
        .to_string();

    let default_value_type = node.trait_value("defaultValueType").and_then(TraitValueType::parse);

    let mut allowed_values = None;
    if node.first_child_named("AllowedValue").is_some() {
        let values: BTreeSet<String> = node
            .children_named("AllowedValue")
            .filter_map(|c| c.trait_value("value").map(str::to_string))
            .collect();
        allowed_values = Some(values);
    }

    Ok(TraitDefinition { name, default_value_type, allowed_values })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Schema {
        let xml = "\
<Schema>\
<TraitDefinition trait=\"fixtureId\" defaultValueType=\"Text\"/>\
<TraitDefinition trait=\"mode\" defaultValueType=\"EnumeratedToken\">\
<AllowedValue value=\"strict\"/>\
<AllowedValue value=\"advisory\"/>\
</TraitDefinition>\
<ConceptDefinition concept=\"AdaptiveFixture\">\
<RequiredTrait name=\"fixtureId\"/>\
<AllowedTrait name=\"mode\"/>\
<AllowedChild concept=\"AdaptiveIntent\"/>\
</ConceptDefinition>\
<ConceptDefinition concept=\"AdaptiveIntent\"/>\
</Schema>";
        let root = Concept::parse(xml).unwrap();
        Schema::from_concept(&root).unwrap()
    }

    #[test]
    fn accepts_a_conforming_document() {
        let schema = sample_schema();
        let root = Concept::new("AdaptiveFixture")
            .with_trait("fixtureId", "f-1")
            .with_trait("mode", "$strict")
            .with_child(Concept::new("AdaptiveIntent"));
        assert!(schema.validate(&root).is_ok());
    }

    #[test]
    fn rejects_missing_required_trait() {
        let schema = sample_schema();
        let root = Concept::new("AdaptiveFixture");
        assert!(matches!(schema.validate(&root), Err(SchemaError::MissingRequiredTrait { .. })));
    }

    #[test]
    fn empty_allowed_children_means_none_allowed() {
        let schema = sample_schema();
        let root = Concept::new("AdaptiveIntent").with_child(Concept::new("AdaptiveFixture"));
        assert!(matches!(schema.validate(&root), Err(SchemaError::DisallowedChild { .. })));
    }

    #[test]
    fn rejects_unlisted_trait() {
        let schema = sample_schema();
        let root = Concept::new("AdaptiveFixture").with_trait("fixtureId", "f-1").with_trait("other", "x");
        assert!(matches!(schema.validate(&root), Err(SchemaError::DisallowedTrait { .. })));
    }

    #[test]
    fn enumerated_token_strips_leading_dollar() {
        let schema = sample_schema();
        let root = Concept::new("AdaptiveFixture").with_trait("fixtureId", "f-1").with_trait("mode", "nonsense");
        assert!(matches!(schema.validate(&root), Err(SchemaError::InvalidTraitValue { .. })));
    }
}
