//! RDF term primitives: IRIs, literals, typed values.

use std::fmt;
use unicode_normalization::is_nfc;

/// An IRI, stored as its full string form. No prefix compression is kept
/// past parsing -- every IRI in this crate is already expanded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Iri(String);

impl Iri {
    pub fn new(value: impl Into<String>) -> Self {
        Iri(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_nfc(&self) -> bool {
        is_nfc(&self.0)
    }

    /// The segment after the last `:`, used for `lastColonSegment(intentId)` in Stage C.
    pub fn last_colon_segment(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Iri {
    fn from(value: &str) -> Self {
        Iri(value.to_string())
    }
}

impl From<String> for Iri {
    fn from(value: String) -> Self {
        Iri(value)
    }
}

/// A literal: lexical form plus optional datatype IRI and language tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Literal {
    pub lexical: String,
    pub datatype: Option<Iri>,
    pub language: Option<String>,
}

impl Literal {
    pub fn plain(lexical: impl Into<String>) -> Self {
        Literal { lexical: lexical.into(), datatype: None, language: None }
    }

    pub fn typed(lexical: impl Into<String>, datatype: Iri) -> Self {
        Literal { lexical: lexical.into(), datatype: Some(datatype), language: None }
    }

    pub fn tagged(lexical: impl Into<String>, language: impl Into<String>) -> Self {
        Literal { lexical: lexical.into(), datatype: None, language: Some(language.into()) }
    }

    pub fn is_nfc(&self) -> bool {
        is_nfc(&self.lexical)
            && self.datatype.as_ref().is_none_or(Iri::is_nfc)
            && self.language.as_deref().is_none_or(is_nfc)
    }
}

/// An RDF term in subject or object position.
///
/// `BlankNode` exists only so the canonicalizer can detect and reject one if
/// a turtle fixture happens to contain it -- nothing downstream of parsing
/// ever legitimately constructs this variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Term {
    Iri(Iri),
    Literal(Literal),
    BlankNode(String),
}

impl Term {
    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Term::BlankNode(_))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "{iri}"),
            Term::Literal(lit) => write!(f, "{}", lit.lexical),
            Term::BlankNode(id) => write!(f, "_:{id}"),
        }
    }
}

/// An RDF triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Iri,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: Iri, object: Term) -> Self {
        Triple { subject, predicate, object }
    }
}

/// A typed scalar value, used for context entries, condition values, and
/// action values. Integer and decimal share numeric comparison semantics;
/// every other pair of kinds is comparable only by exact kind match.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum TypedValue {
    Integer(i64),
    Decimal(rust_decimal::Decimal),
    String(String),
    Boolean(bool),
    Iri(Iri),
}

impl TypedValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TypedValue::Integer(_) => "integer",
            TypedValue::Decimal(_) => "decimal",
            TypedValue::String(_) => "string",
            TypedValue::Boolean(_) => "boolean",
            TypedValue::Iri(_) => "iri",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, TypedValue::Integer(_) | TypedValue::Decimal(_))
    }

    pub fn as_decimal(&self) -> Option<rust_decimal::Decimal> {
        match self {
            TypedValue::Integer(i) => Some(rust_decimal::Decimal::from(*i)),
            TypedValue::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// `Eq`/`Ne` semantics: numeric kinds compare by numeric value across
    /// integer/decimal; every other pair requires identical kind and value.
    pub fn value_eq(&self, other: &TypedValue) -> bool {
        if self.is_numeric() && other.is_numeric() {
            return self.as_decimal() == other.as_decimal();
        }
        self == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_decimal_numeric_equality() {
        let a = TypedValue::Integer(1920);
        let b = TypedValue::Decimal(rust_decimal::Decimal::new(1920, 0));
        assert!(a.value_eq(&b));
    }

    #[test]
    fn string_vs_integer_never_equal() {
        let a = TypedValue::String("1920".to_string());
        let b = TypedValue::Integer(1920);
        assert!(!a.value_eq(&b));
    }

    #[test]
    fn last_colon_segment_extracts_trailing_component() {
        let iri = Iri::new("urn:intent:editorial-hero-adapt-001");
        assert_eq!(iri.last_colon_segment(), "editorial-hero-adapt-001");
    }
}
