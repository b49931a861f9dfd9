//! Term, triple, graph, and canonicalization primitives shared by every
//! stage of the adaptive plan pipeline.

pub mod canonical;
pub mod error;
pub mod graph;
pub mod term;

pub use canonical::{canonical_bytes, graph_hash, has_blank_node, is_nfc_graph, render_triple, scoped_subgraph, sha256_hex};
pub use error::TermError;
pub use graph::{Graph, RDF_TYPE};
pub use term::{Iri, Literal, Term, Triple, TypedValue};
