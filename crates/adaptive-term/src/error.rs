use thiserror::Error;

#[derive(Debug, Error)]
pub enum TermError {
    #[error("graph contains a term that is not NFC-normalized")]
    NotNfc,
    #[error("graph contains a blank node")]
    BlankNode,
    #[error("unsupported RDF term in subject position: {0}")]
    UnsupportedSubject(String),
}
