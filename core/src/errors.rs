//! The tagged error enum surfaced by every public operation of the Data
//! Management Core, and the stable integer codes exposed to transports.

use oxigraph::model::NamedNode;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown property: {0}")]
    UnknownProperty(NamedNode),

    #[error("unknown class: {0}")]
    UnknownClass(NamedNode),

    #[error("cardinality exceeded for property {property} on {resource}: max {max}, would have {would_have}")]
    CardinalityExceeded {
        property: NamedNode,
        resource: NamedNode,
        max: u32,
        would_have: usize,
    },

    #[error("uniqueness violation: {0}")]
    UniquenessViolation(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("ambiguous identification for incoming resource, {0} candidates")]
    AmbiguousIdentification(usize),

    #[error("store error: {0}")]
    StoreError(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Stable integer tag surfaced to transports, per the wire error-code table.
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) => 1,
            Error::UnknownProperty(_) => 2,
            Error::UnknownClass(_) => 3,
            Error::CardinalityExceeded { .. } => 4,
            Error::UniquenessViolation(_) => 5,
            Error::PermissionDenied(_) => 6,
            Error::AmbiguousIdentification(_) => 7,
            Error::StoreError(_) => 8,
            Error::Cancelled => 9,
        }
    }
}

impl From<oxigraph::store::StorageError> for Error {
    fn from(e: oxigraph::store::StorageError) -> Self {
        Error::StoreError(e.to_string())
    }
}

impl From<oxigraph::sparql::EvaluationError> for Error {
    fn from(e: oxigraph::sparql::EvaluationError) -> Self {
        Error::StoreError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
