use std::time::Duration;
use thiserror::Error;

/// Error taxonomy for the row engine (§7). Kinds, not a 1:1 transliteration
/// of any one store's exception hierarchy.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    #[error("ambiguous comparison: {0}")]
    AmbiguousComparison(String),

    #[error("unsupported conversion from {from} to {to}")]
    UnsupportedConversion { from: String, to: String },

    #[error("unique constraint violated on index {index}")]
    UniqueConstraint { index: String },

    #[error("lock unavailable after {duration:?}: {detail}")]
    LockFailure { duration: Duration, detail: String },

    #[error("index {0} is closed")]
    ClosedIndex(String),

    #[error("index {0} was deleted")]
    DeletedIndex(String),

    #[error("unknown schema version {0}")]
    UnknownSchemaVersion(u32),

    #[error("write attempted through a read-only view")]
    UnmodifiableView,

    #[error("conversion exception: {0}")]
    ConversionException(String),

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<relstore_codec::CodecError> for EngineError {
    fn from(err: relstore_codec::CodecError) -> Self {
        match err {
            relstore_codec::CodecError::UnknownSchemaVersion(v) => EngineError::UnknownSchemaVersion(v),
            relstore_codec::CodecError::UnsupportedConversion { from, to } => {
                EngineError::UnsupportedConversion { from: from.to_string(), to: to.to_string() }
            }
            other => EngineError::MalformedEncoding(other.to_string()),
        }
    }
}

impl From<relstore_query::error::QueryError> for EngineError {
    fn from(err: relstore_query::error::QueryError) -> Self {
        match err {
            relstore_query::error::QueryError::AmbiguousComparison => {
                EngineError::AmbiguousComparison("mixed numeric/text operands under a non-exact operator".into())
            }
            other => EngineError::ConversionException(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Sentinel returned (not thrown — see the engine's design notes on
/// replacing exception-as-control-flow) by the evaluator when a stop-column
/// comparison fails and the scan should end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanStopped;
