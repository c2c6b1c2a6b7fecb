use thiserror::Error;

/// Errors raised while encoding or decoding column values.
///
/// Mirrors the taxonomy of §7: codec errors surface directly to the caller,
/// they are never swallowed the way trigger-level `DeletedIndex` is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed encoding: {0}")]
    MalformedEncoding(&'static str),

    #[error("unknown schema version: {0}")]
    UnknownSchemaVersion(u32),

    #[error("unsupported conversion from {from} to {to}")]
    UnsupportedConversion { from: &'static str, to: &'static str },
}

pub type Result<T> = std::result::Result<T, CodecError>;
