use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("ambiguous comparison between a numeric and a string column under a non-exact operator")]
    AmbiguousComparison,

    #[error("placeholder ?{0} has no bound argument")]
    UnboundPlaceholder(usize),
}

pub type Result<T> = std::result::Result<T, QueryError>;
