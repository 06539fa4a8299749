use formatter::FormatError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    /// Caller error: empty key, missing item, and similar.
    #[error("invalid argument: {0}")]
    ArgumentInvalid(&'static str),

    /// Saved state does not have a shape this reader understands.
    #[error("malformed state: {0}")]
    MalformedState(String),

    #[error("could not load item type '{type_name}'")]
    TypeLoad { type_name: String },

    #[error("index {index} out of range for collection of {len} items")]
    IndexOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Format(#[from] FormatError),
}

impl StateError {
    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        StateError::MalformedState(detail.into())
    }
}
