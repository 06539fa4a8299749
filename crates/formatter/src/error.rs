use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    /// The token stream is structurally invalid (unbalanced brackets,
    /// truncated tokens, bad digits, ...).
    #[error("malformed state at offset {offset}: {detail}")]
    MalformedState { offset: usize, detail: String },

    /// The integrity check over a MAC-protected payload failed.
    #[error("state validation failed; the payload was tampered with or signed with another key")]
    ValidationFailed,

    /// No encoding path exists for a value of this type.
    #[error("type '{type_name}' has no registered converter and cannot be serialized")]
    NonSerializable { type_name: String },

    /// A type named in the payload is not known to the registry.
    #[error("could not load type '{type_name}'")]
    TypeLoad { type_name: String },

    /// A type name was rejected at registration.
    #[error("invalid type name '{name}'")]
    InvalidTypeName { name: String },

    /// A converter rejected its input.
    #[error("cannot convert value of type '{type_name}': {detail}")]
    Conversion { type_name: String, detail: String },
}

impl FormatError {
    pub(crate) fn malformed(offset: usize, detail: impl Into<String>) -> Self {
        FormatError::MalformedState {
            offset,
            detail: detail.into(),
        }
    }

    pub fn conversion(type_name: &str, detail: impl Into<String>) -> Self {
        FormatError::Conversion {
            type_name: type_name.to_string(),
            detail: detail.into(),
        }
    }
}
