use thiserror::Error;

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unsupported event validation format version {0:#04x}")]
    UnsupportedVersion(u8),

    /// Truncated input, a bad count, or bytes after the last digest.
    #[error("event validation data is corrupt")]
    CorruptData,
}
