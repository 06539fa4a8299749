use cache::CacheError;
use formatter::FormatError;
use state::StateError;
use thiserror::Error;
use validation::ValidationError;

#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("event validation data is unreadable: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A postback named an event that was never rendered for this page.
    #[error("invalid postback or callback argument for '{unique_id}'")]
    InvalidPostBackEvent {
        unique_id: String,
        argument: Option<String>,
    },

    /// The page configuration cannot be honoured, e.g. signing without a key.
    #[error("invalid page configuration: {0}")]
    Config(&'static str),
}

impl PageError {
    /// Errors that mean the posted state is expired or tampered with rather
    /// than a bug; hosts typically answer these by starting a fresh page.
    pub fn is_untrusted_state(&self) -> bool {
        matches!(
            self,
            PageError::Format(FormatError::ValidationFailed)
                | PageError::Validation(_)
                | PageError::InvalidPostBackEvent { .. }
        )
    }
}
