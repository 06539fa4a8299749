use crate::error::PageError;
use formatter::{FormatterConfig, MacKey};

/// Page-level persistence settings.
#[derive(Clone, Debug)]
pub struct PageStateConfig {
    /// Sign `__VIEWSTATE` and `__EVENTVALIDATION`; requires `validation_key`.
    pub enable_view_state_mac: bool,
    pub enable_event_validation: bool,
    pub validation_key: Option<String>,
    /// Per-user value mixed into signatures so one user's fields do not
    /// validate for another.
    pub user_key: Option<String>,
}

impl Default for PageStateConfig {
    fn default() -> Self {
        Self {
            enable_view_state_mac: false,
            enable_event_validation: true,
            validation_key: None,
            user_key: None,
        }
    }
}

impl PageStateConfig {
    pub fn signed(validation_key: impl Into<String>) -> Self {
        Self {
            enable_view_state_mac: true,
            validation_key: Some(validation_key.into()),
            ..Self::default()
        }
    }

    pub(crate) fn formatter_config(&self) -> Result<FormatterConfig, PageError> {
        let mac_key = if self.enable_view_state_mac {
            let key = self
                .validation_key
                .as_deref()
                .filter(|key| !key.is_empty())
                .ok_or(PageError::Config("view state MAC requires a validation key"))?;
            Some(MacKey::new(key))
        } else {
            None
        };
        Ok(FormatterConfig {
            mac_key,
            ..FormatterConfig::default()
        })
    }
}
