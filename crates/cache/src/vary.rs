use uuid::Uuid;

/// The vary configuration a cached fragment was stored under.
///
/// Equality compares the dimensions only; `cached_vary_id` ties cache
/// entries to the descriptor instance that produced them.
#[derive(Clone, Debug)]
pub struct ControlCachedVary {
    pub vary_by_params: Option<Vec<String>>,
    pub vary_by_controls: Option<Vec<String>>,
    pub vary_by_custom: Option<String>,
    pub cached_vary_id: Uuid,
}

impl ControlCachedVary {
    pub fn new(
        vary_by_params: Option<Vec<String>>,
        vary_by_controls: Option<Vec<String>>,
        vary_by_custom: Option<String>,
    ) -> Self {
        Self {
            vary_by_params,
            vary_by_controls,
            vary_by_custom,
            cached_vary_id: Uuid::new_v4(),
        }
    }

    /// `*` as the only param name varies by every request value.
    pub fn varies_by_all_params(&self) -> bool {
        matches!(self.vary_by_params.as_deref(), Some([only]) if only == "*")
    }
}

impl PartialEq for ControlCachedVary {
    fn eq(&self, other: &Self) -> bool {
        self.vary_by_params == other.vary_by_params
            && self.vary_by_controls == other.vary_by_controls
            && self.vary_by_custom == other.vary_by_custom
    }
}

impl Eq for ControlCachedVary {}
