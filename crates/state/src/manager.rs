use crate::error::StateError;
use formatter::Value;

/// Tracked-state contract shared by bags, collections and collection items.
///
/// Before `track_state` every change is treated as initial configuration and
/// is not persisted. After it, changes are recorded and `save_state` returns
/// just the recorded changes (or `Value::Null` when there are none).
pub trait StateManager {
    fn is_tracking(&self) -> bool;

    fn track_state(&mut self);

    fn save_state(&mut self) -> Value;

    fn load_state(&mut self, state: &Value) -> Result<(), StateError>;
}
