#![no_main]

use formatter::{LosFormatter, Value};
use libfuzzer_sys::fuzz_target;
use state::{ItemTypes, StateBag, StateError, StateItem, StateManagedCollection, StateManager};
use std::any::Any;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Field(StateBag);

impl StateManager for Field {
    fn is_tracking(&self) -> bool {
        self.0.is_tracking()
    }

    fn track_state(&mut self) {
        self.0.track_state();
    }

    fn save_state(&mut self) -> Value {
        self.0.save_state()
    }

    fn load_state(&mut self, state: &Value) -> Result<(), StateError> {
        self.0.load_state(state)
    }
}

impl StateItem for Field {
    fn type_name(&self) -> &str {
        "Fuzz.Field"
    }

    fn set_dirty(&mut self) {
        self.0.set_dirty(true);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(state) = LosFormatter::default().from_token_string(text) else {
        return;
    };
    let types = Arc::new(
        ItemTypes::new()
            .with_known("Fuzz.Field", || Box::new(Field::default()) as Box<dyn StateItem>)
            .with_resolvable("Fuzz.Other", || Box::new(Field::default()) as Box<dyn StateItem>),
    );
    let mut collection = StateManagedCollection::new(types);
    collection.track_state();
    if collection.load_state(&state).is_ok() {
        let _ = collection.save_state();
    }
});
