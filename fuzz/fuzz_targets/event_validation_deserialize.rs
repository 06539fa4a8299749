#![no_main]

use libfuzzer_sys::fuzz_target;
use validation::EventValidationStore;

fuzz_target!(|data: &[u8]| {
    if let Ok(store) = EventValidationStore::deserialize(data) {
        let again = EventValidationStore::deserialize(&store.serialize())
            .expect("serialized store must deserialize");
        assert_eq!(again.len(), store.len());
    }
});
