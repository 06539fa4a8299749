//! Dirty-tracked state containers.
//!
//! [`StateBag`] is a keyed property map; [`StateManagedCollection`] is an
//! ordered list of state-bearing items. Both implement [`StateManager`] and
//! produce [`formatter::Value`] trees for the compact serializer.

mod bag;
mod collection;
mod error;
mod manager;

pub use bag::StateBag;
pub use collection::{
    CollectionConfig, CollectionFormat, ItemFactory, ItemTypes, StateItem, StateManagedCollection,
};
pub use error::StateError;
pub use manager::StateManager;
