//! Partial-page output caching: key derivation, vary descriptors, the
//! fragment store contract and the caching control state machine.

mod control;
mod dependency;
mod entry;
mod error;
mod key;
mod registrar;
mod request;
mod store;
mod vary;

pub use control::{
    CachePolicy, CachedContent, ContentFactory, FragmentRequest, FragmentState,
    PartialCachingControl,
};
pub use dependency::{AggregateDependency, CacheDependency, DependencyFactory, SignalDependency};
pub use entry::{CacheEntry, RegisterCall, ValidationEvent};
pub use error::CacheError;
pub use key::{KEY_PREFIX, VaryByCustomResolver, VaryInputs, base_combiner, base_key, vary_key};
pub use registrar::{ClientRegistrar, NullRegistrar, RecordingRegistrar, Registrations};
pub use request::RequestValues;
pub use store::{
    CachedItem, Clock, Expiration, FragmentStore, InsertRequest, ManualClock,
    MemoryFragmentStore, SystemClock,
};
pub use vary::ControlCachedVary;
