//! Event-validation integrity store.
//!
//! Records which (target, argument) postback events a rendered page
//! legitimately offers, as a set of truncated SHA-256 digests, and carries
//! that set across a round trip in a small binary field.

mod digest;
mod error;
mod store;

pub use digest::{DIGEST_LEN, EventDigest, event_digest};
pub use error::ValidationError;
pub use store::{EventValidationStore, FORMAT_VERSION};
