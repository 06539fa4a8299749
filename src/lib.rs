//! Page-level view-state persistence for server-side web forms.
//!
//! The building blocks live in their own crates and are re-exported here:
//! [`formatter`] (the compact state serializer), [`state`] (dirty-tracked
//! bags and collections), [`validation`] (postback event validation) and
//! [`cache`] (partial-page output caching). This crate ties them to a page:
//! the control tree, hidden-field persistence and client script
//! registration.

mod client_script;
mod config;
mod control;
mod error;
mod page;
mod persister;

pub use client_script::{ClientScriptManager, EVENT_VALIDATION_FIELD};
pub use config::PageStateConfig;
pub use control::{Control, ID_SEPARATOR};
pub use error::PageError;
pub use page::{Page, PageFields, REQUIRES_POSTBACK_KEY};
pub use persister::{HiddenFieldPersister, VIEW_STATE_FIELD};

pub use cache;
pub use formatter;
pub use state;
pub use validation;
