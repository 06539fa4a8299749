//! Client script registrations and event validation for one page.

use crate::error::PageError;
use cache::{ClientRegistrar, RegisterCall};
use formatter::LosFormatter;
use validation::EventValidationStore;

pub const EVENT_VALIDATION_FIELD: &str = "__EVENTVALIDATION";

/// Collects what controls register while the page renders, and owns the
/// page's event-validation state: the outgoing store filled during render
/// and the store that came back with the postback.
#[derive(Debug)]
pub struct ClientScriptManager {
    calls: Vec<RegisterCall>,
    css: Vec<String>,
    event_validation: bool,
    outgoing: EventValidationStore,
    posted: Option<EventValidationStore>,
}

impl ClientScriptManager {
    pub fn new(event_validation: bool) -> Self {
        Self {
            calls: Vec::new(),
            css: Vec::new(),
            event_validation,
            outgoing: EventValidationStore::new(),
            posted: None,
        }
    }

    pub fn registered_calls(&self) -> &[RegisterCall] {
        &self.calls
    }

    pub fn css(&self) -> &[String] {
        &self.css
    }

    pub fn is_event_validation_enabled(&self) -> bool {
        self.event_validation
    }

    /// Events registered during this render.
    pub fn outgoing_events(&self) -> &EventValidationStore {
        &self.outgoing
    }

    pub fn register_client_script_block(&mut self, key: &str, script: &str, add_script_tags: bool) {
        self.register(&RegisterCall::ClientScriptBlock {
            key: key.to_string(),
            script: script.to_string(),
            add_script_tags,
        });
    }

    pub fn register_client_script_include(&mut self, key: &str, url: &str) {
        self.register(&RegisterCall::ClientScriptInclude {
            key: key.to_string(),
            url: url.to_string(),
        });
    }

    pub fn register_startup_script(&mut self, key: &str, script: &str, add_script_tags: bool) {
        self.register(&RegisterCall::StartupScript {
            key: key.to_string(),
            script: script.to_string(),
            add_script_tags,
        });
    }

    pub fn register_array_declaration(&mut self, name: &str, value: &str) {
        self.register(&RegisterCall::ArrayDeclaration {
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    pub fn register_hidden_field(&mut self, name: &str, value: &str) {
        self.register(&RegisterCall::HiddenField {
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    pub fn register_expando_attribute(&mut self, control_id: &str, attribute: &str, value: &str) {
        self.register(&RegisterCall::ExpandoAttribute {
            control_id: control_id.to_string(),
            attribute: attribute.to_string(),
            value: value.to_string(),
        });
    }

    pub fn register_on_submit_statement(&mut self, key: &str, script: &str) {
        self.register(&RegisterCall::OnSubmitStatement {
            key: key.to_string(),
            script: script.to_string(),
        });
    }

    /// Values declared for the client array `name`, in registration order.
    pub fn array_values(&self, name: &str) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                RegisterCall::ArrayDeclaration { name: n, value } if n == name => {
                    Some(value.as_str())
                }
                _ => None,
            })
            .collect()
    }

    /// Carry the events that came back with the postback into this
    /// response's store, for partial renders where controls that are not
    /// re-rendered must stay valid on the next postback.
    pub fn seed_from_posted(&mut self) {
        if !self.event_validation {
            return;
        }
        let Some(posted) = &self.posted else {
            return;
        };
        let mut seeded = posted.clone();
        seeded.union_with(&self.outgoing);
        log::trace!(target: "validation", "seeded {} posted events", posted.len());
        self.outgoing = seeded;
    }

    /// Check a posted event against the events rendered for the previous
    /// response.
    pub fn validate_event(&self, unique_id: &str, argument: Option<&str>) -> Result<(), PageError> {
        if !self.event_validation {
            return Ok(());
        }
        let valid = self
            .posted
            .as_ref()
            .is_some_and(|posted| posted.contains(Some(unique_id), argument));
        if valid {
            return Ok(());
        }
        log::warn!(target: "validation", "rejected postback event for {unique_id}");
        Err(PageError::InvalidPostBackEvent {
            unique_id: unique_id.to_string(),
            argument: argument.map(str::to_string),
        })
    }

    /// The `__EVENTVALIDATION` field for this response, or `None` when
    /// validation is off or nothing was registered.
    pub fn save_event_validation_field(
        &self,
        formatter: &LosFormatter,
    ) -> Result<Option<String>, PageError> {
        if !self.event_validation || self.outgoing.is_empty() {
            return Ok(None);
        }
        Ok(Some(formatter.protect(self.outgoing.serialize())?))
    }

    pub fn load_event_validation_field(
        &mut self,
        field: Option<&str>,
        formatter: &LosFormatter,
    ) -> Result<(), PageError> {
        self.posted = None;
        let Some(field) = field.filter(|field| !field.is_empty()) else {
            return Ok(());
        };
        let bytes = formatter.unprotect(field)?;
        self.posted = Some(EventValidationStore::deserialize(&bytes)?);
        Ok(())
    }
}

fn same_slot(existing: &RegisterCall, incoming: &RegisterCall) -> bool {
    use RegisterCall::*;
    match (existing, incoming) {
        (ClientScriptBlock { key: a, .. }, ClientScriptBlock { key: b, .. })
        | (ClientScriptInclude { key: a, .. }, ClientScriptInclude { key: b, .. })
        | (StartupScript { key: a, .. }, StartupScript { key: b, .. })
        | (OnSubmitStatement { key: a, .. }, OnSubmitStatement { key: b, .. })
        | (HiddenField { name: a, .. }, HiddenField { name: b, .. }) => a == b,
        (
            ExpandoAttribute {
                control_id: a,
                attribute: x,
                ..
            },
            ExpandoAttribute {
                control_id: b,
                attribute: y,
                ..
            },
        ) => a == b && x == y,
        _ => false,
    }
}

impl ClientRegistrar for ClientScriptManager {
    /// Keyed registrations keep the first one made for a key; array
    /// declarations accumulate.
    fn register(&mut self, call: &RegisterCall) {
        if self.calls.iter().any(|existing| same_slot(existing, call)) {
            log::trace!(target: "page.state", "duplicate registration ignored: {call:?}");
            return;
        }
        self.calls.push(call.clone());
    }

    fn register_for_event_validation(&mut self, unique_id: &str, argument: Option<&str>) {
        if self.event_validation {
            self.outgoing.add(Some(unique_id), argument);
        }
    }

    fn register_css(&mut self, css: &str) {
        self.css.push(css.to_string());
    }
}
