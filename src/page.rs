//! Page-level state: the control tree's view state, the control-state map
//! and event validation, persisted into hidden form fields.

use crate::client_script::{ClientScriptManager, EVENT_VALIDATION_FIELD};
use crate::config::PageStateConfig;
use crate::control::Control;
use crate::error::PageError;
use crate::persister::{HiddenFieldPersister, VIEW_STATE_FIELD};
use cache::RequestValues;
use formatter::{LosFormatter, TypeRegistry, Value};
use state::{StateError, StateManager};
use std::collections::HashMap;
use std::sync::Arc;

/// Control-state map key holding the unique ids of controls that asked to
/// see postback data.
pub const REQUIRES_POSTBACK_KEY: &str = "__ControlsRequirePostBackKey__";

/// Hidden fields written into the rendered form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageFields {
    pub view_state: String,
    pub event_validation: Option<String>,
}

#[derive(Debug)]
pub struct Page {
    type_name: String,
    layout_hash: String,
    formatter: LosFormatter,
    controls: Control,
    client_script: ClientScriptManager,
    requires_postback: Vec<String>,
    is_postback: bool,
}

impl Page {
    /// `type_name` identifies the page's control layout; state saved by a
    /// page with another layout is not applied.
    pub fn new(
        type_name: impl Into<String>,
        config: &PageStateConfig,
        registry: Arc<TypeRegistry>,
    ) -> Result<Self, PageError> {
        let type_name = type_name.into();
        let layout_hash = tools::string_hash(&type_name).to_string();
        let modifier = match &config.user_key {
            Some(user) => format!("{layout_hash}:{user}"),
            None => layout_hash.clone(),
        };
        let formatter =
            LosFormatter::new(registry, config.formatter_config()?).with_modifier(modifier);
        Ok(Self {
            type_name,
            layout_hash,
            formatter,
            controls: Control::anonymous(),
            client_script: ClientScriptManager::new(config.enable_event_validation),
            requires_postback: Vec::new(),
            is_postback: false,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn layout_hash(&self) -> &str {
        &self.layout_hash
    }

    pub fn formatter(&self) -> &LosFormatter {
        &self.formatter
    }

    pub fn controls(&self) -> &Control {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut Control {
        &mut self.controls
    }

    pub fn client_script(&self) -> &ClientScriptManager {
        &self.client_script
    }

    pub fn client_script_mut(&mut self) -> &mut ClientScriptManager {
        &mut self.client_script
    }

    pub fn is_postback(&self) -> bool {
        self.is_postback
    }

    pub fn register_requires_postback(&mut self, unique_id: &str) {
        if !self.requires_postback.iter().any(|id| id == unique_id) {
            self.requires_postback.push(unique_id.to_string());
        }
    }

    pub fn controls_requiring_postback(&self) -> &[String] {
        &self.requires_postback
    }

    /// Start recording changes; anything set before this is treated as
    /// declarative configuration and not persisted.
    pub fn track_view_state(&mut self) {
        self.controls.track_view_state_recursive();
    }

    pub fn save_state(&mut self) -> Result<PageFields, PageError> {
        let mut entries = Vec::new();
        self.controls.walk_mut(None, &mut |unique_id, control| {
            if let Some(bag) = control.control_state_mut() {
                bag.set_dirty(true);
                let state = bag.save_state();
                if !state.is_null() {
                    entries.push((Value::from(unique_id), state));
                }
            }
            Ok(())
        })?;
        if !self.requires_postback.is_empty() {
            let ids = self.requires_postback.iter().cloned().map(Some).collect();
            entries.push((Value::from(REQUIRES_POSTBACK_KEY), Value::StringArray(ids)));
        }
        let control_state = if entries.is_empty() {
            Value::Null
        } else {
            Value::Map(entries)
        };

        let tree = self.controls.save_view_state_recursive();
        let view_state = Value::pair(Value::from(self.layout_hash.as_str()), tree);

        let view_state = HiddenFieldPersister::new(&self.formatter).save(control_state, view_state)?;
        let event_validation = self
            .client_script
            .save_event_validation_field(&self.formatter)?;
        Ok(PageFields {
            view_state,
            event_validation,
        })
    }

    /// Restore state posted back in `form`. Controls must already be in the
    /// tree; view state for children added later is applied when they are
    /// added.
    pub fn load_state(&mut self, form: &RequestValues) -> Result<(), PageError> {
        let field = form.get(VIEW_STATE_FIELD);
        self.is_postback = field.is_some();
        let (control_state, view_state) =
            HiddenFieldPersister::new(&self.formatter).load(field.as_deref())?;

        self.load_control_state(control_state)?;

        match view_state {
            Value::Null => {}
            Value::Pair(hash, tree) => {
                if hash.as_str() == Some(self.layout_hash.as_str()) {
                    self.controls.load_view_state_recursive(&tree)?;
                } else {
                    log::debug!(
                        target: "page.state",
                        "layout of {} changed; ignoring posted view state",
                        self.type_name
                    );
                }
            }
            other => {
                return Err(StateError::MalformedState(format!(
                    "view state must be a pair, found {}",
                    other.kind()
                ))
                .into());
            }
        }

        let validation = form.get(EVENT_VALIDATION_FIELD);
        self.client_script
            .load_event_validation_field(validation.as_deref(), &self.formatter)
    }

    fn load_control_state(&mut self, state: Value) -> Result<(), PageError> {
        let entries = match state {
            Value::Null => return Ok(()),
            Value::Map(entries) => entries,
            other => {
                return Err(StateError::MalformedState(format!(
                    "control state must be a map, found {}",
                    other.kind()
                ))
                .into());
            }
        };
        let mut by_id = HashMap::with_capacity(entries.len());
        for (key, value) in entries {
            let Value::String(key) = key else {
                return Err(StateError::MalformedState("control state key is not a string".into()).into());
            };
            by_id.insert(key, value);
        }

        if let Some(ids) = by_id.remove(REQUIRES_POSTBACK_KEY) {
            let Value::StringArray(ids) = ids else {
                return Err(StateError::MalformedState("postback list is not a string array".into()).into());
            };
            self.requires_postback = ids.into_iter().flatten().collect();
        }

        self.controls.walk_mut(None, &mut |unique_id, control| {
            if let (Some(bag), Some(state)) = (control.control_state_mut(), by_id.remove(unique_id)) {
                bag.load_state(&state)?;
            }
            Ok(())
        })
    }
}
