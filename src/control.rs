//! Server control tree and its view-state recursion.
//!
//! A control's saved view state is `Pair(own, children)` where `own` is its
//! bag diff and `children` is a `List` of alternating child index and child
//! state, listing only children that had something to save. A subtree with
//! nothing to save is `Null`.

use crate::error::PageError;
use formatter::Value;
use state::{StateBag, StateError, StateManager};
use std::collections::BTreeMap;

/// Separator between naming-container and control ids.
pub const ID_SEPARATOR: char = '$';

#[derive(Debug, Default)]
pub struct Control {
    id: Option<String>,
    naming_container: bool,
    enable_view_state: bool,
    view_state: StateBag,
    control_state: Option<StateBag>,
    children: Vec<Control>,
    /// Saved state for children that did not exist yet when it was loaded,
    /// keyed by child index; applied when the child is added.
    pending: BTreeMap<usize, Value>,
    tracking: bool,
}

impl Control {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            enable_view_state: true,
            ..Self::default()
        }
    }

    /// A control with no id, such as literal content.
    pub fn anonymous() -> Self {
        Self {
            enable_view_state: true,
            ..Self::default()
        }
    }

    /// Children get unique ids qualified by this control's id.
    pub fn naming_container(mut self) -> Self {
        self.naming_container = true;
        self
    }

    /// Opt this control into control state, which is saved in full on
    /// every request and ignores `enable_view_state`.
    pub fn with_control_state(mut self) -> Self {
        self.control_state = Some(StateBag::new());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn is_naming_container(&self) -> bool {
        self.naming_container
    }

    pub fn set_enable_view_state(&mut self, enabled: bool) {
        self.enable_view_state = enabled;
    }

    pub fn view_state(&self) -> &StateBag {
        &self.view_state
    }

    pub fn view_state_mut(&mut self) -> &mut StateBag {
        &mut self.view_state
    }

    pub fn control_state(&self) -> Option<&StateBag> {
        self.control_state.as_ref()
    }

    pub fn control_state_mut(&mut self) -> Option<&mut StateBag> {
        self.control_state.as_mut()
    }

    pub fn children(&self) -> &[Control] {
        &self.children
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut Control> {
        self.children.get_mut(index)
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    /// Append a child. A child added after tracking starts is brought up to
    /// the same point: it starts tracking and receives any state that was
    /// loaded for its slot before it existed.
    pub fn add_child(&mut self, mut child: Control) -> Result<&mut Control, PageError> {
        let index = self.children.len();
        if self.tracking {
            child.track_view_state_recursive();
        }
        if let Some(state) = self.pending.remove(&index) {
            log::trace!(target: "page.state", "applying deferred state to child {index}");
            child.load_view_state_recursive(&state)?;
        }
        self.children.push(child);
        Ok(&mut self.children[index])
    }

    pub fn track_view_state_recursive(&mut self) {
        self.tracking = true;
        self.view_state.track_state();
        if let Some(bag) = self.control_state.as_mut() {
            bag.track_state();
        }
        for child in &mut self.children {
            child.track_view_state_recursive();
        }
    }

    pub fn save_view_state_recursive(&mut self) -> Value {
        if !self.enable_view_state {
            return Value::Null;
        }
        let own = self.view_state.save_state();

        let mut children = Vec::new();
        for (index, child) in self.children.iter_mut().enumerate() {
            let state = child.save_view_state_recursive();
            if !state.is_null() {
                children.push(Value::Int(index as i32));
                children.push(state);
            }
        }
        // deferred state for children that were never added is carried forward
        for (index, state) in &self.pending {
            children.push(Value::Int(*index as i32));
            children.push(state.clone());
        }

        if own.is_null() && children.is_empty() {
            return Value::Null;
        }
        let children = if children.is_empty() {
            Value::Null
        } else {
            Value::List(children)
        };
        Value::pair(own, children)
    }

    pub fn load_view_state_recursive(&mut self, state: &Value) -> Result<(), PageError> {
        if !self.enable_view_state {
            return Ok(());
        }
        let (own, children) = match state {
            Value::Null => return Ok(()),
            Value::Pair(own, children) => (own.as_ref(), children.as_ref()),
            other => {
                return Err(StateError::MalformedState(format!(
                    "control state must be a pair, found {}",
                    other.kind()
                ))
                .into());
            }
        };
        self.view_state.load_state(own)?;

        let entries = match children {
            Value::Null => return Ok(()),
            Value::List(entries) | Value::Array(entries) => entries,
            other => {
                return Err(StateError::MalformedState(format!(
                    "child states must be a list, found {}",
                    other.kind()
                ))
                .into());
            }
        };
        if entries.len() % 2 != 0 {
            return Err(StateError::MalformedState("child state without an index".into()).into());
        }
        for chunk in entries.chunks_exact(2) {
            let index = chunk[0]
                .as_int()
                .and_then(|index| usize::try_from(index).ok())
                .ok_or_else(|| StateError::MalformedState("bad child index".into()))?;
            match self.children.get_mut(index) {
                Some(child) => child.load_view_state_recursive(&chunk[1])?,
                None => {
                    self.pending.insert(index, chunk[1].clone());
                }
            }
        }
        Ok(())
    }

    /// Visit every control with its unique id, depth first. `prefix` is the
    /// unique id of the enclosing naming container.
    pub(crate) fn walk_mut<F>(&mut self, prefix: Option<&str>, visit: &mut F) -> Result<(), PageError>
    where
        F: FnMut(&str, &mut Control) -> Result<(), PageError>,
    {
        let unique_id = match (&self.id, prefix) {
            (Some(id), Some(prefix)) => Some(format!("{prefix}{ID_SEPARATOR}{id}")),
            (Some(id), None) => Some(id.clone()),
            (None, _) => None,
        };
        if let Some(unique_id) = &unique_id {
            visit(unique_id, self)?;
        }
        let child_prefix = if self.naming_container {
            unique_id.as_deref()
        } else {
            prefix
        };
        for child in &mut self.children {
            child.walk_mut(child_prefix, visit)?;
        }
        Ok(())
    }

    /// Find a descendant by unique id.
    pub fn find(&self, unique_id: &str) -> Option<&Control> {
        self.find_in(None, unique_id)
    }

    fn find_in(&self, prefix: Option<&str>, target: &str) -> Option<&Control> {
        let unique_id = match (&self.id, prefix) {
            (Some(id), Some(prefix)) => Some(format!("{prefix}{ID_SEPARATOR}{id}")),
            (Some(id), None) => Some(id.clone()),
            (None, _) => None,
        };
        if unique_id.as_deref() == Some(target) {
            return Some(self);
        }
        let child_prefix = if self.naming_container {
            unique_id.as_deref()
        } else {
            prefix
        };
        self.children
            .iter()
            .find_map(|child| child.find_in(child_prefix, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Control {
        let mut root = Control::anonymous();
        let mut form = Control::new("form1").naming_container();
        form.add_child(Control::new("Name")).unwrap();
        form.add_child(Control::new("Go")).unwrap();
        root.add_child(form).unwrap();
        root
    }

    #[test]
    fn untouched_tree_saves_null() {
        let mut root = tree();
        root.track_view_state_recursive();
        assert_eq!(root.save_view_state_recursive(), Value::Null);
    }

    #[test]
    fn only_changed_children_are_listed() {
        let mut root = tree();
        root.track_view_state_recursive();
        let go = root.child_mut(0).unwrap().child_mut(1).unwrap();
        go.view_state_mut().set("Text", "Send").unwrap();

        let saved = root.save_view_state_recursive();
        let go_state = Value::pair(
            Value::List(vec![Value::from("Text"), Value::from("Send")]),
            Value::Null,
        );
        let form_state = Value::pair(Value::Null, Value::List(vec![Value::Int(1), go_state]));
        assert_eq!(
            saved,
            Value::pair(Value::Null, Value::List(vec![Value::Int(0), form_state]))
        );

        let mut fresh = tree();
        fresh.track_view_state_recursive();
        fresh.load_view_state_recursive(&saved).unwrap();
        let text = fresh.children()[0].children()[1].view_state().get("text").unwrap();
        assert_eq!(text, Some(&Value::from("Send")));
    }

    #[test]
    fn state_for_a_late_child_waits_for_it() {
        let mut saved_tree = tree();
        saved_tree.track_view_state_recursive();
        let mut late = Control::new("Late");
        late.track_view_state_recursive();
        saved_tree.add_child(late).unwrap().view_state_mut().set("Visible", false).unwrap();
        let saved = saved_tree.save_view_state_recursive();

        let mut fresh = tree();
        fresh.track_view_state_recursive();
        fresh.load_view_state_recursive(&saved).unwrap();
        assert_eq!(fresh.children().len(), 1);
        // deferred state survives a save before the child shows up
        assert_eq!(fresh.save_view_state_recursive(), saved);

        let late = fresh.add_child(Control::new("Late")).unwrap();
        assert!(late.is_tracking());
        assert_eq!(late.view_state().get("Visible").unwrap(), Some(&Value::Bool(false)));
    }

    #[test]
    fn disabled_view_state_is_skipped() {
        let mut root = tree();
        root.track_view_state_recursive();
        root.view_state_mut().set("a", 1).unwrap();
        root.set_enable_view_state(false);
        assert_eq!(root.save_view_state_recursive(), Value::Null);
    }

    #[test]
    fn unique_ids_follow_naming_containers() {
        let root = tree();
        assert!(root.find("form1$Go").is_some());
        assert!(root.find("Go").is_none());

        let mut ids = Vec::new();
        let mut root = tree();
        root.walk_mut(None, &mut |unique_id, _| {
            ids.push(unique_id.to_string());
            Ok(())
        })
        .unwrap();
        assert_eq!(ids, vec!["form1", "form1$Name", "form1$Go"]);
    }

    #[test]
    fn malformed_shapes_are_rejected() {
        let mut root = tree();
        assert!(root.load_view_state_recursive(&Value::Int(3)).is_err());
        let odd = Value::pair(Value::Null, Value::List(vec![Value::Int(0)]));
        assert!(root.load_view_state_recursive(&odd).is_err());
        let negative = Value::pair(Value::Null, Value::List(vec![Value::Int(-1), Value::Null]));
        assert!(root.load_view_state_recursive(&negative).is_err());
    }
}
