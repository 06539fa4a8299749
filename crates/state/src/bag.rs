//! Keyed property map with per-entry dirty flags.
//!
//! Invariant: `index` maps every folded key to its position in `entries`, and
//! `entries` keeps insertion order.

use crate::error::StateError;
use crate::manager::StateManager;
use formatter::Value;
use std::borrow::Cow;
use std::collections::HashMap;

#[derive(Clone, Debug)]
struct Entry {
    key: String,
    value: Value,
    dirty: bool,
}

#[derive(Clone, Debug)]
pub struct StateBag {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
    ignore_case: bool,
    tracking: bool,
}

impl StateBag {
    /// A bag with case-insensitive keys.
    pub fn new() -> Self {
        Self::with_ignore_case(true)
    }

    pub fn with_ignore_case(ignore_case: bool) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            ignore_case,
            tracking: false,
        }
    }

    fn fold<'k>(&self, key: &'k str) -> Cow<'k, str> {
        if self.ignore_case && key.chars().any(char::is_uppercase) {
            Cow::Owned(key.to_lowercase())
        } else {
            Cow::Borrowed(key)
        }
    }

    fn position(&self, key: &str) -> Result<Option<usize>, StateError> {
        if key.is_empty() {
            return Err(StateError::ArgumentInvalid("state key must not be empty"));
        }
        Ok(self.index.get(self.fold(key).as_ref()).copied())
    }

    /// Current value, or `None` when the key is absent or cleared.
    pub fn get(&self, key: &str) -> Result<Option<&Value>, StateError> {
        let found = self.position(key)?.map(|pos| &self.entries[pos].value);
        Ok(found.filter(|value| !value.is_null()))
    }

    /// Assign `value` to `key`.
    ///
    /// Before tracking, assigning null drops the entry outright. Once
    /// tracking, every assignment marks the entry dirty, including a null
    /// (kept as a tombstone so the clear is persisted) and a value equal to
    /// the current one.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<(), StateError> {
        let value = value.into();
        match self.position(key)? {
            None => {
                if value.is_null() && !self.tracking {
                    return Ok(());
                }
                let folded = self.fold(key).into_owned();
                self.index.insert(folded, self.entries.len());
                self.entries.push(Entry {
                    key: key.to_string(),
                    value,
                    dirty: self.tracking,
                });
            }
            Some(pos) => {
                if value.is_null() && !self.tracking {
                    self.remove_at(pos);
                    return Ok(());
                }
                let entry = &mut self.entries[pos];
                entry.value = value;
                if self.tracking {
                    entry.dirty = true;
                }
            }
        }
        Ok(())
    }

    /// Physically remove `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, StateError> {
        Ok(self.position(key)?.map(|pos| self.remove_at(pos)))
    }

    fn remove_at(&mut self, pos: usize) -> Value {
        let entry = self.entries.remove(pos);
        let folded = self.fold(&entry.key).into_owned();
        self.index.remove(&folded);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        entry.value
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in insertion order, as first written.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|entry| (entry.key.as_str(), &entry.value))
    }

    pub fn is_item_dirty(&self, key: &str) -> Result<bool, StateError> {
        Ok(self
            .position(key)?
            .is_some_and(|pos| self.entries[pos].dirty))
    }

    /// Returns false when the key is absent.
    pub fn set_item_dirty(&mut self, key: &str, dirty: bool) -> Result<bool, StateError> {
        let Some(pos) = self.position(key)? else {
            return Ok(false);
        };
        self.entries[pos].dirty = dirty;
        Ok(true)
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        for entry in &mut self.entries {
            entry.dirty = dirty;
        }
    }

    /// One-way switch into tracking mode. Idempotent.
    pub fn start_tracking(&mut self) {
        if !self.tracking {
            log::trace!(target: "state.bag", "tracking {} entries", self.entries.len());
        }
        self.tracking = true;
    }

    /// Dirty entries in insertion order, or `None` when nothing is dirty.
    pub fn save_diff(&self) -> Option<Vec<(String, Value)>> {
        let diff: Vec<(String, Value)> = self
            .entries
            .iter()
            .filter(|entry| entry.dirty)
            .map(|entry| (entry.key.clone(), entry.value.clone()))
            .collect();
        if diff.is_empty() { None } else { Some(diff) }
    }

    /// Replay each pair through [`set`](Self::set).
    pub fn load_diff<I>(&mut self, pairs: I) -> Result<(), StateError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (key, value) in pairs {
            self.set(&key, value)?;
        }
        Ok(())
    }
}

impl Default for StateBag {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager for StateBag {
    fn is_tracking(&self) -> bool {
        self.tracking
    }

    fn track_state(&mut self) {
        self.start_tracking();
    }

    /// `List` of alternating key and value.
    fn save_state(&mut self) -> Value {
        let Some(diff) = self.save_diff() else {
            return Value::Null;
        };
        let mut flat = Vec::with_capacity(diff.len() * 2);
        for (key, value) in diff {
            flat.push(Value::String(key));
            flat.push(value);
        }
        Value::List(flat)
    }

    fn load_state(&mut self, state: &Value) -> Result<(), StateError> {
        let items = match state {
            Value::Null => return Ok(()),
            Value::List(items) | Value::Array(items) => items,
            other => {
                return Err(StateError::malformed(format!(
                    "bag state must be a list, found {}",
                    other.kind()
                )));
            }
        };
        if items.len() % 2 != 0 {
            return Err(StateError::malformed("bag state has a key without a value"));
        }
        log::trace!(target: "state.bag", "loading {} entries", items.len() / 2);
        for chunk in items.chunks_exact(2) {
            let key = chunk[0]
                .as_str()
                .ok_or_else(|| StateError::malformed("bag state key is not a string"))?;
            self.set(key, chunk[1].clone())?;
        }
        Ok(())
    }
}
