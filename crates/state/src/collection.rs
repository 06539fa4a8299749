//! Ordered collection of state-bearing items.
//!
//! Saved state has one of two shapes:
//!
//! - save-all: `Pair(Array(states), types)` where `types` is `Null` (single
//!   declared type, nothing unknown), `Array(type indices)`, or
//!   `Pair(Array(type indices), StringArray(type names))`;
//! - save-changed: `Triplet(Array(indices), Array(states), types)` with
//!   `types` as `Array(type indices)` or the same `Pair` form.
//!
//! Indices below the declared type count refer to declared types; larger
//! ones index into the name list, offset by the declared type count.
//!
//! In the tagged format the shape is wrapped as `Pair(Int(tag), shape)`.
//! Untagged (legacy) state is told apart by shape: a `Triplet` is
//! save-changed, a `Pair` is save-all.

use crate::error::StateError;
use crate::manager::StateManager;
use formatter::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

const TAG_SAVE_ALL: i32 = 1;
const TAG_SAVE_CHANGED: i32 = 2;

/// An element of a [`StateManagedCollection`].
pub trait StateItem: StateManager + fmt::Debug {
    /// Stable type name, used to recreate the item on load.
    fn type_name(&self) -> &str;

    /// Mark every piece of the item's state as changed.
    fn set_dirty(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub type ItemFactory = Arc<dyn Fn() -> Box<dyn StateItem> + Send + Sync>;

/// Item types a collection can recreate: an ordered list of declared types
/// (referenced by index) and any further types resolvable by name.
#[derive(Clone, Default)]
pub struct ItemTypes {
    known: Vec<(Arc<str>, ItemFactory)>,
    resolvable: HashMap<Arc<str>, ItemFactory>,
}

impl ItemTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the next known type. Declaration order is part of the
    /// saved format.
    pub fn with_known<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn StateItem> + Send + Sync + 'static,
    {
        self.known.push((Arc::from(name), Arc::new(factory)));
        self
    }

    /// Make a type loadable by name without declaring it.
    pub fn with_resolvable<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn StateItem> + Send + Sync + 'static,
    {
        self.resolvable.insert(Arc::from(name), Arc::new(factory));
        self
    }

    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    fn known_index(&self, name: &str) -> Option<usize> {
        self.known.iter().position(|(known, _)| known.as_ref() == name)
    }

    fn create_known(&self, index: usize) -> Result<Box<dyn StateItem>, StateError> {
        let (_, factory) = self
            .known
            .get(index)
            .ok_or_else(|| StateError::malformed(format!("no declared item type {index}")))?;
        Ok(factory())
    }

    fn create_named(&self, name: &str) -> Result<Box<dyn StateItem>, StateError> {
        let factory = self
            .resolvable
            .get(name)
            .or_else(|| self.known_index(name).map(|i| &self.known[i].1))
            .ok_or_else(|| StateError::TypeLoad {
                type_name: name.to_string(),
            })?;
        Ok(factory())
    }
}

impl fmt::Debug for ItemTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let known: Vec<&str> = self.known.iter().map(|(name, _)| name.as_ref()).collect();
        let mut resolvable: Vec<&str> = self.resolvable.keys().map(|k| k.as_ref()).collect();
        resolvable.sort_unstable();
        f.debug_struct("ItemTypes")
            .field("known", &known)
            .field("resolvable", &resolvable)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CollectionFormat {
    /// Shape wrapped with an explicit save-all / save-changed tag.
    #[default]
    Tagged,
    /// Bare shape, told apart on load by arity.
    Legacy,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CollectionConfig {
    pub format: CollectionFormat,
}

#[derive(Debug)]
pub struct StateManagedCollection {
    items: Vec<Box<dyn StateItem>>,
    types: Arc<ItemTypes>,
    config: CollectionConfig,
    tracking: bool,
    save_all: bool,
    had_items_at_start: bool,
}

impl StateManagedCollection {
    pub fn new(types: Arc<ItemTypes>) -> Self {
        Self::with_config(types, CollectionConfig::default())
    }

    pub fn with_config(types: Arc<ItemTypes>, config: CollectionConfig) -> Self {
        Self {
            items: Vec::new(),
            types,
            config,
            tracking: false,
            save_all: false,
            had_items_at_start: false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&dyn StateItem> {
        self.items.get(index).map(|item| item.as_ref())
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut (dyn StateItem + 'static)> {
        self.items.get_mut(index).map(|item| item.as_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn StateItem> {
        self.items.iter().map(|item| item.as_ref())
    }

    /// Typed access to the item at `index`.
    pub fn downcast_ref<T: 'static>(&self, index: usize) -> Option<&T> {
        self.items.get(index)?.as_any().downcast_ref::<T>()
    }

    /// Whether the next save writes the whole collection.
    pub fn is_save_all(&self) -> bool {
        self.save_all
    }

    pub fn push(&mut self, item: Box<dyn StateItem>) {
        let index = self.items.len();
        self.insert_unchecked(index, item);
    }

    pub fn insert(&mut self, index: usize, item: Box<dyn StateItem>) -> Result<(), StateError> {
        if index > self.items.len() {
            return Err(StateError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        self.insert_unchecked(index, item);
        Ok(())
    }

    fn insert_unchecked(&mut self, index: usize, mut item: Box<dyn StateItem>) {
        if self.tracking {
            item.track_state();
            item.set_dirty();
            self.mark_save_all("insert");
        }
        self.items.insert(index, item);
    }

    pub fn remove(&mut self, index: usize) -> Result<Box<dyn StateItem>, StateError> {
        if index >= self.items.len() {
            return Err(StateError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        if self.tracking {
            self.mark_save_all("remove");
        }
        Ok(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        if self.tracking {
            self.mark_save_all("clear");
        }
        self.items.clear();
    }

    /// Force the next save to write every item in full.
    pub fn set_dirty(&mut self) {
        self.mark_save_all("set_dirty");
        for item in &mut self.items {
            item.set_dirty();
        }
    }

    fn mark_save_all(&mut self, reason: &str) {
        if !self.save_all {
            log::debug!(target: "state.collection", "switching to save-all after {reason}");
        }
        self.save_all = true;
    }

    fn type_table(&self, items: &[&dyn StateItem]) -> (Vec<Value>, Vec<Option<String>>) {
        let known_count = self.types.known_count();
        let mut indices = Vec::with_capacity(items.len());
        let mut unknown: Vec<Option<String>> = Vec::new();
        let mut unknown_index: HashMap<&str, usize> = HashMap::new();
        for item in items {
            let name = item.type_name();
            let index = match self.types.known_index(name) {
                Some(index) => index,
                None => *unknown_index.entry(name).or_insert_with(|| {
                    unknown.push(Some(name.to_string()));
                    known_count + unknown.len() - 1
                }),
            };
            indices.push(Value::Int(index as i32));
        }
        (indices, unknown)
    }

    fn type_info(indices: Vec<Value>, unknown: Vec<Option<String>>) -> Value {
        if unknown.is_empty() {
            Value::Array(indices)
        } else {
            Value::pair(Value::Array(indices), Value::StringArray(unknown))
        }
    }

    fn save_all_items(&mut self) -> Value {
        if !self.had_items_at_start && self.items.is_empty() {
            return Value::Null;
        }
        let states: Vec<Value> = self
            .items
            .iter_mut()
            .map(|item| {
                item.set_dirty();
                item.save_state()
            })
            .collect();
        let items: Vec<&dyn StateItem> = self.iter().collect();
        let (indices, unknown) = self.type_table(&items);
        let types = if self.types.known_count() == 1 && unknown.is_empty() {
            Value::Null
        } else {
            Self::type_info(indices, unknown)
        };
        self.wrap(TAG_SAVE_ALL, Value::pair(Value::Array(states), types))
    }

    fn save_changed_items(&mut self) -> Value {
        let mut indices = Vec::new();
        let mut states = Vec::new();
        for (index, item) in self.items.iter_mut().enumerate() {
            let state = item.save_state();
            if state.is_null() {
                continue;
            }
            indices.push(index);
            states.push(state);
        }
        if indices.is_empty() {
            return Value::Null;
        }
        let changed: Vec<&dyn StateItem> = indices.iter().map(|&i| self.items[i].as_ref()).collect();
        let (type_indices, unknown) = self.type_table(&changed);
        self.wrap(
            TAG_SAVE_CHANGED,
            Value::triplet(
                Value::Array(indices.into_iter().map(|i| Value::Int(i as i32)).collect()),
                Value::Array(states),
                Self::type_info(type_indices, unknown),
            ),
        )
    }

    fn wrap(&self, tag: i32, shape: Value) -> Value {
        match self.config.format {
            CollectionFormat::Tagged => Value::pair(Value::Int(tag), shape),
            CollectionFormat::Legacy => shape,
        }
    }

    fn load_all_items(&mut self, states: &Value, types: &Value) -> Result<(), StateError> {
        let states = as_array(states, "item states")?;
        let (type_indices, names) = self.read_type_info(types, states.len())?;
        log::trace!(target: "state.collection", "loading all {} items", states.len());

        self.clear();
        for (i, state) in states.iter().enumerate() {
            let type_index = type_indices.as_ref().map_or(0, |indices| indices[i]);
            let mut item = self.create_item(type_index, &names)?;
            item.track_state();
            item.load_state(state)?;
            item.set_dirty();
            self.items.push(item);
        }
        self.save_all = true;
        Ok(())
    }

    fn load_changed_items(
        &mut self,
        indices: &Value,
        states: &Value,
        types: &Value,
    ) -> Result<(), StateError> {
        let indices = as_array(indices, "changed indices")?;
        let states = as_array(states, "changed states")?;
        if indices.len() != states.len() {
            return Err(StateError::malformed(
                "changed indices and states differ in length",
            ));
        }
        let (type_indices, names) = self.read_type_info(types, states.len())?;
        log::trace!(target: "state.collection", "loading {} changed items", states.len());

        for (i, (index, state)) in indices.iter().zip(states).enumerate() {
            let index = as_index(index)?;
            if index < self.items.len() {
                self.items[index].load_state(state)?;
                continue;
            }
            if index > self.items.len() {
                return Err(StateError::IndexOutOfRange {
                    index,
                    len: self.items.len(),
                });
            }
            let type_index = type_indices.as_ref().map_or(0, |indices| indices[i]);
            let mut item = self.create_item(type_index, &names)?;
            item.track_state();
            item.load_state(state)?;
            self.push(item);
        }
        Ok(())
    }

    /// Type indices (or `None` for the single-declared-type shortcut) and
    /// the unknown type names they may refer to.
    fn read_type_info(
        &self,
        types: &Value,
        expected: usize,
    ) -> Result<(Option<Vec<usize>>, Vec<String>), StateError> {
        let (indices, names) = match types {
            Value::Null => {
                if self.types.known_count() != 1 {
                    return Err(StateError::malformed(
                        "type indices omitted but more than one type is declared",
                    ));
                }
                return Ok((None, Vec::new()));
            }
            Value::Pair(indices, names) => {
                let Value::StringArray(names) = names.as_ref() else {
                    return Err(StateError::malformed("type names must be a string array"));
                };
                let names = names
                    .iter()
                    .map(|name| {
                        name.clone()
                            .ok_or_else(|| StateError::malformed("empty type name"))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                (indices.as_ref(), names)
            }
            other => (other, Vec::new()),
        };
        let indices = as_array(indices, "type indices")?
            .iter()
            .map(as_index)
            .collect::<Result<Vec<_>, _>>()?;
        if indices.len() != expected {
            return Err(StateError::malformed(format!(
                "{} type indices for {expected} items",
                indices.len()
            )));
        }
        Ok((Some(indices), names))
    }

    fn create_item(
        &self,
        type_index: usize,
        names: &[String],
    ) -> Result<Box<dyn StateItem>, StateError> {
        let known_count = self.types.known_count();
        if type_index < known_count {
            return self.types.create_known(type_index);
        }
        let name = names.get(type_index - known_count).ok_or_else(|| {
            StateError::malformed(format!("type index {type_index} has no type name"))
        })?;
        self.types.create_named(name)
    }
}

fn as_array<'v>(value: &'v Value, what: &str) -> Result<&'v [Value], StateError> {
    match value {
        Value::Array(items) | Value::List(items) => Ok(items),
        other => Err(StateError::malformed(format!(
            "{what} must be an array, found {}",
            other.kind()
        ))),
    }
}

fn as_index(value: &Value) -> Result<usize, StateError> {
    value
        .as_int()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| StateError::malformed(format!("expected an index, found {}", value.kind())))
}

impl StateManager for StateManagedCollection {
    fn is_tracking(&self) -> bool {
        self.tracking
    }

    fn track_state(&mut self) {
        if !self.tracking {
            self.had_items_at_start = !self.items.is_empty();
        }
        self.tracking = true;
        for item in &mut self.items {
            item.track_state();
        }
    }

    fn save_state(&mut self) -> Value {
        if self.save_all {
            self.save_all_items()
        } else {
            self.save_changed_items()
        }
    }

    fn load_state(&mut self, state: &Value) -> Result<(), StateError> {
        let shape = match state {
            Value::Null => return Ok(()),
            Value::Pair(first, second) => match first.as_ref() {
                Value::Int(TAG_SAVE_ALL) => {
                    let Value::Pair(states, types) = second.as_ref() else {
                        return Err(StateError::malformed("save-all state must be a pair"));
                    };
                    return self.load_all_items(states, types);
                }
                Value::Int(TAG_SAVE_CHANGED) => {
                    let Value::Triplet(indices, states, types) = second.as_ref() else {
                        return Err(StateError::malformed("save-changed state must be a triplet"));
                    };
                    return self.load_changed_items(indices, states, types);
                }
                Value::Int(tag) => {
                    return Err(StateError::malformed(format!(
                        "unknown collection state tag {tag}"
                    )));
                }
                _ => state,
            },
            _ => state,
        };
        match shape {
            Value::Triplet(indices, states, types) => {
                self.load_changed_items(indices, states, types)
            }
            Value::Pair(states, types) => self.load_all_items(states, types),
            other => Err(StateError::malformed(format!(
                "collection state must be a pair or triplet, found {}",
                other.kind()
            ))),
        }
    }
}
