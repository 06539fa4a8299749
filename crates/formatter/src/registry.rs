//! Converter registry for host object types.
//!
//! A type can be persisted as text through a [`StateConverter`], or as an
//! opaque blob through a [`BinaryCodec`]. The text path is preferred when a
//! converter can encode as a string; the blob path is the fallback.

use crate::error::FormatError;
use crate::known::KNOWN_TYPE_NAMES;
use crate::value::{ObjectValue, StateObject};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Names the reader treats as structural prefixes.
const RESERVED_PREFIXES: [&str; 7] = ["i", "o", "b", "p", "t", "l", "h"];

pub trait StateConverter: Send + Sync {
    /// `false` routes values through the binary fallback instead.
    fn can_encode_as_string(&self) -> bool {
        true
    }

    fn encode(&self, value: &dyn StateObject) -> Result<String, FormatError>;

    fn decode(&self, text: &str) -> Result<ObjectValue, FormatError>;
}

pub trait BinaryCodec: Send + Sync {
    fn to_bytes(&self, value: &dyn StateObject) -> Result<Vec<u8>, FormatError>;

    fn from_bytes(&self, bytes: &[u8]) -> Result<ObjectValue, FormatError>;
}

/// Binary fallback for any serde type.
pub struct SerdeCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SerdeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BinaryCodec for SerdeCodec<T>
where
    T: StateObject + Serialize + DeserializeOwned,
{
    fn to_bytes(&self, value: &dyn StateObject) -> Result<Vec<u8>, FormatError> {
        let typed = value.as_any().downcast_ref::<T>().ok_or_else(|| {
            FormatError::conversion(value.type_name(), "registered codec expects another type")
        })?;
        serde_json::to_vec(typed)
            .map_err(|err| FormatError::conversion(value.type_name(), err.to_string()))
    }

    fn from_bytes(&self, bytes: &[u8]) -> Result<ObjectValue, FormatError> {
        let typed: T = serde_json::from_slice(bytes)
            .map_err(|err| FormatError::conversion(std::any::type_name::<T>(), err.to_string()))?;
        Ok(ObjectValue::new(typed))
    }
}

#[derive(Clone, Default)]
pub(crate) struct TypeEntry {
    pub converter: Option<Arc<dyn StateConverter>>,
    pub binary: Option<Arc<dyn BinaryCodec>>,
}

impl TypeEntry {
    /// Converter to use for the text path, if the type has one.
    pub fn text_converter(&self) -> Option<&Arc<dyn StateConverter>> {
        self.converter
            .as_ref()
            .filter(|converter| converter.can_encode_as_string())
    }
}

#[derive(Clone, Default)]
pub struct TypeRegistry {
    entries: HashMap<Arc<str>, TypeEntry>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn register_converter(
        &mut self,
        name: &str,
        converter: Arc<dyn StateConverter>,
    ) -> Result<(), FormatError> {
        validate_type_name(name)?;
        self.entries.entry(Arc::from(name)).or_default().converter = Some(converter);
        Ok(())
    }

    pub fn register_binary(
        &mut self,
        name: &str,
        codec: Arc<dyn BinaryCodec>,
    ) -> Result<(), FormatError> {
        validate_type_name(name)?;
        self.entries.entry(Arc::from(name)).or_default().binary = Some(codec);
        Ok(())
    }

    /// Register `T` for the binary fallback, encoded with serde.
    pub fn register_serde<T>(&mut self, name: &str) -> Result<(), FormatError>
    where
        T: StateObject + Serialize + DeserializeOwned,
    {
        self.register_binary(name, Arc::new(SerdeCodec::<T>::new()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub(crate) fn entry(&self, name: &str) -> Option<&TypeEntry> {
        self.entries.get(name)
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.entries.keys().map(|k| k.as_ref()).collect();
        names.sort_unstable();
        f.debug_struct("TypeRegistry").field("types", &names).finish()
    }
}

/// A name must not be readable as an index or a structural prefix.
fn validate_type_name(name: &str) -> Result<(), FormatError> {
    let invalid = name.is_empty()
        || name.bytes().all(|b| b.is_ascii_digit())
        || name.starts_with('@')
        || RESERVED_PREFIXES.contains(&name)
        || KNOWN_TYPE_NAMES.contains(&name);
    if invalid {
        return Err(FormatError::InvalidTypeName {
            name: name.to_string(),
        });
    }
    Ok(())
}
