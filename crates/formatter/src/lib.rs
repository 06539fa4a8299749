//! Compact state serializer.
//!
//! Values are written as a short ASCII token stream (see [`ValueWriter`] for
//! the grammar), then UTF-8 encoded, optionally MAC-signed, and Base64
//! wrapped for transport in a form field.
//!
//! ```
//! use formatter::{LosFormatter, Value};
//!
//! let formatter = LosFormatter::default();
//! let value = Value::List(vec![Value::Int(1), Value::from("a;b"), Value::Bool(true)]);
//! let field = formatter.serialize(&value).unwrap();
//! assert_eq!(formatter.deserialize(&field).unwrap(), value);
//! ```

mod error;
mod known;
mod mac;
mod reader;
mod registry;
mod value;
mod writer;

pub use error::FormatError;
pub use known::{Color, DYNAMIC_TYPE_OFFSET, KNOWN_TYPE_NAMES, Unit, UnitType};
pub use mac::{MAC_LEN, MacKey};
pub use reader::ValueReader;
pub use registry::{BinaryCodec, SerdeCodec, StateConverter, TypeRegistry};
pub use value::{ObjectValue, StateObject, Value};
pub use writer::{ValueWriter, escape_into};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;

pub const DEFAULT_MAX_DEPTH: usize = 128;

#[derive(Clone, Debug)]
pub struct FormatterConfig {
    /// Sign payloads and require a valid signature on read.
    pub mac_key: Option<MacKey>,
    /// Deepest container nesting accepted on read.
    pub max_depth: usize,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            mac_key: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LosFormatter {
    registry: Arc<TypeRegistry>,
    config: FormatterConfig,
    modifier: Option<String>,
}

impl LosFormatter {
    pub fn new(registry: Arc<TypeRegistry>, config: FormatterConfig) -> Self {
        Self {
            registry,
            config,
            modifier: None,
        }
    }

    /// Bind signatures to `modifier` (e.g. a page identity or user key).
    pub fn with_modifier(mut self, modifier: impl Into<String>) -> Self {
        self.modifier = Some(modifier.into());
        self
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn is_mac_enabled(&self) -> bool {
        self.config.mac_key.is_some()
    }

    /// Serialize to a field-safe string. `Null` serializes to `""`.
    pub fn serialize(&self, value: &Value) -> Result<String, FormatError> {
        if value.is_null() {
            return Ok(String::new());
        }
        let text = self.to_token_string(value)?;
        log::trace!(target: "formatter", "serialized {} token bytes", text.len());
        self.protect(text.into_bytes())
    }

    /// Inverse of [`serialize`](Self::serialize); `""` reads back as `Null`.
    pub fn deserialize(&self, input: &str) -> Result<Value, FormatError> {
        if input.is_empty() {
            return Ok(Value::Null);
        }
        let bytes = self.unprotect(input)?;
        let text = String::from_utf8(bytes)
            .map_err(|err| FormatError::malformed(err.utf8_error().valid_up_to(), "payload is not UTF-8"))?;
        self.from_token_string(&text)
    }

    /// Raw token stream, without signing or Base64.
    pub fn to_token_string(&self, value: &Value) -> Result<String, FormatError> {
        ValueWriter::new(&self.registry).write(value)
    }

    pub fn from_token_string(&self, text: &str) -> Result<Value, FormatError> {
        ValueReader::new(text, &self.registry, self.config.max_depth).read()
    }

    /// Sign (when a key is configured) and Base64-encode arbitrary bytes.
    pub fn protect(&self, mut bytes: Vec<u8>) -> Result<String, FormatError> {
        if let Some(key) = &self.config.mac_key {
            key.sign_into(&mut bytes, self.modifier.as_deref())?;
        }
        Ok(STANDARD.encode(bytes))
    }

    /// Base64-decode and (when a key is configured) verify and strip the MAC.
    ///
    /// With a key configured, any decoding failure is reported as
    /// `ValidationFailed`, since the payload cannot be trusted either way.
    pub fn unprotect(&self, field: &str) -> Result<Vec<u8>, FormatError> {
        let decoded = STANDARD.decode(field.trim());
        let Some(key) = &self.config.mac_key else {
            return decoded
                .map_err(|err| FormatError::malformed(0, format!("bad base64 payload: {err}")));
        };
        let mut bytes = decoded.map_err(|_| FormatError::ValidationFailed)?;
        let payload_len = key.verify(&bytes, self.modifier.as_deref())?.len();
        bytes.truncate(payload_len);
        Ok(bytes)
    }
}

impl Default for LosFormatter {
    fn default() -> Self {
        Self::new(Arc::new(TypeRegistry::new()), FormatterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed(secret: &str) -> LosFormatter {
        LosFormatter::new(
            Arc::new(TypeRegistry::new()),
            FormatterConfig {
                mac_key: Some(MacKey::new(secret)),
                ..FormatterConfig::default()
            },
        )
    }

    #[test]
    fn null_is_the_empty_field() {
        let formatter = LosFormatter::default();
        assert_eq!(formatter.serialize(&Value::Null).unwrap(), "");
        assert_eq!(formatter.deserialize("").unwrap(), Value::Null);
        assert_eq!(signed("k").serialize(&Value::Null).unwrap(), "");
        assert_eq!(signed("k").deserialize("").unwrap(), Value::Null);
    }

    #[test]
    fn scenario_list_with_separator_in_string() {
        let formatter = LosFormatter::default();
        let value = Value::List(vec![Value::Int(1), Value::from("a;b"), Value::Bool(true)]);
        let field = formatter.serialize(&value).unwrap();
        assert_eq!(formatter.deserialize(&field).unwrap(), value);
    }

    #[test]
    fn signed_round_trip() {
        let formatter = signed("machine-key").with_modifier("page:/default");
        let value = Value::pair(Value::from("x"), Value::Int(9));
        let field = formatter.serialize(&value).unwrap();
        assert_eq!(formatter.deserialize(&field).unwrap(), value);
    }

    #[test]
    fn tampered_payload_fails_validation() {
        let formatter = signed("machine-key");
        let field = formatter.serialize(&Value::from("hello")).unwrap();
        let mut bytes = STANDARD.decode(&field).unwrap();
        bytes[0] ^= 0x20;
        let tampered = STANDARD.encode(bytes);
        assert!(matches!(
            formatter.deserialize(&tampered),
            Err(FormatError::ValidationFailed)
        ));
        assert!(matches!(
            formatter.deserialize("%%%not base64"),
            Err(FormatError::ValidationFailed)
        ));
    }

    #[test]
    fn payload_for_another_page_fails_validation() {
        let field = signed("k")
            .with_modifier("page-a")
            .serialize(&Value::Int(1))
            .unwrap();
        assert!(matches!(
            signed("k").with_modifier("page-b").deserialize(&field),
            Err(FormatError::ValidationFailed)
        ));
    }

    #[test]
    fn unsigned_garbage_is_malformed() {
        let formatter = LosFormatter::default();
        assert!(matches!(
            formatter.deserialize("%%%"),
            Err(FormatError::MalformedState { .. })
        ));
        let truncated = STANDARD.encode("p<i<1>;");
        assert!(matches!(
            formatter.deserialize(&truncated),
            Err(FormatError::MalformedState { .. })
        ));
    }
}
