//! Token-stream writer.
//!
//! Output grammar (one value):
//! - null: nothing
//! - string: escaped text, `\e` for the empty string
//! - `i<n>`, `o<t>` / `o<f>`
//! - `p<a;b>`, `t<a;b;c>`, `l<a;b;>`, `h<k;v;k;v;>`
//! - `@<s;s;>` (string array), `@0<a;b;>` (object array)
//! - `typeRef<text>` for converter-backed values, `b<base64>` for blobs
//!
//! A type name is written inline at most once per call; later references use
//! the index it was assigned.

use crate::error::FormatError;
use crate::known::{COLOR_TYPE, DYNAMIC_TYPE_OFFSET, INT16_TYPE, INT64_TYPE, OBJECT_TYPE, UNIT_TYPE};
use crate::registry::TypeRegistry;
use crate::value::{ObjectValue, Value};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use memchr::{memchr, memchr3};
use std::collections::HashMap;
use std::fmt::Write;

pub struct ValueWriter<'r> {
    registry: &'r TypeRegistry,
    out: String,
    dynamic_types: HashMap<String, usize>,
}

impl<'r> ValueWriter<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            out: String::new(),
            dynamic_types: HashMap::new(),
        }
    }

    pub fn write(mut self, value: &Value) -> Result<String, FormatError> {
        self.write_value(value)?;
        Ok(self.out)
    }

    fn write_value(&mut self, value: &Value) -> Result<(), FormatError> {
        match value {
            Value::Null => {}
            Value::String(s) => self.write_string(s),
            Value::Int(v) => {
                let _ = write!(self.out, "i<{v}>");
            }
            Value::Bool(v) => self.out.push_str(if *v { "o<t>" } else { "o<f>" }),
            Value::Int16(v) => {
                let _ = write!(self.out, "{INT16_TYPE}<{v}>");
            }
            Value::Int64(v) => {
                let _ = write!(self.out, "{INT64_TYPE}<{v}>");
            }
            Value::Unit(unit) => self.write_known_text(UNIT_TYPE, &unit.to_string()),
            Value::Color(color) => self.write_known_text(COLOR_TYPE, &color.to_string()),
            Value::StringArray(items) => {
                self.out.push_str("@<");
                for item in items {
                    if let Some(s) = item {
                        self.write_string(s);
                    }
                    self.out.push(';');
                }
                self.out.push('>');
            }
            Value::Array(items) => {
                let _ = write!(self.out, "@{OBJECT_TYPE}<");
                self.write_items(items)?;
                self.out.push('>');
            }
            Value::Pair(first, second) => {
                self.out.push_str("p<");
                self.write_value(first)?;
                self.out.push(';');
                self.write_value(second)?;
                self.out.push('>');
            }
            Value::Triplet(first, second, third) => {
                self.out.push_str("t<");
                self.write_value(first)?;
                self.out.push(';');
                self.write_value(second)?;
                self.out.push(';');
                self.write_value(third)?;
                self.out.push('>');
            }
            Value::List(items) => {
                self.out.push_str("l<");
                self.write_items(items)?;
                self.out.push('>');
            }
            Value::Map(entries) => {
                self.out.push_str("h<");
                for (key, value) in entries {
                    self.write_value(key)?;
                    self.out.push(';');
                    self.write_value(value)?;
                    self.out.push(';');
                }
                self.out.push('>');
            }
            Value::Object(object) => self.write_object(object)?,
        }
        Ok(())
    }

    fn write_items(&mut self, items: &[Value]) -> Result<(), FormatError> {
        for item in items {
            self.write_value(item)?;
            self.out.push(';');
        }
        Ok(())
    }

    fn write_string(&mut self, s: &str) {
        if s.is_empty() {
            self.out.push_str("\\e");
        } else {
            escape_into(&mut self.out, s);
        }
    }

    fn write_known_text(&mut self, index: usize, text: &str) {
        let _ = write!(self.out, "{index}<");
        escape_into(&mut self.out, text);
        self.out.push('>');
    }

    fn write_object(&mut self, object: &ObjectValue) -> Result<(), FormatError> {
        let registry = self.registry;
        let name = object.type_name();
        let entry = registry
            .entry(name)
            .ok_or_else(|| FormatError::NonSerializable {
                type_name: name.to_string(),
            })?;

        if let Some(converter) = entry.text_converter() {
            let text = converter.encode(object.get())?;
            self.write_type_ref(name);
            self.out.push('<');
            escape_into(&mut self.out, &text);
            self.out.push('>');
            return Ok(());
        }

        let Some(codec) = entry.binary.as_ref() else {
            return Err(FormatError::NonSerializable {
                type_name: name.to_string(),
            });
        };
        let payload = codec.to_bytes(object.get())?;
        let mut blob = Vec::with_capacity(payload.len() + name.len() + 5);
        tools::varint::write_7bit_encoded(&mut blob, name.len() as u32);
        blob.extend_from_slice(name.as_bytes());
        blob.extend_from_slice(&payload);
        self.out.push_str("b<");
        STANDARD.encode_string(&blob, &mut self.out);
        self.out.push('>');
        Ok(())
    }

    fn write_type_ref(&mut self, name: &str) {
        if let Some(index) = self.dynamic_types.get(name) {
            let _ = write!(self.out, "{index}");
            return;
        }
        let index = DYNAMIC_TYPE_OFFSET + self.dynamic_types.len();
        log::trace!(target: "formatter", "inline type name {name:?} as index {index}");
        escape_into(&mut self.out, name);
        self.dynamic_types.insert(name.to_string(), index);
    }
}

fn needs_escape(bytes: &[u8]) -> bool {
    memchr3(b'\\', b'<', b'>', bytes).is_some() || memchr(b';', bytes).is_some()
}

/// Backslash-escape `\`, `<`, `>` and `;`.
pub fn escape_into(out: &mut String, s: &str) {
    if !needs_escape(s.as_bytes()) {
        out.push_str(s);
        return;
    }
    out.reserve(s.len() + 4);
    for ch in s.chars() {
        if matches!(ch, '\\' | '<' | '>' | ';') {
            out.push('\\');
        }
        out.push(ch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::known::{Color, Unit};

    fn write(value: &Value) -> String {
        ValueWriter::new(&TypeRegistry::new()).write(value).unwrap()
    }

    #[test]
    fn primitives() {
        assert_eq!(write(&Value::Null), "");
        assert_eq!(write(&Value::Int(-42)), "i<-42>");
        assert_eq!(write(&Value::Bool(true)), "o<t>");
        assert_eq!(write(&Value::Bool(false)), "o<f>");
        assert_eq!(write(&Value::from("")), "\\e");
        assert_eq!(write(&Value::from("a;b<c>\\")), "a\\;b\\<c\\>\\\\");
    }

    #[test]
    fn known_types_cost_one_digit() {
        assert_eq!(write(&Value::Unit(Unit::pixel(10.0))), "1<10px>");
        assert_eq!(write(&Value::Color(Color::rgb(0, 0x80, 0))), "2<#008000>");
        assert_eq!(write(&Value::Int16(7)), "3<7>");
        assert_eq!(write(&Value::Int64(1 << 40)), "4<1099511627776>");
    }

    #[test]
    fn containers() {
        let list = Value::List(vec![Value::Int(1), Value::from("a;b"), Value::Bool(true)]);
        assert_eq!(write(&list), "l<i<1>;a\\;b;o<t>;>");

        let pair = Value::pair(Value::Null, Value::from("x"));
        assert_eq!(write(&pair), "p<;x>");

        let map = Value::Map(vec![(Value::from("k"), Value::Int(2))]);
        assert_eq!(write(&map), "h<k;i<2>;>");

        let strings = Value::StringArray(vec![Some("a".into()), None, Some(String::new())]);
        assert_eq!(write(&strings), "@<a;;\\e;>");

        let objects = Value::Array(vec![Value::Int(3), Value::Null]);
        assert_eq!(write(&objects), "@0<i<3>;;>");
    }

    #[test]
    fn unregistered_object_is_not_serializable() {
        #[derive(Debug)]
        struct Opaque;
        impl crate::value::StateObject for Opaque {
            fn type_name(&self) -> &str {
                "Opaque.Thing"
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
            fn state_eq(&self, _other: &dyn crate::value::StateObject) -> bool {
                false
            }
        }

        let err = ValueWriter::new(&TypeRegistry::new())
            .write(&Value::object(Opaque))
            .unwrap_err();
        match err {
            FormatError::NonSerializable { type_name } => assert_eq!(type_name, "Opaque.Thing"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
