//! Token-stream reader.
//!
//! Recursive descent over the grammar written by [`ValueWriter`](crate::ValueWriter).
//! The input may come from a client, so every access is bounds-checked and
//! every structural error is reported as `MalformedState` with its offset.
//!
//! Invariant: structural bytes (`<`, `>`, `;`, `\`) are ASCII, so every
//! position the reader stops at is a UTF-8 char boundary.

use crate::error::FormatError;
use crate::known::{
    COLOR_TYPE, Color, DYNAMIC_TYPE_OFFSET, INT16_TYPE, INT64_TYPE, KNOWN_TYPE_NAMES, OBJECT_TYPE,
    UNIT_TYPE, Unit,
};
use crate::registry::{StateConverter, TypeRegistry};
use crate::value::Value;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;

struct Token {
    start: usize,
    end: usize,
    text: String,
}

impl Token {
    fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TypeRef {
    Known(usize),
    Dynamic(usize),
}

/// A type named inline, resolved once and reused by index afterwards.
struct ResolvedType {
    name: String,
    converter: Option<Arc<dyn StateConverter>>,
}

pub struct ValueReader<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    registry: &'a TypeRegistry,
    types: Vec<ResolvedType>,
    max_depth: usize,
}

impl<'a> ValueReader<'a> {
    pub fn new(input: &'a str, registry: &'a TypeRegistry, max_depth: usize) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            registry,
            types: Vec::new(),
            max_depth,
        }
    }

    /// Parse exactly one value spanning the whole input.
    pub fn read(mut self) -> Result<Value, FormatError> {
        if self.bytes.is_empty() {
            return Ok(Value::Null);
        }
        let value = self.read_value(0)?;
        if self.pos != self.bytes.len() {
            return Err(FormatError::malformed(self.pos, "trailing data after value"));
        }
        Ok(value)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, b: u8) -> Result<(), FormatError> {
        match self.peek() {
            Some(found) if found == b => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(FormatError::malformed(
                self.pos,
                format!("expected '{}', found '{}'", b as char, found as char),
            )),
            None => Err(FormatError::malformed(
                self.pos,
                format!("expected '{}', found end of input", b as char),
            )),
        }
    }

    /// Read escaped text up to the next unescaped `<`, `>`, `;` or the end.
    /// The terminator is not consumed.
    fn read_token(&mut self) -> Result<Token, FormatError> {
        let start = self.pos;
        let mut text = String::new();
        let mut run_start = self.pos;
        while let Some(b) = self.peek() {
            match b {
                b'<' | b'>' | b';' => break,
                b'\\' => {
                    text.push_str(&self.input[run_start..self.pos]);
                    let Some(ch) = self.input[self.pos + 1..].chars().next() else {
                        return Err(FormatError::malformed(self.pos, "dangling escape"));
                    };
                    text.push(ch);
                    self.pos += 1 + ch.len_utf8();
                    run_start = self.pos;
                }
                _ => self.pos += 1,
            }
        }
        text.push_str(&self.input[run_start..self.pos]);
        if &self.input[start..self.pos] == "\\e" {
            text.clear();
        }
        Ok(Token {
            start,
            end: self.pos,
            text,
        })
    }

    fn read_value(&mut self, depth: usize) -> Result<Value, FormatError> {
        if depth > self.max_depth {
            return Err(FormatError::malformed(self.pos, "nesting exceeds depth limit"));
        }
        let token = self.read_token()?;
        if self.peek() != Some(b'<') {
            if token.is_empty() {
                return Ok(Value::Null);
            }
            return Ok(Value::String(token.text));
        }
        self.pos += 1;

        let input = self.input;
        let value = match &input[token.start..token.end] {
            "i" => Value::Int(self.read_number(&token)?),
            "o" => self.read_bool()?,
            "b" => self.read_blob()?,
            "p" => {
                let first = self.read_value(depth + 1)?;
                self.expect(b';')?;
                let second = self.read_value(depth + 1)?;
                Value::pair(first, second)
            }
            "t" => {
                let first = self.read_value(depth + 1)?;
                self.expect(b';')?;
                let second = self.read_value(depth + 1)?;
                self.expect(b';')?;
                let third = self.read_value(depth + 1)?;
                Value::triplet(first, second, third)
            }
            "l" => Value::List(self.read_items(depth)?),
            "h" => {
                let mut entries = Vec::new();
                while self.peek() != Some(b'>') {
                    let key = self.read_value(depth + 1)?;
                    self.expect(b';')?;
                    let value = self.read_value(depth + 1)?;
                    self.expect(b';')?;
                    entries.push((key, value));
                }
                Value::Map(entries)
            }
            _ if token.text.starts_with('@') => self.read_array(&token, depth)?,
            _ => self.read_typed_text(&token)?,
        };
        self.expect(b'>')?;
        Ok(value)
    }

    fn read_items(&mut self, depth: usize) -> Result<Vec<Value>, FormatError> {
        let mut items = Vec::new();
        while self.peek() != Some(b'>') {
            items.push(self.read_value(depth + 1)?);
            self.expect(b';')?;
        }
        Ok(items)
    }

    fn read_number<T: std::str::FromStr>(&mut self, prefix: &Token) -> Result<T, FormatError> {
        let token = self.read_token()?;
        token.text.parse::<T>().map_err(|_| {
            FormatError::malformed(
                token.start,
                format!(
                    "invalid number {:?} after '{}'",
                    token.text,
                    &self.input[prefix.start..prefix.end]
                ),
            )
        })
    }

    fn read_bool(&mut self) -> Result<Value, FormatError> {
        let token = self.read_token()?;
        let input = self.input;
        match &input[token.start..token.end] {
            "t" => Ok(Value::Bool(true)),
            "f" => Ok(Value::Bool(false)),
            other => Err(FormatError::malformed(
                token.start,
                format!("invalid boolean {other:?}"),
            )),
        }
    }

    fn read_blob(&mut self) -> Result<Value, FormatError> {
        let token = self.read_token()?;
        let blob = STANDARD
            .decode(&self.input[token.start..token.end])
            .map_err(|err| FormatError::malformed(token.start, format!("bad base64 blob: {err}")))?;

        let mut at = 0;
        let name_len = tools::varint::read_7bit_encoded(&blob, &mut at)
            .ok_or_else(|| FormatError::malformed(token.start, "truncated blob header"))?
            as usize;
        let name_bytes = blob
            .get(at..at.saturating_add(name_len))
            .ok_or_else(|| FormatError::malformed(token.start, "truncated blob type name"))?;
        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| FormatError::malformed(token.start, "blob type name is not UTF-8"))?;
        let payload = &blob[at + name_len..];

        let codec = self
            .registry
            .entry(name)
            .and_then(|entry| entry.binary.as_ref())
            .ok_or_else(|| FormatError::TypeLoad {
                type_name: name.to_string(),
            })?;
        Ok(Value::Object(codec.from_bytes(payload)?))
    }

    fn read_array(&mut self, prefix: &Token, depth: usize) -> Result<Value, FormatError> {
        let type_ref = &prefix.text[1..];
        if type_ref.is_empty() {
            let mut items = Vec::new();
            while self.peek() != Some(b'>') {
                let token = self.read_token()?;
                items.push(if token.is_empty() {
                    None
                } else {
                    Some(token.text)
                });
                self.expect(b';')?;
            }
            return Ok(Value::StringArray(items));
        }

        match self.resolve_type_ref(type_ref, prefix.start)? {
            TypeRef::Known(OBJECT_TYPE) => Ok(Value::Array(self.read_items(depth)?)),
            _ => Err(FormatError::malformed(
                prefix.start,
                format!("unsupported array element type {type_ref:?}"),
            )),
        }
    }

    fn read_typed_text(&mut self, prefix: &Token) -> Result<Value, FormatError> {
        let type_ref = self.resolve_type_ref(&prefix.text, prefix.start)?;
        let token = self.read_token()?;
        let text = token.text;
        let value = match type_ref {
            TypeRef::Known(UNIT_TYPE) => Value::Unit(Unit::parse(&text)?),
            TypeRef::Known(COLOR_TYPE) => Value::Color(Color::parse(&text)?),
            TypeRef::Known(INT16_TYPE) => Value::Int16(text.parse().map_err(|_| {
                FormatError::conversion(KNOWN_TYPE_NAMES[INT16_TYPE], text.as_str())
            })?),
            TypeRef::Known(INT64_TYPE) => Value::Int64(text.parse().map_err(|_| {
                FormatError::conversion(KNOWN_TYPE_NAMES[INT64_TYPE], text.as_str())
            })?),
            TypeRef::Known(_) => {
                return Err(FormatError::malformed(
                    prefix.start,
                    "object type has no text form",
                ));
            }
            TypeRef::Dynamic(slot) => {
                let resolved = &self.types[slot];
                let converter = resolved.converter.as_ref().ok_or_else(|| {
                    FormatError::conversion(&resolved.name, "type has no string converter")
                })?;
                Value::Object(converter.decode(&text)?)
            }
        };
        Ok(value)
    }

    /// All-digit references are indices; anything else is a type name and
    /// is appended to the dynamic table.
    fn resolve_type_ref(&mut self, type_ref: &str, offset: usize) -> Result<TypeRef, FormatError> {
        if type_ref.is_empty() {
            return Err(FormatError::malformed(offset, "missing type reference"));
        }
        let all_digits = !type_ref.is_empty() && type_ref.bytes().all(|b| b.is_ascii_digit());
        if all_digits {
            let index: usize = type_ref
                .parse()
                .map_err(|_| FormatError::malformed(offset, "type index out of range"))?;
            if index < KNOWN_TYPE_NAMES.len() {
                return Ok(TypeRef::Known(index));
            }
            if index >= DYNAMIC_TYPE_OFFSET && index - DYNAMIC_TYPE_OFFSET < self.types.len() {
                return Ok(TypeRef::Dynamic(index - DYNAMIC_TYPE_OFFSET));
            }
            return Err(FormatError::malformed(
                offset,
                format!("unknown type index {index}"),
            ));
        }

        let entry = self
            .registry
            .entry(type_ref)
            .ok_or_else(|| FormatError::TypeLoad {
                type_name: type_ref.to_string(),
            })?;
        log::trace!(
            target: "formatter",
            "resolved type {type_ref:?} as index {}",
            DYNAMIC_TYPE_OFFSET + self.types.len()
        );
        self.types.push(ResolvedType {
            name: type_ref.to_string(),
            converter: entry.converter.clone(),
        });
        Ok(TypeRef::Dynamic(self.types.len() - 1))
    }
}
