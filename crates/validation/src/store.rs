//! Wire format: `[version: u8 = 0][count: 7-bit varint][count x 16-byte digest]`.

use crate::digest::{DIGEST_LEN, EventDigest, event_digest};
use crate::error::ValidationError;
use std::collections::HashSet;

pub const FORMAT_VERSION: u8 = 0x00;

/// Set of event digests. Iteration (and so serialization) follows first
/// insertion order.
#[derive(Clone, Debug, Default)]
pub struct EventValidationStore {
    order: Vec<EventDigest>,
    set: HashSet<EventDigest>,
}

impl EventValidationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, target: Option<&str>, argument: Option<&str>) {
        self.insert_digest(event_digest(target, argument));
    }

    pub fn contains(&self, target: Option<&str>, argument: Option<&str>) -> bool {
        self.set.contains(&event_digest(target, argument))
    }

    fn insert_digest(&mut self, digest: EventDigest) {
        if self.set.insert(digest) {
            self.order.push(digest);
        }
    }

    /// Add every digest of `other`.
    pub fn union_with(&mut self, other: &EventValidationStore) {
        for digest in &other.order {
            self.insert_digest(*digest);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn digests(&self) -> impl Iterator<Item = &EventDigest> {
        self.order.iter()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(1 + tools::varint::MAX_VARINT_LEN + self.order.len() * DIGEST_LEN);
        out.push(FORMAT_VERSION);
        tools::varint::write_7bit_encoded(&mut out, self.order.len() as u32);
        for digest in &self.order {
            out.extend_from_slice(digest);
        }
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ValidationError> {
        let Some((&version, rest)) = bytes.split_first() else {
            log::warn!(target: "validation", "empty event validation data");
            return Err(ValidationError::CorruptData);
        };
        if version != FORMAT_VERSION {
            log::warn!(target: "validation", "unsupported event validation version {version:#04x}");
            return Err(ValidationError::UnsupportedVersion(version));
        }
        let mut pos = 0;
        let count = tools::varint::read_7bit_encoded(rest, &mut pos)
            .ok_or(ValidationError::CorruptData)? as usize;
        let body = &rest[pos..];
        let expected = count
            .checked_mul(DIGEST_LEN)
            .ok_or(ValidationError::CorruptData)?;
        if body.len() != expected {
            log::warn!(
                target: "validation",
                "event validation body is {} bytes, expected {expected}",
                body.len()
            );
            return Err(ValidationError::CorruptData);
        }

        let mut store = Self {
            order: Vec::with_capacity(count),
            set: HashSet::with_capacity(count),
        };
        for chunk in body.chunks_exact(DIGEST_LEN) {
            let mut digest = [0u8; DIGEST_LEN];
            digest.copy_from_slice(chunk);
            store.insert_digest(digest);
        }
        log::trace!(target: "validation", "loaded {} event digests", store.len());
        Ok(store)
    }
}
