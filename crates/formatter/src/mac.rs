//! HMAC-SHA256 integrity wrapper for serialized payloads.
//!
//! The tag is appended to the payload bytes. An optional modifier (a per-page
//! or per-user string) is mixed into the tag so a payload issued for one page
//! or user does not validate for another.
//!
//! The tag covers the payload bytes followed directly by the modifier's UTF-8
//! bytes, with no length prefix or separator. The verifier always supplies
//! its own modifier, so the split point is never taken from the wire.

use crate::error::FormatError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

pub const MAC_LEN: usize = 32;

#[derive(Clone)]
pub struct MacKey(Arc<[u8]>);

impl MacKey {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self(Arc::from(secret.as_ref()))
    }

    fn hmac(&self, data: &[u8], modifier: Option<&str>) -> Result<HmacSha256, FormatError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.0).map_err(|_| FormatError::ValidationFailed)?;
        mac.update(data);
        if let Some(modifier) = modifier {
            mac.update(modifier.as_bytes());
        }
        Ok(mac)
    }

    /// Append the tag over `data` (+ modifier) to `data`.
    pub fn sign_into(&self, data: &mut Vec<u8>, modifier: Option<&str>) -> Result<(), FormatError> {
        let tag = self.hmac(data, modifier)?.finalize().into_bytes();
        data.extend_from_slice(&tag);
        Ok(())
    }

    /// Check the trailing tag and return the payload without it.
    pub fn verify<'d>(&self, data: &'d [u8], modifier: Option<&str>) -> Result<&'d [u8], FormatError> {
        if data.len() < MAC_LEN {
            log::warn!(target: "formatter.mac", "payload shorter than its MAC ({} bytes)", data.len());
            return Err(FormatError::ValidationFailed);
        }
        let (payload, tag) = data.split_at(data.len() - MAC_LEN);
        self.hmac(payload, modifier)?
            .verify_slice(tag)
            .map_err(|_| {
                log::warn!(target: "formatter.mac", "MAC mismatch on {} byte payload", payload.len());
                FormatError::ValidationFailed
            })?;
        Ok(payload)
    }
}

impl fmt::Debug for MacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacKey").field("len", &self.0.len()).finish()
    }
}
