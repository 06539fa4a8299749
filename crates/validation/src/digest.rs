use sha2::{Digest, Sha256};

pub const DIGEST_LEN: usize = 16;

pub type EventDigest = [u8; DIGEST_LEN];

/// First 16 bytes of SHA-256 over both strings, each written as a
/// big-endian u32 UTF-16 length followed by its UTF-16BE code units.
///
/// `None` hashes like the empty string.
pub fn event_digest(target: Option<&str>, argument: Option<&str>) -> EventDigest {
    let target = target.unwrap_or("");
    let argument = argument.unwrap_or("");
    let mut buf = Vec::with_capacity(8 + 2 * (target.len() + argument.len()));
    push_field(&mut buf, target);
    push_field(&mut buf, argument);

    let full = Sha256::digest(&buf);
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&full[..DIGEST_LEN]);
    out
}

fn push_field(buf: &mut Vec<u8>, s: &str) {
    let units = tools::utf16::utf16_len(s) as u32;
    buf.extend_from_slice(&units.to_be_bytes());
    tools::utf16::push_utf16_be(buf, s);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_and_empty_hash_alike() {
        assert_eq!(event_digest(None, Some("x")), event_digest(Some(""), Some("x")));
        assert_eq!(event_digest(Some("b"), None), event_digest(Some("b"), Some("")));
    }

    #[test]
    fn length_prefix_separates_fields() {
        assert_ne!(
            event_digest(Some("ab"), Some("c")),
            event_digest(Some("a"), Some("bc"))
        );
        assert_ne!(
            event_digest(Some("btn1"), Some("click")),
            event_digest(Some("click"), Some("btn1"))
        );
    }

    #[test]
    fn matches_hand_built_buffer() {
        let buf = [0, 0, 0, 1, 0, b'a', 0, 0, 0, 2, 0xD8, 0x3D, 0xDE, 0x00];
        let full = Sha256::digest(&buf);
        assert_eq!(event_digest(Some("a"), Some("\u{1F600}"))[..], full[..DIGEST_LEN]);
    }
}
