//! UTF-16 helpers for hashing strings in the same shape as their wire form.

/// Number of UTF-16 code units in `s`.
pub fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// Append `s` to `out` as big-endian UTF-16.
pub fn push_utf16_be(out: &mut Vec<u8>, s: &str) {
    out.reserve(s.len() * 2);
    for unit in s.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_zero_padded_big_endian() {
        let mut out = Vec::new();
        push_utf16_be(&mut out, "ab");
        assert_eq!(out, vec![0x00, b'a', 0x00, b'b']);
    }

    #[test]
    fn astral_chars_take_two_units() {
        assert_eq!(utf16_len("\u{1F600}"), 2);
        let mut out = Vec::new();
        push_utf16_be(&mut out, "\u{1F600}");
        assert_eq!(out, vec![0xD8, 0x3D, 0xDE, 0x00]);
    }
}
