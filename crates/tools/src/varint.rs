//! 7-bit variable-length integer encoding (little-endian groups, high bit = continue).
//!
//! A `u32` takes at most five bytes; the fifth byte may only carry the top four bits.

pub const MAX_VARINT_LEN: usize = 5;

pub fn write_7bit_encoded(out: &mut Vec<u8>, mut value: u32) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Read a varint at `*pos`, advancing it past the encoded bytes.
///
/// Returns `None` on truncation or an over-long encoding; `*pos` is left
/// unchanged in that case.
pub fn read_7bit_encoded(bytes: &[u8], pos: &mut usize) -> Option<u32> {
    let mut value: u32 = 0;
    let mut shift = 0u32;
    let mut i = *pos;
    for n in 0..MAX_VARINT_LEN {
        let b = *bytes.get(i)?;
        i += 1;
        if n == MAX_VARINT_LEN - 1 && b > 0x0F {
            return None;
        }
        value |= u32::from(b & 0x7F) << shift;
        if b & 0x80 == 0 {
            *pos = i;
            return Some(value);
        }
        shift += 7;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode(v: u32) -> Vec<u8> {
        let mut out = Vec::new();
        write_7bit_encoded(&mut out, v);
        out
    }

    #[test]
    fn small_values_take_one_byte() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(0x7F), vec![0x7F]);
    }

    #[test]
    fn multi_byte_layout() {
        assert_eq!(encode(0x80), vec![0x80, 0x01]);
        assert_eq!(encode(300), vec![0xAC, 0x02]);
        assert_eq!(encode(u32::MAX), vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
    }

    #[test]
    fn read_advances_position() {
        let bytes = [0xAC, 0x02, 0x05];
        let mut pos = 0;
        assert_eq!(read_7bit_encoded(&bytes, &mut pos), Some(300));
        assert_eq!(pos, 2);
        assert_eq!(read_7bit_encoded(&bytes, &mut pos), Some(5));
        assert_eq!(pos, 3);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let mut pos = 0;
        assert_eq!(read_7bit_encoded(&[0x80, 0x80], &mut pos), None);
        assert_eq!(pos, 0);
    }

    #[test]
    fn overlong_fifth_byte_is_rejected() {
        let mut pos = 0;
        assert_eq!(
            read_7bit_encoded(&[0xFF, 0xFF, 0xFF, 0xFF, 0x1F], &mut pos),
            None
        );
    }

    proptest! {
        #[test]
        fn any_u32_reads_back(v in any::<u32>()) {
            let bytes = encode(v);
            let mut pos = 0;
            prop_assert_eq!(read_7bit_encoded(&bytes, &mut pos), Some(v));
            prop_assert_eq!(pos, bytes.len());
        }
    }
}
