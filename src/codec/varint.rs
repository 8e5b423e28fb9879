//! Zigzag signed LEB128 varints over i32.

use super::CodecError;

/// Longest encoding of a 32-bit value.
pub(crate) const MAX_VARINT_LEN32: usize = 5;

fn zigzag(v: i32) -> u32 {
    ((v << 1) ^ (v >> 31)) as u32
}

fn unzigzag(u: u32) -> i32 {
    ((u >> 1) as i32) ^ -((u & 1) as i32)
}

/// Append the varint encoding of `v` to `out`.
pub(crate) fn put_varint(out: &mut Vec<u8>, v: i32) {
    let mut u = zigzag(v);
    while u >= 0x80 {
        out.push((u as u8) | 0x80);
        u >>= 7;
    }
    out.push(u as u8);
}

/// Read one varint starting at `offset`. Returns the value and the number of bytes consumed.
pub(crate) fn read_varint(buf: &[u8], offset: usize) -> Result<(i32, usize), CodecError> {
    let mut u: u32 = 0;
    for (i, &b) in buf[offset..].iter().enumerate() {
        if i == MAX_VARINT_LEN32 - 1 && b > 0x0f {
            return Err(CodecError::VarintOverflow { offset });
        }
        u |= u32::from(b & 0x7f) << (7 * i);
        if b < 0x80 {
            return Ok((unzigzag(u), i + 1));
        }
    }
    Err(CodecError::TruncatedVarint { offset })
}
