//! Range quads ⇄ bytes.
//!
//! Encoding: split N quads into four columns (start lines, start characters, line spans,
//! character spans), delta-encode each column, reverse the last one, then write all four as
//! varints. Most ranges are single-line with a repeated width, so the span columns become long
//! zero runs; reversing the last column puts its zeros right after those of the line-span column
//! so the two runs merge into one `(0, run_length)` pair.

use super::CodecError;
use super::varint::{MAX_VARINT_LEN32, put_varint, read_varint};
use crate::types::Range;
use crate::utils::config::MAX_DECODED_VALUES;

/// Encode a flat `[start_line, start_char, end_line, end_char, ...]` slice.
pub fn encode_ranges(values: &[i32]) -> Result<Vec<u8>, CodecError> {
    if values.is_empty() {
        return Ok(Vec::new());
    }
    if !values.len().is_multiple_of(4) {
        return Err(CodecError::InvalidLength(values.len()));
    }

    let n = values.len() / 4;
    let mut columns = vec![0_i32; values.len()];
    let (q1, rest) = columns.split_at_mut(n);
    let (q2, rest) = rest.split_at_mut(n);
    let (q3, q4) = rest.split_at_mut(n);
    for (i, quad) in values.chunks_exact(4).enumerate() {
        q1[i] = quad[0];
        q2[i] = quad[1];
        q3[i] = quad[2].wrapping_sub(quad[0]);
        q4[i] = quad[3].wrapping_sub(quad[1]);
    }
    for column in [&mut *q1, &mut *q2, &mut *q3, &mut *q4] {
        delta_encode(column);
    }
    q4.reverse();

    Ok(write_varints(&columns))
}

/// Decode into [`Range`]s.
pub fn decode_ranges(buf: &[u8]) -> Result<Vec<Range>, CodecError> {
    let flat = decode_flattened_ranges(buf)?;
    Ok(flat
        .chunks_exact(4)
        .map(|q| Range::from_quad([q[0], q[1], q[2], q[3]]))
        .collect())
}

/// Decode into the flat quad layout accepted by [`encode_ranges`].
pub fn decode_flattened_ranges(buf: &[u8]) -> Result<Vec<i32>, CodecError> {
    if buf.is_empty() {
        return Ok(Vec::new());
    }

    let mut columns = read_varints(buf)?;
    if !columns.len().is_multiple_of(4) {
        return Err(CodecError::UnalignedLength(columns.len()));
    }

    let n = columns.len() / 4;
    let (q1, rest) = columns.split_at_mut(n);
    let (q2, rest) = rest.split_at_mut(n);
    let (q3, q4) = rest.split_at_mut(n);
    q4.reverse();
    for column in [&mut *q1, &mut *q2, &mut *q3, &mut *q4] {
        delta_decode(column);
    }

    let mut out = Vec::with_capacity(n * 4);
    for i in 0..n {
        out.push(q1[i]);
        out.push(q2[i]);
        out.push(q1[i].wrapping_add(q3[i]));
        out.push(q2[i].wrapping_add(q4[i]));
    }
    Ok(out)
}

fn delta_encode(column: &mut [i32]) {
    let mut prev = 0_i32;
    for v in column.iter_mut() {
        let current = *v;
        *v = current.wrapping_sub(prev);
        prev = current;
    }
}

fn delta_decode(column: &mut [i32]) {
    let mut sum = 0_i32;
    for v in column.iter_mut() {
        sum = sum.wrapping_add(*v);
        *v = sum;
    }
}

fn write_varints(values: &[i32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * MAX_VARINT_LEN32);
    let mut i = 0;
    while i < values.len() {
        if values[i] != 0 {
            put_varint(&mut out, values[i]);
            i += 1;
            continue;
        }
        let run = values[i..].iter().take_while(|&&v| v == 0).count();
        put_varint(&mut out, 0);
        // A run never exceeds the value count, which is far below i32::MAX for any real document.
        put_varint(&mut out, run as i32);
        i += run;
    }
    out
}

fn read_varints(buf: &[u8]) -> Result<Vec<i32>, CodecError> {
    let mut values = Vec::with_capacity(buf.len());
    let mut offset = 0;
    while offset < buf.len() {
        let (v, n) = read_varint(buf, offset)?;
        let marker = offset;
        offset += n;
        if v != 0 {
            values.push(v);
            continue;
        }
        if offset >= buf.len() {
            return Err(CodecError::MissingRunLength { offset: marker });
        }
        let (run, n) = read_varint(buf, offset)?;
        if run <= 0 {
            return Err(CodecError::InvalidRunLength { offset, value: run });
        }
        let expanded = values.len().saturating_add(run as usize);
        if expanded > MAX_DECODED_VALUES {
            return Err(CodecError::TooManyValues {
                offset,
                limit: MAX_DECODED_VALUES,
            });
        }
        offset += n;
        values.resize(expanded, 0);
    }
    Ok(values)
}
