//! Compact binary codec for source ranges.
//!
//! A buffer holds N ranges as four delta-encoded columns of zigzag varints, with runs of zeros
//! collapsed to `(0, run_length)`. The format is only guaranteed to round-trip within one build.

mod ranges;
mod varint;

pub use ranges::{decode_flattened_ranges, decode_ranges, encode_ranges};

/// Malformed codec input. Decoding never returns partial output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("unexpected range length - have {0} but expected a multiple of 4")]
    InvalidLength(usize),

    #[error("unexpected number of encoded values - have {0} but expected a multiple of 4")]
    UnalignedLength(usize),

    #[error("zero marker at byte {offset} is not followed by a run length")]
    MissingRunLength { offset: usize },

    #[error("invalid zero run length {value} at byte {offset}")]
    InvalidRunLength { offset: usize, value: i32 },

    #[error("zero run at byte {offset} expands past {limit} values")]
    TooManyValues { offset: usize, limit: usize },

    #[error("truncated varint at byte {offset}")]
    TruncatedVarint { offset: usize },

    #[error("varint at byte {offset} overflows 32 bits")]
    VarintOverflow { offset: usize },
}
