//! Binary framing for executable graphs (`.gem` files).
//!
//! ```text
//! MAGIC(3B "SHC") FTYPE(1B) VERSION(1B) '\n'
//! UID_SIZE(1B) '\n'
//! record*            record = LEN(3B) payload(LEN bytes, ends in '\n')
//! ```
//!
//! A payload is
//!
//! ```text
//! TAG(5B) INP_COUNT(1B) OUT_COUNT(1B) CONST_COUNT(1B)
//! INP_COUNT × UID
//! OUT_COUNT × (REF_COUNT(1B) REF_COUNT × UID)
//! CONST_COUNT × (BLOB_LEN(2B) blob)
//! '\n'
//! ```
//!
//! All integers are big-endian and unsigned. Constant blobs may contain
//! `'\n'`, so record boundaries come only from the length prefix.

mod decode;
mod encode;
mod header;

pub use decode::{decode, decode_with_header};
pub use encode::{encode, Encoder};
pub use header::FileHeader;

pub const MAGIC: &[u8; 3] = b"SHC";
/// File type byte of an executable model
pub const FILE_TYPE_EXECUTABLE: u8 = 0x10;
pub const FORMAT_VERSION: u8 = 0x01;
pub const DEFAULT_UID_SIZE: u8 = 1;
pub const MAX_UID_SIZE: u8 = 8;

pub(crate) const DELIMITER: u8 = b'\n';
pub(crate) const RECORD_LEN_SIZE: usize = 3;
pub(crate) const COUNT_SIZE: usize = 1;
pub(crate) const BLOB_LEN_SIZE: usize = 2;

pub(crate) fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

/// Append the low `width` bytes of `value`, most significant first.
pub(crate) fn write_be(out: &mut Vec<u8>, value: u64, width: usize) {
    out.extend_from_slice(&value.to_be_bytes()[8 - width..]);
}

/// Largest value representable in `width` bytes.
pub(crate) fn max_for_width(width: usize) -> u64 {
    if width >= 8 {
        u64::MAX
    } else {
        (1u64 << (8 * width)) - 1
    }
}
