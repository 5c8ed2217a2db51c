//! Wire format encoding.
//!
//! A frame is an ordered list of opaque parts:
//! ```text
//! ┌────────────┬────────────┬────────┬─────┬──────────────┬──────────┐
//! │ Part count │ Part 0 len │ Part 0 │ ... │ Part N-1 len │ Part N-1 │
//! │ uint32 BE  │ uint32 BE  │ bytes  │     │ uint32 BE    │ bytes    │
//! └────────────┴────────────┴────────┴─────┴──────────────┴──────────┘
//! ```
//!
//! A zero-length part is a valid part. It is how the default pipe name and
//! the end-of-stream payload travel, so it must never be confused with an
//! absent part.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, SkypipeError};

/// Size of the leading part count, in bytes.
pub const PART_COUNT_SIZE: usize = 4;

/// Size of each part length prefix, in bytes.
pub const PART_LEN_SIZE: usize = 4;

/// Maximum number of parts accepted in a single frame.
pub const MAX_PARTS: usize = 16;

/// Default maximum size of a single part (1 GB).
pub const DEFAULT_MAX_PART_SIZE: u32 = 1_073_741_824;

/// Number of bytes `parts` occupy once encoded.
pub fn encoded_len<P: AsRef<[u8]>>(parts: &[P]) -> usize {
    PART_COUNT_SIZE
        + parts
            .iter()
            .map(|p| PART_LEN_SIZE + p.as_ref().len())
            .sum::<usize>()
}

/// Encode parts into a single contiguous frame.
///
/// Fails if the frame breaks a decoder limit: more than [`MAX_PARTS`]
/// parts, or a part over [`DEFAULT_MAX_PART_SIZE`]. Such a frame would be
/// rejected by the receiver and cost the whole connection.
///
/// # Example
///
/// ```
/// use skypipe::protocol::encode_frame;
///
/// let bytes = encode_frame(&[&b"SKYPIPE/0.1"[..], b"HELLO"]).unwrap();
/// assert_eq!(&bytes[..4], &[0, 0, 0, 2]);
/// ```
pub fn encode_frame<P: AsRef<[u8]>>(parts: &[P]) -> Result<Bytes> {
    validate_part_count(parts.len())?;
    for part in parts {
        validate_part_size(part.as_ref().len(), DEFAULT_MAX_PART_SIZE)?;
    }

    let mut buf = BytesMut::with_capacity(encoded_len(parts));
    buf.put_u32(parts.len() as u32);
    for part in parts {
        let part = part.as_ref();
        buf.put_u32(part.len() as u32);
        buf.put_slice(part);
    }
    Ok(buf.freeze())
}

/// Reject part counts that no valid sender produces.
pub fn validate_part_count(count: usize) -> Result<()> {
    if count > MAX_PARTS {
        return Err(SkypipeError::Protocol(format!(
            "Part count {} exceeds maximum {}",
            count, MAX_PARTS
        )));
    }
    Ok(())
}

/// Reject a part longer than `max` bytes.
pub fn validate_part_size(len: usize, max: u32) -> Result<()> {
    if len > max as usize {
        return Err(SkypipeError::Protocol(format!(
            "Part size {} exceeds maximum {}",
            len, max
        )));
    }
    Ok(())
}
