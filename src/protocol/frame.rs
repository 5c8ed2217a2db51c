//! Frame struct with raw part accessors.
//!
//! A `Frame` is what the decoder hands out: the ordered parts exactly as
//! received, before any protocol interpretation. Parts are `bytes::Bytes`
//! slices of the read buffer, so cloning a frame never copies payloads.
//!
//! # Example
//!
//! ```
//! use skypipe::protocol::Frame;
//!
//! let frame = Frame::from_parts(&[&b"SKYPIPE/0.1"[..], b"HELLO"]);
//!
//! assert_eq!(frame.header(), Some(&b"SKYPIPE/0.1"[..]));
//! assert_eq!(frame.command(), Some(&b"HELLO"[..]));
//! assert_eq!(frame.len(), 2);
//! ```

use bytes::Bytes;

use super::wire_format::encode_frame;
use crate::error::Result;

/// A complete multipart frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Parts in transmission order.
    pub parts: Vec<Bytes>,
}

impl Frame {
    /// Create a frame from already-owned parts.
    pub fn new(parts: Vec<Bytes>) -> Self {
        Self { parts }
    }

    /// Create a frame from borrowed parts (copies data).
    pub fn from_parts<P: AsRef<[u8]>>(parts: &[P]) -> Self {
        Self {
            parts: parts
                .iter()
                .map(|p| Bytes::copy_from_slice(p.as_ref()))
                .collect(),
        }
    }

    /// Part at `index`, if present.
    #[inline]
    pub fn part(&self, index: usize) -> Option<&[u8]> {
        self.parts.get(index).map(|p| &p[..])
    }

    /// Part 0, the protocol header.
    #[inline]
    pub fn header(&self) -> Option<&[u8]> {
        self.part(0)
    }

    /// Part 1, the command.
    #[inline]
    pub fn command(&self) -> Option<&[u8]> {
        self.part(1)
    }

    /// Number of parts.
    #[inline]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Check if the frame has no parts at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Encode to wire bytes. Fails if the frame breaks a decoder limit.
    pub fn encode(&self) -> Result<Bytes> {
        encode_frame(&self.parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let frame = Frame::from_parts(&[&b"SKYPIPE/0.1"[..], b"DATA", b"", b"x"]);

        assert_eq!(frame.header(), Some(&b"SKYPIPE/0.1"[..]));
        assert_eq!(frame.command(), Some(&b"DATA"[..]));
        assert_eq!(frame.part(2), Some(&b""[..]));
        assert_eq!(frame.part(3), Some(&b"x"[..]));
        assert_eq!(frame.part(4), None);
        assert_eq!(frame.len(), 4);
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_empty_part_is_not_absent() {
        let frame = Frame::from_parts(&[&b"SKYPIPE/0.1"[..], b"LISTEN", b""]);
        assert!(frame.part(2).is_some());
        assert!(frame.part(3).is_none());
    }

    #[test]
    fn test_missing_header() {
        let frame = Frame::new(Vec::new());
        assert!(frame.is_empty());
        assert!(frame.header().is_none());
        assert!(frame.command().is_none());
    }

    #[test]
    fn test_clone_shares_parts() {
        let frame = Frame::new(vec![Bytes::from_static(b"SKYPIPE/0.1")]);
        let cloned = frame.clone();
        assert_eq!(frame.parts[0].as_ptr(), cloned.parts[0].as_ptr());
    }
}
