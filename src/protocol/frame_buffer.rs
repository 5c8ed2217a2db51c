//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForCount`: Need the 4-byte part count
//! - `WaitingForLength`: Need the 4-byte length of the next part
//! - `WaitingForPart`: Length known, need N more part bytes
//!
//! # Example
//!
//! ```
//! use skypipe::protocol::{encode_frame, FrameBuffer};
//!
//! let mut buffer = FrameBuffer::new();
//! let bytes = encode_frame(&[&b"SKYPIPE/0.1"[..], b"HELLO"]).unwrap();
//!
//! // Data arrives in chunks from the socket
//! assert!(buffer.push(&bytes[..3]).unwrap().is_empty());
//! let frames = buffer.push(&bytes[3..]).unwrap();
//! assert_eq!(frames.len(), 1);
//! ```

use bytes::{Buf, Bytes, BytesMut};

use super::wire_format::{
    validate_part_count, validate_part_size, DEFAULT_MAX_PART_SIZE, PART_COUNT_SIZE,
    PART_LEN_SIZE,
};
use super::Frame;
use crate::error::Result;

/// State machine for frame parsing.
#[derive(Debug)]
enum State {
    /// Waiting for the part count.
    WaitingForCount,
    /// Waiting for the length prefix of part `parts.len()`.
    WaitingForLength { count: usize, parts: Vec<Bytes> },
    /// Length known, waiting for the part bytes.
    WaitingForPart {
        count: usize,
        parts: Vec<Bytes>,
        length: usize,
    },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// All data is stored in a single `BytesMut` buffer; completed parts are
/// split off and frozen without copying.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed size of a single part.
    max_part_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 64KB, max part: 1GB.
    pub fn new() -> Self {
        Self::with_max_part_size(DEFAULT_MAX_PART_SIZE)
    }

    /// Create a new frame buffer with a custom max part size.
    pub fn with_max_part_size(max_part_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForCount,
            max_part_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial data is buffered internally for the next push.
    ///
    /// # Errors
    ///
    /// Returns error if a frame declares too many parts or a part exceeds
    /// `max_part_size`. The stream cannot be resynchronised after that.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }

        Ok(frames)
    }

    /// Try to extract a single frame from the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` if a complete frame was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` on a framing violation
    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        loop {
            match std::mem::replace(&mut self.state, State::WaitingForCount) {
                State::WaitingForCount => {
                    if self.buffer.len() < PART_COUNT_SIZE {
                        return Ok(None);
                    }

                    let count = self.buffer.get_u32() as usize;
                    validate_part_count(count)?;

                    if count == 0 {
                        return Ok(Some(Frame::new(Vec::new())));
                    }

                    self.state = State::WaitingForLength {
                        count,
                        parts: Vec::with_capacity(count),
                    };
                }

                State::WaitingForLength { count, parts } => {
                    if self.buffer.len() < PART_LEN_SIZE {
                        self.state = State::WaitingForLength { count, parts };
                        return Ok(None);
                    }

                    let length = self.buffer.get_u32();
                    validate_part_size(length as usize, self.max_part_size)?;

                    self.state = State::WaitingForPart {
                        count,
                        parts,
                        length: length as usize,
                    };
                }

                State::WaitingForPart {
                    count,
                    mut parts,
                    length,
                } => {
                    if self.buffer.len() < length {
                        self.state = State::WaitingForPart {
                            count,
                            parts,
                            length,
                        };
                        return Ok(None);
                    }

                    parts.push(self.buffer.split_to(length).freeze());

                    if parts.len() == count {
                        return Ok(Some(Frame::new(parts)));
                    }

                    self.state = State::WaitingForLength { count, parts };
                }
            }
        }
    }

    /// Get the number of buffered, not yet consumed bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForCount => "WaitingForCount",
            State::WaitingForLength { .. } => "WaitingForLength",
            State::WaitingForPart { .. } => "WaitingForPart",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_frame, MAX_PARTS};

    fn data_frame(pipe: &str, payload: &[u8]) -> Bytes {
        encode_frame(&[&b"SKYPIPE/0.1"[..], b"DATA", pipe.as_bytes(), payload]).unwrap()
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();

        let frames = buffer.push(&data_frame("logs", b"hello")).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 4);
        assert_eq!(frames[0].part(2), Some(&b"logs"[..]));
        assert_eq!(frames[0].part(3), Some(&b"hello"[..]));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();

        let mut combined = Vec::new();
        combined.extend_from_slice(&data_frame("", b"first"));
        combined.extend_from_slice(&data_frame("", b"second"));
        combined.extend_from_slice(&data_frame("", b""));

        let frames = buffer.push(&combined).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].part(3), Some(&b"first"[..]));
        assert_eq!(frames[1].part(3), Some(&b"second"[..]));
        assert_eq!(frames[2].part(3), Some(&b""[..]));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_count_and_length() {
        let mut buffer = FrameBuffer::new();
        let bytes = data_frame("p", b"test");

        assert!(buffer.push(&bytes[..2]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForCount");

        // Count complete, length of part 0 split in half
        assert!(buffer.push(&bytes[2..6]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForLength");

        let frames = buffer.push(&bytes[6..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_part() {
        let mut buffer = FrameBuffer::new();
        let payload = b"this is a longer payload that will be fragmented";
        let bytes = data_frame("", payload);

        let split = bytes.len() - 10;
        assert!(buffer.push(&bytes[..split]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForPart");

        let frames = buffer.push(&bytes[split..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].part(3), Some(&payload[..]));
    }

    #[test]
    fn test_empty_parts_are_preserved() {
        let mut buffer = FrameBuffer::new();

        let frames = buffer.push(&data_frame("", b"")).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 4);
        assert!(frames[0].parts[2].is_empty());
        assert!(frames[0].parts[3].is_empty());
    }

    #[test]
    fn test_zero_part_frame() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&[0, 0, 0, 0]).unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_empty());
    }

    #[test]
    fn test_too_many_parts_rejected() {
        let mut buffer = FrameBuffer::new();
        let count = (MAX_PARTS as u32 + 1).to_be_bytes();

        let err = buffer.push(&count).unwrap_err();
        assert!(err.to_string().contains("Part count"));
    }

    #[test]
    fn test_max_part_size_validation() {
        let mut buffer = FrameBuffer::with_max_part_size(100);

        let mut bytes = 1u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&1000u32.to_be_bytes());

        let err = buffer.push(&bytes).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_mixed_complete_and_partial() {
        let mut buffer = FrameBuffer::new();

        let first = data_frame("", b"first");
        let second = data_frame("", b"second");

        let mut data = first.to_vec();
        data.extend_from_slice(&second[..9]);

        let frames = buffer.push(&data).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(buffer.state_name(), "WaitingForPart");

        let frames = buffer.push(&second[9..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].part(3), Some(&b"second"[..]));
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let bytes = data_frame("pipe", b"hi");

        let mut all_frames = Vec::new();
        for byte in bytes.iter() {
            all_frames.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all_frames.len(), 1);
        assert_eq!(all_frames[0].part(3), Some(&b"hi"[..]));
    }
}
