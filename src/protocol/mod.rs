//! Protocol module - wire format, framing, and the message vocabulary.
//!
//! This module implements the skypipe protocol on top of a byte stream:
//! - Multipart frame encoding (part count + length-prefixed parts)
//! - Frame buffer for accumulating partial reads
//! - `Message`, the closed set of commands exchanged with the broker

mod frame;
mod frame_buffer;
mod message;
mod wire_format;

pub use frame::Frame;
pub use frame_buffer::FrameBuffer;
pub use message::{Command, Message, PipeName, Rejection, EOF, HEADER};
pub use wire_format::{
    encode_frame, encoded_len, validate_part_count, validate_part_size, DEFAULT_MAX_PART_SIZE,
    MAX_PARTS, PART_COUNT_SIZE, PART_LEN_SIZE,
};
