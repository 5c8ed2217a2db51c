//! The skypipe message vocabulary.
//!
//! Every frame starts with the protocol header and a command:
//! ```text
//! HELLO                        [SKYPIPE/0.1, HELLO]
//! DATA <pipe> <payload>        [SKYPIPE/0.1, DATA, pipe, payload]
//! LISTEN <pipe>                [SKYPIPE/0.1, LISTEN, pipe]
//! UNLISTEN <pipe>              [SKYPIPE/0.1, UNLISTEN, pipe]
//! ```
//!
//! The empty pipe name is the default pipe. A DATA frame with an empty
//! payload is the end-of-stream sentinel.

use std::fmt;

use bytes::Bytes;

use super::Frame;

/// Protocol header, part 0 of every frame.
pub const HEADER: &str = "SKYPIPE/0.1";

/// End-of-stream payload.
pub const EOF: &[u8] = b"";

/// The four protocol commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Hello,
    Data,
    Listen,
    Unlisten,
}

impl Command {
    /// Wire literal for this command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Hello => "HELLO",
            Command::Data => "DATA",
            Command::Listen => "LISTEN",
            Command::Unlisten => "UNLISTEN",
        }
    }

    /// Parse a wire literal. Matching is exact and case-sensitive.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        match raw {
            b"HELLO" => Some(Command::Hello),
            b"DATA" => Some(Command::Data),
            b"LISTEN" => Some(Command::Listen),
            b"UNLISTEN" => Some(Command::Unlisten),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing key for a pipe. The empty name is the default pipe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipeName(String);

impl PipeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this is the default (unnamed) pipe.
    pub fn is_default(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PipeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            f.write_str("<default>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for PipeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for PipeName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Liveness probe and its reply.
    Hello,
    /// One payload for a pipe. An empty payload ends the stream.
    Data { pipe: PipeName, payload: Bytes },
    /// Subscribe the sender to a pipe.
    Listen { pipe: PipeName },
    /// Unsubscribe the sender from a pipe.
    Unlisten { pipe: PipeName },
}

/// Why a well-framed message was not accepted.
///
/// Rejected frames are discarded by receivers; they are never reported
/// back to the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Header part missing or not [`HEADER`].
    ForeignHeader,
    /// Command part missing or not one of the four commands.
    UnknownCommand(String),
    /// A part required by the command is absent.
    MissingPart(&'static str),
    /// Pipe name is not valid UTF-8.
    InvalidPipeName,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::ForeignHeader => f.write_str("foreign header"),
            Rejection::UnknownCommand(cmd) => write!(f, "unknown command {:?}", cmd),
            Rejection::MissingPart(part) => write!(f, "missing {} part", part),
            Rejection::InvalidPipeName => f.write_str("pipe name is not UTF-8"),
        }
    }
}

impl Message {
    /// Build a DATA message.
    pub fn data(pipe: impl Into<PipeName>, payload: impl Into<Bytes>) -> Self {
        Message::Data {
            pipe: pipe.into(),
            payload: payload.into(),
        }
    }

    /// Build the end-of-stream DATA message for a pipe.
    pub fn eof(pipe: impl Into<PipeName>) -> Self {
        Message::Data {
            pipe: pipe.into(),
            payload: Bytes::from_static(EOF),
        }
    }

    pub fn listen(pipe: impl Into<PipeName>) -> Self {
        Message::Listen { pipe: pipe.into() }
    }

    pub fn unlisten(pipe: impl Into<PipeName>) -> Self {
        Message::Unlisten { pipe: pipe.into() }
    }

    pub fn command(&self) -> Command {
        match self {
            Message::Hello => Command::Hello,
            Message::Data { .. } => Command::Data,
            Message::Listen { .. } => Command::Listen,
            Message::Unlisten { .. } => Command::Unlisten,
        }
    }

    /// Pipe this message is addressed to. `None` for HELLO.
    pub fn pipe(&self) -> Option<&PipeName> {
        match self {
            Message::Hello => None,
            Message::Data { pipe, .. } | Message::Listen { pipe } | Message::Unlisten { pipe } => {
                Some(pipe)
            }
        }
    }

    /// Check if this is an end-of-stream DATA message.
    pub fn is_eof(&self) -> bool {
        matches!(self, Message::Data { payload, .. } if payload.is_empty())
    }

    /// Convert to raw frame parts.
    pub fn to_frame(&self) -> Frame {
        let header = Bytes::from_static(HEADER.as_bytes());
        let command = Bytes::from_static(self.command().as_str().as_bytes());

        let parts = match self {
            Message::Hello => vec![header, command],
            Message::Data { pipe, payload } => vec![
                header,
                command,
                Bytes::copy_from_slice(pipe.as_str().as_bytes()),
                payload.clone(),
            ],
            Message::Listen { pipe } | Message::Unlisten { pipe } => vec![
                header,
                command,
                Bytes::copy_from_slice(pipe.as_str().as_bytes()),
            ],
        };

        Frame::new(parts)
    }

    /// Encode to wire bytes. Fails only for a payload over the part size
    /// limit.
    pub fn encode(&self) -> crate::error::Result<Bytes> {
        self.to_frame().encode()
    }

    /// Interpret a raw frame.
    ///
    /// Header is checked first, then the command, then the parts the
    /// command requires. Trailing parts are ignored.
    pub fn decode(frame: &Frame) -> std::result::Result<Self, Rejection> {
        if frame.header() != Some(HEADER.as_bytes()) {
            return Err(Rejection::ForeignHeader);
        }

        let raw_command = frame.command().unwrap_or_default();
        let command = Command::parse(raw_command).ok_or_else(|| {
            Rejection::UnknownCommand(String::from_utf8_lossy(raw_command).into_owned())
        })?;

        if command == Command::Hello {
            return Ok(Message::Hello);
        }

        let pipe = frame.part(2).ok_or(Rejection::MissingPart("pipe"))?;
        let pipe = std::str::from_utf8(pipe)
            .map(PipeName::from)
            .map_err(|_| Rejection::InvalidPipeName)?;

        Ok(match command {
            Command::Hello => Message::Hello,
            Command::Data => {
                let payload = frame
                    .parts
                    .get(3)
                    .cloned()
                    .ok_or(Rejection::MissingPart("payload"))?;
                Message::Data { pipe, payload }
            }
            Command::Listen => Message::Listen { pipe },
            Command::Unlisten => Message::Unlisten { pipe },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_literals_are_exact() {
        assert_eq!(Command::parse(b"HELLO"), Some(Command::Hello));
        assert_eq!(Command::parse(b"UNLISTEN"), Some(Command::Unlisten));
        assert_eq!(Command::parse(b"hello"), None);
        assert_eq!(Command::parse(b"DATA "), None);
        assert_eq!(Command::Listen.to_string(), "LISTEN");
    }

    #[test]
    fn test_hello_frame_has_two_parts() {
        let frame = Message::Hello.to_frame();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.header(), Some(HEADER.as_bytes()));
        assert_eq!(frame.command(), Some(&b"HELLO"[..]));
    }

    #[test]
    fn test_data_frame_layout() {
        let frame = Message::data("logs", "line\n").to_frame();
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.part(2), Some(&b"logs"[..]));
        assert_eq!(frame.part(3), Some(&b"line\n"[..]));
    }

    #[test]
    fn test_decode_default_pipe_and_eof() {
        let frame = Frame::from_parts(&[HEADER.as_bytes(), b"DATA", b"", b""]);
        let msg = Message::decode(&frame).unwrap();

        assert!(msg.is_eof());
        assert!(msg.pipe().unwrap().is_default());
        assert_eq!(msg, Message::eof(""));
    }

    #[test]
    fn test_decode_listen() {
        let frame = Frame::from_parts(&[HEADER.as_bytes(), b"LISTEN", b"builds"]);
        assert_eq!(
            Message::decode(&frame).unwrap(),
            Message::listen("builds")
        );
    }

    #[test]
    fn test_decode_ignores_trailing_parts() {
        let frame = Frame::from_parts(&[HEADER.as_bytes(), b"HELLO", b"extra"]);
        assert_eq!(Message::decode(&frame).unwrap(), Message::Hello);
    }

    #[test]
    fn test_decode_rejects_foreign_header() {
        let frame = Frame::from_parts(&[&b"SKYPIPE/0.2"[..], b"HELLO"]);
        assert_eq!(Message::decode(&frame), Err(Rejection::ForeignHeader));

        let empty = Frame::new(Vec::new());
        assert_eq!(Message::decode(&empty), Err(Rejection::ForeignHeader));
    }

    #[test]
    fn test_decode_rejects_unknown_command() {
        let frame = Frame::from_parts(&[HEADER.as_bytes(), b"PUBLISH", b""]);
        assert_eq!(
            Message::decode(&frame),
            Err(Rejection::UnknownCommand("PUBLISH".to_string()))
        );

        let no_command = Frame::from_parts(&[HEADER.as_bytes()]);
        assert!(matches!(
            Message::decode(&no_command),
            Err(Rejection::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_decode_rejects_missing_parts() {
        let no_pipe = Frame::from_parts(&[HEADER.as_bytes(), b"LISTEN"]);
        assert_eq!(
            Message::decode(&no_pipe),
            Err(Rejection::MissingPart("pipe"))
        );

        let no_payload = Frame::from_parts(&[HEADER.as_bytes(), b"DATA", b"p"]);
        assert_eq!(
            Message::decode(&no_payload),
            Err(Rejection::MissingPart("payload"))
        );
    }

    #[test]
    fn test_decode_rejects_non_utf8_pipe() {
        let frame = Frame::from_parts(&[HEADER.as_bytes(), b"UNLISTEN", &[0xffu8, 0xfe][..]]);
        assert_eq!(Message::decode(&frame), Err(Rejection::InvalidPipeName));
    }

    #[test]
    fn test_payload_is_opaque_bytes() {
        let payload = Bytes::from_static(&[0x00, 0xff, 0x10]);
        let msg = Message::data("bin", payload.clone());
        let decoded = Message::decode(&msg.to_frame()).unwrap();

        assert_eq!(decoded, Message::Data { pipe: "bin".into(), payload });
    }

    #[test]
    fn test_pipe_name_display() {
        assert_eq!(PipeName::default().to_string(), "<default>");
        assert_eq!(PipeName::from("x").to_string(), "x");
    }
}
