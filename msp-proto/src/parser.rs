//! Byte-at-a-time MSP stream parser.
//!
//! Both framings share the `$`, type and direction bytes; after that the
//! parser follows one of two disjoint branches:
//!
//! ```text
//! v1: length -> command -> payload[len] -> xor
//! v2: flags -> id lo -> id hi -> len lo -> len hi -> payload[len] -> crc8
//! ```
//!
//! A `$` seen in one of the shared header states restarts the header. Bytes in
//! the binary part of a frame are always consumed as data.

use alloc::vec::Vec;
use core::fmt;

use crate::crc::Crc8Digest;
use crate::frame::{Direction, Frame, Version, MARKER, TYPE_V1, TYPE_V2};

/// Parser error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Checksum or CRC mismatch; the frame was dropped.
    Checksum { cmd: u16, expected: u8, received: u8 },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Checksum {
                cmd,
                expected,
                received,
            } => write!(
                f,
                "checksum error on command {cmd}: expected {expected:#04x}, got {received:#04x}"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitMarker,
    WaitType,
    WaitDirection(Version),
    V1(V1Step),
    V2(V2Step),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum V1Step {
    Length,
    Command,
    Payload,
    Checksum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum V2Step {
    Flags,
    IdLo,
    IdHi,
    LenLo,
    LenHi,
    Payload,
    Crc,
}

/// Running checksum, one per branch.
enum Check {
    Xor(u8),
    Crc(Crc8Digest),
}

impl Check {
    #[inline]
    fn update(&mut self, byte: u8) {
        match self {
            Check::Xor(acc) => *acc ^= byte,
            Check::Crc(digest) => digest.update(byte),
        }
    }

    #[inline]
    fn finish(self) -> u8 {
        match self {
            Check::Xor(acc) => acc,
            Check::Crc(digest) => digest.finalize(),
        }
    }
}

/// MSP frame parser.
///
/// Feed bytes with [`MspParser::push_byte`]; a complete frame is returned
/// once its checksum has been verified.
pub struct MspParser {
    state: State,
    ok: bool,
    cmd: u16,
    len: usize,
    payload: Vec<u8>,
    check: Check,
}

impl MspParser {
    /// Create a new parser.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::WaitMarker,
            ok: false,
            cmd: 0,
            len: 0,
            payload: Vec::new(),
            check: Check::Xor(0),
        }
    }

    /// Reset parser state, discarding any partial frame.
    pub fn reset(&mut self) {
        self.state = State::WaitMarker;
        self.start_frame();
    }

    fn start_frame(&mut self) {
        self.ok = false;
        self.cmd = 0;
        self.len = 0;
        self.payload = Vec::new();
        self.check = Check::Xor(0);
    }

    /// Feed a byte to the parser.
    ///
    /// Returns `Ok(Some(frame))` when a complete, verified frame has been
    /// received and `Err` when a frame was dropped on a checksum mismatch.
    pub fn push_byte(&mut self, byte: u8) -> Result<Option<Frame>, ParseError> {
        match self.state {
            State::WaitMarker => {
                if byte == MARKER {
                    self.start_frame();
                    self.state = State::WaitType;
                }
            }
            State::WaitType => {
                self.state = match byte {
                    TYPE_V1 => State::WaitDirection(Version::V1),
                    TYPE_V2 => State::WaitDirection(Version::V2),
                    MARKER => State::WaitType,
                    _ => State::WaitMarker,
                };
            }
            State::WaitDirection(version) => {
                let direction = match byte {
                    b'>' => Some(Direction::Reply),
                    b'!' => Some(Direction::Error),
                    _ => None,
                };
                self.state = match (direction, version) {
                    (Some(direction), Version::V1) => {
                        self.ok = direction == Direction::Reply;
                        self.check = Check::Xor(0);
                        State::V1(V1Step::Length)
                    }
                    (Some(direction), Version::V2) => {
                        self.ok = direction == Direction::Reply;
                        self.check = Check::Crc(Crc8Digest::new());
                        State::V2(V2Step::Flags)
                    }
                    (None, _) if byte == MARKER => {
                        self.start_frame();
                        State::WaitType
                    }
                    (None, _) => State::WaitMarker,
                };
            }
            State::V1(step) => return self.push_v1(step, byte),
            State::V2(step) => return self.push_v2(step, byte),
        }
        Ok(None)
    }

    fn push_v1(&mut self, step: V1Step, byte: u8) -> Result<Option<Frame>, ParseError> {
        match step {
            V1Step::Length => {
                self.check.update(byte);
                self.len = byte as usize;
                self.state = State::V1(V1Step::Command);
            }
            V1Step::Command => {
                self.check.update(byte);
                self.cmd = byte as u16;
                self.begin_payload(State::V1(V1Step::Payload), State::V1(V1Step::Checksum));
            }
            V1Step::Payload => {
                self.check.update(byte);
                self.push_payload(byte, State::V1(V1Step::Checksum));
            }
            V1Step::Checksum => return self.finish(byte),
        }
        Ok(None)
    }

    fn push_v2(&mut self, step: V2Step, byte: u8) -> Result<Option<Frame>, ParseError> {
        if step != V2Step::Crc {
            self.check.update(byte);
        }
        match step {
            V2Step::Flags => self.state = State::V2(V2Step::IdLo),
            V2Step::IdLo => {
                self.cmd = byte as u16;
                self.state = State::V2(V2Step::IdHi);
            }
            V2Step::IdHi => {
                self.cmd |= (byte as u16) << 8;
                self.state = State::V2(V2Step::LenLo);
            }
            V2Step::LenLo => {
                self.len = byte as usize;
                self.state = State::V2(V2Step::LenHi);
            }
            V2Step::LenHi => {
                self.len |= (byte as usize) << 8;
                self.begin_payload(State::V2(V2Step::Payload), State::V2(V2Step::Crc));
            }
            V2Step::Payload => self.push_payload(byte, State::V2(V2Step::Crc)),
            V2Step::Crc => return self.finish(byte),
        }
        Ok(None)
    }

    fn begin_payload(&mut self, payload: State, checksum: State) {
        if self.len == 0 {
            self.state = checksum;
        } else {
            self.payload = Vec::with_capacity(self.len);
            self.state = payload;
        }
    }

    fn push_payload(&mut self, byte: u8, checksum: State) {
        self.payload.push(byte);
        if self.payload.len() == self.len {
            self.state = checksum;
        }
    }

    fn finish(&mut self, received: u8) -> Result<Option<Frame>, ParseError> {
        let check = core::mem::replace(&mut self.check, Check::Xor(0));
        let expected = check.finish();
        let cmd = self.cmd;
        let ok = self.ok;
        let payload = core::mem::take(&mut self.payload);
        self.reset();

        if expected != received {
            return Err(ParseError::Checksum {
                cmd,
                expected,
                received,
            });
        }
        Ok(Some(Frame::new(cmd, ok, payload)))
    }
}

impl Default for MspParser {
    fn default() -> Self {
        Self::new()
    }
}
