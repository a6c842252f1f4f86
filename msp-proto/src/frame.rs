//! Frame types and encoders for MSP v1 and v2.
//!
//! # Wire formats
//!
//! ```text
//! v1: $ M <dir> <len:1> <cmd:1> <payload:len> <xor>
//! v2: $ X <dir> <flags:1> <cmd:2 LE> <len:2 LE> <payload:len> <crc8>
//! ```
//!
//! `dir` is `<` for requests, `>` for successful replies and `!` for error
//! replies.

use alloc::vec::Vec;
use core::fmt;

use crate::command::{LINK_LOST, MAX_V1_COMMAND};
use crate::crc::{xor_checksum, Crc8Digest};

/// Frame start marker.
pub const MARKER: u8 = b'$';
/// Type byte selecting the v1 layout.
pub const TYPE_V1: u8 = b'M';
/// Type byte selecting the v2 layout.
pub const TYPE_V2: u8 = b'X';

/// Largest v1 payload.
pub const MAX_V1_PAYLOAD: usize = u8::MAX as usize;
/// Largest v2 payload.
pub const MAX_V2_PAYLOAD: usize = u16::MAX as usize;

/// v1 overhead: `$`, `M`, dir, len, cmd, checksum.
const V1_OVERHEAD: usize = 6;
/// v2 overhead: `$`, `X`, dir, flags, cmd(2), len(2), crc.
const V2_OVERHEAD: usize = 9;

/// Protocol framing version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Version {
    #[default]
    V1,
    V2,
}

impl Version {
    /// Framing to use for `cmd` on a link negotiated at `self`.
    ///
    /// Ids above 255 always need v2 framing.
    #[inline]
    #[must_use]
    pub const fn for_command(self, cmd: u16) -> Version {
        match self {
            Version::V2 => Version::V2,
            Version::V1 if cmd > MAX_V1_COMMAND => Version::V2,
            Version::V1 => Version::V1,
        }
    }
}

/// Direction byte of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// `<` host to flight controller.
    Request,
    /// `>` successful reply.
    Reply,
    /// `!` error reply.
    Error,
}

impl Direction {
    /// The byte written on the wire.
    #[inline]
    #[must_use]
    pub const fn byte(self) -> u8 {
        match self {
            Direction::Request => b'<',
            Direction::Reply => b'>',
            Direction::Error => b'!',
        }
    }
}

/// A complete, checksum-verified frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command id.
    pub cmd: u16,
    /// `true` for `>` replies, `false` for `!` replies and the link-lost marker.
    pub ok: bool,
    /// Payload bytes; the declared length is always `payload.len()`.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Build a frame from its parts.
    #[must_use]
    pub fn new(cmd: u16, ok: bool, payload: Vec<u8>) -> Self {
        Self { cmd, ok, payload }
    }

    /// The terminal frame emitted once when the transport fails or closes.
    #[must_use]
    pub fn link_lost() -> Self {
        Self {
            cmd: LINK_LOST,
            ok: false,
            payload: Vec::new(),
        }
    }

    /// `true` for the terminal link-lost frame.
    #[inline]
    #[must_use]
    pub fn is_link_lost(&self) -> bool {
        self.cmd == LINK_LOST && !self.ok
    }

    /// Declared payload length.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Error type for encoding operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// Payload longer than the framing's length field allows.
    PayloadTooLarge { len: usize, max: usize },
    /// Command id does not fit a v1 frame.
    CommandOutOfRange(u16),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::PayloadTooLarge { len, max } => {
                write!(f, "payload of {len} bytes exceeds frame limit of {max}")
            }
            EncodeError::CommandOutOfRange(cmd) => {
                write!(f, "command {cmd} does not fit a v1 frame")
            }
        }
    }
}

/// Encode a v1 request.
pub fn encode_v1(cmd: u8, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
    encode_v1_as(Direction::Request, cmd, payload)
}

/// Encode a v1 frame with an explicit direction byte.
pub fn encode_v1_as(direction: Direction, cmd: u8, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
    if payload.len() > MAX_V1_PAYLOAD {
        return Err(EncodeError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_V1_PAYLOAD,
        });
    }

    let mut buf = Vec::with_capacity(V1_OVERHEAD + payload.len());
    buf.extend_from_slice(&[MARKER, TYPE_V1, direction.byte()]);
    buf.push(payload.len() as u8);
    buf.push(cmd);
    buf.extend_from_slice(payload);
    let checksum = xor_checksum(&buf[3..]);
    buf.push(checksum);
    Ok(buf)
}

/// Encode a v2 request.
pub fn encode_v2(cmd: u16, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
    encode_v2_as(Direction::Request, cmd, payload)
}

/// Encode a v2 frame with an explicit direction byte.
pub fn encode_v2_as(direction: Direction, cmd: u16, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
    if payload.len() > MAX_V2_PAYLOAD {
        return Err(EncodeError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_V2_PAYLOAD,
        });
    }

    let mut buf = Vec::with_capacity(V2_OVERHEAD + payload.len());
    buf.extend_from_slice(&[MARKER, TYPE_V2, direction.byte()]);
    // flags
    buf.push(0);
    buf.extend_from_slice(&cmd.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    buf.extend_from_slice(payload);

    let mut crc = Crc8Digest::new();
    crc.update_slice(&buf[3..]);
    buf.push(crc.finalize());
    Ok(buf)
}

/// Encode a request using the send policy for a link negotiated at `version`.
///
/// v2 is used when the link runs v2 or when `cmd` exceeds 255, v1 otherwise.
pub fn encode(version: Version, cmd: u16, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
    match version.for_command(cmd) {
        Version::V2 => encode_v2(cmd, payload),
        Version::V1 => {
            let cmd = u8::try_from(cmd).map_err(|_| EncodeError::CommandOutOfRange(cmd))?;
            encode_v1(cmd, payload)
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::command::{MSP2_INAV_STATUS, MSP_API_VERSION, MSP_SET_RAW_RC};
    use crate::crc::crc8_dvb_s2;
    use std::vec;

    #[test]
    fn test_encode_v1_empty_request() {
        let buf = encode_v1(1, &[]).unwrap();
        assert_eq!(buf, b"$M<\x00\x01\x01");
    }

    #[test]
    fn test_encode_v1_payload_checksum() {
        let buf = encode_v1(200, &[0xDC, 0x05]).unwrap();
        assert_eq!(&buf[..5], b"$M<\x02\xC8");
        assert_eq!(&buf[5..7], &[0xDC, 0x05]);
        assert_eq!(buf[7], 0x02 ^ 0xC8 ^ 0xDC ^ 0x05);
    }

    #[test]
    fn test_encode_v1_rejects_long_payload() {
        let payload = vec![0u8; 256];
        assert_eq!(
            encode_v1(1, &payload),
            Err(EncodeError::PayloadTooLarge { len: 256, max: 255 })
        );
    }

    #[test]
    fn test_encode_v2_layout() {
        let buf = encode_v2(0x1003, b"ab").unwrap();
        assert_eq!(&buf[..3], b"$X<");
        assert_eq!(buf[3], 0);
        assert_eq!(&buf[4..6], &[0x03, 0x10]);
        assert_eq!(&buf[6..8], &[0x02, 0x00]);
        assert_eq!(&buf[8..10], b"ab");
        assert_eq!(buf[10], crc8_dvb_s2(&buf[3..10]));
        assert_eq!(buf.len(), 11);
    }

    #[test]
    fn test_encode_policy() {
        let v1 = encode(Version::V1, MSP_API_VERSION, &[]).unwrap();
        assert_eq!(v1[1], TYPE_V1);

        let forced = encode(Version::V2, MSP_API_VERSION, &[]).unwrap();
        assert_eq!(forced[1], TYPE_V2);

        // High ids are promoted even on a v1 link
        let high = encode(Version::V1, MSP2_INAV_STATUS, &[]).unwrap();
        assert_eq!(high[1], TYPE_V2);
        assert_eq!(&high[4..6], &[0x00, 0x20]);

        let rc = encode(Version::V1, MSP_SET_RAW_RC, &[0; 36]).unwrap();
        assert_eq!(rc[1], TYPE_V1);
        assert_eq!(rc.len(), 6 + 36);
    }

    #[test]
    fn test_version_for_command() {
        assert_eq!(Version::V1.for_command(255), Version::V1);
        assert_eq!(Version::V1.for_command(256), Version::V2);
        assert_eq!(Version::V2.for_command(1), Version::V2);
    }

    #[test]
    fn test_link_lost_frame() {
        let frame = Frame::link_lost();
        assert!(frame.is_link_lost());
        assert!(frame.is_empty());
        assert!(!Frame::new(LINK_LOST, true, Vec::new()).is_link_lost());
    }
}
