//! MSP frame codec and stream parser.
//!
//! This crate provides everything needed to talk MSP at the byte level:
//!
//! - **Encoding**: [`encode_v1`], [`encode_v2`] and the link-level send
//!   policy [`encode`]
//! - **Parsing**: [`MspParser`] consumes a byte stream and yields
//!   checksum-verified [`Frame`]s
//! - **Checksums**: XOR for v1, CRC-8/DVB-S2 for v2 ([`crc8_dvb_s2`])
//! - **Command ids**: the subset of MSP the RC exerciser speaks ([`command`])
//!
//! # Example
//!
//! ```
//! use msp_proto::{encode_v1_as, Direction, MspParser};
//!
//! let bytes = encode_v1_as(Direction::Reply, 1, &[0, 2, 5]).unwrap();
//!
//! let mut parser = MspParser::new();
//! let mut frames = bytes.iter().filter_map(|&b| parser.push_byte(b).ok().flatten());
//! let frame = frames.next().unwrap();
//! assert_eq!(frame.cmd, 1);
//! assert_eq!(frame.payload, [0, 2, 5]);
//! assert!(frame.ok);
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host use and testing)
//! - **`defmt`**: Enable defmt formatting (for embedded logging)
//!
//! # No-std Support
//!
//! This crate is `#![no_std]` by default. Payloads are heap-allocated, so an
//! allocator is required.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod command;
pub mod crc;
pub mod frame;
pub mod parser;

// Re-export main types at crate root
pub use crc::{crc8_dvb_s2, xor_checksum, Crc8Digest};
pub use frame::{
    encode, encode_v1, encode_v1_as, encode_v2, encode_v2_as, Direction, EncodeError, Frame,
    Version, MAX_V1_PAYLOAD, MAX_V2_PAYLOAD,
};
pub use parser::{MspParser, ParseError};
