//! Checksums used by the two MSP framings.
//!
//! - v1 frames carry an XOR of length, command and payload bytes.
//! - v2 frames carry CRC-8/DVB-S2 (polynomial 0xD5, MSB-first, zero init)
//!   over flags, command, length and payload.

use crc::{Crc, CRC_8_DVB_S2};

/// CRC-8/DVB-S2 calculator with 256-byte lookup table.
const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_DVB_S2);

/// Calculate CRC-8/DVB-S2 of a byte slice.
#[inline]
#[must_use]
pub fn crc8_dvb_s2(data: &[u8]) -> u8 {
    CRC8.checksum(data)
}

/// XOR checksum used by v1 frames.
#[inline]
#[must_use]
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// CRC-8/DVB-S2 digest for incremental calculation.
///
/// The stream parser feeds header and payload bytes one at a time as they
/// arrive, so it cannot use [`crc8_dvb_s2`] on a finished slice.
pub struct Crc8Digest {
    digest: crc::Digest<'static, u8>,
}

impl Crc8Digest {
    /// Create a new CRC-8 digest.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            digest: CRC8.digest(),
        }
    }

    /// Update the digest with a single byte.
    #[inline]
    pub fn update(&mut self, byte: u8) {
        self.digest.update(&[byte]);
    }

    /// Update the digest with a byte slice.
    #[inline]
    pub fn update_slice(&mut self, data: &[u8]) {
        self.digest.update(data);
    }

    /// Finalize and return the checksum value.
    #[inline]
    #[must_use]
    pub fn finalize(self) -> u8 {
        self.digest.finalize()
    }
}

impl Default for Crc8Digest {
    fn default() -> Self {
        Self::new()
    }
}
