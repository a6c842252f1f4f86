//! MSP command identifiers used by the RC exerciser.
//!
//! Ids up to 255 exist in both framings; anything above can only travel in
//! v2 frames.

pub const MSP_API_VERSION: u16 = 1;
pub const MSP_FC_VARIANT: u16 = 2;
pub const MSP_FC_VERSION: u16 = 3;
pub const MSP_BOARD_INFO: u16 = 4;
pub const MSP_BUILD_INFO: u16 = 5;
pub const MSP_NAME: u16 = 10;
pub const MSP_MODE_RANGES: u16 = 34;
pub const MSP_RX_MAP: u16 = 64;
/// Legacy status reply (32-bit box flags).
pub const MSP_STATUS: u16 = 101;
/// RC channel readback.
pub const MSP_RC: u16 = 105;
pub const MSP_BOXNAMES: u16 = 116;
/// Extended status reply (32-bit box flags, 16-bit arming flags).
pub const MSP_STATUS_EX: u16 = 150;
pub const MSP_SET_RAW_RC: u16 = 200;

/// Named setting lookup, v2 only.
pub const MSP2_COMMON_SETTING: u16 = 0x1003;
/// INAV status reply (64-bit box flags), v2 only.
pub const MSP2_INAV_STATUS: u16 = 0x2000;

/// Command id carried by the terminal frame emitted when the link drops.
pub const LINK_LOST: u16 = 0xFFFF;

/// Largest command id that fits a v1 frame.
pub const MAX_V1_COMMAND: u16 = 255;
