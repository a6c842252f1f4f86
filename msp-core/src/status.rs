//! Status-reply decoding.
//!
//! Three status commands exist depending on firmware age. Each stores box
//! flags and arming flags at different offsets:
//!
//! | Command | box flags | arming flags |
//! |---|---|---|
//! | MSP_STATUS (101) | 6, 4 bytes | 9, 4 bytes |
//! | MSP_STATUS_EX (150) | 6, 4 bytes | 13, 2 bytes |
//! | MSP2_INAV_STATUS (0x2000) | 13, 8 bytes | 9, 4 bytes |
//!
//! All fields are little-endian. The legacy layout overlaps its two fields;
//! that is what the firmware sends.

use msp_proto::command::{MSP2_INAV_STATUS, MSP_STATUS, MSP_STATUS_EX};
use msp_proto::Frame;

use crate::types::{ApiVersion, FirmwareVersion};

/// Arming flags at or above this value block arming.
pub const ARMING_BLOCKED: u32 = 0x80;

/// First firmware with MSP2_INAV_STATUS.
const INAV_STATUS_SINCE: FirmwareVersion = FirmwareVersion::new(1, 8, 1);

/// Byte range of one little-endian field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    pub offset: usize,
    pub width: usize,
}

impl Field {
    const fn new(offset: usize, width: usize) -> Self {
        Self { offset, width }
    }

    /// Read the field, `None` if the payload is too short.
    #[must_use]
    pub fn read(&self, payload: &[u8]) -> Option<u64> {
        let bytes = payload.get(self.offset..self.offset + self.width)?;
        Some(
            bytes
                .iter()
                .rev()
                .fold(0u64, |acc, &b| (acc << 8) | b as u64),
        )
    }
}

/// Where a status command keeps its flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusLayout {
    pub box_flags: Field,
    pub arm_flags: Field,
}

/// Status layouts keyed by command id.
pub const STATUS_LAYOUTS: [(u16, StatusLayout); 3] = [
    (
        MSP_STATUS,
        StatusLayout {
            box_flags: Field::new(6, 4),
            arm_flags: Field::new(9, 4),
        },
    ),
    (
        MSP_STATUS_EX,
        StatusLayout {
            box_flags: Field::new(6, 4),
            arm_flags: Field::new(13, 2),
        },
    ),
    (
        MSP2_INAV_STATUS,
        StatusLayout {
            box_flags: Field::new(13, 8),
            arm_flags: Field::new(9, 4),
        },
    ),
];

/// Look up the layout for a status command id.
#[must_use]
pub fn layout_for(cmd: u16) -> Option<StatusLayout> {
    STATUS_LAYOUTS
        .iter()
        .find(|(id, _)| *id == cmd)
        .map(|(_, layout)| *layout)
}

/// `true` for any of the status command ids.
#[must_use]
pub fn is_status_command(cmd: u16) -> bool {
    layout_for(cmd).is_some()
}

/// Status command to poll, chosen once at negotiation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StatusCommand {
    #[default]
    Legacy,
    Extended,
    Inav,
}

impl StatusCommand {
    /// Pick the richest status command the firmware supports.
    #[must_use]
    pub fn select(api: ApiVersion, firmware: FirmwareVersion) -> Self {
        if api.major >= 2 {
            if firmware >= INAV_STATUS_SINCE {
                StatusCommand::Inav
            } else {
                StatusCommand::Extended
            }
        } else {
            StatusCommand::Legacy
        }
    }

    /// Command id on the wire.
    #[must_use]
    pub const fn id(self) -> u16 {
        match self {
            StatusCommand::Legacy => MSP_STATUS,
            StatusCommand::Extended => MSP_STATUS_EX,
            StatusCommand::Inav => MSP2_INAV_STATUS,
        }
    }
}

/// Flags decoded from one status reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct StatusFlags {
    pub box_flags: u64,
    pub arm_flags: u32,
}

impl StatusFlags {
    /// `true` when no arming-blocking reason is set.
    #[must_use]
    pub fn ready_to_arm(&self) -> bool {
        self.arm_flags < ARMING_BLOCKED
    }
}

/// Decode a status reply. `None` for non-status frames or short payloads.
#[must_use]
pub fn decode_status(frame: &Frame) -> Option<StatusFlags> {
    let layout = layout_for(frame.cmd)?;
    let box_flags = layout.box_flags.read(&frame.payload)?;
    let arm_flags = layout.arm_flags.read(&frame.payload)?;
    Some(StatusFlags {
        box_flags,
        arm_flags: arm_flags as u32,
    })
}

/// Names of the arming flags by bit. Empty names are not reported.
const ARMING_FLAG_NAMES: [&str; 32] = [
    "", "", "Armed", "Ever armed", "", "", "", "F/S", "Level", "Calibrate", "Overload",
    "NavUnsafe", "MagCal", "AccCal", "ArmSwitch", "H/WFail", "BoxF/S", "BoxKill", "RCLink",
    "Throttle", "CLI", "CMS", "OSD", "Roll/Pitch", "Autotrim", "OOM", "Settings", "PWM Out",
    "PreArm", "DSHOTBeep", "Land", "Other",
];

/// Human-readable arming flags, always ending with the raw value.
#[must_use]
pub fn describe_arm_flags(flags: u32) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if flags < ARMING_BLOCKED {
        if flags & (1 << 2) != 0 {
            parts.push(ARMING_FLAG_NAMES[2]);
        } else {
            parts.push("Ready to arm");
        }
    } else {
        parts.extend(
            ARMING_FLAG_NAMES
                .iter()
                .enumerate()
                .filter(|(bit, name)| !name.is_empty() && flags & (1 << bit) != 0)
                .map(|(_, name)| *name),
        );
    }
    format!("{} ({flags:#x})", parts.join(" "))
}
