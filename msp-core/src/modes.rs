//! Mode-range decoding and arm/angle channel derivation.
//!
//! MSP_MODE_RANGES returns up to 40 packed 4-byte records:
//!
//! ```text
//! [box id] [aux channel index] [start step] [end step]
//! ```
//!
//! A step is 25 µs above 900 µs. Channels 0-3 carry the sticks, so aux index
//! `n` lives on RC channel `4 + n`.

use log::debug;

/// Permanent box id of ARM.
pub const BOX_ARM: u8 = 0;
/// Permanent box id of ANGLE.
pub const BOX_ANGLE: u8 = 1;
/// Permanent box id of HORIZON.
pub const BOX_HORIZON: u8 = 2;
/// Permanent box id of RTH.
pub const BOX_RTH: u8 = 10;
/// Permanent box id of FAILSAFE.
pub const BOX_FAILSAFE: u8 = 27;

/// Most records a MODE_RANGES reply can carry.
pub const MAX_MODE_RANGES: usize = 40;

/// Size of one packed record.
const RECORD_LEN: usize = 4;

/// Widest accepted ARM window in steps (40 × 25 µs = 1000 µs).
const MAX_ARM_WIDTH: u8 = 40;

/// First RC channel available to aux switches.
pub const FIRST_AUX_CHANNEL: usize = 4;

/// One decoded mode-range record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeRange {
    pub box_id: u8,
    pub channel_index: u8,
    pub start_step: u8,
    pub end_step: u8,
}

impl ModeRange {
    /// Decode one packed record.
    #[must_use]
    pub fn from_bytes(bytes: [u8; RECORD_LEN]) -> Self {
        Self {
            box_id: bytes[0],
            channel_index: bytes[1],
            start_step: bytes[2],
            end_step: bytes[3],
        }
    }

    /// Inactive records have a zero end step.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.end_step != 0
    }

    /// ARM windows wider than 1000 µs are rejected as implausible. An
    /// inverted ARM window wraps around and is rejected too.
    #[inline]
    #[must_use]
    pub fn is_plausible(&self) -> bool {
        self.box_id != BOX_ARM || self.end_step.wrapping_sub(self.start_step) <= MAX_ARM_WIDTH
    }

    /// RC channel carrying this range.
    #[inline]
    #[must_use]
    pub fn channel(&self) -> usize {
        FIRST_AUX_CHANNEL + self.channel_index as usize
    }

    /// Midpoint of the range in µs: `(start + end) × 25 / 2 + 900`.
    ///
    /// Not clamped to a valid pulse width.
    #[inline]
    #[must_use]
    pub fn midpoint(&self) -> u16 {
        (self.start_step as u16 + self.end_step as u16) * 25 / 2 + 900
    }
}

/// A channel and the pulse that triggers its mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelTrigger {
    /// Zero-based RC channel index.
    pub channel: usize,
    /// Pulse in µs.
    pub pulse: u16,
}

/// Arm and angle-mode switch configuration.
///
/// Derived once at negotiation and never changed afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ArmConfig {
    /// Arm switch; `None` when the firmware has no ARM range.
    pub arm: Option<ChannelTrigger>,
    /// Angle-mode switch; `None` when the firmware has no ANGLE range.
    pub angle: Option<ChannelTrigger>,
}

impl ArmConfig {
    /// Replace the arm switch with an explicit aux channel, where 2000 µs arms.
    ///
    /// `channel_number` is 1-based, as printed on a transmitter.
    #[must_use]
    pub fn with_arm_switch(mut self, channel_number: u8) -> Self {
        self.arm = Some(ChannelTrigger {
            channel: channel_number.saturating_sub(1) as usize,
            pulse: 2000,
        });
        self
    }
}

/// Filtered and sorted mode ranges.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModeRangeTable {
    ranges: Vec<ModeRange>,
}

impl ModeRangeTable {
    /// Decode a MODE_RANGES payload.
    ///
    /// Inactive records and implausible ARM records are dropped; survivors are
    /// sorted by channel index, then start step. A trailing partial record is
    /// ignored.
    #[must_use]
    pub fn decode(payload: &[u8]) -> Self {
        let mut ranges: Vec<ModeRange> = payload
            .chunks_exact(RECORD_LEN)
            .take(MAX_MODE_RANGES)
            .map(|chunk| ModeRange::from_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .filter(|r| r.is_active() && r.is_plausible())
            .collect();

        // sort_by_key is stable
        ranges.sort_by_key(|r| (r.channel_index, r.start_step));
        Self { ranges }
    }

    /// The surviving records in sorted order.
    #[must_use]
    pub fn ranges(&self) -> &[ModeRange] {
        &self.ranges
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Derive arm and angle switches. The last matching record in sorted order
    /// wins. No arm switch is invented when the firmware has no ARM range.
    #[must_use]
    pub fn arm_config(&self) -> ArmConfig {
        let mut config = ArmConfig::default();
        for range in &self.ranges {
            debug!(
                "mode range: box {} aux {} {}..{} ({}..{} µs)",
                range.box_id,
                range.channel_index,
                range.start_step,
                range.end_step,
                900 + range.start_step as u16 * 25,
                900 + range.end_step as u16 * 25,
            );
            let trigger = ChannelTrigger {
                channel: range.channel(),
                pulse: range.midpoint(),
            };
            match range.box_id {
                BOX_ARM => config.arm = Some(trigger),
                BOX_ANGLE => config.angle = Some(trigger),
                _ => {}
            }
        }
        config
    }
}
