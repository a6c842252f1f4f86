//! Channel-role map and outgoing RC frame assembly.

use core::fmt;

use log::warn;
use rand::Rng;

use crate::modes::{ArmConfig, FIRST_AUX_CHANNEL};
use crate::types::{Phase, VirtualRc, STICK_CENTER, THROTTLE_MIN};

/// Aux channels not driven by a switch.
pub const AUX_DEFAULT: u16 = 1000;
/// Throttle before any status has been seen.
pub const THROTTLE_UNKNOWN: u16 = 990;
/// Arm channel value while quiescent; marks the channel without arming.
pub const ARM_MARKER: u16 = 1001;
/// Arm channel value while disarming, below any plausible arm threshold.
pub const ARM_RELEASE: u16 = 999;
/// Failsafe jitter spans `STICK_CENTER ± FAILSAFE_JITTER / 2`.
pub const FAILSAFE_JITTER: u16 = 200;

/// Channel counts by firmware generation.
pub const LEGACY_CHANNELS: usize = 16;
pub const CHANNELS: usize = 18;

/// Stick role carried by one of the first four channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Roll,
    Pitch,
    Yaw,
    Throttle,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Roll, Role::Pitch, Role::Yaw, Role::Throttle];

    /// Letter used in map strings.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Role::Roll => 'A',
            Role::Pitch => 'E',
            Role::Yaw => 'R',
            Role::Throttle => 'T',
        }
    }

    #[must_use]
    pub fn from_letter(c: char) -> Option<Role> {
        Role::ALL
            .into_iter()
            .find(|role| role.letter() == c.to_ascii_uppercase())
    }
}

/// Error type for channel-map strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapError(pub String);

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid channel map {:?}, expected a permutation of AERT", self.0)
    }
}

impl std::error::Error for MapError {}

/// Which physical slot (0-3) carries each stick role.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelMap {
    /// Indexed by `Role as usize`.
    slots: [usize; 4],
}

impl ChannelMap {
    /// Slot of `role`.
    #[inline]
    #[must_use]
    pub fn slot(&self, role: Role) -> usize {
        self.slots[role as usize]
    }

    /// Parse a map string where position is the channel and the letter is
    /// the role, e.g. `AERT` or `TAER`.
    pub fn parse(text: &str) -> Result<Self, MapError> {
        let err = || MapError(text.to_owned());
        let chars: Vec<char> = text.chars().collect();
        if chars.len() != 4 {
            return Err(err());
        }
        let mut slots = [usize::MAX; 4];
        for (slot, c) in chars.into_iter().enumerate() {
            let role = Role::from_letter(c).ok_or_else(err)?;
            if slots[role as usize] != usize::MAX {
                return Err(err());
            }
            slots[role as usize] = slot;
        }
        Ok(Self { slots })
    }

    /// Decode an RX_MAP reply: for roll, pitch, yaw and throttle in turn,
    /// the slot carrying it. `None` unless the reply is exactly a
    /// permutation of 0..4.
    #[must_use]
    pub fn from_rx_map(payload: &[u8]) -> Option<Self> {
        let bytes: [u8; 4] = payload.try_into().ok()?;
        let mut seen = [false; 4];
        for &b in &bytes {
            let slot = seen.get_mut(b as usize)?;
            if *slot {
                return None;
            }
            *slot = true;
        }
        Some(Self {
            slots: bytes.map(usize::from),
        })
    }
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self { slots: [0, 1, 2, 3] }
    }
}

impl fmt::Display for ChannelMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut letters = ['?'; 4];
        for role in Role::ALL {
            letters[self.slot(role)] = role.letter();
        }
        letters.iter().try_for_each(|c| write!(f, "{c}"))
    }
}

/// Builds the SET_RAW_RC channel array for each tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RcFrameBuilder {
    channel_count: usize,
    map: ChannelMap,
    arm: ArmConfig,
}

impl RcFrameBuilder {
    /// Frames always carry at least the four stick channels.
    #[must_use]
    pub fn new(channel_count: usize, map: ChannelMap, arm: ArmConfig) -> Self {
        Self {
            channel_count: channel_count.max(FIRST_AUX_CHANNEL),
            map,
            arm,
        }
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    #[must_use]
    pub fn arm_config(&self) -> &ArmConfig {
        &self.arm
    }

    /// Channel values for `phase`. Trigger channels beyond the frame are
    /// ignored with a warning.
    pub fn build<R: Rng + ?Sized>(&self, phase: Phase, vrc: &VirtualRc, rng: &mut R) -> Vec<u16> {
        let mut channels = vec![0u16; self.channel_count];
        for value in channels.iter_mut().skip(FIRST_AUX_CHANNEL) {
            *value = AUX_DEFAULT;
        }

        if let Some(arm) = self.arm.arm {
            self.put(&mut channels, arm.channel, ARM_MARKER);
        }
        if let Some(angle) = self.arm.angle {
            self.put(&mut channels, angle.channel, angle.pulse);
        }

        let (roll, pitch, yaw) = if vrc.failsafe {
            // a pilot fighting a failsafe
            (jitter(rng), jitter(rng), STICK_CENTER)
        } else {
            (
                offset(vrc.roll),
                offset(vrc.pitch),
                offset(vrc.yaw),
            )
        };
        channels[self.map.slot(Role::Roll)] = roll;
        channels[self.map.slot(Role::Pitch)] = pitch;
        channels[self.map.slot(Role::Yaw)] = yaw;

        let throttle = match phase {
            Phase::Unknown => THROTTLE_UNKNOWN,
            Phase::Quiescent => THROTTLE_MIN,
            Phase::Arming => {
                self.hold_arm(&mut channels);
                THROTTLE_MIN
            }
            Phase::LowThrottle => {
                self.hold_arm(&mut channels);
                vrc.throttle.max(THROTTLE_MIN)
            }
            Phase::Disarming => {
                for role in [Role::Roll, Role::Pitch, Role::Yaw] {
                    channels[self.map.slot(role)] = STICK_CENTER;
                }
                if let Some(arm) = self.arm.arm {
                    self.put(&mut channels, arm.channel, ARM_RELEASE);
                }
                THROTTLE_MIN
            }
        };
        channels[self.map.slot(Role::Throttle)] = throttle;
        channels
    }

    fn hold_arm(&self, channels: &mut [u16]) {
        if let Some(arm) = self.arm.arm {
            self.put(channels, arm.channel, arm.pulse);
        }
    }

    fn put(&self, channels: &mut [u16], channel: usize, value: u16) {
        match channels.get_mut(channel) {
            Some(slot) => *slot = value,
            None => warn!(
                "channel {} outside {}-channel frame",
                channel + 1,
                self.channel_count
            ),
        }
    }
}

fn offset(delta: i16) -> u16 {
    (STICK_CENTER as i32 + delta as i32) as u16
}

fn jitter<R: Rng + ?Sized>(rng: &mut R) -> u16 {
    STICK_CENTER + rng.gen_range(0..FAILSAFE_JITTER) - FAILSAFE_JITTER / 2
}

/// Serialise channel values as little-endian u16s.
#[must_use]
pub fn to_payload(channels: &[u16]) -> Vec<u8> {
    channels.iter().flat_map(|c| c.to_le_bytes()).collect()
}

/// Decode an RC reply into at most `max` channel values.
#[must_use]
pub fn decode_channels(payload: &[u8], max: usize) -> Vec<u16> {
    payload
        .chunks_exact(2)
        .take(max)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
