//! Core runtime types: Phase, VirtualRc, Axis, Key.

use core::fmt;

/// Lowest throttle the virtual sticks will command.
pub const THROTTLE_MIN: u16 = 1000;
/// Highest throttle the virtual sticks will command.
pub const THROTTLE_MAX: u16 = 2000;
/// Stick centre pulse in µs.
pub const STICK_CENTER: u16 = 1500;
/// Largest roll/pitch/yaw offset from centre in µs.
pub const STICK_LIMIT: i16 = 300;
/// Pulse change per keystroke in µs.
pub const STEP: i16 = 25;

/// The exerciser's own view of the arm lifecycle.
///
/// Distinct from what the firmware reports; transitions are driven by
/// status changes and keystrokes in [`crate::Controller`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Phase {
    /// No status seen yet.
    #[default]
    Unknown,
    /// Disarmed and ready.
    Quiescent,
    /// Arm pulse is being sent, waiting for the firmware to report armed.
    Arming,
    /// Firmware reports armed, throttle follows the virtual stick.
    LowThrottle,
    /// Arm pulse withdrawn, sticks centred, waiting for disarmed.
    Disarming,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Unknown => "unknown",
            Phase::Quiescent => "quiescent",
            Phase::Arming => "arming",
            Phase::LowThrottle => "low throttle",
            Phase::Disarming => "disarming",
        };
        f.write_str(name)
    }
}

/// Stick axis moved by the keyboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Roll,
    Pitch,
    Yaw,
}

/// Virtual stick state.
///
/// Throttle stays within [`THROTTLE_MIN`]..=[`THROTTLE_MAX`], offsets within
/// ±[`STICK_LIMIT`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VirtualRc {
    pub throttle: u16,
    pub roll: i16,
    pub pitch: i16,
    pub yaw: i16,
    /// Firmware reports the FAILSAFE box active.
    pub failsafe: bool,
}

impl VirtualRc {
    /// Centred sticks at the given throttle (clamped into range).
    #[must_use]
    pub fn new(throttle: u16) -> Self {
        Self {
            throttle: throttle.clamp(THROTTLE_MIN, THROTTLE_MAX),
            roll: 0,
            pitch: 0,
            yaw: 0,
            failsafe: false,
        }
    }

    /// Move the throttle by `delta` µs, saturating at the range limits.
    pub fn adjust_throttle(&mut self, delta: i16) {
        let value = (self.throttle as i32 + delta as i32)
            .clamp(THROTTLE_MIN as i32, THROTTLE_MAX as i32);
        self.throttle = value as u16;
    }

    /// Move one stick axis by `delta` µs, saturating at ±[`STICK_LIMIT`].
    pub fn adjust(&mut self, axis: Axis, delta: i16) {
        let offset = match axis {
            Axis::Roll => &mut self.roll,
            Axis::Pitch => &mut self.pitch,
            Axis::Yaw => &mut self.yaw,
        };
        *offset = offset
            .saturating_add(delta)
            .clamp(-STICK_LIMIT, STICK_LIMIT);
    }

    /// Return roll, pitch and yaw to centre.
    pub fn center(&mut self) {
        self.roll = 0;
        self.pitch = 0;
        self.yaw = 0;
    }
}

impl Default for VirtualRc {
    fn default() -> Self {
        Self::new(THROTTLE_MIN)
    }
}

impl fmt::Display for VirtualRc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[R:{}, P:{}, Y:{}, T:{}]",
            self.roll, self.pitch, self.yaw, self.throttle
        )
    }
}

/// A keystroke the controller understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    /// `p` / `P`
    ToggleArm,
    /// `L`, disarms first when armed
    Quit,
    /// `F`, stops immediately and lets the firmware fail safe
    QuitToFailsafe,
    /// `v` / `V`
    ToggleVerbose,
    /// `+` / `=`
    ThrottleUp,
    /// `-`
    ThrottleDown,
    /// `c` / `C` / `` ` ``
    Center,
    /// `a` `d` roll, `w` `s` pitch, `q` `e` yaw
    Stick(Axis, i16),
}

impl Key {
    /// Map a raw keyboard byte to a key, `None` for unbound bytes.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Key> {
        Some(match byte {
            b'p' | b'P' => Key::ToggleArm,
            b'L' => Key::Quit,
            b'F' => Key::QuitToFailsafe,
            b'v' | b'V' => Key::ToggleVerbose,
            b'+' | b'=' => Key::ThrottleUp,
            b'-' => Key::ThrottleDown,
            b'c' | b'C' | b'`' => Key::Center,
            b'd' => Key::Stick(Axis::Roll, STEP),
            b'a' => Key::Stick(Axis::Roll, -STEP),
            b's' => Key::Stick(Axis::Pitch, STEP),
            b'w' => Key::Stick(Axis::Pitch, -STEP),
            b'e' => Key::Stick(Axis::Yaw, STEP),
            b'q' => Key::Stick(Axis::Yaw, -STEP),
            _ => return None,
        })
    }
}

/// MSP API version from MSP_API_VERSION.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ApiVersion {
    pub major: u8,
    pub minor: u8,
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Firmware version from MSP_FC_VERSION.
///
/// Field order makes the derived ordering numeric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl FirmwareVersion {
    #[must_use]
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Keyboard help, printed when the control loop starts.
pub const KEY_HELP: &str = "\
Keypresses: 'p'/'P': toggle arming, 'L': quit, 'F': quit to failsafe
            '+'/'-' raise / lower throttle by 25µs
            'c'/'C' centre sticks, 'v' toggle verbose
            'a'<=>'d' roll
            'w'<=>'s' pitch
            'q'<=>'e' yaw";
