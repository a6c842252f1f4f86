//! Box-name table from MSP_BOXNAMES.
//!
//! The reply is a `;`-separated list of names. A box's position in that list is
//! the bit it occupies in the status box flags.

/// Name of the arm box.
pub const ARM: &str = "ARM";
/// Name of the failsafe box.
pub const FAILSAFE: &str = "FAILSAFE";

/// Box flags are at most 64 bits wide.
const MAX_BOXES: usize = 64;

/// Ordered box names and the masks decoded from them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BoxMaskTable {
    names: Vec<String>,
    arm_mask: Option<u64>,
    failsafe_mask: Option<u64>,
}

impl BoxMaskTable {
    /// Parse a BOXNAMES payload.
    #[must_use]
    pub fn parse(payload: &[u8]) -> Self {
        let text = String::from_utf8_lossy(payload);
        let names: Vec<String> = text
            .split(';')
            .take(MAX_BOXES)
            .map(str::to_owned)
            .collect();

        let mask_of = |wanted: &str| {
            names
                .iter()
                .position(|name| name == wanted)
                .map(|bit| 1u64 << bit)
        };
        let arm_mask = mask_of(ARM);
        let failsafe_mask = mask_of(FAILSAFE);

        Self {
            names,
            arm_mask,
            failsafe_mask,
        }
    }

    /// Bit mask of the ARM box, if the firmware has one.
    #[must_use]
    pub fn arm_mask(&self) -> Option<u64> {
        self.arm_mask
    }

    /// Bit mask of the FAILSAFE box, if the firmware has one.
    #[must_use]
    pub fn failsafe_mask(&self) -> Option<u64> {
        self.failsafe_mask
    }

    /// `true` when the box flags show the craft armed.
    #[must_use]
    pub fn is_armed(&self, box_flags: u64) -> bool {
        self.arm_mask.is_some_and(|mask| box_flags & mask != 0)
    }

    /// `true` when the box flags fully cover the FAILSAFE mask.
    #[must_use]
    pub fn is_failsafe(&self, box_flags: u64) -> bool {
        self.failsafe_mask
            .is_some_and(|mask| box_flags & mask == mask)
    }

    /// Comma-separated names of the boxes set in `box_flags`.
    #[must_use]
    pub fn describe(&self, box_flags: u64) -> String {
        self.names
            .iter()
            .enumerate()
            .filter(|(bit, name)| !name.is_empty() && box_flags & (1u64 << bit) != 0)
            .map(|(_, name)| name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }
}
