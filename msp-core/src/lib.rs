//! Flight-controller negotiation and the arm-lifecycle controller.
//!
//! This crate holds everything between the byte-level codec and the OS:
//!
//! - [`modes`]: mode-range decoding and arm/angle switch derivation
//!   ([`ModeRangeTable`], [`ArmConfig`])
//! - [`boxes`]: box names and the ARM / FAILSAFE masks ([`BoxMaskTable`])
//! - [`status`]: the per-command status layout table ([`decode_status`])
//! - [`channels`]: channel-role map and RC frame assembly ([`RcFrameBuilder`])
//! - [`negotiate`]: the startup exchange ([`Negotiator`], [`negotiate`])
//! - [`control`]: the control-loop state machine ([`Controller`])
//! - [`input`] / [`output`]: the async seams to the transport
//!   ([`FrameSource`], [`MspSink`])
//!
//! # Example
//!
//! ```rust
//! use msp_core::{ModeRangeTable, BOX_ARM};
//!
//! // ARM on aux 1 between 1700 and 2100 µs
//! let table = ModeRangeTable::decode(&[BOX_ARM, 0, 32, 48]);
//! let arm = table.arm_config().arm.unwrap();
//! assert_eq!(arm.channel, 4);
//! assert_eq!(arm.pulse, 1900);
//! ```

pub mod boxes;
pub mod channels;
pub mod control;
pub mod input;
pub mod modes;
pub mod negotiate;
pub mod output;
pub mod status;
pub mod types;

// Re-export main types at crate root
pub use boxes::BoxMaskTable;
pub use channels::{decode_channels, to_payload, ChannelMap, MapError, RcFrameBuilder, Role};
pub use control::{Controller, Exit, Reaction};
pub use input::FrameSource;
pub use modes::{
    ArmConfig, ChannelTrigger, ModeRange, ModeRangeTable, BOX_ANGLE, BOX_ARM, BOX_FAILSAFE,
};
pub use negotiate::{
    negotiate, Capabilities, NegotiateError, NegotiateOptions, Negotiator, Request, Step,
};
pub use output::{MspSink, OutputError};
pub use status::{decode_status, describe_arm_flags, StatusCommand, StatusFlags};
pub use types::{ApiVersion, Axis, FirmwareVersion, Key, Phase, VirtualRc, KEY_HELP};
