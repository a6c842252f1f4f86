//! Host side of the MSP RC exerciser.
//!
//! Wires the codec and controller from `msp-proto` / `msp-core` to real I/O:
//!
//! - [`cli`]: command-line options
//! - [`device`]: device-string grammar ([`DeviceSpec`])
//! - [`transport`]: serial, TCP and UDP links ([`open`])
//! - [`input`]: link reader and keyboard threads feeding async channels
//! - [`output`]: request framing onto the link ([`MspWriter`])
//! - [`bridge`]: the control loop ([`RcBridge`])

pub mod bridge;
pub mod cli;
pub mod device;
pub mod input;
pub mod output;
pub mod transport;

// Re-export main types at crate root
pub use bridge::{QuitSignal, RcBridge, TX_PERIOD};
pub use cli::Args;
pub use device::{DeviceError, DeviceSpec, DEFAULT_DEVICES};
pub use input::{
    spawn_keyboard, spawn_reader, FrameChannel, KeyChannel, KeySource, KeyStrokes, LinkFrames,
};
pub use output::MspWriter;
pub use transport::{open, Link, LinkReader, TransportError};
