//! Inbound sources for the control loop.
//!
//! Both are fed by blocking OS threads pushing into `'static` channels:
//! parsed frames from the transport, and keystrokes from stdin.

pub mod keys;
pub mod link;

pub use keys::{spawn_keyboard, KeyChannel, KeySource, KeyStrokes};
pub use link::{spawn_reader, FrameChannel, LinkFrames};
