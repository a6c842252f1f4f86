//! Outbound side of the link.

pub mod link;

pub use link::MspWriter;
