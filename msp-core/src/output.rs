use core::fmt;

use msp_proto::{EncodeError, Version};

/// Error type for output operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputError {
    /// Frame could not be encoded.
    Encode(EncodeError),
    /// Transport write failed.
    Io,
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputError::Encode(e) => write!(f, "encode failed: {e}"),
            OutputError::Io => f.write_str("transport write failed"),
        }
    }
}

impl std::error::Error for OutputError {}

impl From<EncodeError> for OutputError {
    fn from(e: EncodeError) -> Self {
        OutputError::Encode(e)
    }
}

/// Async trait for MSP request sinks.
///
/// The sink owns the framing policy: requests go out as v2 when the link runs
/// v2 or the command id exceeds 255, v1 otherwise.
pub trait MspSink {
    /// Encode and send one request.
    fn send(&mut self, cmd: u16, payload: &[u8])
        -> impl core::future::Future<Output = Result<(), OutputError>>;

    /// Switch the framing used for later requests.
    fn set_version(&mut self, version: Version);
}
