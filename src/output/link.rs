use std::io::Write;

use log::trace;
use msp_core::{MspSink, OutputError};
use msp_proto::{encode, Version};

/// [`MspSink`] that frames requests and writes them to a byte stream.
///
/// Writes block until the transport accepts the whole frame.
pub struct MspWriter<W> {
    writer: W,
    version: Version,
}

impl<W: Write> MspWriter<W> {
    /// Wrap `writer`, framing as v1 until told otherwise.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            version: Version::V1,
        }
    }

    /// Framing used for commands that fit v1.
    #[inline]
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> MspSink for MspWriter<W> {
    async fn send(&mut self, cmd: u16, payload: &[u8]) -> Result<(), OutputError> {
        let bytes = encode(self.version, cmd, payload)?;
        trace!("send {} ({} bytes)", cmd, payload.len());
        self.writer
            .write_all(&bytes)
            .and_then(|()| self.writer.flush())
            .map_err(|_| OutputError::Io)
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}
