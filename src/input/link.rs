use std::io::{self, ErrorKind, Read};
use std::thread::{self, JoinHandle};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver};
use log::{error, info, warn};
use msp_core::FrameSource;
use msp_proto::{Frame, MspParser};

use crate::transport::LinkReader;

/// Depth of the inbound frame queue.
pub const FRAME_QUEUE: usize = 16;

/// Frames from the link reader thread to the control loop.
pub type FrameChannel = Channel<CriticalSectionRawMutex, Frame, FRAME_QUEUE>;

const READ_CHUNK: usize = 2048;

/// Read `reader` until it fails or closes, handing each verified frame to
/// `deliver`. Finishes with exactly one [`Frame::link_lost`].
///
/// Read timeouts are not failures; checksum errors are logged and parsing
/// resumes at the next marker.
pub fn pump_frames<R: Read + ?Sized>(reader: &mut R, mut deliver: impl FnMut(Frame)) {
    let mut parser = MspParser::new();
    let mut buf = [0u8; READ_CHUNK];

    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                info!("Link closed");
                break;
            }
            Ok(n) => {
                for &byte in &buf[..n] {
                    match parser.push_byte(byte) {
                        Ok(Some(frame)) => deliver(frame),
                        Ok(None) => {}
                        Err(e) => warn!("{}", e),
                    }
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                error!("Link read failed: {}", e);
                break;
            }
        }
    }

    deliver(Frame::link_lost());
}

/// Run [`pump_frames`] on its own thread, feeding `frames`.
///
/// The reader is closed once the link is lost.
pub fn spawn_reader(
    mut reader: Box<dyn LinkReader>,
    frames: &'static FrameChannel,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("msp-link".into())
        .spawn(move || {
            pump_frames(&mut *reader, |frame| {
                embassy_futures::block_on(frames.send(frame));
            });
            reader.close();
        })
}

/// [`FrameSource`] over the receiving end of a [`FrameChannel`].
pub struct LinkFrames<'a> {
    rx: Receiver<'a, CriticalSectionRawMutex, Frame, FRAME_QUEUE>,
}

impl<'a> LinkFrames<'a> {
    pub fn new(frames: &'a FrameChannel) -> Self {
        Self {
            rx: frames.receiver(),
        }
    }
}

impl FrameSource for LinkFrames<'_> {
    async fn receive(&mut self) -> Frame {
        self.rx.receive().await
    }
}
