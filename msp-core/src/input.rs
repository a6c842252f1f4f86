use msp_proto::Frame;

/// Async trait for sources of parsed frames.
///
/// Implementations deliver checksum-verified frames in arrival order. When the
/// transport fails or closes they deliver [`Frame::link_lost`] exactly once.
pub trait FrameSource {
    /// Wait for and receive the next frame.
    fn receive(&mut self) -> impl core::future::Future<Output = Frame>;
}
