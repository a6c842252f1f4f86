use std::io::Write;

use embassy_futures::select::{select4, Either4};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker};
use log::{debug, info};
use msp_core::{Controller, Exit, FrameSource, MspSink, Reaction};
use msp_proto::command::MSP_SET_RAW_RC;
use rand::Rng;

use crate::input::KeySource;

/// RC frame period.
pub const TX_PERIOD: Duration = Duration::from_millis(100);

/// Raised from the OS signal handler to request a safe quit.
pub type QuitSignal = Signal<CriticalSectionRawMutex, ()>;

/// The control loop: multiplexes the TX ticker, the quit signal, inbound
/// frames and keystrokes into one [`Controller`].
///
/// Every tick sends one SET_RAW_RC frame. Sends are fire-and-forget; a
/// failed write is logged and the loop carries on until the link reader
/// reports the link lost.
pub struct RcBridge<'a, I, O, K, R> {
    controller: Controller,
    frames: I,
    output: O,
    keys: K,
    quit: &'a QuitSignal,
    rng: R,
    ticker: Ticker,
}

impl<'a, I, O, K, R> RcBridge<'a, I, O, K, R>
where
    I: FrameSource,
    O: MspSink,
    K: KeySource,
    R: Rng,
{
    /// Create a bridge. The first tick fires one period from now.
    pub fn new(
        controller: Controller,
        frames: I,
        output: O,
        keys: K,
        quit: &'a QuitSignal,
        rng: R,
    ) -> Self {
        Self {
            controller,
            frames,
            output,
            keys,
            quit,
            rng,
            ticker: Ticker::every(TX_PERIOD),
        }
    }

    /// Run until the controller decides to stop.
    pub async fn run(&mut self) -> Exit {
        info!("Start TX loop");
        loop {
            if let Some(exit) = self.step().await {
                info!("Stopping: {}", exit);
                return exit;
            }
        }
    }

    /// Wait for the next event from any source and handle it.
    ///
    /// Returns the exit reason once the loop should end.
    pub async fn step(&mut self) -> Option<Exit> {
        let event = select4(
            self.ticker.next(),
            self.quit.wait(),
            self.frames.receive(),
            self.keys.next_key(),
        )
        .await;

        let reaction = match event {
            Either4::First(()) => {
                let payload = self.controller.tx_payload(&mut self.rng);
                self.send(MSP_SET_RAW_RC, &payload).await;
                Reaction::Idle
            }
            Either4::Second(()) => self.controller.on_interrupt(),
            Either4::Third(frame) => self.controller.on_frame(&frame),
            Either4::Fourth(key) => {
                let reaction = self.controller.on_key(key);
                let mut stdout = std::io::stdout();
                let _ = write!(stdout, "\r{}", self.controller.vrc());
                let _ = stdout.flush();
                reaction
            }
        };

        match reaction {
            Reaction::Idle => None,
            Reaction::Request(cmd) => {
                self.send(cmd, &[]).await;
                None
            }
            Reaction::Exit(exit) => Some(exit),
        }
    }

    async fn send(&mut self, cmd: u16, payload: &[u8]) {
        if let Err(e) = self.output.send(cmd, payload).await {
            debug!("send {} failed: {}", cmd, e);
        }
    }

    #[inline]
    #[must_use]
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    #[inline]
    #[must_use]
    pub fn output(&self) -> &O {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msp_core::{Capabilities, Key, OutputError, Phase};
    use msp_proto::command::{MSP_RC, MSP_STATUS};
    use msp_proto::{Frame, Version};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::VecDeque;

    /// Delivers queued items, then never completes.
    struct Scripted<T>(VecDeque<T>);

    impl<T> Scripted<T> {
        async fn next(&mut self) -> T {
            match self.0.pop_front() {
                Some(item) => item,
                None => core::future::pending().await,
            }
        }
    }

    impl FrameSource for Scripted<Frame> {
        async fn receive(&mut self) -> Frame {
            self.next().await
        }
    }

    impl KeySource for Scripted<Key> {
        async fn next_key(&mut self) -> Key {
            self.next().await
        }
    }

    #[derive(Default)]
    struct MockSink {
        sent: Vec<(u16, Vec<u8>)>,
        fail: bool,
    }

    impl MspSink for MockSink {
        async fn send(&mut self, cmd: u16, payload: &[u8]) -> Result<(), OutputError> {
            self.sent.push((cmd, payload.to_vec()));
            if self.fail {
                Err(OutputError::Io)
            } else {
                Ok(())
            }
        }

        fn set_version(&mut self, _version: Version) {}
    }

    fn bridge<'a>(
        frames: Vec<Frame>,
        keys: Vec<Key>,
        quit: &'a QuitSignal,
        verbose: bool,
    ) -> RcBridge<'a, Scripted<Frame>, MockSink, Scripted<Key>, StdRng> {
        let caps = Capabilities {
            channel_count: 16,
            ..Capabilities::default()
        };
        RcBridge::new(
            Controller::new(&caps, false, verbose),
            Scripted(frames.into()),
            MockSink::default(),
            Scripted(keys.into()),
            quit,
            StdRng::seed_from_u64(7),
        )
    }

    #[test]
    fn test_quit_signal_interrupts() {
        let quit = QuitSignal::new();
        quit.signal(());
        let mut bridge = bridge(vec![], vec![], &quit, false);
        assert_eq!(
            embassy_futures::block_on(bridge.step()),
            Some(Exit::Interrupted)
        );
    }

    #[test]
    fn test_failsafe_key_exits() {
        let quit = QuitSignal::new();
        let mut bridge = bridge(vec![], vec![Key::ThrottleUp, Key::QuitToFailsafe], &quit, false);
        assert_eq!(embassy_futures::block_on(bridge.step()), None);
        assert_eq!(bridge.controller().vrc().throttle, 1025);
        assert_eq!(embassy_futures::block_on(bridge.run()), Exit::Failsafe);
    }

    #[test]
    fn test_link_lost_exits() {
        let quit = QuitSignal::new();
        let mut bridge = bridge(vec![Frame::link_lost()], vec![], &quit, false);
        let exit = embassy_futures::block_on(bridge.run());
        assert_eq!(exit, Exit::LinkLost);
        assert_eq!(exit.code(), 1);
    }

    #[test]
    fn test_ack_polls_status() {
        let quit = QuitSignal::new();
        let ack = Frame::new(MSP_SET_RAW_RC, true, vec![]);

        let mut quiet = bridge(vec![ack.clone()], vec![], &quit, false);
        assert_eq!(embassy_futures::block_on(quiet.step()), None);
        assert_eq!(quiet.output().sent, vec![(MSP_STATUS, vec![])]);

        let mut verbose = bridge(vec![ack], vec![], &quit, true);
        assert_eq!(embassy_futures::block_on(verbose.step()), None);
        assert_eq!(verbose.output().sent, vec![(MSP_RC, vec![])]);
    }

    #[test]
    fn test_tick_sends_rc_frame() {
        let quit = QuitSignal::new();
        let mut bridge = bridge(vec![], vec![], &quit, false);
        assert_eq!(embassy_futures::block_on(bridge.step()), None);

        let sent = &bridge.output().sent;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, MSP_SET_RAW_RC);
        let channels = msp_core::decode_channels(&sent[0].1, 16);
        assert_eq!(channels.len(), 16);
        // Unknown phase holds throttle below the arming floor
        assert_eq!(&channels[..4], &[1500, 1500, 1500, 990]);
        assert_eq!(bridge.controller().phase(), Phase::Unknown);
    }

    #[test]
    fn test_send_failure_keeps_running() {
        let quit = QuitSignal::new();
        let ack = Frame::new(MSP_SET_RAW_RC, true, vec![]);
        let mut bridge = bridge(vec![ack, Frame::link_lost()], vec![], &quit, false);
        bridge.output.fail = true;
        assert_eq!(embassy_futures::block_on(bridge.step()), None);
        assert_eq!(embassy_futures::block_on(bridge.step()), Some(Exit::LinkLost));
    }
}
