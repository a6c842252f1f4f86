//! Arm-lifecycle controller.
//!
//! [`Controller`] is the single owner of the phase, the virtual sticks and the
//! last observed status. The async bridge feeds it ticks, frames, keystrokes
//! and interrupts; it never blocks and never touches I/O itself.
//!
//! # Transitions
//!
//! | Event | From | To |
//! |---|---|---|
//! | status: armed | any | LowThrottle |
//! | status: disarmed, ready, auto-arm pending | any | Arming |
//! | status: disarmed, ready | any | Quiescent (exit if quit deferred) |
//! | toggle-arm key | Quiescent | Arming |
//! | toggle-arm key | LowThrottle | Disarming |
//! | quit / interrupt | LowThrottle, Disarming | Disarming, quit deferred |
//! | quit / interrupt | other | exit |
//!
//! A status identical to the previous one causes nothing.

use core::fmt;

use log::{debug, error, info, trace, warn};
use msp_proto::command::{MSP_RC, MSP_SET_RAW_RC};
use msp_proto::Frame;
use rand::Rng;

use crate::boxes::BoxMaskTable;
use crate::channels::{decode_channels, to_payload, RcFrameBuilder};
use crate::negotiate::Capabilities;
use crate::status::{decode_status, describe_arm_flags, is_status_command, StatusCommand, StatusFlags};
use crate::types::{Key, Phase, VirtualRc, STEP};

/// Why the control loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exit {
    /// Quit key, after disarming if needed.
    Quit,
    /// Immediate quit leaving the firmware to fail safe.
    Failsafe,
    /// OS termination signal, after disarming if needed.
    Interrupted,
    /// Transport failed or closed.
    LinkLost,
}

impl Exit {
    /// Process exit status.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Exit::LinkLost => 1,
            Exit::Quit | Exit::Failsafe | Exit::Interrupted => 0,
        }
    }
}

impl fmt::Display for Exit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Exit::Quit => "quit",
            Exit::Failsafe => "exit to failsafe",
            Exit::Interrupted => "interrupted",
            Exit::LinkLost => "link lost",
        })
    }
}

/// What the bridge should do after an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reaction {
    Idle,
    /// Send an empty request for this command.
    Request(u16),
    Exit(Exit),
}

/// Control-loop state machine.
pub struct Controller {
    phase: Phase,
    vrc: VirtualRc,
    last: Option<StatusFlags>,
    auto_arm: bool,
    deferred: Option<Exit>,
    verbose: bool,
    builder: RcFrameBuilder,
    boxes: BoxMaskTable,
    status: StatusCommand,
}

impl Controller {
    /// Start in [`Phase::Unknown`] with the sticks centred at idle throttle.
    #[must_use]
    pub fn new(caps: &Capabilities, auto_arm: bool, verbose: bool) -> Self {
        Self {
            phase: Phase::Unknown,
            vrc: VirtualRc::default(),
            last: None,
            auto_arm,
            deferred: None,
            verbose,
            builder: caps.rc_builder(),
            boxes: caps.boxes.clone(),
            status: caps.status,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn vrc(&self) -> &VirtualRc {
        &self.vrc
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// `true` once a quit waits for the firmware to report disarmed.
    #[must_use]
    pub fn quit_pending(&self) -> bool {
        self.deferred.is_some()
    }

    /// Status command polled after each RC echo.
    #[must_use]
    pub fn status_command(&self) -> StatusCommand {
        self.status
    }

    /// SET_RAW_RC payload for this tick.
    pub fn tx_payload<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<u8> {
        let channels = self.builder.build(self.phase, &self.vrc, rng);
        if self.verbose {
            info!("Tx: {:?}", channels);
        } else {
            trace!("Tx: {:?}", channels);
        }
        to_payload(&channels)
    }

    /// React to an inbound frame.
    pub fn on_frame(&mut self, frame: &Frame) -> Reaction {
        if frame.is_link_lost() {
            error!("link lost");
            return Reaction::Exit(Exit::LinkLost);
        }
        if !frame.ok {
            warn!("MSP {} ({:#x}) failed", frame.cmd, frame.cmd);
            return Reaction::Idle;
        }
        match frame.cmd {
            MSP_SET_RAW_RC => {
                if self.verbose {
                    Reaction::Request(MSP_RC)
                } else {
                    Reaction::Request(self.status.id())
                }
            }
            MSP_RC => {
                let channels = decode_channels(&frame.payload, self.builder.channel_count());
                info!("Rx: {:?}", channels);
                Reaction::Request(self.status.id())
            }
            cmd if is_status_command(cmd) => match decode_status(frame) {
                Some(flags) => self.on_status(flags),
                None => {
                    warn!("short status reply {} ({} bytes)", cmd, frame.len());
                    Reaction::Idle
                }
            },
            cmd => {
                debug!("unsolicited {}, length {}", cmd, frame.len());
                Reaction::Idle
            }
        }
    }

    fn on_status(&mut self, flags: StatusFlags) -> Reaction {
        if self.last == Some(flags) {
            return Reaction::Idle;
        }
        self.last = Some(flags);
        info!(
            "Box: {} ({:x}) Arm: {}",
            self.boxes.describe(flags.box_flags),
            flags.box_flags,
            describe_arm_flags(flags.arm_flags)
        );
        self.vrc.failsafe = self.boxes.is_failsafe(flags.box_flags);

        if self.boxes.is_armed(flags.box_flags) {
            self.set_phase(Phase::LowThrottle);
        } else if flags.ready_to_arm() {
            if self.auto_arm {
                self.auto_arm = false;
                self.set_phase(Phase::Arming);
            } else {
                self.set_phase(Phase::Quiescent);
                if let Some(exit) = self.deferred {
                    return Reaction::Exit(exit);
                }
            }
        }
        Reaction::Idle
    }

    /// React to a keystroke.
    pub fn on_key(&mut self, key: Key) -> Reaction {
        match key {
            Key::ToggleArm => match self.phase {
                Phase::Quiescent => {
                    info!("Arming commanded");
                    self.set_phase(Phase::Arming);
                }
                Phase::LowThrottle => {
                    info!("Disarming commanded");
                    self.set_phase(Phase::Disarming);
                }
                _ => {}
            },
            Key::Quit => {
                info!("Quit commanded");
                return self.safe_quit(Exit::Quit);
            }
            Key::QuitToFailsafe => {
                info!("Exit to failsafe commanded");
                return Reaction::Exit(Exit::Failsafe);
            }
            Key::ToggleVerbose => self.verbose = !self.verbose,
            Key::ThrottleUp => self.vrc.adjust_throttle(STEP),
            Key::ThrottleDown => self.vrc.adjust_throttle(-STEP),
            Key::Center => {
                info!("Centering the sticks");
                self.vrc.center();
            }
            Key::Stick(axis, delta) => self.vrc.adjust(axis, delta),
        }
        Reaction::Idle
    }

    /// React to an OS termination signal.
    pub fn on_interrupt(&mut self) -> Reaction {
        info!("Interrupt");
        self.safe_quit(Exit::Interrupted)
    }

    /// Never leave the craft armed: disarm first and wait for confirmation.
    fn safe_quit(&mut self, exit: Exit) -> Reaction {
        self.auto_arm = false;
        match self.phase {
            Phase::LowThrottle | Phase::Disarming => {
                self.set_phase(Phase::Disarming);
                self.deferred = Some(exit);
                Reaction::Idle
            }
            _ => Reaction::Exit(exit),
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            info!("phase: {} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::{ArmConfig, ChannelTrigger};
    use crate::types::{Axis, STICK_LIMIT, THROTTLE_MAX};
    use msp_proto::command::{MSP2_INAV_STATUS, MSP_STATUS_EX};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const ARMED: u64 = 0b001;
    const FAILSAFE: u64 = 0b100;

    fn caps() -> Capabilities {
        Capabilities {
            channel_count: 18,
            boxes: BoxMaskTable::parse(b"ARM;ANGLE;FAILSAFE"),
            arm: ArmConfig {
                arm: Some(ChannelTrigger {
                    channel: 4,
                    pulse: 1900,
                }),
                angle: None,
            },
            status: StatusCommand::Inav,
            ..Capabilities::default()
        }
    }

    fn status(box_flags: u64, arm_flags: u32) -> Frame {
        let mut payload = vec![0u8; 21];
        payload[9..13].copy_from_slice(&arm_flags.to_le_bytes());
        payload[13..21].copy_from_slice(&box_flags.to_le_bytes());
        Frame::new(MSP2_INAV_STATUS, true, payload)
    }

    fn armed_controller() -> Controller {
        let mut ctl = Controller::new(&caps(), false, false);
        ctl.on_frame(&status(ARMED, 0));
        assert_eq!(ctl.phase(), Phase::LowThrottle);
        ctl
    }

    fn channels(ctl: &Controller) -> Vec<u16> {
        let payload = ctl.tx_payload(&mut StdRng::seed_from_u64(1));
        decode_channels(&payload, 18)
    }

    #[test]
    fn test_starts_unknown() {
        let ctl = Controller::new(&caps(), false, false);
        assert_eq!(ctl.phase(), Phase::Unknown);
        assert_eq!(channels(&ctl)[3], 990);
    }

    #[test]
    fn test_first_status_never_deduplicated() {
        let mut ctl = Controller::new(&caps(), false, false);
        assert_eq!(ctl.on_frame(&status(0, 0)), Reaction::Idle);
        assert_eq!(ctl.phase(), Phase::Quiescent);
    }

    #[test]
    fn test_quiescent_to_low_throttle_and_back() {
        let mut ctl = Controller::new(&caps(), false, false);
        ctl.on_frame(&status(0, 0));
        ctl.on_frame(&status(ARMED, 0x04));
        assert_eq!(ctl.phase(), Phase::LowThrottle);
        ctl.on_frame(&status(0, 0));
        assert_eq!(ctl.phase(), Phase::Quiescent);
    }

    #[test]
    fn test_blocked_arming_keeps_phase() {
        let mut ctl = Controller::new(&caps(), true, false);
        ctl.on_frame(&status(0, 0x80 | 0x40000));
        assert_eq!(ctl.phase(), Phase::Unknown);
        ctl.on_frame(&status(0, 0));
        assert_eq!(ctl.phase(), Phase::Arming);
    }

    #[test]
    fn test_auto_arm_consumed_once() {
        let mut ctl = Controller::new(&caps(), true, false);
        ctl.on_frame(&status(0, 0));
        assert_eq!(ctl.phase(), Phase::Arming);
        ctl.on_frame(&status(ARMED, 0x04));
        ctl.on_frame(&status(0, 0));
        assert_eq!(ctl.phase(), Phase::Quiescent);
    }

    #[test]
    fn test_duplicate_status_ignored() {
        let mut ctl = Controller::new(&caps(), false, false);
        ctl.on_frame(&status(0, 0));
        ctl.on_key(Key::ToggleArm);
        assert_eq!(ctl.phase(), Phase::Arming);
        // unchanged status must not knock the phase back to quiescent
        ctl.on_frame(&status(0, 0));
        assert_eq!(ctl.phase(), Phase::Arming);
    }

    #[test]
    fn test_toggle_arm() {
        let mut ctl = armed_controller();
        ctl.on_key(Key::ToggleArm);
        assert_eq!(ctl.phase(), Phase::Disarming);
        // no effect while disarming
        ctl.on_key(Key::ToggleArm);
        assert_eq!(ctl.phase(), Phase::Disarming);
    }

    #[test]
    fn test_safe_quit_from_quiescent_is_immediate() {
        let mut ctl = Controller::new(&caps(), false, false);
        ctl.on_frame(&status(0, 0));
        assert_eq!(ctl.on_key(Key::Quit), Reaction::Exit(Exit::Quit));
        assert!(!ctl.quit_pending());
    }

    #[test]
    fn test_safe_quit_from_low_throttle_defers() {
        let mut ctl = armed_controller();
        assert_eq!(ctl.on_key(Key::Quit), Reaction::Idle);
        assert_eq!(ctl.phase(), Phase::Disarming);
        assert!(ctl.quit_pending());

        assert_eq!(channels(&ctl)[..4], [1500, 1500, 1500, 1000]);
        assert_eq!(ctl.on_frame(&status(0, 0x08)), Reaction::Exit(Exit::Quit));
    }

    #[test]
    fn test_interrupt_defers_while_armed() {
        let mut ctl = armed_controller();
        assert_eq!(ctl.on_interrupt(), Reaction::Idle);
        assert_eq!(channels(&ctl)[4], 999);
        assert_eq!(ctl.on_frame(&status(0, 0)), Reaction::Exit(Exit::Interrupted));
    }

    #[test]
    fn test_failsafe_key_is_immediate() {
        let mut ctl = armed_controller();
        assert_eq!(ctl.on_key(Key::QuitToFailsafe), Reaction::Exit(Exit::Failsafe));
    }

    #[test]
    fn test_link_lost_ends_loop() {
        let mut ctl = armed_controller();
        ctl.on_key(Key::Quit);
        assert_eq!(ctl.on_frame(&Frame::link_lost()), Reaction::Exit(Exit::LinkLost));
        assert_eq!(Exit::LinkLost.code(), 1);
        assert_eq!(Exit::Interrupted.code(), 0);
    }

    #[test]
    fn test_error_reply_not_terminal() {
        let mut ctl = Controller::new(&caps(), false, false);
        let reaction = ctl.on_frame(&Frame::new(MSP_SET_RAW_RC, false, Vec::new()));
        assert_eq!(reaction, Reaction::Idle);
    }

    #[test]
    fn test_rc_echo_requests_telemetry() {
        let mut ctl = Controller::new(&caps(), false, false);
        let echo = Frame::new(MSP_SET_RAW_RC, true, Vec::new());
        assert_eq!(ctl.on_frame(&echo), Reaction::Request(MSP2_INAV_STATUS));

        ctl.on_key(Key::ToggleVerbose);
        assert!(ctl.verbose());
        assert_eq!(ctl.on_frame(&echo), Reaction::Request(MSP_RC));

        let readback = Frame::new(MSP_RC, true, vec![0xDC, 0x05, 0xE8, 0x03]);
        assert_eq!(ctl.on_frame(&readback), Reaction::Request(MSP2_INAV_STATUS));
    }

    #[test]
    fn test_any_status_command_decoded() {
        let mut ctl = Controller::new(&caps(), false, false);
        let mut payload = vec![0u8; 15];
        payload[6] = ARMED as u8;
        ctl.on_frame(&Frame::new(MSP_STATUS_EX, true, payload));
        assert_eq!(ctl.phase(), Phase::LowThrottle);
    }

    #[test]
    fn test_short_status_ignored() {
        let mut ctl = Controller::new(&caps(), false, false);
        let frame = Frame::new(MSP2_INAV_STATUS, true, vec![0; 12]);
        assert_eq!(ctl.on_frame(&frame), Reaction::Idle);
        assert_eq!(ctl.phase(), Phase::Unknown);
    }

    #[test]
    fn test_failsafe_flag_tracks_box() {
        let mut ctl = Controller::new(&caps(), false, false);
        ctl.on_frame(&status(FAILSAFE, 0x80));
        assert!(ctl.vrc().failsafe);
        ctl.on_frame(&status(0, 0x80));
        assert!(!ctl.vrc().failsafe);
    }

    #[test]
    fn test_keys_move_sticks_within_limits() {
        let mut ctl = Controller::new(&caps(), false, false);
        for _ in 0..60 {
            ctl.on_key(Key::ThrottleUp);
            ctl.on_key(Key::Stick(Axis::Roll, -STEP));
        }
        assert_eq!(ctl.vrc().throttle, THROTTLE_MAX);
        assert_eq!(ctl.vrc().roll, -STICK_LIMIT);
        ctl.on_key(Key::Center);
        assert_eq!(ctl.vrc().roll, 0);
        assert_eq!(ctl.phase(), Phase::Unknown);
    }

    #[test]
    fn test_low_throttle_follows_virtual_stick() {
        let mut ctl = armed_controller();
        for _ in 0..4 {
            ctl.on_key(Key::ThrottleUp);
        }
        let tx = channels(&ctl);
        assert_eq!(tx[3], 1100);
        assert_eq!(tx[4], 1900);
    }
}
