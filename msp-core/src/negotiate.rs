//! Startup capability negotiation.
//!
//! A strictly sequential request/response exchange, one request in flight:
//!
//! ```text
//! API_VERSION → FC_VARIANT → FC_VERSION → BUILD_INFO → BOARD_INFO
//!   → [COMMON_SETTING, v2 only] → RX_MAP → NAME → BOXNAMES → MODE_RANGES
//! ```
//!
//! [`Negotiator`] is the sans-IO state machine; [`negotiate`] drives it over a
//! [`FrameSource`] and an [`MspSink`]. There is no timeout: a silent device
//! hangs negotiation.

use core::fmt;

use log::{info, warn};
use msp_proto::command::{
    MSP2_COMMON_SETTING, MSP_API_VERSION, MSP_BOARD_INFO, MSP_BOXNAMES, MSP_BUILD_INFO,
    MSP_FC_VARIANT, MSP_FC_VERSION, MSP_MODE_RANGES, MSP_NAME, MSP_RX_MAP,
};
use msp_proto::{Frame, Version};

use crate::boxes::BoxMaskTable;
use crate::channels::{ChannelMap, RcFrameBuilder, CHANNELS, LEGACY_CHANNELS};
use crate::input::FrameSource;
use crate::modes::{ArmConfig, ModeRangeTable};
use crate::output::{MspSink, OutputError};
use crate::status::StatusCommand;
use crate::types::{ApiVersion, FirmwareVersion};

/// Setting queried to detect the arming-safety bypass.
pub const ARMING_SAFETY_SETTING: &str = "nav_extra_arming_safety";

/// Setting value meaning "allow bypass".
const BYPASS: u8 = 2;

/// Firmware major version that shifted the setting's enum by one.
const SETTING_SHIFT_SINCE_MAJOR: u8 = 6;

/// BUILD_INFO: date (11) and time (8) precede the git revision.
const GIT_REV_OFFSET: usize = 19;

/// BOARD_INFO: the board name follows 9 bytes of ids and capabilities.
const BOARD_NAME_OFFSET: usize = 9;

/// Error type for negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiateError {
    /// Transport closed or failed before negotiation finished.
    LinkLost,
    /// A request could not be sent.
    Output(OutputError),
}

impl fmt::Display for NegotiateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiateError::LinkLost => f.write_str("link lost during negotiation"),
            NegotiateError::Output(e) => write!(f, "negotiation request failed: {e}"),
        }
    }
}

impl std::error::Error for NegotiateError {}

/// User options that shape negotiation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NegotiateOptions {
    /// Use v2 framing whatever the API version.
    pub force_v2: bool,
    /// Role map kept when RX_MAP gives nothing usable.
    pub map: ChannelMap,
    /// 1-based aux channel overriding the derived arm switch.
    pub arm_switch: Option<u8>,
}

/// Everything learned about the flight controller.
///
/// Immutable once negotiation completes; threaded into the controller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub api: ApiVersion,
    pub version: Version,
    pub firmware: FirmwareVersion,
    pub variant: String,
    pub board: String,
    pub git_rev: String,
    pub name: String,
    pub arming_bypass: bool,
    pub channel_count: usize,
    pub channel_map: ChannelMap,
    pub boxes: BoxMaskTable,
    pub modes: ModeRangeTable,
    pub arm: ArmConfig,
    pub status: StatusCommand,
}

impl Capabilities {
    /// RC frame builder for this controller.
    #[must_use]
    pub fn rc_builder(&self) -> RcFrameBuilder {
        RcFrameBuilder::new(self.channel_count, self.channel_map, self.arm)
    }
}

/// One outgoing request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub cmd: u16,
    pub payload: Vec<u8>,
}

impl Request {
    fn empty(cmd: u16) -> Self {
        Self {
            cmd,
            payload: Vec::new(),
        }
    }
}

/// Outcome of feeding one frame to the negotiator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Send this request next.
    Send(Request),
    /// Negotiation complete.
    Done(Box<Capabilities>),
    /// Frame was not the expected reply and was ignored.
    Unsolicited,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    ApiVersion,
    Variant,
    FcVersion,
    BuildInfo,
    BoardInfo,
    ArmingSafety,
    RxMap,
    Name,
    BoxNames,
    ModeRanges,
}

impl Stage {
    const fn cmd(self) -> u16 {
        match self {
            Stage::ApiVersion => MSP_API_VERSION,
            Stage::Variant => MSP_FC_VARIANT,
            Stage::FcVersion => MSP_FC_VERSION,
            Stage::BuildInfo => MSP_BUILD_INFO,
            Stage::BoardInfo => MSP_BOARD_INFO,
            Stage::ArmingSafety => MSP2_COMMON_SETTING,
            Stage::RxMap => MSP_RX_MAP,
            Stage::Name => MSP_NAME,
            Stage::BoxNames => MSP_BOXNAMES,
            Stage::ModeRanges => MSP_MODE_RANGES,
        }
    }
}

/// Sans-IO negotiation state machine.
pub struct Negotiator {
    options: NegotiateOptions,
    stage: Stage,
    caps: Capabilities,
}

impl Negotiator {
    #[must_use]
    pub fn new(options: NegotiateOptions) -> Self {
        let caps = Capabilities {
            version: if options.force_v2 {
                Version::V2
            } else {
                Version::V1
            },
            channel_count: CHANNELS,
            channel_map: options.map,
            ..Capabilities::default()
        };
        Self {
            options,
            stage: Stage::ApiVersion,
            caps,
        }
    }

    /// The first request.
    #[must_use]
    pub fn start(&self) -> Request {
        Request::empty(MSP_API_VERSION)
    }

    /// Command id of the reply currently awaited.
    #[must_use]
    pub fn expected(&self) -> u16 {
        self.stage.cmd()
    }

    /// Framing to use for the next request.
    #[must_use]
    pub fn version(&self) -> Version {
        self.caps.version
    }

    /// Feed one inbound frame.
    pub fn handle(&mut self, frame: &Frame) -> Result<Step, NegotiateError> {
        if frame.is_link_lost() {
            return Err(NegotiateError::LinkLost);
        }
        if frame.cmd != self.stage.cmd() {
            warn!("unsolicited {}, length {}", frame.cmd, frame.len());
            return Ok(Step::Unsolicited);
        }
        if !frame.ok {
            warn!("command {} rejected by flight controller", frame.cmd);
        }
        let data: &[u8] = if frame.ok { &frame.payload } else { &[] };

        let next = match self.stage {
            Stage::ApiVersion => {
                self.on_api_version(data);
                Stage::Variant
            }
            Stage::Variant => {
                if let Some(variant) = data.get(..4) {
                    self.caps.variant = text(variant);
                }
                Stage::FcVersion
            }
            Stage::FcVersion => {
                if let [major, minor, patch, ..] = *data {
                    self.caps.firmware = FirmwareVersion::new(major, minor, patch);
                    if major == 1 {
                        self.caps.channel_count = LEGACY_CHANNELS;
                    }
                }
                Stage::BuildInfo
            }
            Stage::BuildInfo => {
                if let Some(rev) = data.get(GIT_REV_OFFSET..) {
                    self.caps.git_rev = text(rev);
                }
                Stage::BoardInfo
            }
            Stage::BoardInfo => {
                self.on_board_info(data);
                if self.caps.version == Version::V2 {
                    let mut payload = ARMING_SAFETY_SETTING.as_bytes().to_vec();
                    payload.push(0);
                    self.stage = Stage::ArmingSafety;
                    return Ok(Step::Send(Request {
                        cmd: MSP2_COMMON_SETTING,
                        payload,
                    }));
                }
                Stage::RxMap
            }
            Stage::ArmingSafety => {
                self.on_arming_safety(data);
                Stage::RxMap
            }
            Stage::RxMap => {
                self.on_rx_map(data);
                Stage::Name
            }
            Stage::Name => {
                if !data.is_empty() {
                    self.caps.name = text(data);
                    info!("name: \"{}\"", self.caps.name);
                }
                Stage::BoxNames
            }
            Stage::BoxNames => {
                if data.is_empty() {
                    warn!("no boxes reported");
                } else {
                    info!("box: {}", String::from_utf8_lossy(data));
                }
                self.caps.boxes = BoxMaskTable::parse(data);
                Stage::ModeRanges
            }
            Stage::ModeRanges => {
                self.caps.modes = ModeRangeTable::decode(data);
                return Ok(Step::Done(Box::new(self.finish())));
            }
        };
        self.stage = next;
        Ok(Step::Send(Request::empty(next.cmd())))
    }

    fn on_api_version(&mut self, data: &[u8]) {
        // byte 0 is the protocol version
        let [_, major, minor, ..] = *data else {
            warn!("short API_VERSION reply ({} bytes)", data.len());
            return;
        };
        self.caps.api = ApiVersion { major, minor };
        if major >= 2 {
            self.caps.version = Version::V2;
        }
    }

    fn on_board_info(&mut self, data: &[u8]) {
        let board = if data.len() >= BOARD_NAME_OFFSET {
            data.get(BOARD_NAME_OFFSET..)
        } else {
            data.get(..4)
        };
        if let Some(board) = board {
            self.caps.board = text(board);
        }
        let caps = &self.caps;
        info!(
            "{} v{} {} ({}) API {}",
            caps.variant, caps.firmware, caps.board, caps.git_rev, caps.api
        );
    }

    fn on_arming_safety(&mut self, data: &[u8]) {
        let Some(&raw) = data.first() else {
            return;
        };
        let value = if self.caps.firmware.major >= SETTING_SHIFT_SINCE_MAJOR {
            raw.saturating_add(1)
        } else {
            raw
        };
        self.caps.arming_bypass = value == BYPASS;
        info!(
            "{}: {} (bypass {})",
            ARMING_SAFETY_SETTING, value, self.caps.arming_bypass
        );
    }

    fn on_rx_map(&mut self, data: &[u8]) {
        match ChannelMap::from_rx_map(data) {
            Some(map) => self.caps.channel_map = map,
            None => warn!(
                "unusable RX_MAP reply {:?}, keeping {}",
                data, self.caps.channel_map
            ),
        }
        info!("map: {}", self.caps.channel_map);
    }

    fn finish(&mut self) -> Capabilities {
        let mut caps = core::mem::take(&mut self.caps);
        caps.arm = caps.modes.arm_config();
        if let Some(channel) = self.options.arm_switch {
            caps.arm = caps.arm.with_arm_switch(channel);
        }
        caps.status = StatusCommand::select(caps.api, caps.firmware);
        caps
    }
}

/// Run negotiation to completion over `input` and `output`.
pub async fn negotiate<I: FrameSource, O: MspSink>(
    input: &mut I,
    output: &mut O,
    options: NegotiateOptions,
) -> Result<Capabilities, NegotiateError> {
    let mut negotiator = Negotiator::new(options);
    let mut request = negotiator.start();
    loop {
        output.set_version(negotiator.version());
        output
            .send(request.cmd, &request.payload)
            .await
            .map_err(NegotiateError::Output)?;

        request = loop {
            let frame = input.receive().await;
            match negotiator.handle(&frame)? {
                Step::Send(next) => break next,
                Step::Done(caps) => return Ok(*caps),
                Step::Unsolicited => {}
            }
        };
    }
}

/// Payload bytes as text, trailing NULs dropped.
fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .to_owned()
}
