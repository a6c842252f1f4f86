//! Command-line options.

use clap::Parser;
use msp_core::{ChannelMap, MapError, NegotiateOptions};

/// Drive a flight controller's RC input over MSP from the keyboard.
#[derive(Parser, Debug, Clone)]
#[command(name = "msp-set-rx", version, about)]
pub struct Args {
    /// Serial baud rate when the device string has no `@baud`
    #[arg(short, long, default_value_t = 115_200)]
    pub baud: u32,

    /// Device: path[@baud], tcp://host:port, udp://host:port[/peer:port] or bt://addr
    #[arg(short, long)]
    pub device: Option<String>,

    /// Arm automatically once the firmware reports ready-to-arm
    #[arg(short, long)]
    pub arm: bool,

    /// Use this aux channel (5-8) as the arm switch, 2000µs arms
    #[arg(short = 'A', long, value_parser = clap::value_parser!(u8).range(5..=8))]
    pub arm_switch: Option<u8>,

    /// Force MSP v2 framing
    #[arg(short = '2', long)]
    pub msp2: bool,

    /// Fallback channel map when the firmware does not report one
    #[arg(short, long, default_value = "AERT", value_parser = parse_map)]
    pub map: ChannelMap,

    /// Start with RC readback and TX dump enabled
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Negotiation settings carried by these options.
    #[must_use]
    pub fn negotiate_options(&self) -> NegotiateOptions {
        NegotiateOptions {
            force_v2: self.msp2,
            map: self.map,
            arm_switch: self.arm_switch,
        }
    }
}

fn parse_map(text: &str) -> Result<ChannelMap, MapError> {
    ChannelMap::parse(text)
}
