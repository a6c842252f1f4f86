use anyhow::Context;
use clap::Parser;
use embassy_executor::Spawner;
use log::{error, info};
use msp_core::{negotiate, Controller, Exit, KEY_HELP};
use msp_set_rx::{
    open, spawn_keyboard, spawn_reader, Args, DeviceSpec, FrameChannel, KeyChannel, KeyStrokes,
    LinkFrames, MspWriter, QuitSignal, RcBridge, DEFAULT_DEVICES,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use static_cell::StaticCell;

/// Parsed frames from the link reader thread.
static FRAMES: StaticCell<FrameChannel> = StaticCell::new();
/// Keystrokes from the keyboard thread.
static KEYS: StaticCell<KeyChannel> = StaticCell::new();
/// Set by the SIGINT / SIGTERM handler.
static QUIT: StaticCell<QuitSignal> = StaticCell::new();

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let code = match run(args).await {
        Ok(exit) => exit.code(),
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };
    std::process::exit(code);
}

async fn run(args: Args) -> anyhow::Result<Exit> {
    let spec = match &args.device {
        Some(device) => DeviceSpec::parse(device, args.baud)?,
        None => DeviceSpec::probe(args.baud, &DEFAULT_DEVICES)?,
    };
    info!("Using device {}", spec);

    let link = open(&spec).with_context(|| format!("opening {spec}"))?;

    let frames: &'static FrameChannel = FRAMES.init(FrameChannel::new());
    let keys: &'static KeyChannel = KEYS.init(KeyChannel::new());
    let quit: &'static QuitSignal = QUIT.init(QuitSignal::new());

    spawn_reader(link.reader, frames).context("starting link reader")?;
    let mut output = MspWriter::new(link.writer);
    let mut inbound = LinkFrames::new(frames);

    let caps = negotiate(&mut inbound, &mut output, args.negotiate_options())
        .await
        .context("negotiating with flight controller")?;

    ctrlc::set_handler(move || quit.signal(())).context("installing signal handler")?;
    spawn_keyboard(keys).context("starting keyboard reader")?;
    println!("{}", KEY_HELP);

    let controller = Controller::new(&caps, args.arm, args.verbose);
    let mut bridge = RcBridge::new(
        controller,
        inbound,
        output,
        KeyStrokes::new(keys),
        quit,
        StdRng::from_entropy(),
    );
    let exit = bridge.run().await;
    println!();
    Ok(exit)
}
