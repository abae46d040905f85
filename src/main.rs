//! TNC harness
//!
//! Host-side driver for the data-link core. Runs a controller against the
//! in-memory loopback radio: sends an APRS beacon and an M17 packet, loops
//! them back through the receiver and prints what was decoded.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, LevelFilter, Log, Metadata, Record};

use sdr_tnc::prelude::*;
use sdr_tnc::{LoopbackSdr, Stats};

#[derive(Parser, Debug)]
#[command(name = "tnc-harness", version, about = "Dual-mode M17/AX.25 TNC harness")]
struct Args {
    /// Operating frequency in Hz (both protocols)
    #[arg(short, long)]
    frequency: Option<u32>,

    /// Operating mode: m17, ax25, dual or bridge
    #[arg(short, long)]
    mode: Option<OperatingMode>,

    /// Station callsign
    #[arg(short, long)]
    callsign: Option<String>,

    /// AX.25 SSID
    #[arg(short, long)]
    ssid: Option<u8>,

    /// Settings file to load
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective settings here before running
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// More logging (repeat for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

/// Prints every frame and link event
struct PrintObserver;

impl Observer for PrintObserver {
    fn on_frame(&mut self, direction: Direction, protocol: Protocol, bytes: &[u8]) {
        println!("{direction:?} {protocol:<5} {} bytes", bytes.len());
    }

    fn on_error(&mut self, protocol: Protocol, error: &Error) {
        println!("ERR {protocol:<5} {error}");
    }

    fn on_link(&mut self, event: &sdr_tnc::LinkEvent) {
        println!("LINK {event:?}");
    }
}

fn build_config(args: &Args) -> core::result::Result<ControllerConfig, String> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("{}: {e}", path.display()))?;
            ControllerConfig::parse(&text).map_err(|e| format!("{}: {e}", path.display()))?
        }
        None => ControllerConfig::default(),
    };
    if let Some(hz) = args.frequency {
        let frequency = Frequency::from_hz(hz).ok_or("frequency out of range")?;
        config.m17_frequency = frequency;
        config.ax25_frequency = frequency;
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(callsign) = &args.callsign {
        config.callsign = sdr_tnc::settings::parse_callsign(callsign).map_err(|e| e.to_string())?;
    }
    if let Some(ssid) = args.ssid {
        config.ssid = Ssid::new(ssid).ok_or("ssid above 15")?;
    }
    Ok(config)
}

fn print_stats(stats: &Stats) {
    println!("--- statistics ---");
    for protocol in Protocol::ALL {
        println!(
            "{protocol:<5} rx {:>4} tx {:>4}",
            stats.rx(protocol),
            stats.tx(protocol)
        );
    }
    println!(
        "switches {}  errors {}  conversions failed {}",
        stats.protocol_switches, stats.errors, stats.conversion_errors
    );
    println!("fec corrections {}  overflow {}", stats.fec_corrections, stats.overflow);
}

fn run(config: ControllerConfig) -> sdr_tnc::Result<()> {
    let mut controller = Controller::with_observer(config, PrintObserver)?;
    controller.bind_sdr(LoopbackSdr::new())?;

    let beacon = sdr_tnc::config::bridge::DEFAULT_BEACON;
    if controller.mode().ax25_enabled() {
        controller.send_aprs(beacon)?;
    }
    if controller.mode().m17_enabled() {
        controller.send_m17("@ALL", b"hello from the harness")?;
    }

    let looped = controller.sdr_mut().map_or(0, LoopbackSdr::loop_back);
    info!("harness: {looped} frames looped back");

    controller.start_rx()?;
    let mut buf = [0u8; WIRE_MTU];
    while let Some(received) = controller.receive(&mut buf)? {
        println!("decoded {} ({} bytes)", received.protocol, received.len);
    }
    if let Some(packet) = controller.take_m17_packet() {
        println!("m17 packet: {}", String::from_utf8_lossy(&packet));
    }
    controller.stop_rx()?;

    print_stats(controller.stats());
    Ok(())
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = &args.save_config {
        let mut text = String::new();
        if config.write_to(&mut text).is_err() || fs::write(path, text).is_err() {
            error!("cannot write {}", path.display());
            return ExitCode::FAILURE;
        }
    }

    info!("tnc-harness v{}", env!("CARGO_PKG_VERSION"));
    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
