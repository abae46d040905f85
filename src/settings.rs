//! Runtime controller settings
//!
//! A [`ControllerConfig`] is what the harness builds from the command line
//! or a settings file. The text form is one `key=value` per line; blank
//! lines and lines starting with `#` are ignored, unknown keys are skipped
//! with a warning.
//!
//! ```text
//! mode=dual
//! m17_frequency=144800000
//! ax25_frequency=144390000
//! ax25_callsign=N0CALL
//! ax25_ssid=7
//! ```

use core::fmt::{self, Write};
use core::str::FromStr;

use heapless::{String, Vec};
use log::warn;

use crate::ax25::address::{is_callsign_char, MAX_CALLSIGN_LEN};
use crate::config::{
    DEFAULT_BANDWIDTH_HZ, DEFAULT_CALLSIGN, DEFAULT_FREQUENCY, DEFAULT_GAIN_DB, DEFAULT_MODE,
    DEFAULT_PROTOCOL_TIMEOUT_MS, DEFAULT_SCAN_DWELL_MS, MAX_SCAN_CHANNELS,
};
use crate::error::{Error, Result};
use crate::types::{Can, Frequency, OperatingMode, Ssid, TxFec};

/// Controller settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Protocols in use
    pub mode: OperatingMode,
    /// Frequency for M17
    pub m17_frequency: Frequency,
    /// Frequency for AX.25, APRS, FX.25 and IL2P
    pub ax25_frequency: Frequency,
    /// Channel bandwidth in Hz
    pub bandwidth: u32,
    /// Transmit gain in dB
    pub tx_gain: i8,
    /// Receive gain in dB
    pub rx_gain: i8,
    /// Allow transmitting while receiving
    pub full_duplex: bool,
    /// Milliseconds before the active protocol decays
    pub protocol_timeout_ms: u32,
    /// Station callsign (AX.25 form)
    pub callsign: String<MAX_CALLSIGN_LEN>,
    /// Station SSID
    pub ssid: Ssid,
    /// M17 channel access number
    pub can: Can,
    /// Scan list
    pub scan_channels: Vec<Frequency, MAX_SCAN_CHANNELS>,
    /// Milliseconds per scan channel
    pub scan_dwell_ms: u32,
    /// FEC wrapped around outbound AX.25
    pub fec: TxFec,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        let mut callsign = String::new();
        let _ = callsign.push_str(DEFAULT_CALLSIGN);
        Self {
            mode: DEFAULT_MODE,
            m17_frequency: DEFAULT_FREQUENCY,
            ax25_frequency: DEFAULT_FREQUENCY,
            bandwidth: DEFAULT_BANDWIDTH_HZ,
            tx_gain: DEFAULT_GAIN_DB,
            rx_gain: DEFAULT_GAIN_DB,
            full_duplex: false,
            protocol_timeout_ms: DEFAULT_PROTOCOL_TIMEOUT_MS,
            callsign,
            ssid: Ssid::default(),
            can: Can::default(),
            scan_channels: Vec::new(),
            scan_dwell_ms: DEFAULT_SCAN_DWELL_MS,
            fec: TxFec::None,
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidArgument("expected true or false")),
    }
}

fn parse_num<T: FromStr>(value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::InvalidArgument("expected a number"))
}

fn parse_frequency(value: &str) -> Result<Frequency> {
    Frequency::from_hz(parse_num(value)?).ok_or(Error::InvalidArgument("frequency out of range"))
}

/// Validate and uppercase an AX.25 station callsign
///
/// # Errors
///
/// `InvalidArgument` unless 1..=6 characters `[A-Za-z0-9]`.
pub fn parse_callsign(value: &str) -> Result<String<MAX_CALLSIGN_LEN>> {
    let mut text = String::new();
    for c in value.bytes().map(|c| c.to_ascii_uppercase()) {
        if !is_callsign_char(c) {
            return Err(Error::InvalidArgument("callsign character"));
        }
        text.push(char::from(c))
            .map_err(|()| Error::InvalidArgument("callsign too long"))?;
    }
    if text.is_empty() {
        return Err(Error::InvalidArgument("empty callsign"));
    }
    Ok(text)
}

impl ControllerConfig {
    /// Defaults overridden by `text`
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a malformed line or value.
    pub fn parse(text: &str) -> Result<Self> {
        let mut config = Self::default();
        config.merge(text)?;
        Ok(config)
    }

    /// Apply the settings in `text` on top of `self`
    ///
    /// The enable flags are resolved after every line is read, so their
    /// order does not matter. On error `self` is left unchanged.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a malformed line or value, or if both
    /// protocols end up disabled.
    pub fn merge(&mut self, text: &str) -> Result<()> {
        let mut next = self.clone();
        let mut m17_enabled = None;
        let mut ax25_enabled = None;

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or(Error::InvalidArgument("setting line without '='"))?;
            let value = value.trim();
            match key.trim() {
                "mode" => next.mode = value.parse()?,
                "m17_enabled" => m17_enabled = Some(parse_bool(value)?),
                "ax25_enabled" => ax25_enabled = Some(parse_bool(value)?),
                "m17_frequency" => next.m17_frequency = parse_frequency(value)?,
                "ax25_frequency" => next.ax25_frequency = parse_frequency(value)?,
                "m17_can" => {
                    next.can = Can::new(parse_num(value)?)
                        .ok_or(Error::InvalidArgument("can above 15"))?;
                }
                "ax25_callsign" => next.callsign = parse_callsign(value)?,
                "ax25_ssid" => {
                    next.ssid = Ssid::new(parse_num(value)?)
                        .ok_or(Error::InvalidArgument("ssid above 15"))?;
                }
                "bandwidth" => next.bandwidth = parse_num(value)?,
                "tx_gain" => next.tx_gain = parse_num(value)?,
                "rx_gain" => next.rx_gain = parse_num(value)?,
                "full_duplex" => next.full_duplex = parse_bool(value)?,
                "protocol_timeout" => next.protocol_timeout_ms = parse_num(value)?,
                "scan_dwell" => next.scan_dwell_ms = parse_num(value)?,
                "ax25_fec" => next.fec = value.parse()?,
                "scan_channels" => {
                    next.scan_channels.clear();
                    for item in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                        next.scan_channels
                            .push(parse_frequency(item)?)
                            .map_err(|_| Error::InvalidArgument("too many scan channels"))?;
                    }
                }
                other => warn!("settings: ignoring unknown key {other}"),
            }
        }

        if m17_enabled.is_some() || ax25_enabled.is_some() {
            let m17 = m17_enabled.unwrap_or(next.mode.m17_enabled());
            let ax25 = ax25_enabled.unwrap_or(next.mode.ax25_enabled());
            if !(next.mode == OperatingMode::Bridge && m17 && ax25) {
                next.mode = OperatingMode::from_flags(m17, ax25)
                    .ok_or(Error::InvalidArgument("no protocol enabled"))?;
            }
        }
        *self = next;
        Ok(())
    }

    /// Write every setting in the text form
    ///
    /// # Errors
    ///
    /// Whatever the writer reports.
    pub fn write_to<W: Write>(&self, out: &mut W) -> fmt::Result {
        writeln!(out, "mode={}", self.mode)?;
        writeln!(out, "m17_enabled={}", self.mode.m17_enabled())?;
        writeln!(out, "ax25_enabled={}", self.mode.ax25_enabled())?;
        writeln!(out, "m17_frequency={}", self.m17_frequency.as_hz())?;
        writeln!(out, "ax25_frequency={}", self.ax25_frequency.as_hz())?;
        writeln!(out, "m17_can={}", self.can.value())?;
        writeln!(out, "ax25_callsign={}", self.callsign)?;
        writeln!(out, "ax25_ssid={}", self.ssid.value())?;
        writeln!(out, "bandwidth={}", self.bandwidth)?;
        writeln!(out, "tx_gain={}", self.tx_gain)?;
        writeln!(out, "rx_gain={}", self.rx_gain)?;
        writeln!(out, "full_duplex={}", self.full_duplex)?;
        writeln!(out, "protocol_timeout={}", self.protocol_timeout_ms)?;
        writeln!(out, "ax25_fec={}", self.fec)?;
        writeln!(out, "scan_dwell={}", self.scan_dwell_ms)?;
        out.write_str("scan_channels=")?;
        for (i, f) in self.scan_channels.iter().enumerate() {
            if i > 0 {
                out.write_char(',')?;
            }
            write!(out, "{}", f.as_hz())?;
        }
        out.write_char('\n')
    }
}
