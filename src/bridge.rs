//! M17 <-> AX.25 bridge
//!
//! Stateless converters between the two link layers plus the callsign
//! mapping table they consult:
//!
//! - an M17 Link Setup Frame becomes an APRS position beacon,
//! - an M17 packet frame becomes an AX.25 UI frame to `QQQQQQ`,
//! - an AX.25 UI frame becomes an M17 packet (LSF plus packet frames).

pub mod aprs;
pub mod mapping;

pub use mapping::{Mapping, MappingTable};

use heapless::Vec;
use log::debug;

use crate::ax25::frame::{Control, UnnumberedKind};
use crate::ax25::{Address, Frame, PID_NO_LAYER3};
use crate::config::bridge::{DEFAULT_BEACON, PACKET_INFO_LEN, RELAY_DESTINATION};
use crate::error::{Error, Result};
use crate::m17::lsf::{Lsf, LsfType};
use crate::m17::packet::{packetize, PacketFrame, MAX_FRAMES};
use crate::types::Can;
use aprs::{InfoText, PositionReport};

/// APRS destination for beacons
pub const APRS_DESTINATION: &str = "APRS";

/// Comment appended to converted positions
pub const POSITION_COMMENT: &str = "M17";

/// M17 packet produced from an AX.25 frame
pub type M17Packet = (Lsf, Vec<PacketFrame, MAX_FRAMES>);

/// Bridge station and mapping table
#[derive(Clone, Debug)]
pub struct Bridge {
    station: Address,
    can: Can,
    beacon: Option<InfoText>,
    mappings: MappingTable,
}

impl Bridge {
    /// Bridge transmitting AX.25 as `callsign-ssid`
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an invalid callsign or SSID.
    pub fn new(callsign: &str, ssid: u8) -> Result<Self> {
        Ok(Self {
            station: Address::new(callsign, ssid)?,
            can: Can::default(),
            beacon: None,
            mappings: MappingTable::new(),
        })
    }

    /// Bridge station address
    #[must_use]
    pub const fn station(&self) -> &Address {
        &self.station
    }

    /// Change the bridge station
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an invalid callsign or SSID.
    pub fn set_station(&mut self, callsign: &str, ssid: u8) -> Result<()> {
        self.station = Address::new(callsign, ssid)?;
        Ok(())
    }

    /// CAN used for M17 packets built from AX.25
    #[must_use]
    pub const fn can(&self) -> Can {
        self.can
    }

    /// Change the CAN
    pub fn set_can(&mut self, can: Can) {
        self.can = can;
    }

    /// Use `info` as the beacon for LSFs without a position
    ///
    /// # Errors
    ///
    /// `InvalidArgument` unless `info` is an APRS position (starts with `!`)
    /// and fits in an info field.
    pub fn set_beacon(&mut self, info: &str) -> Result<()> {
        if !info.starts_with('!') {
            return Err(Error::InvalidArgument("beacon must be a position report"));
        }
        let text = InfoText::try_from(info).map_err(|()| Error::InvalidArgument("beacon too long"))?;
        self.beacon = Some(text);
        Ok(())
    }

    /// Fall back to the built-in beacon
    pub fn clear_beacon(&mut self) {
        self.beacon = None;
    }

    /// Beacon text in use
    #[must_use]
    pub fn beacon(&self) -> &str {
        self.beacon.as_deref().unwrap_or(DEFAULT_BEACON)
    }

    /// Mapping table
    #[must_use]
    pub const fn mappings(&self) -> &MappingTable {
        &self.mappings
    }

    /// Mutable mapping table
    pub fn mappings_mut(&mut self) -> &mut MappingTable {
        &mut self.mappings
    }

    /// See [`MappingTable::add`]
    ///
    /// # Errors
    ///
    /// As [`MappingTable::add`].
    pub fn add_mapping(&mut self, m17: &str, ax25: &str, ssid: u8) -> Result<()> {
        self.mappings.add(m17, ax25, ssid)
    }

    /// See [`MappingTable::remove`]
    ///
    /// # Errors
    ///
    /// As [`MappingTable::remove`].
    pub fn remove_mapping(&mut self, m17: &str) -> Result<()> {
        self.mappings.remove(m17).map(|_| ())
    }

    /// APRS beacon for an M17 Link Setup Frame
    ///
    /// # Errors
    ///
    /// - `Malformed` if the LSF source does not decode.
    /// - `InvalidArgument` if no AX.25 callsign can be derived from it.
    pub fn lsf_to_aprs(&self, lsf: &Lsf) -> Result<Frame> {
        let m17_src = lsf.src_callsign()?;
        let src = match self.mappings.find(&m17_src) {
            Some(mapping) => mapping.ax25().clone(),
            None => truncate_callsign(&m17_src)?,
        }
        .with_c_bit(false);
        let dst = Address::new(APRS_DESTINATION, 0)?.with_c_bit(true);

        let info = match lsf.position() {
            Some(position) => {
                let mut report = PositionReport::new(
                    position.latitude,
                    position.longitude,
                    aprs::symbol_for_station(position.station),
                    POSITION_COMMENT,
                );
                report.altitude_ft = position.altitude;
                report.course_speed = position
                    .motion
                    .map(|m| (m.bearing, mph_to_knots(m.speed)));
                aprs::render(&report)?
            }
            None => InfoText::try_from(self.beacon())
                .map_err(|()| Error::InvalidArgument("beacon too long"))?,
        };
        debug!("bridge: lsf {m17_src} -> {src} aprs");
        Frame::ui(dst, src, PID_NO_LAYER3, info.as_bytes())
    }

    /// AX.25 UI frame relaying an M17 packet frame
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the relay addresses cannot be built.
    pub fn packet_to_ui(&self, packet: &PacketFrame) -> Result<Frame> {
        let data = packet.data();
        let info = &data[..data.len().min(PACKET_INFO_LEN)];
        let dst = Address::new(RELAY_DESTINATION, 0)?.with_c_bit(true);
        let src = self.station.clone().with_c_bit(false);
        Frame::ui(dst, src, PID_NO_LAYER3, info)
    }

    /// M17 packet carrying the info field of an AX.25 UI frame
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a non-UI frame, an empty info field or a
    /// callsign M17 cannot carry.
    pub fn ui_to_m17(&self, frame: &Frame) -> Result<M17Packet> {
        if !matches!(
            frame.control,
            Control::Unnumbered {
                kind: UnnumberedKind::Ui,
                ..
            }
        ) {
            return Err(Error::InvalidArgument("only ui frames are bridged"));
        }
        let src = self
            .mappings
            .find_by_ax25(&frame.src)
            .map_or(self.station.callsign(), Mapping::m17);
        let dst = self
            .mappings
            .find_by_ax25(&frame.dst)
            .map_or(frame.dst.callsign(), Mapping::m17);
        let lsf = Lsf::new(dst, src, LsfType::packet(self.can))?;
        let frames = packetize(&frame.info)?;
        debug!("bridge: ui {} -> m17 {src}, {} frames", frame.src, frames.len());
        Ok((lsf, frames))
    }
}

#[allow(clippy::cast_possible_truncation)]
fn mph_to_knots(mph: u8) -> u16 {
    ((u32::from(mph) * 869 + 500) / 1000) as u16
}

/// First six alphanumerics of an M17 callsign as an AX.25 address
fn truncate_callsign(m17: &str) -> Result<Address> {
    let mut text: heapless::String<6> = heapless::String::new();
    for c in m17.chars().filter(char::is_ascii_alphanumeric).take(6) {
        text.push(c)
            .map_err(|()| Error::InvalidArgument("callsign length"))?;
    }
    if text.is_empty() {
        return Err(Error::InvalidArgument("no usable source callsign"));
    }
    Address::new(&text, 0)
}
