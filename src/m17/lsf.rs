//! Link Setup Frame
//!
//! `dst(6) | src(6) | type(2) | meta(14) | crc(2)`, all big-endian, CRC over
//! the first 28 bytes.

#[cfg(not(feature = "std"))]
use micromath::F32Ext;

use crate::error::{Error, Result};
use crate::fec::crc::m17_crc;
use crate::m17::callsign::{self, Callsign, ENCODED_LEN};
use crate::types::Can;

/// Encoded LSF length
pub const LSF_LEN: usize = 30;

/// META field length
pub const META_LEN: usize = 14;

/// Bytes covered by the CRC
pub const CRC_COVERAGE: usize = LSF_LEN - 2;

/// TYPE field
///
/// ```text
/// bit 0      packet (0) / stream (1)
/// bits 2..1  data type: data 1, voice 2, voice+data 3
/// bits 4..3  encryption type
/// bits 6..5  encryption subtype, or META kind when unencrypted
/// bits 10..7 channel access number
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct LsfType(u16);

/// What the META field holds when the stream is not encrypted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetaKind {
    /// Free text
    Text,
    /// GNSS position
    Position,
    /// Extended callsign data
    ExtendedCallsign,
    /// Reserved value
    Reserved,
}

impl LsfType {
    const STREAM: u16 = 1;
    const DATA: u16 = 1 << 1;
    const VOICE: u16 = 2 << 1;
    const ENCRYPTION_MASK: u16 = 3 << 3;
    const SUBTYPE_SHIFT: u16 = 5;
    const SUBTYPE_MASK: u16 = 3 << 5;
    const CAN_SHIFT: u16 = 7;
    const CAN_MASK: u16 = 0x0F << 7;

    /// Raw value
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw value
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Packet mode, data, unencrypted
    #[must_use]
    pub const fn packet(can: Can) -> Self {
        Self(Self::DATA | ((can.value() as u16) << Self::CAN_SHIFT))
    }

    /// Stream mode, voice, unencrypted
    #[must_use]
    pub const fn voice_stream(can: Can) -> Self {
        Self(Self::STREAM | Self::VOICE | ((can.value() as u16) << Self::CAN_SHIFT))
    }

    /// Stream mode, data, unencrypted
    #[must_use]
    pub const fn data_stream(can: Can) -> Self {
        Self(Self::STREAM | Self::DATA | ((can.value() as u16) << Self::CAN_SHIFT))
    }

    /// Same type with the META kind set
    #[must_use]
    pub const fn with_meta(self, kind: MetaKind) -> Self {
        let bits: u16 = match kind {
            MetaKind::Text => 0,
            MetaKind::Position => 1,
            MetaKind::ExtendedCallsign => 2,
            MetaKind::Reserved => 3,
        };
        Self((self.0 & !Self::SUBTYPE_MASK) | (bits << Self::SUBTYPE_SHIFT))
    }

    /// Stream (true) or packet (false) mode
    #[must_use]
    pub const fn is_stream(self) -> bool {
        self.0 & Self::STREAM != 0
    }

    /// Data type carries voice
    #[must_use]
    pub const fn has_voice(self) -> bool {
        self.0 & Self::VOICE != 0
    }

    /// Data type carries data
    #[must_use]
    pub const fn has_data(self) -> bool {
        self.0 & Self::DATA != 0
    }

    /// Encryption type (0 = none)
    #[must_use]
    pub const fn encryption(self) -> u8 {
        ((self.0 & Self::ENCRYPTION_MASK) >> 3) as u8
    }

    /// Channel access number
    #[must_use]
    pub const fn can(self) -> u8 {
        ((self.0 & Self::CAN_MASK) >> Self::CAN_SHIFT) as u8
    }

    /// META kind, None when encrypted (the subtype bits then mean something else)
    #[must_use]
    pub const fn meta_kind(self) -> Option<MetaKind> {
        if self.encryption() != 0 {
            return None;
        }
        Some(match (self.0 & Self::SUBTYPE_MASK) >> Self::SUBTYPE_SHIFT {
            0 => MetaKind::Text,
            1 => MetaKind::Position,
            2 => MetaKind::ExtendedCallsign,
            _ => MetaKind::Reserved,
        })
    }
}

/// Bearing and speed from a position report
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Motion {
    /// Degrees
    pub bearing: u16,
    /// Miles per hour
    pub speed: u8,
}

/// GNSS position carried in META
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    /// Data source (0 M17 client, 1 OpenRTX, 255 other)
    pub source: u8,
    /// Station type (0 fixed, 1 mobile, 2 handheld)
    pub station: u8,
    /// Degrees, north positive
    pub latitude: f32,
    /// Degrees, east positive
    pub longitude: f32,
    /// Feet, -1500..=64035
    pub altitude: Option<i32>,
    /// Bearing and speed
    pub motion: Option<Motion>,
}

const FLAG_SOUTH: u8 = 1 << 0;
const FLAG_WEST: u8 = 1 << 1;
const FLAG_ALTITUDE: u8 = 1 << 2;
const FLAG_MOTION: u8 = 1 << 3;
const ALTITUDE_OFFSET: i32 = 1500;

/// Whole degrees and a 16-bit binary fraction
fn split_degrees(value: f32) -> (u8, u16) {
    let magnitude = value.abs();
    let whole = magnitude.floor();
    let fraction = ((magnitude - whole) * 65536.0).floor();
    (whole as u8, fraction as u16)
}

fn join_degrees(whole: u8, fraction: [u8; 2], negative: bool) -> f32 {
    let magnitude = f32::from(whole) + f32::from(u16::from_be_bytes(fraction)) / 65536.0;
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

impl Position {
    /// Encode into the META layout
    #[must_use]
    pub fn to_meta(&self) -> [u8; META_LEN] {
        let mut meta = [0u8; META_LEN];
        meta[0] = self.source;
        meta[1] = self.station;
        let (lat_whole, lat_frac) = split_degrees(self.latitude);
        meta[2] = lat_whole;
        meta[3..5].copy_from_slice(&lat_frac.to_be_bytes());
        let (lon_whole, lon_frac) = split_degrees(self.longitude);
        meta[5] = lon_whole;
        meta[6..8].copy_from_slice(&lon_frac.to_be_bytes());

        let mut flags = 0;
        if self.latitude < 0.0 {
            flags |= FLAG_SOUTH;
        }
        if self.longitude < 0.0 {
            flags |= FLAG_WEST;
        }
        if let Some(altitude) = self.altitude {
            flags |= FLAG_ALTITUDE;
            let encoded = (altitude + ALTITUDE_OFFSET).clamp(0, i32::from(u16::MAX));
            let encoded = u16::try_from(encoded).unwrap_or(u16::MAX);
            meta[9..11].copy_from_slice(&encoded.to_be_bytes());
        }
        if let Some(motion) = self.motion {
            flags |= FLAG_MOTION;
            meta[11..13].copy_from_slice(&motion.bearing.to_be_bytes());
            meta[13] = motion.speed;
        }
        meta[8] = flags;
        meta
    }

    /// Decode the META layout
    #[must_use]
    pub fn from_meta(meta: &[u8; META_LEN]) -> Self {
        let flags = meta[8];
        Self {
            source: meta[0],
            station: meta[1],
            latitude: join_degrees(meta[2], [meta[3], meta[4]], flags & FLAG_SOUTH != 0),
            longitude: join_degrees(meta[5], [meta[6], meta[7]], flags & FLAG_WEST != 0),
            altitude: (flags & FLAG_ALTITUDE != 0)
                .then(|| i32::from(u16::from_be_bytes([meta[9], meta[10]])) - ALTITUDE_OFFSET),
            motion: (flags & FLAG_MOTION != 0).then(|| Motion {
                bearing: u16::from_be_bytes([meta[11], meta[12]]),
                speed: meta[13],
            }),
        }
    }
}

/// Link Setup Frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lsf {
    /// Encoded destination callsign
    pub dst: [u8; ENCODED_LEN],
    /// Encoded source callsign
    pub src: [u8; ENCODED_LEN],
    /// TYPE field
    pub lsf_type: LsfType,
    /// META field
    pub meta: [u8; META_LEN],
}

impl Lsf {
    /// LSF with zeroed META
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if either callsign cannot be base-40 encoded.
    pub fn new(dst: &str, src: &str, lsf_type: LsfType) -> Result<Self> {
        Ok(Self {
            dst: callsign::encode(dst)?,
            src: callsign::encode(src)?,
            lsf_type,
            meta: [0; META_LEN],
        })
    }

    /// Decoded destination
    ///
    /// # Errors
    ///
    /// `Malformed` for a reserved address value.
    pub fn dst_callsign(&self) -> Result<Callsign> {
        callsign::decode(&self.dst)
    }

    /// Decoded source
    ///
    /// # Errors
    ///
    /// `Malformed` for a reserved address value.
    pub fn src_callsign(&self) -> Result<Callsign> {
        callsign::decode(&self.src)
    }

    /// Store a position report in META and mark the type accordingly
    pub fn set_position(&mut self, position: &Position) {
        self.meta = position.to_meta();
        self.lsf_type = self.lsf_type.with_meta(MetaKind::Position);
    }

    /// Position report, when META holds one
    #[must_use]
    pub fn position(&self) -> Option<Position> {
        (self.lsf_type.meta_kind() == Some(MetaKind::Position))
            .then(|| Position::from_meta(&self.meta))
    }

    /// Store extended callsign data (two callsign fields) in META
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if either callsign cannot be encoded.
    pub fn set_extended_callsign(&mut self, first: &str, second: &str) -> Result<()> {
        let mut meta = [0u8; META_LEN];
        meta[..ENCODED_LEN].copy_from_slice(&callsign::encode(first)?);
        meta[ENCODED_LEN..2 * ENCODED_LEN].copy_from_slice(&callsign::encode(second)?);
        self.meta = meta;
        self.lsf_type = self.lsf_type.with_meta(MetaKind::ExtendedCallsign);
        Ok(())
    }

    /// Extended callsign data, when META holds it
    ///
    /// # Errors
    ///
    /// `Malformed` for reserved address values.
    pub fn extended_callsign(&self) -> Result<Option<(Callsign, Callsign)>> {
        if self.lsf_type.meta_kind() != Some(MetaKind::ExtendedCallsign) {
            return Ok(None);
        }
        let mut first = [0u8; ENCODED_LEN];
        let mut second = [0u8; ENCODED_LEN];
        first.copy_from_slice(&self.meta[..ENCODED_LEN]);
        second.copy_from_slice(&self.meta[ENCODED_LEN..2 * ENCODED_LEN]);
        Ok(Some((callsign::decode(&first)?, callsign::decode(&second)?)))
    }

    /// CRC over dst, src, type and meta
    #[must_use]
    pub fn crc(&self) -> u16 {
        let bytes = self.to_bytes();
        m17_crc(&bytes[..CRC_COVERAGE])
    }

    /// Serialize with CRC
    #[must_use]
    pub fn to_bytes(&self) -> [u8; LSF_LEN] {
        let mut out = [0u8; LSF_LEN];
        out[..6].copy_from_slice(&self.dst);
        out[6..12].copy_from_slice(&self.src);
        out[12..14].copy_from_slice(&self.lsf_type.raw().to_be_bytes());
        out[14..CRC_COVERAGE].copy_from_slice(&self.meta);
        let crc = m17_crc(&out[..CRC_COVERAGE]);
        out[CRC_COVERAGE..].copy_from_slice(&crc.to_be_bytes());
        out
    }

    /// Parse and check the CRC
    ///
    /// # Errors
    ///
    /// `Malformed` if fewer than 30 bytes are given, `IntegrityFailure` on CRC
    /// mismatch.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes = bytes.get(..LSF_LEN).ok_or(Error::Malformed("short lsf"))?;
        if m17_crc(bytes) != 0 {
            return Err(Error::IntegrityFailure("lsf crc"));
        }
        let mut dst = [0u8; ENCODED_LEN];
        let mut src = [0u8; ENCODED_LEN];
        let mut meta = [0u8; META_LEN];
        dst.copy_from_slice(&bytes[..6]);
        src.copy_from_slice(&bytes[6..12]);
        meta.copy_from_slice(&bytes[14..CRC_COVERAGE]);
        Ok(Self {
            dst,
            src,
            lsf_type: LsfType::from_raw(u16::from_be_bytes([bytes[12], bytes[13]])),
            meta,
        })
    }
}
