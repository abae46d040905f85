//! APRS info-field formatting
//!
//! Uncompressed position reports, status reports and messages, rendered
//! through `core::fmt` so they work without an allocator.

use core::fmt::{self, Write};

use heapless::String;
#[cfg(not(feature = "std"))]
use micromath::F32Ext;

use crate::ax25::frame::MAX_INFO_LEN;
use crate::error::{Error, Result};

/// Rendered info field
pub type InfoText = String<MAX_INFO_LEN>;

/// Addressee field width in messages
pub const ADDRESSEE_LEN: usize = 9;

/// Primary symbol table
pub const PRIMARY_TABLE: char = '/';

/// Uncompressed position report, `!DDMM.mmN/DDDMM.mmW<sym>`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionReport<'a> {
    /// Degrees, north positive
    pub latitude: f32,
    /// Degrees, east positive
    pub longitude: f32,
    /// Symbol table identifier
    pub table: char,
    /// Symbol code
    pub symbol: char,
    /// Course in degrees and speed in knots
    pub course_speed: Option<(u16, u16)>,
    /// Altitude in feet
    pub altitude_ft: Option<i32>,
    /// Free text
    pub comment: &'a str,
}

impl<'a> PositionReport<'a> {
    /// Report with the primary table and no extensions
    #[must_use]
    pub const fn new(latitude: f32, longitude: f32, symbol: char, comment: &'a str) -> Self {
        Self {
            latitude,
            longitude,
            table: PRIMARY_TABLE,
            symbol,
            course_speed: None,
            altitude_ft: None,
            comment,
        }
    }
}

/// Degrees as (whole degrees, hundredths of a minute)
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_minutes(value: f32) -> (u32, u32) {
    let hundredths = (value.abs() * 6000.0).round() as u32;
    (hundredths / 6000, hundredths % 6000)
}

impl fmt::Display for PositionReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (lat_deg, lat_min) = to_minutes(self.latitude);
        let (lon_deg, lon_min) = to_minutes(self.longitude);
        let ns = if self.latitude < 0.0 { 'S' } else { 'N' };
        let ew = if self.longitude < 0.0 { 'W' } else { 'E' };
        write!(
            f,
            "!{:02}{:02}.{:02}{ns}{}{:03}{:02}.{:02}{ew}{}",
            lat_deg,
            lat_min / 100,
            lat_min % 100,
            self.table,
            lon_deg,
            lon_min / 100,
            lon_min % 100,
            self.symbol
        )?;
        if let Some((course, speed)) = self.course_speed {
            write!(f, "{:03}/{:03}", course % 361, speed.min(999))?;
        }
        if let Some(alt) = self.altitude_ft {
            write!(f, "/A={alt:06}")?;
        }
        f.write_str(self.comment)
    }
}

/// Status report, `>text`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Status<'a>(pub &'a str);

impl fmt::Display for Status<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ">{}", self.0)
    }
}

/// Message, `:ADDRESSEE:text` with an optional `{id`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Message<'a> {
    /// Recipient, padded to nine characters
    pub addressee: &'a str,
    /// Message body
    pub text: &'a str,
    /// Message number for acknowledgement
    pub id: Option<&'a str>,
}

impl fmt::Display for Message<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addressee = self.addressee.get(..ADDRESSEE_LEN).unwrap_or(self.addressee);
        write!(f, ":{:<width$}:{}", addressee, self.text, width = ADDRESSEE_LEN)?;
        if let Some(id) = self.id {
            write!(f, "{{{id}")?;
        }
        Ok(())
    }
}

/// Render any report into an info-field buffer
///
/// # Errors
///
/// `InvalidArgument` if the text does not fit in an AX.25 info field.
pub fn render(item: &impl fmt::Display) -> Result<InfoText> {
    let mut out = InfoText::new();
    write!(out, "{item}").map_err(|_| Error::InvalidArgument("aprs text too long"))?;
    Ok(out)
}

/// APRS symbol for an M17 station type (fixed, mobile, handheld)
#[must_use]
pub const fn symbol_for_station(station: u8) -> char {
    match station {
        1 => '>',
        2 => '[',
        _ => '-',
    }
}
