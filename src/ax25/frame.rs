//! AX.25 frame codec
//!
//! Body layout: dst, src, up to seven digipeaters, control, PID (I and UI
//! frames only), info. The FCS, when present, follows little-endian.

use heapless::Vec;

use crate::ax25::address::{Address, ADDRESS_LEN};
use crate::error::{Error, Result};
use crate::fec::crc::{ax25_fcs, fcs_register, FCS_RESIDUE};
use crate::hdlc;

/// PID for "no layer 3" (APRS and plain text)
pub const PID_NO_LAYER3: u8 = 0xF0;

/// Digipeaters carried after dst and src
pub const MAX_DIGIPEATERS: usize = 7;

/// Addresses in a frame, including dst and src
pub const MAX_ADDRESSES: usize = MAX_DIGIPEATERS + 2;

/// Largest info field
pub const MAX_INFO_LEN: usize = 256;

/// Smallest legal body: two addresses and a control byte
pub const MIN_FRAME_LEN: usize = 2 * ADDRESS_LEN + 1;

/// Largest body without FCS
pub const MAX_FRAME_LEN: usize = MAX_ADDRESSES * ADDRESS_LEN + 2 + MAX_INFO_LEN;

/// FCS length
pub const FCS_LEN: usize = 2;

/// Info field storage
pub type Info = Vec<u8, MAX_INFO_LEN>;

/// Supervisory frame type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SupervisoryKind {
    /// Receive ready
    Rr,
    /// Receive not ready
    Rnr,
    /// Reject
    Rej,
    /// Selective reject
    Srej,
}

impl SupervisoryKind {
    const fn bits(self) -> u8 {
        match self {
            Self::Rr => 0b00,
            Self::Rnr => 0b01,
            Self::Rej => 0b10,
            Self::Srej => 0b11,
        }
    }
}

/// Unnumbered frame type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnnumberedKind {
    /// Set asynchronous balanced mode
    Sabm,
    /// SABM, extended (modulo 128)
    Sabme,
    /// Disconnect
    Disc,
    /// Disconnected mode
    Dm,
    /// Unnumbered acknowledge
    Ua,
    /// Frame reject
    Frmr,
    /// Unnumbered information
    Ui,
}

impl UnnumberedKind {
    const fn code(self) -> u8 {
        match self {
            Self::Sabm => 0x2F,
            Self::Sabme => 0x6F,
            Self::Disc => 0x43,
            Self::Dm => 0x0F,
            Self::Ua => 0x63,
            Self::Frmr => 0x87,
            Self::Ui => 0x03,
        }
    }

    const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x2F => Some(Self::Sabm),
            0x6F => Some(Self::Sabme),
            0x43 => Some(Self::Disc),
            0x0F => Some(Self::Dm),
            0x63 => Some(Self::Ua),
            0x87 => Some(Self::Frmr),
            0x03 => Some(Self::Ui),
            _ => None,
        }
    }
}

/// P/F bit in every control format
const PF_BIT: u8 = 0x10;

const fn pf_bits(pf: bool) -> u8 {
    if pf {
        PF_BIT
    } else {
        0
    }
}

/// Decoded control field (modulo 8)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    /// Information frame
    Information {
        /// Send sequence number
        ns: u8,
        /// Receive sequence number
        nr: u8,
        /// Poll bit
        pf: bool,
    },
    /// Supervisory frame
    Supervisory {
        /// RR, RNR, REJ or SREJ
        kind: SupervisoryKind,
        /// Receive sequence number
        nr: u8,
        /// Poll/final bit
        pf: bool,
    },
    /// Unnumbered frame
    Unnumbered {
        /// Frame type
        kind: UnnumberedKind,
        /// Poll/final bit
        pf: bool,
    },
    /// Unnumbered pattern outside the supported set
    Reserved(u8),
}

impl Control {
    /// UI with P/F clear, as used for APRS
    pub const UI: Self = Self::Unnumbered {
        kind: UnnumberedKind::Ui,
        pf: false,
    };

    /// Encode into the control byte
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Information { ns, nr, pf } => ((nr & 7) << 5) | pf_bits(pf) | ((ns & 7) << 1),
            Self::Supervisory { kind, nr, pf } => {
                ((nr & 7) << 5) | pf_bits(pf) | (kind.bits() << 2) | 0x01
            }
            Self::Unnumbered { kind, pf } => kind.code() | pf_bits(pf),
            Self::Reserved(byte) => byte,
        }
    }

    /// Decode a control byte
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        let pf = byte & PF_BIT != 0;
        let nr = byte >> 5;
        if byte & 0x01 == 0 {
            return Self::Information {
                ns: (byte >> 1) & 7,
                nr,
                pf,
            };
        }
        if byte & 0x03 == 0x01 {
            let kind = match (byte >> 2) & 0x03 {
                0b00 => SupervisoryKind::Rr,
                0b01 => SupervisoryKind::Rnr,
                0b10 => SupervisoryKind::Rej,
                _ => SupervisoryKind::Srej,
            };
            return Self::Supervisory { kind, nr, pf };
        }
        match UnnumberedKind::from_code(byte & !PF_BIT) {
            Some(kind) => Self::Unnumbered { kind, pf },
            None => Self::Reserved(byte),
        }
    }

    /// I and UI frames carry a PID byte
    #[must_use]
    pub const fn has_pid(self) -> bool {
        matches!(
            self,
            Self::Information { .. }
                | Self::Unnumbered {
                    kind: UnnumberedKind::Ui,
                    ..
                }
        )
    }

    /// Same control with the P/F bit replaced
    #[must_use]
    pub const fn with_pf(self, pf: bool) -> Self {
        match self {
            Self::Information { ns, nr, .. } => Self::Information { ns, nr, pf },
            Self::Supervisory { kind, nr, .. } => Self::Supervisory { kind, nr, pf },
            Self::Unnumbered { kind, .. } => Self::Unnumbered { kind, pf },
            Self::Reserved(byte) => Self::Reserved(byte),
        }
    }

    /// Poll/final bit
    #[must_use]
    pub const fn pf(self) -> bool {
        match self {
            Self::Information { pf, .. }
            | Self::Supervisory { pf, .. }
            | Self::Unnumbered { pf, .. } => pf,
            Self::Reserved(byte) => byte & PF_BIT != 0,
        }
    }
}

/// An AX.25 frame without FCS
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Destination
    pub dst: Address,
    /// Source
    pub src: Address,
    /// Digipeater path
    pub via: Vec<Address, MAX_DIGIPEATERS>,
    /// Control field
    pub control: Control,
    /// Protocol identifier, present for I and UI frames
    pub pid: Option<u8>,
    /// Information field
    pub info: Info,
}

impl Frame {
    /// Frame without info (S and most U frames)
    #[must_use]
    pub fn new(dst: Address, src: Address, control: Control) -> Self {
        Self {
            dst,
            src,
            via: Vec::new(),
            control,
            pid: control.has_pid().then_some(PID_NO_LAYER3),
            info: Vec::new(),
        }
    }

    /// UI frame with the given PID and info
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `info` exceeds 256 bytes.
    pub fn ui(dst: Address, src: Address, pid: u8, info: &[u8]) -> Result<Self> {
        let mut frame = Self::new(dst, src, Control::UI);
        frame.pid = Some(pid);
        frame.set_info(info)?;
        Ok(frame)
    }

    /// Replace the info field
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `info` exceeds 256 bytes.
    pub fn set_info(&mut self, info: &[u8]) -> Result<()> {
        self.info = Vec::from_slice(info).map_err(|()| Error::InvalidArgument("info too long"))?;
        Ok(())
    }

    /// UI frame with PID 0xF0
    #[must_use]
    pub fn is_aprs(&self) -> bool {
        matches!(
            self.control,
            Control::Unnumbered {
                kind: UnnumberedKind::Ui,
                ..
            }
        ) && self.pid == Some(PID_NO_LAYER3)
    }

    /// Command frame (dst C bit set, src C bit clear)
    #[must_use]
    pub const fn is_command(&self) -> bool {
        self.dst.c_bit() && !self.src.c_bit()
    }

    /// Body length without FCS
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        (2 + self.via.len()) * ADDRESS_LEN
            + 1
            + usize::from(self.control.has_pid())
            + self.info.len()
    }

    /// Encode the body (no FCS) into `out`
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `out` is too small.
    pub fn encode(&self, out: &mut [u8]) -> Result<usize> {
        let len = self.encoded_len();
        let out = out
            .get_mut(..len)
            .ok_or(Error::InvalidArgument("ax25 output too small"))?;
        let last_index = 1 + self.via.len();
        let addresses = [&self.dst, &self.src].into_iter().chain(self.via.iter());
        for (i, (address, chunk)) in addresses
            .zip(out.chunks_exact_mut(ADDRESS_LEN))
            .enumerate()
        {
            chunk.copy_from_slice(&address.encode(i == last_index));
        }
        let mut pos = (last_index + 1) * ADDRESS_LEN;
        out[pos] = self.control.to_byte();
        pos += 1;
        if self.control.has_pid() {
            out[pos] = self.pid.unwrap_or(PID_NO_LAYER3);
            pos += 1;
        }
        out[pos..].copy_from_slice(&self.info);
        Ok(len)
    }

    /// Encode the body followed by the little-endian FCS
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `out` is too small.
    pub fn encode_with_fcs(&self, out: &mut [u8]) -> Result<usize> {
        let body = self.encode(out)?;
        let fcs = ax25_fcs(&out[..body]);
        out.get_mut(body..body + FCS_LEN)
            .ok_or(Error::InvalidArgument("ax25 output too small"))?
            .copy_from_slice(&fcs.to_le_bytes());
        Ok(body + FCS_LEN)
    }

    /// Body and FCS between 0x7E flags, not bit-stuffed
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `out` is too small.
    pub fn to_hdlc(&self, out: &mut [u8]) -> Result<usize> {
        let mut body = [0u8; MAX_FRAME_LEN + FCS_LEN];
        let len = self.encode_with_fcs(&mut body)?;
        hdlc::wrap(&body[..len], out)
    }

    /// Decode a body without FCS
    ///
    /// # Errors
    ///
    /// `Malformed` for a missing address terminator within nine addresses,
    /// fewer than two addresses, a missing control or PID byte, an invalid
    /// callsign or an info field longer than 256 bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut count = None;
        for i in 0..MAX_ADDRESSES {
            let ssid = *bytes
                .get(i * ADDRESS_LEN + ADDRESS_LEN - 1)
                .ok_or(Error::Malformed("truncated address"))?;
            if ssid & 0x01 != 0 {
                count = Some(i + 1);
                break;
            }
        }
        let count = count.ok_or(Error::Malformed("no address terminator"))?;
        if count < 2 {
            return Err(Error::Malformed("fewer than two addresses"));
        }

        let (dst, _) = Address::decode(bytes)?;
        let (src, _) = Address::decode(&bytes[ADDRESS_LEN..])?;
        let mut via = Vec::new();
        for i in 2..count {
            let (digi, _) = Address::decode(&bytes[i * ADDRESS_LEN..])?;
            via.push(digi)
                .map_err(|_| Error::Malformed("too many digipeaters"))?;
        }

        let addresses_end = count * ADDRESS_LEN;
        let control = Control::from_byte(
            *bytes
                .get(addresses_end)
                .ok_or(Error::Malformed("missing control"))?,
        );
        let has_pid = control.has_pid();
        let pid = if has_pid {
            Some(
                *bytes
                    .get(addresses_end + 1)
                    .ok_or(Error::Malformed("missing pid"))?,
            )
        } else {
            None
        };
        let info_start = addresses_end + 1 + usize::from(has_pid);
        let info = Vec::from_slice(&bytes[info_start..])
            .map_err(|()| Error::Malformed("info too long"))?;

        Ok(Self {
            dst,
            src,
            via,
            control,
            pid,
            info,
        })
    }

    /// Check the trailing FCS, then decode the body
    ///
    /// # Errors
    ///
    /// `Malformed` for a frame too short to hold a body and FCS,
    /// `IntegrityFailure` on FCS mismatch, otherwise as [`Frame::decode`].
    pub fn decode_with_fcs(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_FRAME_LEN + FCS_LEN {
            return Err(Error::Malformed("frame too short"));
        }
        if fcs_register(bytes) != FCS_RESIDUE {
            return Err(Error::IntegrityFailure("ax25 fcs"));
        }
        Self::decode(&bytes[..bytes.len() - FCS_LEN])
    }
}
