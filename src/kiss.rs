//! KISS host-link codec
//!
//! Frames look like `FEND cmd data... FEND`. The command byte carries the
//! port in its high nibble and the opcode in its low nibble, except for
//! RETURN which is the whole byte 0xFF. FEND and FESC inside the frame
//! (command byte included) are escaped as `FESC TFEND` and `FESC TFESC`.
//!
//! [`KissDecoder`] is fed one byte at a time like the CAT parser it grew
//! from, and shares the closing FEND of one frame with the opening of the
//! next.

use heapless::Vec;

use crate::config::kiss::{
    MAX_HARDWARE, MAX_PAYLOAD, PERSISTENCE, SLOTTIME, TXDELAY, TXTAIL,
};
use crate::error::{Error, Result};

/// Frame end
pub const FEND: u8 = 0xC0;
/// Frame escape
pub const FESC: u8 = 0xDB;
/// Transposed frame end
pub const TFEND: u8 = 0xDC;
/// Transposed frame escape
pub const TFESC: u8 = 0xDD;
/// Command byte that leaves KISS mode
pub const RETURN: u8 = 0xFF;

/// Highest addressable port
pub const MAX_PORT: u8 = 15;

/// KISS opcode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Frame to send on the air
    Data,
    /// Keyup delay, 10 ms units
    TxDelay,
    /// CSMA persistence
    Persistence,
    /// CSMA slot interval, 10 ms units
    SlotTime,
    /// Post-frame hold, 10 ms units
    TxTail,
    /// Full duplex on/off
    FullDuplex,
    /// Hardware specific
    SetHardware,
    /// Leave KISS mode
    Return,
}

impl Command {
    /// Low nibble of the command byte (0xFF for RETURN)
    #[must_use]
    pub const fn opcode(self) -> u8 {
        match self {
            Self::Data => 0x00,
            Self::TxDelay => 0x01,
            Self::Persistence => 0x02,
            Self::SlotTime => 0x03,
            Self::TxTail => 0x04,
            Self::FullDuplex => 0x05,
            Self::SetHardware => 0x06,
            Self::Return => RETURN,
        }
    }

    /// Split a command byte into port and opcode
    ///
    /// # Errors
    ///
    /// `Malformed` for an opcode outside the standard set.
    pub const fn parse(byte: u8) -> Result<(u8, Self)> {
        if byte == RETURN {
            return Ok((0, Self::Return));
        }
        let command = match byte & 0x0F {
            0x00 => Self::Data,
            0x01 => Self::TxDelay,
            0x02 => Self::Persistence,
            0x03 => Self::SlotTime,
            0x04 => Self::TxTail,
            0x05 => Self::FullDuplex,
            0x06 => Self::SetHardware,
            _ => return Err(Error::Malformed("unknown kiss opcode")),
        };
        Ok((byte >> 4, command))
    }

    /// Build the command byte for `port`
    #[must_use]
    pub const fn to_byte(self, port: u8) -> u8 {
        match self {
            Self::Return => RETURN,
            _ => (port << 4) | self.opcode(),
        }
    }
}

/// A decoded KISS frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KissFrame {
    /// Port number (0..=15)
    pub port: u8,
    /// Opcode
    pub command: Command,
    /// Unescaped payload
    pub payload: Vec<u8, MAX_PAYLOAD>,
}

impl KissFrame {
    /// Data frame on `port`
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an out-of-range port or oversize payload.
    pub fn data(port: u8, payload: &[u8]) -> Result<Self> {
        if port > MAX_PORT {
            return Err(Error::InvalidArgument("kiss port"));
        }
        let payload =
            Vec::from_slice(payload).map_err(|()| Error::InvalidArgument("kiss payload too long"))?;
        Ok(Self {
            port,
            command: Command::Data,
            payload,
        })
    }

    /// Encode this frame into `out`
    ///
    /// # Errors
    ///
    /// As [`encode`].
    pub fn encode(&self, out: &mut [u8]) -> Result<usize> {
        encode(self.port, self.command, &self.payload, out)
    }
}

/// Escaped size of one byte
const fn escaped_len(byte: u8) -> usize {
    if byte == FEND || byte == FESC {
        2
    } else {
        1
    }
}

/// Bytes needed to encode a frame with this command byte and payload
#[must_use]
pub fn encoded_len(command_byte: u8, payload: &[u8]) -> usize {
    2 + escaped_len(command_byte) + payload.iter().map(|&b| escaped_len(b)).sum::<usize>()
}

/// Encode a KISS frame into `out`, returning its length
///
/// # Errors
///
/// `InvalidArgument` for a port above 15 or when `out` is too small.
pub fn encode(port: u8, command: Command, payload: &[u8], out: &mut [u8]) -> Result<usize> {
    if port > MAX_PORT {
        return Err(Error::InvalidArgument("kiss port"));
    }
    let command_byte = command.to_byte(port);
    if encoded_len(command_byte, payload) > out.len() {
        return Err(Error::InvalidArgument("kiss output too small"));
    }
    let mut pos = 0;
    let mut put = |byte: u8| {
        out[pos] = byte;
        pos += 1;
    };
    put(FEND);
    for &byte in core::iter::once(&command_byte).chain(payload) {
        match byte {
            FEND => {
                put(FESC);
                put(TFEND);
            }
            FESC => {
                put(FESC);
                put(TFESC);
            }
            _ => put(byte),
        }
    }
    put(FEND);
    Ok(pos)
}

/// Write one KISS frame to an `embedded-io` sink
///
/// # Errors
///
/// `InvalidArgument` for a port above 15, `Transient` if the writer fails.
pub fn write_frame<W: embedded_io::Write>(
    writer: &mut W,
    port: u8,
    command: Command,
    payload: &[u8],
) -> Result<()> {
    if port > MAX_PORT {
        return Err(Error::InvalidArgument("kiss port"));
    }
    let command_byte = command.to_byte(port);
    let mut emit = |bytes: &[u8]| {
        writer
            .write_all(bytes)
            .map_err(|_| Error::Transient("kiss write"))
    };
    emit(&[FEND])?;
    for &byte in core::iter::once(&command_byte).chain(payload) {
        match byte {
            FEND => emit(&[FESC, TFEND])?,
            FESC => emit(&[FESC, TFESC])?,
            _ => emit(&[byte])?,
        }
    }
    emit(&[FEND])
}

/// Decoder state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DecodeState {
    /// Waiting for the first FEND
    #[default]
    Idle,
    /// At a frame boundary, expecting the command byte
    Started,
    /// Collecting payload bytes
    Data,
    /// Previous byte was FESC
    Escape,
}

/// Byte-at-a-time KISS decoder
#[derive(Debug, Default)]
pub struct KissDecoder {
    state: DecodeState,
    command: Option<u8>,
    buffer: Vec<u8, MAX_PAYLOAD>,
}

impl KissDecoder {
    /// Create a decoder in the Idle state
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: DecodeState::Idle,
            command: None,
            buffer: Vec::new(),
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> DecodeState {
        self.state
    }

    /// Drop any partial frame and return to Idle
    pub fn reset(&mut self) {
        self.state = DecodeState::Idle;
        self.command = None;
        self.buffer.clear();
    }

    fn restart(&mut self) {
        self.state = DecodeState::Started;
        self.command = None;
        self.buffer.clear();
    }

    fn accept(&mut self, byte: u8) -> Result<()> {
        if self.command.is_none() {
            self.command = Some(byte);
            return Ok(());
        }
        if self.buffer.push(byte).is_err() {
            self.reset();
            return Err(Error::InvalidArgument("kiss frame overflow"));
        }
        Ok(())
    }

    fn publish(&mut self) -> Result<Option<KissFrame>> {
        let Some(command_byte) = self.command else {
            self.restart();
            return Ok(None);
        };
        let parsed = Command::parse(command_byte);
        let payload = core::mem::take(&mut self.buffer);
        self.restart();
        let (port, command) = parsed?;
        Ok(Some(KissFrame {
            port,
            command,
            payload,
        }))
    }

    /// Feed one byte
    ///
    /// Returns a frame when a closing FEND completes one.
    ///
    /// # Errors
    ///
    /// - `Malformed` for an illegal escape (the decoder resets to Idle) or an
    ///   unknown opcode (the frame is dropped).
    /// - `InvalidArgument` when the payload exceeds the buffer (the decoder
    ///   resets to Idle).
    pub fn feed(&mut self, byte: u8) -> Result<Option<KissFrame>> {
        match self.state {
            DecodeState::Idle => {
                if byte == FEND {
                    self.restart();
                }
                Ok(None)
            }
            DecodeState::Started => {
                match byte {
                    // back-to-back FENDs: empty frame, stay at the boundary
                    FEND => {}
                    FESC => self.state = DecodeState::Escape,
                    _ => {
                        self.command = Some(byte);
                        self.state = DecodeState::Data;
                    }
                }
                Ok(None)
            }
            DecodeState::Data => match byte {
                FEND => self.publish(),
                FESC => {
                    self.state = DecodeState::Escape;
                    Ok(None)
                }
                _ => self.accept(byte).map(|()| None),
            },
            DecodeState::Escape => {
                let literal = match byte {
                    TFEND => FEND,
                    TFESC => FESC,
                    _ => {
                        self.reset();
                        return Err(Error::Malformed("bad kiss escape"));
                    }
                };
                self.state = DecodeState::Data;
                self.accept(literal).map(|()| None)
            }
        }
    }

    /// Feed a slice, stopping at the first completed frame
    ///
    /// Returns the number of bytes consumed and the frame, if any.
    ///
    /// # Errors
    ///
    /// As [`KissDecoder::feed`]; bytes up to the failing one are consumed.
    pub fn feed_slice(&mut self, bytes: &[u8]) -> Result<(usize, Option<KissFrame>)> {
        for (i, &byte) in bytes.iter().enumerate() {
            if let Some(frame) = self.feed(byte)? {
                return Ok((i + 1, Some(frame)));
            }
        }
        Ok((bytes.len(), None))
    }

    /// Pull bytes from an `embedded-io` source until a frame completes or the
    /// source reports end of input
    ///
    /// # Errors
    ///
    /// `Transient` if the reader fails, otherwise as [`KissDecoder::feed`].
    pub fn read_from<R: embedded_io::Read>(&mut self, reader: &mut R) -> Result<Option<KissFrame>> {
        let mut byte = [0u8; 1];
        loop {
            let n = reader
                .read(&mut byte)
                .map_err(|_| Error::Transient("kiss read"))?;
            if n == 0 {
                return Ok(None);
            }
            if let Some(frame) = self.feed(byte[0])? {
                return Ok(Some(frame));
            }
        }
    }
}

/// TNC parameters set over KISS
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KissParams {
    /// Keyup delay, 10 ms units
    pub txdelay: u8,
    /// Persistence P, p = (P + 1) / 256
    pub persistence: u8,
    /// Slot time, 10 ms units
    pub slottime: u8,
    /// TX tail, 10 ms units
    pub txtail: u8,
    /// Full duplex
    pub full_duplex: bool,
    /// Last SETHARDWARE payload
    pub hardware: Vec<u8, MAX_HARDWARE>,
}

impl Default for KissParams {
    fn default() -> Self {
        Self {
            txdelay: TXDELAY,
            persistence: PERSISTENCE,
            slottime: SLOTTIME,
            txtail: TXTAIL,
            full_duplex: false,
            hardware: Vec::new(),
        }
    }
}

impl KissParams {
    /// Apply a parameter command
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for DATA or RETURN, which are not parameters.
    /// - `Malformed` when a parameter command carries no value.
    /// - `ResourceExhausted` for an oversize SETHARDWARE payload.
    pub fn apply(&mut self, command: Command, payload: &[u8]) -> Result<()> {
        if command == Command::SetHardware {
            self.hardware = Vec::from_slice(payload)
                .map_err(|()| Error::ResourceExhausted("kiss hardware payload"))?;
            return Ok(());
        }
        if matches!(command, Command::Data | Command::Return) {
            return Err(Error::InvalidArgument("not a kiss parameter"));
        }
        let &value = payload
            .first()
            .ok_or(Error::Malformed("kiss parameter without value"))?;
        match command {
            Command::TxDelay => self.txdelay = value,
            Command::Persistence => self.persistence = value,
            Command::SlotTime => self.slottime = value,
            Command::TxTail => self.txtail = value,
            Command::FullDuplex => self.full_duplex = value != 0,
            Command::Data | Command::Return | Command::SetHardware => {}
        }
        Ok(())
    }

    /// Keyup delay in milliseconds
    #[must_use]
    pub const fn txdelay_ms(&self) -> u32 {
        self.txdelay as u32 * 10
    }

    /// Slot time in milliseconds
    #[must_use]
    pub const fn slottime_ms(&self) -> u32 {
        self.slottime as u32 * 10
    }

    /// TX tail in milliseconds
    #[must_use]
    pub const fn txtail_ms(&self) -> u32 {
        self.txtail as u32 * 10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(decoder: &mut KissDecoder, bytes: &[u8]) -> std::vec::Vec<KissFrame> {
        bytes
            .iter()
            .filter_map(|&b| decoder.feed(b).unwrap())
            .collect()
    }

    #[test]
    fn encodes_escaped_payload() {
        let mut out = [0u8; 32];
        let len = encode(0, Command::Data, &[0xC0, 0xDB, 0x01, 0x02, 0xC0], &mut out).unwrap();
        assert_eq!(
            &out[..len],
            &[0xC0, 0x00, 0xDB, 0xDC, 0xDB, 0xDD, 0x01, 0x02, 0xDB, 0xDC, 0xC0]
        );
    }

    #[test]
    fn decodes_back_to_back_frames() {
        let mut decoder = KissDecoder::new();
        let frames = feed_all(&mut decoder, &[0xC0, 0x00, 0x41, 0xC0, 0x10, 0x42, 0xC0]);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].payload.as_slice(), b"A");
        assert_eq!(frames[1].port, 1);
        assert_eq!(frames[1].payload.as_slice(), b"B");
    }

    #[test]
    fn empty_frames_are_discarded() {
        let mut decoder = KissDecoder::new();
        let frames = feed_all(&mut decoder, &[0xC0, 0xC0, 0xC0, 0x00, 0x01, 0xC0]);
        assert_eq!(frames.len(), 1);
        assert_eq!(decoder.state(), DecodeState::Started);
    }

    #[test]
    fn bad_escape_resets() {
        let mut decoder = KissDecoder::new();
        decoder.feed(0xC0).unwrap();
        decoder.feed(0x00).unwrap();
        decoder.feed(FESC).unwrap();
        assert_eq!(decoder.feed(0x00), Err(Error::Malformed("bad kiss escape")));
        assert_eq!(decoder.state(), DecodeState::Idle);
    }

    #[test]
    fn escaped_command_byte() {
        let mut out = [0u8; 8];
        // port 12 DATA has command byte 0xC0
        let len = encode(12, Command::Data, &[], &mut out).unwrap();
        assert_eq!(&out[..len], &[0xC0, 0xDB, 0xDC, 0xC0]);
        let mut decoder = KissDecoder::new();
        let frames = feed_all(&mut decoder, &out[..len]);
        assert_eq!(frames[0].port, 12);
        assert_eq!(frames[0].command, Command::Data);
    }

    #[test]
    fn unknown_opcode_is_malformed() {
        let mut decoder = KissDecoder::new();
        decoder.feed(0xC0).unwrap();
        decoder.feed(0x0A).unwrap();
        assert!(matches!(decoder.feed(0xC0), Err(Error::Malformed(_))));
        assert_eq!(decoder.state(), DecodeState::Started);
    }

    #[test]
    fn overflow_resets_to_idle() {
        let mut decoder = KissDecoder::new();
        decoder.feed(0xC0).unwrap();
        decoder.feed(0x00).unwrap();
        for _ in 0..MAX_PAYLOAD {
            decoder.feed(0x55).unwrap();
        }
        assert!(matches!(decoder.feed(0x55), Err(Error::InvalidArgument(_))));
        assert_eq!(decoder.state(), DecodeState::Idle);
    }

    #[test]
    fn params_apply() {
        let mut params = KissParams::default();
        assert_eq!(params.txdelay, 50);
        params.apply(Command::TxDelay, &[30]).unwrap();
        params.apply(Command::FullDuplex, &[1]).unwrap();
        assert_eq!(params.txdelay_ms(), 300);
        assert!(params.full_duplex);
        assert!(params.apply(Command::Data, &[1]).is_err());
        assert!(params.apply(Command::SlotTime, &[]).is_err());
    }
}
