//! M17 frames on the shared byte link
//!
//! Each frame travels as `5D 5F kind body`:
//!
//! | kind | frame  | body                                       |
//! |------|--------|--------------------------------------------|
//! | 0x00 | LSF    | 30 bytes                                   |
//! | 0x01 | Stream | LICH (6) + frame number (2) + payload (16) |
//! | 0x02 | Packet | payload (25) + counter byte                |
//! | 0x03 | EOT    | empty                                      |
//! | 0x04 | BERT   | 25 bytes                                   |
//!
//! The stream frame number's top bit marks the last frame of a stream.

use log::trace;

use crate::error::{Error, Result};
use crate::m17::lsf::{Lsf, LSF_LEN};
use crate::m17::packet::{PacketFrame, PACKET_CHUNK};

/// Envelope sync bytes
pub const ENVELOPE_SYNC: [u8; 2] = [0x5D, 0x5F];

/// Sync plus kind byte
pub const ENVELOPE_HEADER: usize = 3;

/// LICH chunk plus counter byte
pub const LICH_LEN: usize = 6;

/// LSF bytes per LICH chunk
pub const LICH_CHUNK: usize = 5;

/// LICH chunks per LSF
pub const LICH_COUNT: usize = 6;

/// Stream payload length
pub const STREAM_PAYLOAD: usize = 16;

/// BERT payload length
pub const BERT_LEN: usize = 25;

/// Largest enveloped frame
pub const MAX_ENVELOPE_LEN: usize = ENVELOPE_HEADER + LSF_LEN;

const KIND_LSF: u8 = 0x00;
const KIND_STREAM: u8 = 0x01;
const KIND_PACKET: u8 = 0x02;
const KIND_EOT: u8 = 0x03;
const KIND_BERT: u8 = 0x04;

const END_OF_STREAM: u16 = 0x8000;

/// Stream frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamFrame {
    /// LICH chunk and counter
    pub lich: [u8; LICH_LEN],
    /// 15-bit frame number
    pub frame_number: u16,
    /// Last frame of the stream
    pub end_of_stream: bool,
    /// Payload
    pub payload: [u8; STREAM_PAYLOAD],
}

/// Any M17 frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum M17Frame {
    /// Link Setup Frame
    Lsf(Lsf),
    /// Stream frame
    Stream(StreamFrame),
    /// Packet frame
    Packet(PacketFrame),
    /// End of transmission
    Eot,
    /// Bit error rate test frame
    Bert([u8; BERT_LEN]),
}

const fn body_len(kind: u8) -> Option<usize> {
    match kind {
        KIND_LSF => Some(LSF_LEN),
        KIND_STREAM => Some(LICH_LEN + 2 + STREAM_PAYLOAD),
        KIND_PACKET => Some(PACKET_CHUNK + 1),
        KIND_EOT => Some(0),
        KIND_BERT => Some(BERT_LEN),
        _ => None,
    }
}

/// True if `bytes` starts with the envelope sync
#[must_use]
pub fn is_m17(bytes: &[u8]) -> bool {
    bytes.starts_with(&ENVELOPE_SYNC)
}

impl M17Frame {
    const fn kind(&self) -> u8 {
        match self {
            Self::Lsf(_) => KIND_LSF,
            Self::Stream(_) => KIND_STREAM,
            Self::Packet(_) => KIND_PACKET,
            Self::Eot => KIND_EOT,
            Self::Bert(_) => KIND_BERT,
        }
    }

    /// Short name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Lsf(_) => "lsf",
            Self::Stream(_) => "stream",
            Self::Packet(_) => "packet",
            Self::Eot => "eot",
            Self::Bert(_) => "bert",
        }
    }

    /// Enveloped length
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        match body_len(self.kind()) {
            Some(len) => ENVELOPE_HEADER + len,
            None => ENVELOPE_HEADER,
        }
    }

    /// Write the enveloped frame into `out`
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `out` is too small.
    pub fn encode(&self, out: &mut [u8]) -> Result<usize> {
        let len = self.encoded_len();
        let out = out
            .get_mut(..len)
            .ok_or(Error::InvalidArgument("m17 output too small"))?;
        out[..2].copy_from_slice(&ENVELOPE_SYNC);
        out[2] = self.kind();
        let body = &mut out[ENVELOPE_HEADER..];
        match self {
            Self::Lsf(lsf) => body.copy_from_slice(&lsf.to_bytes()),
            Self::Stream(frame) => {
                let mut number = frame.frame_number & !END_OF_STREAM;
                if frame.end_of_stream {
                    number |= END_OF_STREAM;
                }
                body[..LICH_LEN].copy_from_slice(&frame.lich);
                body[LICH_LEN..LICH_LEN + 2].copy_from_slice(&number.to_be_bytes());
                body[LICH_LEN + 2..].copy_from_slice(&frame.payload);
            }
            Self::Packet(frame) => {
                body[..PACKET_CHUNK].copy_from_slice(&frame.payload);
                body[PACKET_CHUNK] = frame.counter;
            }
            Self::Eot => {}
            Self::Bert(data) => body.copy_from_slice(data),
        }
        Ok(len)
    }

    /// Parse an enveloped frame
    ///
    /// # Errors
    ///
    /// - `Malformed` for a missing sync, unknown kind or a body of the wrong
    ///   size.
    /// - `IntegrityFailure` for an LSF with a bad CRC.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if !is_m17(bytes) {
            return Err(Error::Malformed("m17 sync"));
        }
        let kind = *bytes
            .get(2)
            .ok_or(Error::Malformed("m17 frame truncated"))?;
        let expected = body_len(kind).ok_or(Error::Malformed("m17 frame kind"))?;
        let body = &bytes[ENVELOPE_HEADER..];
        if body.len() != expected {
            return Err(Error::Malformed("m17 body length"));
        }
        trace!("m17: frame kind {kind}, {} bytes", body.len());
        Ok(match kind {
            KIND_LSF => Self::Lsf(Lsf::from_bytes(body)?),
            KIND_STREAM => {
                let mut lich = [0u8; LICH_LEN];
                let mut payload = [0u8; STREAM_PAYLOAD];
                lich.copy_from_slice(&body[..LICH_LEN]);
                payload.copy_from_slice(&body[LICH_LEN + 2..]);
                let number = u16::from_be_bytes([body[LICH_LEN], body[LICH_LEN + 1]]);
                Self::Stream(StreamFrame {
                    lich,
                    frame_number: number & !END_OF_STREAM,
                    end_of_stream: number & END_OF_STREAM != 0,
                    payload,
                })
            }
            KIND_PACKET => {
                let mut payload = [0u8; PACKET_CHUNK];
                payload.copy_from_slice(&body[..PACKET_CHUNK]);
                Self::Packet(PacketFrame {
                    payload,
                    counter: body[PACKET_CHUNK],
                })
            }
            KIND_EOT => Self::Eot,
            _ => {
                let mut data = [0u8; BERT_LEN];
                data.copy_from_slice(body);
                Self::Bert(data)
            }
        })
    }
}

/// LICH chunk `counter` (0..=5) of an encoded LSF
///
/// # Errors
///
/// `InvalidArgument` for a counter above 5.
pub fn lich_chunk(lsf: &[u8; LSF_LEN], counter: u8) -> Result<[u8; LICH_LEN]> {
    let index = usize::from(counter);
    if index >= LICH_COUNT {
        return Err(Error::InvalidArgument("lich counter"));
    }
    let mut out = [0u8; LICH_LEN];
    out[..LICH_CHUNK].copy_from_slice(&lsf[index * LICH_CHUNK..(index + 1) * LICH_CHUNK]);
    out[LICH_CHUNK] = counter << 5;
    Ok(out)
}

/// Rebuilds an LSF from the LICH chunks carried by stream frames
#[derive(Clone, Debug, Default)]
pub struct LichCollector {
    lsf: [u8; LSF_LEN],
    received: u8,
}

impl LichCollector {
    const ALL: u8 = (1 << LICH_COUNT) - 1;

    /// Empty collector
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lsf: [0; LSF_LEN],
            received: 0,
        }
    }

    /// Forget collected chunks
    pub fn reset(&mut self) {
        self.received = 0;
    }

    /// Chunks received so far
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.received.count_ones()
    }

    /// Add a LICH chunk; returns the LSF once all six are in and the CRC holds
    ///
    /// # Errors
    ///
    /// `Malformed` for a counter above 5, `IntegrityFailure` if the complete
    /// LSF fails its CRC (the collector starts over).
    pub fn push(&mut self, lich: &[u8; LICH_LEN]) -> Result<Option<Lsf>> {
        let index = usize::from(lich[LICH_CHUNK] >> 5);
        if index >= LICH_COUNT {
            return Err(Error::Malformed("lich counter"));
        }
        self.lsf[index * LICH_CHUNK..(index + 1) * LICH_CHUNK].copy_from_slice(&lich[..LICH_CHUNK]);
        self.received |= 1 << index;
        if self.received != Self::ALL {
            return Ok(None);
        }
        self.received = 0;
        Lsf::from_bytes(&self.lsf).map(Some)
    }
}
