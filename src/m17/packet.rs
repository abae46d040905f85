//! M17 packet mode
//!
//! A packet is the application data followed by its M17 CRC (big-endian),
//! cut into 25-byte frames. Each frame carries a counter byte: bit 7 marks
//! the last frame, bits 6..2 hold the frame index, or for the last frame the
//! number of valid bytes in it.

use heapless::Vec;
use log::debug;

use crate::error::{Error, Result};
use crate::fec::crc::m17_crc;

/// Payload bytes per packet frame
pub const PACKET_CHUNK: usize = 25;

/// Frames in the largest packet
pub const MAX_FRAMES: usize = 33;

/// Largest application payload (33 frames less the CRC)
pub const MAX_PACKET_LEN: usize = MAX_FRAMES * PACKET_CHUNK - 2;

const EOF: u8 = 0x80;
const FIELD_MASK: u8 = 0x1F;

/// One packet frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketFrame {
    /// Data bytes (the tail of the last frame is padding)
    pub payload: [u8; PACKET_CHUNK],
    /// EOF flag and index or byte count
    pub counter: u8,
}

impl PacketFrame {
    /// Last frame of the packet
    #[must_use]
    pub const fn eof(&self) -> bool {
        self.counter & EOF != 0
    }

    /// Frame index (non-final frames only)
    #[must_use]
    pub const fn index(&self) -> Option<u8> {
        if self.eof() {
            None
        } else {
            Some((self.counter >> 2) & FIELD_MASK)
        }
    }

    /// Valid bytes in this frame
    #[must_use]
    pub const fn len(&self) -> usize {
        if self.eof() {
            ((self.counter >> 2) & FIELD_MASK) as usize
        } else {
            PACKET_CHUNK
        }
    }

    /// True for a final frame with no valid bytes
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Valid bytes of this frame
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.payload[..self.len().min(PACKET_CHUNK)]
    }
}

/// Split `data` plus its CRC into packet frames
///
/// # Errors
///
/// `InvalidArgument` if `data` is empty or longer than [`MAX_PACKET_LEN`].
pub fn packetize(data: &[u8]) -> Result<Vec<PacketFrame, MAX_FRAMES>> {
    if data.is_empty() || data.len() > MAX_PACKET_LEN {
        return Err(Error::InvalidArgument("m17 packet length"));
    }
    let crc = m17_crc(data).to_be_bytes();
    let total = data.len() + 2;
    let count = total.div_ceil(PACKET_CHUNK);
    let byte_at = |i: usize| {
        if i < data.len() {
            data[i]
        } else {
            crc[i - data.len()]
        }
    };

    let mut frames = Vec::new();
    for index in 0..count {
        let start = index * PACKET_CHUNK;
        let end = (start + PACKET_CHUNK).min(total);
        let mut payload = [0u8; PACKET_CHUNK];
        for (slot, i) in payload.iter_mut().zip(start..end) {
            *slot = byte_at(i);
        }
        #[allow(clippy::cast_possible_truncation)]
        let counter = if index + 1 == count {
            EOF | (((end - start) as u8) << 2)
        } else {
            (index as u8) << 2
        };
        frames
            .push(PacketFrame { payload, counter })
            .map_err(|_| Error::ResourceExhausted("m17 packet frames"))?;
    }
    Ok(frames)
}

/// Reassembles packet frames and checks the CRC
#[derive(Clone, Debug, Default)]
pub struct PacketAssembler {
    buffer: Vec<u8, { MAX_FRAMES * PACKET_CHUNK }>,
    next: u8,
}

impl PacketAssembler {
    /// Empty assembler
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            next: 0,
        }
    }

    /// Drop a partial packet
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.next = 0;
    }

    /// Frames collected so far
    #[must_use]
    pub const fn frames(&self) -> u8 {
        self.next
    }

    /// Add a frame; returns the application data once the last frame arrives
    ///
    /// # Errors
    ///
    /// - `Malformed` for an out-of-order index, a bad final count or an
    ///   overlong packet. The assembler starts over.
    /// - `IntegrityFailure` if the CRC does not match.
    pub fn push(&mut self, frame: &PacketFrame) -> Result<Option<Vec<u8, MAX_PACKET_LEN>>> {
        if let Some(index) = frame.index() {
            if index != self.next {
                debug!("m17: packet frame {index} out of order, expected {}", self.next);
                self.reset();
                return Err(Error::Malformed("m17 packet order"));
            }
            if self.buffer.extend_from_slice(&frame.payload).is_err() {
                self.reset();
                return Err(Error::Malformed("m17 packet too long"));
            }
            self.next += 1;
            return Ok(None);
        }

        let len = frame.len();
        if len == 0 || len > PACKET_CHUNK || self.buffer.extend_from_slice(&frame.payload[..len]).is_err() {
            self.reset();
            return Err(Error::Malformed("m17 packet final count"));
        }
        let result = self.finish();
        self.reset();
        result.map(Some)
    }

    fn finish(&self) -> Result<Vec<u8, MAX_PACKET_LEN>> {
        if self.buffer.len() < 3 {
            return Err(Error::Malformed("m17 packet too short"));
        }
        let (data, crc) = self.buffer.split_at(self.buffer.len() - 2);
        if m17_crc(data).to_be_bytes() != [crc[0], crc[1]] {
            return Err(Error::IntegrityFailure("m17 packet crc"));
        }
        Vec::from_slice(data).map_err(|()| Error::Malformed("m17 packet too long"))
    }
}
