//! M17 digital voice and data protocol
//!
//! Byte-level view of M17 on the shared link: callsign addressing, the Link
//! Setup Frame, stream/packet/EOT/BERT frames in a small byte envelope, packet
//! mode segmentation, and the symbol-level helpers the demodulator needs
//! (symbol map, randomizer, slicer, syncword matcher).

pub mod callsign;
pub mod frame;
pub mod lsf;
pub mod packet;
pub mod phy;

pub use frame::{LichCollector, M17Frame, StreamFrame};
pub use lsf::{Lsf, LsfType, Position};
pub use packet::{PacketAssembler, PacketFrame};

/// Link Setup Frame syncword
pub const SYNC_LSF: u16 = 0x55F7;
/// Stream frame syncword
pub const SYNC_STREAM: u16 = 0xFF5D;
/// Packet frame syncword
pub const SYNC_PACKET: u16 = 0x75FF;
/// BERT frame syncword
pub const SYNC_BERT: u16 = 0xDF55;
/// End of transmission marker
pub const SYNC_EOT: u16 = 0x555D;
