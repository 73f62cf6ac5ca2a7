//! Protocol module - VISCA-over-IP packet framing
//!
//! Every datagram carries exactly one packet in a fixed binary format:
//! - 2 bytes payload category (big-endian)
//! - 2 bytes payload length (big-endian)
//! - 4 bytes sequence number (big-endian)
//! - Variable length VISCA payload

mod codec;
mod packet;

pub use codec::*;
pub use packet::*;

/// Size of the fixed packet header
pub const HEADER_SIZE: usize = 8;

/// Largest payload the 16-bit length field can describe
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Conventional UDP port for VISCA-over-IP
pub const DEFAULT_PORT: u16 = 52381;

/// Trailer byte ending every VISCA command and response on the serial line
pub const TERMINATOR: u8 = 0xFF;
