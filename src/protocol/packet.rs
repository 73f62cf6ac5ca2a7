//! Packet definitions
//!
//! Defines the packet categories and the immutable packet value exchanged
//! with VISCA-over-IP controllers.

use bytes::Bytes;
use std::fmt;

use super::{CodecError, MAX_PAYLOAD_SIZE};

/// Packet category, carried as a 16-bit code at the start of the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PacketCategory {
    Command = 0x0100,
    Inquiry = 0x0110,
    Reply = 0x0111,
    DeviceSettingCommand = 0x0120,
    ControlCommand = 0x0200,
    ControlReply = 0x0201,
}

impl PacketCategory {
    /// Every category known on the wire
    #[cfg(test)]
    pub const ALL: [PacketCategory; 6] = [
        PacketCategory::Command,
        PacketCategory::Inquiry,
        PacketCategory::Reply,
        PacketCategory::DeviceSettingCommand,
        PacketCategory::ControlCommand,
        PacketCategory::ControlReply,
    ];

    /// Wire code of this category
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Look up a category by its wire code
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x0100 => Some(PacketCategory::Command),
            0x0110 => Some(PacketCategory::Inquiry),
            0x0111 => Some(PacketCategory::Reply),
            0x0120 => Some(PacketCategory::DeviceSettingCommand),
            0x0200 => Some(PacketCategory::ControlCommand),
            0x0201 => Some(PacketCategory::ControlReply),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PacketCategory::Command => "Command",
            PacketCategory::Inquiry => "Inquiry",
            PacketCategory::Reply => "Reply",
            PacketCategory::DeviceSettingCommand => "DeviceSettingCommand",
            PacketCategory::ControlCommand => "ControlCommand",
            PacketCategory::ControlReply => "ControlReply",
        }
    }

    /// Category used when answering a request of this category.
    ///
    /// Control commands are answered with control replies; everything else,
    /// including inquiries and device setting commands, gets a plain reply.
    pub fn reply_category(self) -> Self {
        match self {
            PacketCategory::ControlCommand => PacketCategory::ControlReply,
            _ => PacketCategory::Reply,
        }
    }
}

impl fmt::Display for PacketCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single VISCA-over-IP packet.
///
/// The payload length is never stored; it is always `payload().len()`, which
/// construction guarantees fits the 16-bit length field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    category: PacketCategory,
    sequence_number: u32,
    payload: Bytes,
}

impl Packet {
    /// Create a packet, rejecting payloads the header cannot describe
    pub fn new(
        category: PacketCategory,
        sequence_number: u32,
        payload: impl Into<Bytes>,
    ) -> Result<Self, CodecError> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(CodecError::PayloadTooLarge(payload.len(), MAX_PAYLOAD_SIZE));
        }

        Ok(Self {
            category,
            sequence_number,
            payload,
        })
    }

    pub fn category(&self) -> PacketCategory {
        self.category
    }

    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Value of the header length field
    pub fn payload_len(&self) -> u16 {
        // Bounded by MAX_PAYLOAD_SIZE in `new`
        self.payload.len() as u16
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{} [{}]",
            self.category,
            self.sequence_number,
            Hex(&self.payload)
        )
    }
}

/// Renders bytes as space-separated uppercase hex pairs, e.g. `81 01 FF`
pub struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}
