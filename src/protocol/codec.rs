//! Protocol codec for encoding/decoding packets
//!
//! Datagrams are self-delimiting, so decoding works on one complete buffer
//! and never waits for more data.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::{Packet, PacketCategory, HEADER_SIZE};

/// Codec errors. Everything except `PayloadTooLarge` marks a malformed packet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Truncated packet: {0} bytes, header needs 8")]
    Truncated(usize),

    #[error("Unknown packet category: {0:#06x}")]
    UnknownCategory(u16),

    #[error("Length mismatch: header declares {declared} bytes, {actual} present")]
    LengthMismatch { declared: u16, actual: usize },

    #[error("Payload too large: {0} bytes (max: {1})")]
    PayloadTooLarge(usize, usize),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Encode a packet into a buffer
pub fn encode_into(packet: &Packet, buf: &mut BytesMut) {
    buf.reserve(HEADER_SIZE + packet.payload().len());

    // Write header
    buf.put_u16(packet.category().code());
    buf.put_u16(packet.payload_len());
    buf.put_u32(packet.sequence_number());

    // Write payload
    buf.put_slice(packet.payload());
}

/// Encode a packet into a freshly allocated datagram
pub fn encode(packet: &Packet) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + packet.payload().len());
    encode_into(packet, &mut buf);
    buf.freeze()
}

/// Decode one datagram into a packet
pub fn decode(data: &[u8]) -> CodecResult<Packet> {
    if data.len() < HEADER_SIZE {
        return Err(CodecError::Truncated(data.len()));
    }

    let mut header = &data[..HEADER_SIZE];
    let code = header.get_u16();
    let declared = header.get_u16();
    let sequence = header.get_u32();

    let category = PacketCategory::from_code(code).ok_or(CodecError::UnknownCategory(code))?;

    let payload = &data[HEADER_SIZE..];
    if payload.len() != declared as usize {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: payload.len(),
        });
    }

    Packet::new(category, sequence, Bytes::copy_from_slice(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn header(code: u16, declared: u16, sequence: u32) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(&code.to_be_bytes());
        buf.extend_from_slice(&declared.to_be_bytes());
        buf.extend_from_slice(&sequence.to_be_bytes());
        buf
    }

    #[test]
    fn test_encode_layout() {
        let packet = Packet::new(
            PacketCategory::Command,
            0x0102_0304,
            vec![0x81, 0x01, 0x06, 0x01, 0xFF],
        )
        .unwrap();

        let encoded = encode(&packet);
        assert_eq!(
            &encoded[..],
            &[0x01, 0x00, 0x00, 0x05, 0x01, 0x02, 0x03, 0x04, 0x81, 0x01, 0x06, 0x01, 0xFF]
        );
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let packets = vec![
            Packet::new(PacketCategory::Command, 1, vec![0x81, 0x01, 0x04, 0x00, 0x02, 0xFF]),
            Packet::new(PacketCategory::Inquiry, 3, vec![0x81, 0x09, 0x04, 0x47, 0xFF]),
            Packet::new(PacketCategory::ControlCommand, 7, vec![0x01]),
            Packet::new(PacketCategory::ControlReply, u32::MAX, Vec::new()),
            Packet::new(PacketCategory::DeviceSettingCommand, 0, vec![0x88, 0x30, 0x01, 0xFF]),
            Packet::new(PacketCategory::Reply, 42, vec![0x55; 65535]),
        ];

        for packet in packets {
            let packet = packet.unwrap();
            let decoded = assert_ok!(decode(&encode(&packet)));
            assert_eq!(decoded, packet);
        }
    }

    #[test]
    fn test_encode_into_appends() {
        let first = Packet::new(PacketCategory::Inquiry, 1, vec![0xFF]).unwrap();
        let mut buf = BytesMut::from(&b"xx"[..]);
        encode_into(&first, &mut buf);
        assert_eq!(buf.len(), 2 + HEADER_SIZE + 1);
        assert_eq!(assert_ok!(decode(&buf[2..])), first);
    }

    #[test]
    fn test_truncated() {
        assert_eq!(decode(&[]), Err(CodecError::Truncated(0)));
        assert_eq!(decode(&[0x01, 0x00, 0x00]), Err(CodecError::Truncated(3)));
        assert_eq!(decode(&header(0x0100, 0, 9)[..7]), Err(CodecError::Truncated(7)));
    }

    #[test]
    fn test_header_only() {
        let packet = assert_ok!(decode(&header(0x0110, 0, 9)));
        assert_eq!(packet.category(), PacketCategory::Inquiry);
        assert_eq!(packet.sequence_number(), 9);
        assert!(packet.payload().is_empty());
    }

    #[test]
    fn test_unknown_category() {
        for code in [0x0000u16, 0xFFFF, 0x0101, 0x0112, 0x0202, 0x0300] {
            let mut data = header(code, 1, 1);
            data.push(0xFF);
            assert_eq!(decode(&data), Err(CodecError::UnknownCategory(code)));
        }
    }

    #[test]
    fn test_length_mismatch_declared_larger() {
        let mut data = header(0x0100, 5, 1);
        data.extend_from_slice(&[0x81, 0x01, 0xFF]);

        let err = assert_err!(decode(&data));
        assert_eq!(err, CodecError::LengthMismatch { declared: 5, actual: 3 });
    }

    #[test]
    fn test_length_mismatch_declared_smaller() {
        let mut data = header(0x0100, 2, 1);
        data.extend_from_slice(&[0x81, 0x01, 0xFF]);

        let err = assert_err!(decode(&data));
        assert_eq!(err, CodecError::LengthMismatch { declared: 2, actual: 3 });

        let mut data = header(0x0200, 0, 1);
        data.push(0x01);
        assert_eq!(
            decode(&data),
            Err(CodecError::LengthMismatch { declared: 0, actual: 1 })
        );
    }

    #[test]
    fn test_sequence_number_unconstrained() {
        for sequence in [0u32, 1, 0x7FFF_FFFF, u32::MAX] {
            let mut data = header(0x0111, 1, sequence);
            data.push(0xFF);
            let packet = assert_ok!(decode(&data));
            assert_eq!(packet.sequence_number(), sequence);
            assert_eq!(packet.category(), PacketCategory::Reply);
        }
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CodecError::UnknownCategory(0xFFFF).to_string(),
            "Unknown packet category: 0xffff"
        );
        assert_eq!(
            CodecError::LengthMismatch { declared: 4, actual: 2 }.to_string(),
            "Length mismatch: header declares 4 bytes, 2 present"
        );
    }
}
