//! Relay engine - pure event handlers with no I/O.

use bytes::Bytes;
use std::net::SocketAddr;

use super::{RelayError, RelayResult, SessionContext};
use crate::protocol::{decode, encode, Packet};

/// An action returned by the relay engine for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write these bytes verbatim to the serial device
    WriteSerial(Bytes),
    /// Send this encoded packet to a controller
    SendDatagram { to: SocketAddr, data: Bytes },
}

/// Single-slot request/response correlator
#[derive(Debug, Default)]
pub struct RelayEngine {
    session: Option<SessionContext>,
}

impl RelayEngine {
    pub fn new() -> Self {
        Self { session: None }
    }

    /// Context of the most recent valid request, if any arrived yet
    #[cfg(test)]
    pub fn session(&self) -> Option<&SessionContext> {
        self.session.as_ref()
    }

    /// Process a datagram received from `from`.
    ///
    /// A valid packet replaces the session context and yields its payload for
    /// the serial line. A malformed one leaves the context untouched.
    pub fn handle_datagram(&mut self, data: &[u8], from: SocketAddr) -> RelayResult<Action> {
        let packet = decode(data)?;

        tracing::debug!("Request from {}: {}", from, packet);

        if let Some(previous) = &self.session {
            tracing::trace!(
                "Replacing session #{} from {}",
                previous.sequence_number,
                previous.peer
            );
        }

        self.session = Some(SessionContext::new(
            packet.sequence_number(),
            from,
            packet.category(),
        ));

        Ok(Action::WriteSerial(packet.into_payload()))
    }

    /// Process one terminated frame read from the serial line.
    ///
    /// The frame is wrapped with the reply category and sequence number of
    /// the current session and addressed to its peer. The session itself is
    /// never changed here.
    pub fn handle_serial_frame(&self, frame: Bytes) -> RelayResult<Action> {
        let session = self.session.ok_or(RelayError::OrphanFrame(frame.len()))?;

        let len = frame.len();
        let packet = Packet::new(session.reply_category(), session.sequence_number, frame)
            .map_err(|_| RelayError::FrameTooLarge(len))?;

        tracing::debug!("Reply to {}: {}", session.peer, packet);

        Ok(Action::SendDatagram {
            to: session.peer,
            data: encode(&packet),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
