//! Session context for request/response correlation

use std::net::SocketAddr;

use crate::protocol::PacketCategory;

/// Routing information of the most recent valid request.
///
/// There is a single slot per relay. A new request replaces it wholesale even
/// when the previous request has not been answered yet, so a late camera
/// response goes to the newest peer with the newest sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
    /// Sequence number to echo in the reply
    pub sequence_number: u32,
    /// Controller that sent the request
    pub peer: SocketAddr,
    /// Category of the request
    pub category: PacketCategory,
}

impl SessionContext {
    pub fn new(sequence_number: u32, peer: SocketAddr, category: PacketCategory) -> Self {
        Self {
            sequence_number,
            peer,
            category,
        }
    }

    /// Category the reply to this request is sent with
    pub fn reply_category(&self) -> PacketCategory {
        self.category.reply_category()
    }
}
