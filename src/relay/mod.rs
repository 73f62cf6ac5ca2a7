//! Relay module - correlates controller requests with camera responses
//!
//! The engine does no I/O. It turns inbound events into `Action`s that the
//! gateway loop executes against the network and serial channels.

mod engine;
mod session;

pub use engine::*;
pub use session::*;

use thiserror::Error;

use crate::protocol::CodecError;

/// Relay errors. Neither is fatal; the event is logged and dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Malformed packet: {0}")]
    Malformed(#[from] CodecError),

    #[error("Orphan serial frame ({0} bytes): no request to answer")]
    OrphanFrame(usize),

    #[error("Serial frame too large to encapsulate: {0} bytes")]
    FrameTooLarge(usize),
}

pub type RelayResult<T> = Result<T, RelayError>;
