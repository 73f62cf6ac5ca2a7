//! VISCA Gateway
//!
//! Drives the relay engine from the network channel and the serial link on a
//! single task. Handlers never run concurrently, so the session context needs
//! no locking, but an intervening request can still take over the reply of an
//! earlier one.

use bytes::Bytes;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use thiserror::Error;

use super::NetworkChannel;
use crate::protocol::{Hex, HEADER_SIZE, MAX_PAYLOAD_SIZE};
use crate::relay::{Action, RelayEngine, RelayError};
use crate::serial::{FrameDecoder, SerialLink};

/// Large enough for any packet the header can describe
const RECV_BUF_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// Gateway errors
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Bind failed: {0}")]
    BindFailed(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GatewayStats {
    /// Request payloads handed to the serial writer
    pub requests_forwarded: u64,
    /// Replies sent back to controllers
    pub replies_sent: u64,
    /// Datagrams rejected by the codec
    pub malformed_dropped: u64,
    /// Serial frames received with no request to answer
    pub orphan_frames: u64,
    /// Serial frames too large to encapsulate
    pub oversized_frames: u64,
    /// Unterminated serial runs the framer threw away
    pub discarded_runs: u64,
    /// Failed sends, writes and receives on either channel
    pub io_errors: u64,
}

/// Relays between VISCA-over-IP controllers and one serial device
pub struct Gateway<N> {
    /// Datagram channel to the controllers
    network: N,
    /// Byte channel to the device
    serial: SerialLink,
    /// Splits serial input into responses
    framer: FrameDecoder,
    /// Session context and event handlers
    engine: RelayEngine,
    /// Whether serial input is still being delivered
    serial_open: bool,
    stats: GatewayStats,
}

impl<N: NetworkChannel> Gateway<N> {
    /// Create a gateway over already-open channels
    pub fn new(network: N, serial: SerialLink) -> Self {
        Self {
            network,
            serial,
            framer: FrameDecoder::new(),
            engine: RelayEngine::new(),
            serial_open: true,
            stats: GatewayStats::default(),
        }
    }

    /// Run until `shutdown` resolves.
    ///
    /// Channel failures are logged and the loop keeps going; nothing after
    /// startup stops the gateway except the shutdown signal.
    pub async fn run<F>(mut self, shutdown: F) -> GatewayStats
    where
        F: Future<Output = ()>,
    {
        match self.network.local_addr() {
            Ok(addr) => tracing::info!("Gateway relaying on {}", addr),
            Err(e) => tracing::warn!("Gateway started, local address unknown: {}", e),
        }

        tokio::pin!(shutdown);
        let mut buf = vec![0u8; RECV_BUF_SIZE];

        loop {
            tokio::select! {
                result = self.network.recv_from(&mut buf) => {
                    match result {
                        Ok((n, from)) => self.on_datagram(&buf[..n], from),
                        Err(e) => {
                            self.stats.io_errors += 1;
                            tracing::error!("Network receive error: {}", e);
                        }
                    }
                }

                chunk = self.serial.recv(), if self.serial_open => {
                    match chunk {
                        Some(chunk) => self.on_serial_chunk(&chunk).await,
                        None => {
                            tracing::error!("Serial input closed; no more replies can be relayed");
                            self.serial_open = false;
                        }
                    }
                }

                _ = &mut shutdown => {
                    tracing::info!("Gateway shutdown requested");
                    break;
                }
            }
        }

        tracing::info!(
            requests = self.stats.requests_forwarded,
            replies = self.stats.replies_sent,
            malformed = self.stats.malformed_dropped,
            orphans = self.stats.orphan_frames,
            oversized = self.stats.oversized_frames,
            discarded = self.stats.discarded_runs,
            io_errors = self.stats.io_errors,
            "Gateway stopped"
        );

        self.stats
    }

    fn on_datagram(&mut self, data: &[u8], from: SocketAddr) {
        match self.engine.handle_datagram(data, from) {
            Ok(Action::WriteSerial(payload)) => self.write_serial(payload),
            Ok(action) => tracing::error!("Unexpected action for datagram: {:?}", action),
            Err(e) => {
                self.stats.malformed_dropped += 1;
                tracing::warn!("Dropping datagram from {}: {} [{}]", from, e, Hex(data));
            }
        }
    }

    async fn on_serial_chunk(&mut self, chunk: &[u8]) {
        self.framer.extend(chunk);

        while let Some(frame) = self.framer.decode() {
            match self.engine.handle_serial_frame(frame.clone()) {
                Ok(Action::SendDatagram { to, data }) => self.send_reply(to, data).await,
                Ok(action) => tracing::error!("Unexpected action for serial frame: {:?}", action),
                Err(e @ RelayError::OrphanFrame(_)) => {
                    self.stats.orphan_frames += 1;
                    tracing::warn!("Dropping serial frame [{}]: {}", Hex(&frame), e);
                }
                Err(e) => {
                    self.stats.oversized_frames += 1;
                    tracing::warn!("Dropping serial frame: {}", e);
                }
            }
        }

        self.stats.discarded_runs = self.framer.discarded();
    }

    fn write_serial(&mut self, payload: Bytes) {
        let len = payload.len();
        match self.serial.try_write(payload) {
            Ok(()) => {
                self.stats.requests_forwarded += 1;
                tracing::trace!("Queued {} bytes for serial", len);
            }
            Err(e) => {
                // The session stays in place; the next frame still answers it
                self.stats.io_errors += 1;
                tracing::error!("Serial write failed, request abandoned: {}", e);
            }
        }
    }

    async fn send_reply(&mut self, to: SocketAddr, data: Bytes) {
        match self.network.send_to(&data, to).await {
            Ok(_) => self.stats.replies_sent += 1,
            Err(e) => {
                self.stats.io_errors += 1;
                tracing::error!("Failed to send reply to {}: {}", to, e);
            }
        }
    }
}
