//! Network module - Handles the VISCA-over-IP side of the bridge
//!
//! Provides:
//! - The datagram channel abstraction used by the gateway
//! - UDP socket setup
//! - The gateway loop relaying between controllers and the serial device

mod gateway;

pub use gateway::*;

use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;

/// Configuration for the network side
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Port to listen on
    pub port: u16,
    /// Interface to bind to
    pub bind_address: IpAddr,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: crate::protocol::DEFAULT_PORT,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}

impl NetworkConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    pub fn with_bind_address(mut self, bind_address: IpAddr) -> Self {
        self.bind_address = bind_address;
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

/// A datagram channel carrying one packet per datagram
#[async_trait]
pub trait NetworkChannel: Send + Sync {
    /// Receive one datagram and the address it came from
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// Send one datagram to `target`
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl NetworkChannel for UdpSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }

    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, target).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }
}

/// Bind the UDP socket controllers talk to
pub async fn bind(config: &NetworkConfig) -> GatewayResult<UdpSocket> {
    let addr = config.socket_addr();
    let socket = UdpSocket::bind(addr)
        .await
        .map_err(|e| GatewayError::BindFailed(format!("Failed to bind to {}: {}", addr, e)))?;

    tracing::info!("Listening for VISCA-over-IP on {}", socket.local_addr()?);
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NetworkConfig::default();
        assert_eq!(config.port, 52381);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:52381");
    }

    #[tokio::test]
    async fn test_bind_ephemeral() {
        let config = NetworkConfig::new(0).with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let socket = bind(&config).await.unwrap();
        let addr = NetworkChannel::local_addr(&socket).unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_conflict() {
        let first = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = first.local_addr().unwrap().port();

        let config = NetworkConfig::new(port).with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let err = bind(&config).await.unwrap_err();
        assert!(matches!(err, GatewayError::BindFailed(_)));
    }
}
