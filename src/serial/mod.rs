//! Serial module - byte channel to the camera
//!
//! Provides:
//! - `SerialLink`, the async byte channel pair the gateway consumes
//! - Bridging a blocking `serialport` handle into that pair
//! - Framing of the inbound byte stream
//! - Enumeration of available serial adapters

mod framer;

pub use framer::*;

use bytes::Bytes;
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use std::fmt;
use std::io::{self, Read, Write};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Read timeout of the blocking port; bounds how fast the reader notices shutdown
const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Queue depth between the gateway and the serial threads
const CHANNEL_CAPACITY: usize = 64;

const READ_BUF_SIZE: usize = 256;

/// Serial errors
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("Serial port error: {0}")]
    Port(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Write queue full, {0} bytes dropped")]
    QueueFull(usize),

    #[error("Serial link closed")]
    Closed,
}

pub type SerialResult<T> = Result<T, SerialError>;

/// Serial line settings
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`
    pub path: String,
    /// Line speed in baud
    pub baud_rate: u32,
}

impl SerialConfig {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
        }
    }
}

/// An open duplex byte channel to the serial device.
///
/// Inbound chunks arrive exactly as read, with no framing applied. Outbound
/// writes are queued and performed elsewhere; write failures are reported
/// through the log only.
pub struct SerialLink {
    incoming: mpsc::Receiver<Bytes>,
    outgoing: mpsc::Sender<Bytes>,
}

impl SerialLink {
    /// Build a link from already-connected channel halves
    pub fn new(incoming: mpsc::Receiver<Bytes>, outgoing: mpsc::Sender<Bytes>) -> Self {
        Self { incoming, outgoing }
    }

    /// Open a serial port (8N1, no flow control) and bridge it to a link.
    ///
    /// One thread reads the port and one writes it; both exit once the link
    /// is dropped.
    pub fn open(config: &SerialConfig) -> SerialResult<Self> {
        let port = serialport::new(&config.path, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()?;
        let writer = port.try_clone()?;

        let (in_tx, in_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (out_tx, out_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let path = config.path.clone();
        std::thread::Builder::new()
            .name("serial-reader".to_string())
            .spawn(move || read_loop(port, in_tx, path))?;

        let path = config.path.clone();
        std::thread::Builder::new()
            .name("serial-writer".to_string())
            .spawn(move || write_loop(writer, out_rx, path))?;

        tracing::info!("Opened {} at {} baud (8N1)", config.path, config.baud_rate);

        Ok(Self::new(in_rx, out_tx))
    }

    /// Wait for the next chunk read from the device.
    /// Returns None once the reader has stopped
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.incoming.recv().await
    }

    /// Queue bytes for the device without waiting
    pub fn try_write(&self, data: Bytes) -> SerialResult<()> {
        self.outgoing.try_send(data).map_err(|e| match e {
            TrySendError::Full(data) => SerialError::QueueFull(data.len()),
            TrySendError::Closed(_) => SerialError::Closed,
        })
    }
}

fn read_loop(mut port: Box<dyn SerialPort>, tx: mpsc::Sender<Bytes>, path: String) {
    let mut buf = [0u8; READ_BUF_SIZE];

    while !tx.is_closed() {
        match port.read(&mut buf) {
            Ok(0) => continue,
            Ok(n) => {
                tracing::trace!("Read {} bytes from {}", n, path);
                if tx.blocking_send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                    break;
                }
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {
                continue
            }
            Err(e) => {
                tracing::error!("Serial read error on {}: {}", path, e);
                break;
            }
        }
    }

    tracing::debug!("Serial reader for {} stopped", path);
}

fn write_loop(mut port: Box<dyn SerialPort>, mut rx: mpsc::Receiver<Bytes>, path: String) {
    while let Some(data) = rx.blocking_recv() {
        if let Err(e) = port.write_all(&data).and_then(|_| port.flush()) {
            tracing::error!(
                "Serial write error on {} ({} bytes dropped): {}",
                path,
                data.len(),
                e
            );
        }
    }

    tracing::debug!("Serial writer for {} stopped", path);
}

/// Kind of serial adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Usb,
    Pci,
    Bluetooth,
    Unknown,
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PortKind::Usb => "USB",
            PortKind::Pci => "PCI",
            PortKind::Bluetooth => "Bluetooth",
            PortKind::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// A serial adapter present on this machine
#[derive(Debug, Clone)]
pub struct PortInfo {
    pub name: String,
    pub kind: PortKind,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

impl From<serialport::SerialPortInfo> for PortInfo {
    fn from(port: serialport::SerialPortInfo) -> Self {
        let mut info = PortInfo {
            name: port.port_name,
            kind: PortKind::Unknown,
            manufacturer: None,
            product: None,
            serial_number: None,
            vid: None,
            pid: None,
        };

        match port.port_type {
            SerialPortType::UsbPort(usb) => {
                info.kind = PortKind::Usb;
                info.manufacturer = usb.manufacturer;
                info.product = usb.product;
                info.serial_number = usb.serial_number;
                info.vid = Some(usb.vid);
                info.pid = Some(usb.pid);
            }
            SerialPortType::PciPort => info.kind = PortKind::Pci,
            SerialPortType::BluetoothPort => info.kind = PortKind::Bluetooth,
            SerialPortType::Unknown => {}
        }

        info
    }
}

impl fmt::Display for PortInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)?;
        if let (Some(vid), Some(pid)) = (self.vid, self.pid) {
            write!(f, " {:04x}:{:04x}", vid, pid)?;
        }
        let label: Vec<&str> = [&self.manufacturer, &self.product]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect();
        if !label.is_empty() {
            write!(f, " - {}", label.join(" "))?;
        }
        Ok(())
    }
}

/// List available serial ports.
///
/// On macOS only the /dev/cu.* (calling unit) devices are shown; their
/// /dev/tty.* twins block on open waiting for carrier detect.
pub fn list_ports() -> SerialResult<Vec<PortInfo>> {
    let ports = serialport::available_ports()?;

    Ok(ports
        .into_iter()
        .filter(|_p| {
            #[cfg(target_os = "macos")]
            {
                !_p.port_name.starts_with("/dev/tty.")
            }
            #[cfg(not(target_os = "macos"))]
            {
                true
            }
        })
        .map(PortInfo::from)
        .collect())
}
