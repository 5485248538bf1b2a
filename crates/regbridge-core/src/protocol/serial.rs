//! Serial port handling
//!
//! Provides host serial device enumeration and the transport the bus
//! interface talks through.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
#[cfg(target_os = "linux")]
use std::fs;
use std::io::{Read, Write};
#[cfg(target_os = "linux")]
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Read timeout handed to the OS driver. Reads that hit it are retried, so
/// this only bounds how often a configured deadline gets checked.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Information about an available serial port
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB1" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Product name (if available)
    pub product: Option<String>,

    /// Serial number (if available)
    pub serial_number: Option<String>,

    /// USB interface location such as "1-1.2:1.1" (Linux only)
    pub location: Option<String>,
}

impl PortInfo {
    /// Whether this port belongs to a USB device with the given IDs
    pub fn matches_usb_id(&self, vid: u16, pid: u16) -> bool {
        self.vid == Some(vid) && self.pid == Some(pid)
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let location = usb_location(&info.port_name);
        match info.port_type {
            SerialPortType::UsbPort(usb_info) => Self {
                name: info.port_name,
                vid: Some(usb_info.vid),
                pid: Some(usb_info.pid),
                manufacturer: usb_info.manufacturer,
                product: usb_info.product,
                serial_number: usb_info.serial_number,
                location,
            },
            _ => Self {
                name: info.port_name,
                location,
                ..Self::default()
            },
        }
    }
}

/// Look up the USB interface directory a tty hangs off in sysfs.
///
/// `/sys/class/tty/ttyUSB1/device` resolves to something like
/// `/sys/devices/pci0000:00/.../usb1/1-1/1-1:1.1/ttyUSB1`; the interface
/// component is the one shaped like `<bus>-<ports>:<config>.<interface>`.
#[cfg(target_os = "linux")]
fn usb_location(port_name: &str) -> Option<String> {
    let tty = Path::new(port_name).file_name()?;
    let device = fs::canonicalize(Path::new("/sys/class/tty").join(tty).join("device")).ok()?;
    device
        .ancestors()
        .filter_map(|dir| dir.file_name()?.to_str())
        .find(|name| is_usb_interface_dir(name))
        .map(str::to_string)
}

#[cfg(not(target_os = "linux"))]
fn usb_location(_port_name: &str) -> Option<String> {
    None
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn is_usb_interface_dir(name: &str) -> bool {
    let Some((ports, interface)) = name.split_once(':') else {
        return false;
    };
    ports.starts_with(|c: char| c.is_ascii_digit())
        && ports.contains('-')
        && interface.contains('.')
        && interface.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// One run of a natural sort key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum KeyPart {
    Number(u64),
    Text(String),
}

/// Split a name into digit and non-digit runs so that "ttyUSB10" sorts after
/// "ttyUSB9" and "1-10" after "1-9".
pub(crate) fn natural_key(name: &str) -> Vec<KeyPart> {
    let mut parts = Vec::new();
    let mut rest = name;

    while let Some(first) = rest.chars().next() {
        let is_digit = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != is_digit)
            .unwrap_or(rest.len());
        let (run, tail) = rest.split_at(end);
        parts.push(if is_digit {
            KeyPart::Number(run.parse().unwrap_or(u64::MAX))
        } else {
            KeyPart::Text(run.to_string())
        });
        rest = tail;
    }

    parts
}

/// List all available serial ports in deterministic order
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let mut ports: Vec<PortInfo> = serialport::available_ports()?
        .into_iter()
        .map(PortInfo::from)
        .collect();
    ports.sort_by_cached_key(|p| natural_key(&p.name));
    Ok(ports)
}

/// Open a serial port 8-N-1 without flow control
pub fn open_port(name: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>> {
    let port = serialport::new(name, baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(POLL_INTERVAL)
        .open()?;

    // Stale bytes from a previous session would shift every response
    port.clear(serialport::ClearBuffer::Input)?;

    tracing::debug!("Opened serial port {name} at {baud_rate} baud");
    Ok(port)
}

/// Host serial capability: device enumeration plus opening a byte stream.
///
/// The bus interface only needs these two things from the host, which lets
/// it run against an emulated bridge in tests.
pub trait SerialBackend {
    /// Byte stream to the bridge
    type Port: Read + Write;

    /// List the host's serial devices
    fn list_ports(&self) -> Result<Vec<PortInfo>>;

    /// Open a device at the given baud rate
    fn open(&self, path: &str, baud_rate: u32) -> Result<Self::Port>;
}

/// Serial backend using the operating system's serial ports
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend;

impl SerialBackend for NativeBackend {
    type Port = Box<dyn SerialPort>;

    fn list_ports(&self) -> Result<Vec<PortInfo>> {
        list_ports()
    }

    fn open(&self, path: &str, baud_rate: u32) -> Result<Self::Port> {
        open_port(path, baud_rate)
    }
}
