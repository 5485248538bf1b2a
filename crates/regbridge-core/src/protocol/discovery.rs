//! Port auto-detection
//!
//! Boards built around the FTDI FT2232 expose two serial interfaces from one
//! chip. Board vendors wire interface 0 to JTAG for programming and
//! interface 1 to the FPGA's UART, so the bridge always sits on the
//! higher-numbered interface.

use std::cmp::Ordering;
use thiserror::Error;

use super::serial::{natural_key, PortInfo, SerialBackend};
use crate::config::PortSpec;
use crate::error::Result;

/// FTDI USB vendor ID
pub const FTDI_VID: u16 = 0x0403;

/// FT2232 (dual UART) USB product ID
pub const FT2232_PID: u16 = 0x6010;

/// Errors that can occur while picking the port automatically
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortResolutionError {
    /// Not exactly two FT2232 interfaces attached
    #[error("Expected to see two serial ports for FT2232 device, but instead see {0}")]
    WrongCandidateCount(usize),

    /// The two interfaces belong to different chips
    #[error(
        "Serial numbers should be the same on both FT2232 ports ({first:?} vs {second:?}) - \
         probably grabbed ports on two different devices"
    )]
    SerialNumberMismatch {
        /// Serial number of the first interface
        first: Option<String>,
        /// Serial number of the second interface
        second: Option<String>,
    },

    /// Location and name both compare equal
    #[error("Cannot tell FT2232 interfaces {first} and {second} apart")]
    Ambiguous {
        /// Name of the first interface
        first: String,
        /// Name of the second interface
        second: String,
    },
}

/// Pick the UART interface of the single attached FT2232 from a port list.
pub fn select_uart_port(ports: &[PortInfo]) -> std::result::Result<&PortInfo, PortResolutionError> {
    let candidates: Vec<&PortInfo> = ports
        .iter()
        .filter(|p| p.matches_usb_id(FTDI_VID, FT2232_PID))
        .collect();

    let &[first, second] = candidates.as_slice() else {
        return Err(PortResolutionError::WrongCandidateCount(candidates.len()));
    };

    if first.serial_number != second.serial_number {
        return Err(PortResolutionError::SerialNumberMismatch {
            first: first.serial_number.clone(),
            second: second.serial_number.clone(),
        });
    }

    match interface_order(first, second) {
        Ordering::Greater => Ok(first),
        Ordering::Less => Ok(second),
        Ordering::Equal => Err(PortResolutionError::Ambiguous {
            first: first.name.clone(),
            second: second.name.clone(),
        }),
    }
}

/// Order two interfaces of the same chip by USB location, or by port name
/// when the platform does not report locations (macOS names the FT2232
/// halves `...A` and `...B`).
fn interface_order(a: &PortInfo, b: &PortInfo) -> Ordering {
    match (&a.location, &b.location) {
        (Some(loc_a), Some(loc_b)) => natural_key(loc_a).cmp(&natural_key(loc_b)),
        _ => natural_key(&a.name).cmp(&natural_key(&b.name)),
    }
}

/// Turn a port spec into a device path, scanning the host when it is `auto`
pub fn resolve_port<B: SerialBackend>(backend: &B, spec: &PortSpec) -> Result<String> {
    match spec {
        PortSpec::Path(path) => Ok(path.clone()),
        PortSpec::Auto => {
            let ports = backend.list_ports()?;
            let port = select_uart_port(&ports)?;
            tracing::debug!(
                "Auto-detected FT2232 UART interface {} (location {:?})",
                port.name,
                port.location
            );
            Ok(port.name.clone())
        }
    }
}
