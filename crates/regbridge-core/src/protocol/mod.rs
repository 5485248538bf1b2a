//! UART Bridge Protocol
//!
//! Implements the fixed-width ASCII protocol spoken by the FPGA's UART bus
//! bridge.
//!
//! Requests are written back to back; the bridge answers read requests
//! strictly in order and never acknowledges writes.

mod connection;
pub mod discovery;
mod error;
pub mod frame;
pub mod serial;

pub use connection::BusInterface;
pub use discovery::{resolve_port, select_uart_port, PortResolutionError};
pub use error::ProtocolError;
pub use frame::{decode_read_response, encode_read_request, encode_write_request, hex4};
pub use serial::{list_ports, open_port, NativeBackend, PortInfo, SerialBackend};

/// Frame preamble byte
pub const PREAMBLE: u8 = b'M';

/// Frame terminator
pub const EOL: &[u8; 2] = b"\r\n";

/// Length of a read request frame
pub const READ_REQUEST_LEN: usize = 7;

/// Length of a write request frame
pub const WRITE_REQUEST_LEN: usize = 11;

/// Length of a read response frame
pub const READ_RESPONSE_LEN: usize = 7;
