//! Crate-wide error type

use thiserror::Error;

use crate::config::ConfigError;
use crate::protocol::{PortResolutionError, ProtocolError};

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors surfaced by the bus interface.
///
/// None of these are retried internally. The protocol carries no sequence
/// numbers or checksums, so after a fault the link cannot be resynchronized
/// and the caller has to decide what to do.
#[derive(Error, Debug)]
pub enum BusError {
    /// Rejected configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Auto-detection failed
    #[error(transparent)]
    PortResolution(#[from] PortResolutionError),

    /// Malformed or missing response
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Write addresses and data differ in length
    #[error("Write addresses and write data must be of same length ({addrs} addresses, {datas} data words)")]
    Arity {
        /// Number of addresses
        addrs: usize,
        /// Number of data words
        datas: usize,
    },

    /// Port could not be listed or opened
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// Configured deadline passed before a chunk arrived
    #[error("Timed out after {timeout_ms}ms with {received} of {expected} bytes received")]
    Timeout {
        /// Bytes the chunk needed
        expected: usize,
        /// Bytes read before the deadline
        received: usize,
        /// Deadline in milliseconds
        timeout_ms: u64,
    },

    /// Read or write on the open port failed
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// HDL template rendering failed
    #[error(transparent)]
    Template(#[from] anyhow::Error),
}

impl From<serialport::Error> for BusError {
    fn from(e: serialport::Error) -> Self {
        BusError::SerialError(e.to_string())
    }
}
