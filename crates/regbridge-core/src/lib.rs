//! # regbridge Core Library
//!
//! Host-side access to the register bus an FPGA exposes over a UART.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Validation of UART transport parameters (clock, baud rate, chunking)
//! - Automatic detection of FT2232-based boards
//! - The fixed-width ASCII frame codec spoken by the FPGA bridge
//! - Chunked batch register reads and writes
//!
//! ## Wire format
//!
//! | Message       | Bytes | Layout               |
//! |---------------|-------|----------------------|
//! | Read request  | 7     | `M` `AAAA` `\r\n`    |
//! | Write request | 11    | `M` `AAAA` `DDDD` `\r\n` |
//! | Read response | 7     | `M` `DDDD` `\r\n`    |
//!
//! ## Example
//!
//! ```rust,ignore
//! use regbridge_core::prelude::*;
//!
//! let config = BusConfig::new("auto", 100_000_000, 115_200)?;
//! let mut bus = BusInterface::new(config);
//!
//! bus.write_registers(&[0x0000, 0x0001], &[0x1234, 0x5678])?;
//! let values = bus.read_registers(&[0x0000, 0x0001])?;
//! ```

pub mod config;
pub mod error;
pub mod hdl;
pub mod protocol;

pub use error::{BusError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{BusConfig, ConfigError, DerivedTiming, PortSpec};
    pub use crate::error::{BusError, Result};
    pub use crate::hdl::HdlTemplates;
    pub use crate::protocol::{
        BusInterface, NativeBackend, PortInfo, PortResolutionError, ProtocolError, SerialBackend,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
