//! Protocol errors

use thiserror::Error;

/// Malformed or missing response data.
///
/// The protocol has no resynchronization mechanism, so each of these is a hard
/// transport fault for the call that hit it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Nothing came back
    #[error("No response received")]
    NoResponse,

    /// First byte was not `M`
    #[error("Bad message received, incorrect preamble {0:#04x}")]
    BadPreamble(u8),

    /// Response was not exactly 7 bytes
    #[error("Wrong number of bytes received, expecting {expected} but got {actual}")]
    WrongLength {
        /// Bytes a response must have
        expected: usize,
        /// Bytes actually seen
        actual: usize,
    },

    /// Response did not end in CRLF
    #[error("Bad message received, incorrect EOL")]
    BadTerminator,

    /// Data field was not four hex digits
    #[error("Bad message received, invalid hex data field {0:?}")]
    InvalidHex(String),

    /// Stream ended before the chunk was complete
    #[error("Response ended early: got {received} of {expected} bytes")]
    ShortRead {
        /// Bytes the chunk needed
        expected: usize,
        /// Bytes read before end of stream
        received: usize,
    },
}
