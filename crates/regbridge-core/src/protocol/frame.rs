//! Frame encoding/decoding
//!
//! Frame format (all ASCII):
//! - 1 byte: Preamble `M`
//! - 4 bytes: Address, uppercase hex (requests)
//! - 4 bytes: Data, uppercase hex (write requests and read responses)
//! - 2 bytes: `\r\n`
//!
//! A read response reuses the address slot for the data, so it is 7 bytes
//! like a read request.

use super::{ProtocolError, EOL, PREAMBLE, READ_REQUEST_LEN, READ_RESPONSE_LEN, WRITE_REQUEST_LEN};

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Format a 16-bit value as exactly four uppercase hex digits
pub fn hex4(value: u16) -> String {
    let mut digits = Vec::with_capacity(4);
    push_hex4(&mut digits, value);
    digits.into_iter().map(char::from).collect()
}

fn push_hex4(buf: &mut Vec<u8>, value: u16) {
    for shift in [12u16, 8, 4, 0] {
        buf.push(HEX_DIGITS[usize::from((value >> shift) & 0xF)]);
    }
}

/// Encode a read request: `M AAAA \r\n`
pub fn encode_read_request(addr: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(READ_REQUEST_LEN);
    push_read_request(&mut frame, addr);
    frame
}

/// Encode a write request: `M AAAA DDDD \r\n`
pub fn encode_write_request(addr: u16, data: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(WRITE_REQUEST_LEN);
    push_write_request(&mut frame, addr, data);
    frame
}

fn push_read_request(buf: &mut Vec<u8>, addr: u16) {
    buf.push(PREAMBLE);
    push_hex4(buf, addr);
    buf.extend_from_slice(EOL);
}

fn push_write_request(buf: &mut Vec<u8>, addr: u16, data: u16) {
    buf.push(PREAMBLE);
    push_hex4(buf, addr);
    push_hex4(buf, data);
    buf.extend_from_slice(EOL);
}

/// Decode a read response and return the data word it carries.
///
/// Checks run in a fixed order: presence, preamble, length, terminator, then
/// the hex field itself.
pub fn decode_read_response(response: &[u8]) -> Result<u16, ProtocolError> {
    let (&first, _) = response.split_first().ok_or(ProtocolError::NoResponse)?;

    if first != PREAMBLE {
        return Err(ProtocolError::BadPreamble(first));
    }

    if response.len() != READ_RESPONSE_LEN {
        return Err(ProtocolError::WrongLength {
            expected: READ_RESPONSE_LEN,
            actual: response.len(),
        });
    }

    if response[READ_RESPONSE_LEN - 2..] != EOL[..] {
        return Err(ProtocolError::BadTerminator);
    }

    let field = &response[1..5];
    field
        .iter()
        .try_fold(0u16, |acc, &b| {
            char::from(b).to_digit(16).map(|digit| (acc << 4) | digit as u16)
        })
        .ok_or_else(|| ProtocolError::InvalidHex(String::from_utf8_lossy(field).into_owned()))
}

/// Decode back-to-back read responses, preserving their order
pub fn decode_read_responses(buf: &[u8]) -> Result<Vec<u16>, ProtocolError> {
    buf.chunks(READ_RESPONSE_LEN)
        .map(decode_read_response)
        .collect()
}

/// Builder for a batch of request frames sent as one write
#[derive(Debug, Default)]
pub struct RequestBatch {
    bytes: Vec<u8>,
    frames: usize,
}

impl RequestBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty batch sized for `frames` write requests
    pub fn with_capacity(frames: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(frames * WRITE_REQUEST_LEN),
            frames: 0,
        }
    }

    /// Append a read request
    pub fn read(mut self, addr: u16) -> Self {
        push_read_request(&mut self.bytes, addr);
        self.frames += 1;
        self
    }

    /// Append a write request
    pub fn write(mut self, addr: u16, data: u16) -> Self {
        push_write_request(&mut self.bytes, addr, data);
        self.frames += 1;
        self
    }

    /// Number of frames in the batch
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Take the encoded bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_read_request() {
        assert_eq!(encode_read_request(0x0000), b"M0000\r\n".to_vec());
        assert_eq!(encode_read_request(0x00AB), b"M00AB\r\n".to_vec());
        assert_eq!(encode_read_request(0xFFFF), b"MFFFF\r\n".to_vec());
        assert_eq!(encode_read_request(0x1234).len(), READ_REQUEST_LEN);
    }

    #[test]
    fn test_encode_write_request() {
        assert_eq!(encode_write_request(0x0001, 0x1234), b"M00011234\r\n".to_vec());
        assert_eq!(encode_write_request(0xBEEF, 0x000F), b"MBEEF000F\r\n".to_vec());
        assert_eq!(encode_write_request(0, 0).len(), WRITE_REQUEST_LEN);
    }

    #[test]
    fn test_hex4_matches_encoder() {
        for value in [0x0000, 0x0009, 0x00A0, 0x0ABC, 0xF00D, 0xFFFF] {
            let frame = encode_read_request(value);
            assert_eq!(hex4(value).as_bytes(), &frame[1..5]);
        }
        assert_eq!(hex4(0x2A), "002A");
        assert_eq!(hex4(0x0000), "0000");
        assert_eq!(hex4(0xBEEF), "BEEF");
    }

    #[test]
    fn test_decode_every_value() {
        for value in 0..=u16::MAX {
            // a read response has the same shape as a read request
            let response = encode_read_request(value);
            assert_eq!(decode_read_response(&response), Ok(value));
        }
    }

    #[test]
    fn test_decode_accepts_lowercase_hex() {
        assert_eq!(decode_read_response(b"Mbeef\r\n"), Ok(0xBEEF));
    }

    #[test]
    fn test_decode_empty() {
        assert_eq!(decode_read_response(b""), Err(ProtocolError::NoResponse));
    }

    #[test]
    fn test_decode_bad_preamble() {
        assert_eq!(
            decode_read_response(b"X1234\r\n"),
            Err(ProtocolError::BadPreamble(b'X'))
        );
    }

    #[test]
    fn test_decode_wrong_length() {
        assert_eq!(
            decode_read_response(b"M12345\r\n"),
            Err(ProtocolError::WrongLength {
                expected: 7,
                actual: 8
            })
        );
        assert_eq!(
            decode_read_response(b"M12\r\n"),
            Err(ProtocolError::WrongLength {
                expected: 7,
                actual: 5
            })
        );
        assert_eq!(
            decode_read_response(b"M"),
            Err(ProtocolError::WrongLength {
                expected: 7,
                actual: 1
            })
        );
    }

    #[test]
    fn test_decode_bad_terminator() {
        assert_eq!(
            decode_read_response(b"M1234\r\r"),
            Err(ProtocolError::BadTerminator)
        );
        assert_eq!(
            decode_read_response(b"M1234\n\n"),
            Err(ProtocolError::BadTerminator)
        );
        assert_eq!(
            decode_read_response(b"M12345\n"),
            Err(ProtocolError::BadTerminator)
        );
    }

    #[test]
    fn test_decode_invalid_hex() {
        assert_eq!(
            decode_read_response(b"M12G4\r\n"),
            Err(ProtocolError::InvalidHex("12G4".to_string()))
        );
        // from_str_radix would take a leading sign; the codec must not
        assert!(matches!(
            decode_read_response(b"M+123\r\n"),
            Err(ProtocolError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_decode_responses_in_order() {
        let buf = b"M0001\r\nM0002\r\nMFFFF\r\n";
        assert_eq!(decode_read_responses(buf), Ok(vec![0x0001, 0x0002, 0xFFFF]));
        assert_eq!(decode_read_responses(b""), Ok(vec![]));
    }

    #[test]
    fn test_decode_responses_trailing_fragment() {
        let buf = b"M0001\r\nM00";
        assert_eq!(
            decode_read_responses(buf),
            Err(ProtocolError::WrongLength {
                expected: 7,
                actual: 3
            })
        );
    }

    #[test]
    fn test_request_batch() {
        let batch = RequestBatch::new().read(0x0000).read(0x0001).write(0x0002, 0xABCD);

        assert_eq!(batch.frame_count(), 3);
        assert_eq!(
            batch.as_bytes(),
            b"M0000\r\nM0001\r\nM0002ABCD\r\n".as_slice()
        );
    }
}
