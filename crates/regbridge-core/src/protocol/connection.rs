//! Bus interface
//!
//! Owns the serial session to the bridge and runs chunked register
//! transfers over it.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use super::{
    discovery::resolve_port,
    frame::{decode_read_responses, RequestBatch},
    NativeBackend, ProtocolError, SerialBackend, READ_RESPONSE_LEN,
};
use crate::config::{BusConfig, DerivedTiming, PortSpec};
use crate::error::{BusError, Result};
use crate::hdl::{self, HdlTemplates};

/// Fill `buf` from the port, accumulating partial reads.
///
/// Driver timeouts only mean "nothing yet"; the call gives up when the
/// optional deadline passes or the stream ends.
fn read_full<R: Read + ?Sized>(
    port: &mut R,
    buf: &mut [u8],
    timeout: Option<Duration>,
) -> Result<()> {
    let start = Instant::now();
    let mut offset = 0;

    while offset < buf.len() {
        match port.read(&mut buf[offset..]) {
            Ok(0) => {
                return Err(ProtocolError::ShortRead {
                    expected: buf.len(),
                    received: offset,
                }
                .into());
            }
            Ok(n) => offset += n,
            Err(ref e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(e.into()),
        }

        if let Some(limit) = timeout {
            if offset < buf.len() && start.elapsed() >= limit {
                return Err(BusError::Timeout {
                    expected: buf.len(),
                    received: offset,
                    timeout_ms: limit.as_millis() as u64,
                });
            }
        }
    }

    Ok(())
}

/// Host side of the FPGA's UART register bus.
///
/// The serial session is opened on first use, not at construction, so a
/// `BusInterface` can be built without the board attached. Requests go out
/// in chunks of at most `chunk_size` frames; for reads, each chunk's
/// responses are drained before the next chunk is sent so the OS receive
/// buffer never has to hold more than one chunk.
pub struct BusInterface<B: SerialBackend = NativeBackend> {
    /// Host serial capability
    backend: B,
    /// Serial session, once opened
    session: Option<B::Port>,
    /// Validated configuration; `port` is rewritten once if it was `auto`
    config: BusConfig,
    /// Metrics: cumulative bytes/frames sent & received
    tx_bytes: u64,
    rx_bytes: u64,
    tx_frames: u64,
    rx_frames: u64,
}

impl BusInterface<NativeBackend> {
    /// Create an interface that talks through the host's serial ports
    pub fn new(config: BusConfig) -> Self {
        Self::with_backend(config, NativeBackend)
    }
}

impl<B: SerialBackend> BusInterface<B> {
    /// Create an interface over a specific serial backend
    pub fn with_backend(config: BusConfig, backend: B) -> Self {
        Self {
            backend,
            session: None,
            config,
            tx_bytes: 0,
            rx_bytes: 0,
            tx_frames: 0,
            rx_frames: 0,
        }
    }

    /// Validated configuration
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Derived clock division
    pub fn timing(&self) -> &DerivedTiming {
        self.config.timing()
    }

    /// Serial port; a concrete path once the session has been opened
    pub fn port(&self) -> &PortSpec {
        self.config.port()
    }

    /// Whether the serial session has been opened
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Get cumulative tx bytes, rx bytes, tx frames and rx frames
    pub fn get_counters(&self) -> (u64, u64, u64, u64) {
        (self.tx_bytes, self.rx_bytes, self.tx_frames, self.rx_frames)
    }

    /// Open the session if needed and hand it out
    fn session(&mut self) -> Result<&mut B::Port> {
        let port = match self.session.take() {
            Some(port) => port,
            None => self.open_session()?,
        };
        Ok(self.session.insert(port))
    }

    fn open_session(&mut self) -> Result<B::Port> {
        let path = match self.config.port() {
            PortSpec::Path(path) => path.clone(),
            PortSpec::Auto => {
                let path = resolve_port(&self.backend, &PortSpec::Auto)?;
                self.config.set_resolved_port(path.clone());
                path
            }
        };

        tracing::debug!(
            "Opening UART session on {} at {} baud",
            path,
            self.config.baudrate()
        );
        self.backend.open(&path, self.config.baudrate())
    }

    fn send(&mut self, batch: &RequestBatch) -> Result<()> {
        let bytes = batch.as_bytes();
        tracing::trace!("-> {:?}", String::from_utf8_lossy(bytes));

        self.session()?.write_all(bytes)?;

        self.tx_bytes = self.tx_bytes.saturating_add(bytes.len() as u64);
        self.tx_frames = self.tx_frames.saturating_add(batch.frame_count() as u64);
        Ok(())
    }

    fn receive(&mut self, frames: usize) -> Result<Vec<u8>> {
        let timeout = self.config.timeout();
        let mut inbound = vec![0u8; frames * READ_RESPONSE_LEN];

        read_full(self.session()?, &mut inbound, timeout)?;
        tracing::trace!("<- {:?}", String::from_utf8_lossy(&inbound));

        self.rx_bytes = self.rx_bytes.saturating_add(inbound.len() as u64);
        self.rx_frames = self.rx_frames.saturating_add(frames as u64);
        Ok(inbound)
    }

    /// Read a batch of registers, returning values in address order.
    ///
    /// Each chunk is a single write of concatenated read requests followed by
    /// a blocking read of exactly 7 bytes per request.
    pub fn read_registers(&mut self, addrs: &[u16]) -> Result<Vec<u16>> {
        let mut data = Vec::with_capacity(addrs.len());
        if addrs.is_empty() {
            return Ok(data);
        }

        let chunk_size = self.config.chunk_size();
        for (index, chunk) in addrs.chunks(chunk_size).enumerate() {
            let batch = chunk
                .iter()
                .fold(RequestBatch::with_capacity(chunk.len()), |batch, &addr| {
                    batch.read(addr)
                });
            tracing::debug!(
                "read chunk {}: {} requests, {} bytes",
                index,
                batch.frame_count(),
                batch.as_bytes().len()
            );

            self.send(&batch)?;
            let inbound = self.receive(chunk.len())?;
            data.extend(decode_read_responses(&inbound)?);
        }

        Ok(data)
    }

    /// Write a batch of registers.
    ///
    /// The bridge never acknowledges writes, so nothing is read back. Length
    /// mismatches are rejected before any byte is sent.
    pub fn write_registers(&mut self, addrs: &[u16], datas: &[u16]) -> Result<()> {
        if addrs.len() != datas.len() {
            return Err(BusError::Arity {
                addrs: addrs.len(),
                datas: datas.len(),
            });
        }
        if addrs.is_empty() {
            return Ok(());
        }

        let chunk_size = self.config.chunk_size();
        let chunks = addrs.chunks(chunk_size).zip(datas.chunks(chunk_size));
        for (index, (addr_chunk, data_chunk)) in chunks.enumerate() {
            let batch = addr_chunk.iter().zip(data_chunk).fold(
                RequestBatch::with_capacity(addr_chunk.len()),
                |batch, (&addr, &data)| batch.write(addr, data),
            );
            tracing::debug!(
                "write chunk {}: {} requests, {} bytes",
                index,
                batch.frame_count(),
                batch.as_bytes().len()
            );

            self.send(&batch)?;
        }

        Ok(())
    }

    /// Read a single register
    pub fn read_register(&mut self, addr: u16) -> Result<u16> {
        let data = self
            .read_registers(&[addr])?
            .pop()
            .ok_or(ProtocolError::NoResponse)?;

        if self.config.verbose() {
            tracing::info!("read {data:04X} from {addr:04X}");
        }

        Ok(data)
    }

    /// Write a single register
    pub fn write_register(&mut self, addr: u16, data: u16) -> Result<()> {
        self.write_registers(&[addr], &[data])?;

        if self.config.verbose() {
            tracing::info!("wrote {data:04X} to {addr:04X}");
        }

        Ok(())
    }

    /// Top-level signal declarations the bridge needs
    pub fn hdl_top_level_ports(&self) -> [&'static str; 2] {
        hdl::TOP_LEVEL_PORTS
    }

    /// Module definitions for the receive path
    pub fn rx_hdl_def(&self, templates: &impl HdlTemplates) -> Result<String> {
        hdl::rx_definitions(templates)
    }

    /// Module definitions for the transmit path
    pub fn tx_hdl_def(&self, templates: &impl HdlTemplates) -> Result<String> {
        hdl::tx_definitions(templates)
    }

    /// Instantiation of the receive path for this clock/baud setting
    pub fn rx_hdl_inst(&self, templates: &impl HdlTemplates) -> Result<String> {
        hdl::rx_instance(templates, self.timing())
    }

    /// Instantiation of the transmit path for this clock/baud setting
    pub fn tx_hdl_inst(&self, templates: &impl HdlTemplates) -> Result<String> {
        hdl::tx_instance(templates, self.timing())
    }
}
