//! Bus configuration
//!
//! Validates user-supplied UART parameters and derives the clock-division
//! factor the FPGA side is built with.
//!
//! Raw configuration is a JSON object:
//!
//! ```json
//! { "port": "auto", "clock_freq": 100000000, "baudrate": 115200, "chunk_size": 256 }
//! ```
//!
//! Validation is eager. A `BusConfig` that exists is known to be usable;
//! nothing here touches hardware.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Port value that requests automatic detection
pub const AUTO_PORT: &str = "auto";

/// Default maximum number of request frames in flight per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 256;

/// Minimum number of FPGA clock cycles per baud period
pub const MIN_CLOCKS_PER_BAUD: u32 = 2;

/// Maximum tolerated deviation between requested and achievable baud rate, in percent
pub const MAX_BAUDRATE_ERROR_PCT: u64 = 5;

/// Errors that can occur while validating a bus configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `port` key absent
    #[error("No serial port provided to UART core")]
    MissingPort,

    /// `port` is the empty string
    #[error("Serial port must not be empty")]
    EmptyPort,

    /// A required numeric option is absent
    #[error("{0} not provided to UART core")]
    MissingOption(&'static str),

    /// Zero or negative value
    #[error("{option} must be positive, got {value}")]
    NonPositive {
        /// Option name
        option: &'static str,
        /// Rejected value
        value: i64,
    },

    /// Value does not fit the field
    #[error("{option} is out of range: {value}")]
    OutOfRange {
        /// Option name
        option: &'static str,
        /// Rejected value
        value: i64,
    },

    /// Fewer than two clocks per baud period
    #[error(
        "Clock frequency {clock_freq}Hz is too slow for {baudrate} baud \
         ({clocks_per_baud} clocks per baud, need at least 2)"
    )]
    ClockTooSlow {
        /// FPGA clock in Hz
        clock_freq: u32,
        /// Requested baud rate
        baudrate: u32,
        /// Derived divider
        clocks_per_baud: u32,
    },

    /// Achievable baud rate is more than 5% off
    #[error(
        "Unable to match target baudrate {baudrate} - closest is {actual_baudrate:.1}, \
         they differ by {error_pct:.3}%"
    )]
    BaudrateMismatch {
        /// Requested baud rate
        baudrate: u32,
        /// Closest rate the divider gives
        actual_baudrate: f64,
        /// Deviation in percent
        error_pct: f64,
    },

    /// Malformed input, such as a wrongly typed value
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Configuration file could not be read
    #[error("Failed to read configuration file: {0}")]
    Io(String),
}

/// Serial port selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSpec {
    /// Detect the port on first use
    Auto,
    /// Explicit device path (e.g. "/dev/ttyUSB1" or "COM3")
    Path(String),
}

impl PortSpec {
    /// Parse a user-supplied port string
    pub fn parse(port: &str) -> Result<Self, ConfigError> {
        match port {
            "" => Err(ConfigError::EmptyPort),
            AUTO_PORT => Ok(PortSpec::Auto),
            path => Ok(PortSpec::Path(path.to_string())),
        }
    }

    /// Whether the port still needs to be detected
    pub fn is_auto(&self) -> bool {
        matches!(self, PortSpec::Auto)
    }

    /// The device path, if one is known
    pub fn as_path(&self) -> Option<&str> {
        match self {
            PortSpec::Auto => None,
            PortSpec::Path(path) => Some(path),
        }
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortSpec::Auto => f.write_str(AUTO_PORT),
            PortSpec::Path(path) => f.write_str(path),
        }
    }
}

/// Timing values derived once from clock frequency and baud rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedTiming {
    /// FPGA clock cycles per UART bit, `floor(clock_freq / baudrate)`
    pub clocks_per_baud: u32,
    /// Baud rate the FPGA will actually produce
    pub actual_baudrate: f64,
    /// Deviation from the requested baud rate, in percent
    pub baudrate_error_pct: f64,
}

impl DerivedTiming {
    /// Compute and check the clock division for a clock/baud pair.
    ///
    /// The error bound is checked in integer arithmetic. With
    /// `r = clock_freq mod baudrate` the error is `100 * r / (clocks_per_baud * baudrate)`,
    /// which keeps the 5% boundary exact.
    pub fn compute(clock_freq: u32, baudrate: u32) -> Result<Self, ConfigError> {
        if clock_freq == 0 {
            return Err(ConfigError::NonPositive {
                option: "clock_freq",
                value: 0,
            });
        }
        if baudrate == 0 {
            return Err(ConfigError::NonPositive {
                option: "baudrate",
                value: 0,
            });
        }

        let clocks_per_baud = clock_freq / baudrate;
        if clocks_per_baud < MIN_CLOCKS_PER_BAUD {
            return Err(ConfigError::ClockTooSlow {
                clock_freq,
                baudrate,
                clocks_per_baud,
            });
        }

        let remainder = u64::from(clock_freq % baudrate);
        let divisor = u64::from(clocks_per_baud) * u64::from(baudrate);
        let actual_baudrate = f64::from(clock_freq) / f64::from(clocks_per_baud);
        let baudrate_error_pct = 100.0 * remainder as f64 / divisor as f64;

        if 100 * remainder > MAX_BAUDRATE_ERROR_PCT * divisor {
            return Err(ConfigError::BaudrateMismatch {
                baudrate,
                actual_baudrate,
                error_pct: baudrate_error_pct,
            });
        }

        Ok(Self {
            clocks_per_baud,
            actual_baudrate,
            baudrate_error_pct,
        })
    }
}

/// Recognized options as they appear in the raw map; anything else lands in `unrecognized`.
#[derive(Debug, Deserialize)]
struct RawBusConfig {
    port: Option<String>,
    clock_freq: Option<i64>,
    baudrate: Option<i64>,
    chunk_size: Option<i64>,
    verbose: Option<bool>,
    timeout_ms: Option<i64>,
    #[serde(flatten)]
    unrecognized: BTreeMap<String, Value>,
}

/// Validated UART bus configuration
#[derive(Debug, Clone)]
pub struct BusConfig {
    port: PortSpec,
    clock_freq: u32,
    baudrate: u32,
    chunk_size: usize,
    verbose: bool,
    timeout: Option<Duration>,
    timing: DerivedTiming,
    ignored_options: Vec<String>,
}

impl BusConfig {
    /// Build a configuration from explicit values.
    ///
    /// `port` is either `"auto"` or a device path.
    pub fn new(port: impl AsRef<str>, clock_freq: u32, baudrate: u32) -> Result<Self, ConfigError> {
        let port = PortSpec::parse(port.as_ref())?;
        let timing = DerivedTiming::compute(clock_freq, baudrate)?;

        Ok(Self {
            port,
            clock_freq,
            baudrate,
            chunk_size: DEFAULT_CHUNK_SIZE,
            verbose: false,
            timeout: None,
            timing,
            ignored_options: Vec::new(),
        })
    }

    /// Set the maximum number of request frames sent per chunk
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Result<Self, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::NonPositive {
                option: "chunk_size",
                value: 0,
            });
        }
        self.chunk_size = chunk_size;
        Ok(self)
    }

    /// Enable or disable the per-register trace lines
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Give up on a chunk's response after `timeout` instead of waiting forever
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validate a raw configuration map.
    ///
    /// Unknown keys are logged and skipped. Everything else that is wrong is fatal.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let raw: RawBusConfig =
            serde_json::from_value(value).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Self::from_raw(raw)
    }

    /// Validate a configuration given as JSON text
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Self::from_value(value)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&contents)
    }

    fn from_raw(raw: RawBusConfig) -> Result<Self, ConfigError> {
        let ignored_options: Vec<String> = raw.unrecognized.into_keys().collect();
        for option in &ignored_options {
            tracing::warn!("Ignoring unrecognized option '{option}' in UART interface");
        }

        let port = raw.port.ok_or(ConfigError::MissingPort)?;
        let clock_freq = raw
            .clock_freq
            .ok_or(ConfigError::MissingOption("clock_freq"))?;
        let clock_freq = positive_u32("clock_freq", clock_freq)?;
        let baudrate = raw.baudrate.ok_or(ConfigError::MissingOption("baudrate"))?;
        let baudrate = positive_u32("baudrate", baudrate)?;

        let mut config = Self::new(port, clock_freq, baudrate)?;

        if let Some(chunk_size) = raw.chunk_size {
            let chunk_size = positive("chunk_size", chunk_size)?;
            let chunk_size = usize::try_from(chunk_size).map_err(|_| ConfigError::OutOfRange {
                option: "chunk_size",
                value: chunk_size,
            })?;
            config = config.with_chunk_size(chunk_size)?;
        }

        if let Some(verbose) = raw.verbose {
            config = config.with_verbose(verbose);
        }

        if let Some(timeout_ms) = raw.timeout_ms {
            let timeout_ms = positive("timeout_ms", timeout_ms)?;
            config = config.with_timeout(Duration::from_millis(timeout_ms as u64));
        }

        config.ignored_options = ignored_options;
        Ok(config)
    }

    /// Requested serial port
    pub fn port(&self) -> &PortSpec {
        &self.port
    }

    /// FPGA clock frequency in Hz
    pub fn clock_freq(&self) -> u32 {
        self.clock_freq
    }

    /// Requested baud rate
    pub fn baudrate(&self) -> u32 {
        self.baudrate
    }

    /// Maximum number of request frames in flight at once
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Whether per-register trace lines are emitted
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Per-chunk response deadline; `None` waits indefinitely
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Derived clock division
    pub fn timing(&self) -> &DerivedTiming {
        &self.timing
    }

    /// Unrecognized keys that were skipped during validation, sorted
    pub fn ignored_options(&self) -> &[String] {
        &self.ignored_options
    }

    /// Replace `auto` with the detected device path. Only valid once.
    pub(crate) fn set_resolved_port(&mut self, path: String) {
        debug_assert!(self.port.is_auto());
        self.port = PortSpec::Path(path);
    }
}

fn positive(option: &'static str, value: i64) -> Result<i64, ConfigError> {
    if value <= 0 {
        return Err(ConfigError::NonPositive { option, value });
    }
    Ok(value)
}

fn positive_u32(option: &'static str, value: i64) -> Result<u32, ConfigError> {
    let value = positive(option, value)?;
    u32::try_from(value).map_err(|_| ConfigError::OutOfRange { option, value })
}
