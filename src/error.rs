//! Error types for RakshaIO

use crate::devices::secure_module::datagram::FrameError;
use crate::devices::secure_module::status::StatusCode;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// RakshaIO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error raised while opening a port
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error outside of a link exchange (config files, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Link could not be opened within the retry policy
    #[error("Connection failed after {attempts} attempt(s): {reason}")]
    Connection {
        /// Number of open attempts made
        attempts: u32,
        /// Last reported failure
        reason: String,
    },

    /// No data arrived within the configured window
    #[error("Communication timeout")]
    Timeout,

    /// I/O failure in the middle of an exchange
    #[error("Transport error: {0}")]
    Transport(#[source] std::io::Error),

    /// Request could not be encoded
    #[error("Invalid request: {0}")]
    InvalidRequest(#[source] FrameError),

    /// Response bytes failed structural validation
    #[error("Invalid response: {0}")]
    InvalidResponse(#[source] FrameError),

    /// Response correlates to a different request
    #[error("Sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch {
        /// Sequence of the outstanding request
        expected: i32,
        /// Sequence echoed by the device
        actual: i32,
    },

    /// Response echoes a different command than the one sent
    #[error("Command mismatch: expected {expected:#04x}, got {actual:#04x}")]
    CommandMismatch {
        /// Opcode of the outstanding request
        expected: u8,
        /// Opcode echoed by the device
        actual: u8,
    },

    /// Device explicitly rejected the request
    #[error("Device error: {0}")]
    Device(StatusCode),

    /// Particulate sensor frame failed validation
    #[error("Invalid sensor packet: {0}")]
    InvalidPacket(String),

    /// Sequence counter reached its maximum for this session
    #[error("Sequence counter exhausted")]
    SequenceExhausted,

    /// Opcode has no supported command behind it
    #[error("Command not implemented: {0:#04x}")]
    NotImplemented(u8),

    /// Concentration lies outside every AQI band
    #[error("Concentration {0} ug/m3 outside available range")]
    OutOfRange(f64),

    /// Caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// TOML parse failure
    #[error("Config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization failure
    #[error("Config serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether retrying the same request later may succeed.
    ///
    /// Device rejections other than `SYS_BUSY` need a different remedy
    /// (new pin, re-provisioning) and are not retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Connection { .. } | Error::Timeout | Error::Transport(_) => true,
            Error::Device(code) => *code == StatusCode::SysBusy,
            _ => false,
        }
    }
}
