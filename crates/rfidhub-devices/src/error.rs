//! Device link errors.

use crate::codec::CodecError;

/// Errors on the reader connection. Every variant is fatal to the station.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("RFID reader connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("RFID reader connect to {0} timed out")]
    ConnectTimeout(String),

    #[error("RFID reader did not answer the handshake in time")]
    HandshakeTimeout,

    #[error("RFID reader responded with NOK to initialization")]
    HandshakeRejected,

    #[error("RFID reader stopped accepting commands (write timed out after {0}s)")]
    WriteTimeout(f64),

    #[error("RFID reader connection closed")]
    Closed,

    #[error("RFID reader I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed frame from RFID reader: {0}")]
    Malformed(#[from] CodecError),

    #[error("RFID command {0} sent while another command is still in flight")]
    Busy(&'static str),
}
