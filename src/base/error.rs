use crate::status::StatusCode;
use std::io;
use thiserror::Error;

/// Represents errors that can occur while talking to an NXT brick.
#[derive(Debug, Error)]
pub enum Error {
    /// The device answered with a non-zero status byte.
    #[error("opcode 0x{opcode:02X} failed: {status} (0x{code:02X})", code = .status.0)]
    Status { opcode: u8, status: StatusCode },

    /// A reply was well framed but its content does not match the expected layout.
    #[error("protocol error: {description}")]
    ProtocolError { description: String },

    /// The telegram does not fit into the 16-bit length prefix.
    #[error("payload of {len} bytes is too large for a telegram")]
    PayloadTooLarge { len: usize },

    /// The buffer provided is too small for telegram encoding.
    #[error("buffer is too small for telegram encoding")]
    BufferTooSmall,

    /// No transport is attached to the device.
    #[error("not connected")]
    NotConnected,

    /// The transport failed or was closed while a request was outstanding.
    #[error("link lost: {description}")]
    LinkLost { description: String },

    /// A reply did not arrive in time during a multi-step transfer.
    #[error("operation timeout")]
    OperationTimeout,

    /// A chunked transfer stopped part way; the device may hold a partially applied buffer.
    #[error("transfer interrupted after {transferred} of {total} bytes: {source}")]
    TransferInterrupted {
        transferred: usize,
        total: usize,
        #[source]
        source: Box<Error>,
    },

    /// An I/O error occurred while communicating with the underlying stream (e.g., serial port).
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
}

impl Error {
    /// Returns `true` for failures that end the session (closed or broken link).
    pub fn is_transport(&self) -> bool {
        match self {
            Error::NotConnected | Error::LinkLost { .. } | Error::IoError(_) => true,
            Error::TransferInterrupted { source, .. } => source.is_transport(),
            _ => false,
        }
    }

    /// The status code of a device-reported failure, if this is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A specialized `Result` type for NXT operations.
pub type Result<T> = std::result::Result<T, Error>;
