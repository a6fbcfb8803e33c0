//! Error types for the PPPoE client

use std::io;
use thiserror::Error;

/// Result type alias for PPPoE operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the PPPoE client
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying socket, ioctl or file error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Named interface does not exist
    #[error("interface '{0}' not found")]
    InterfaceNotFound(String),

    /// Interface exists but does not carry a 6-byte hardware address
    #[error("interface '{0}' has a non-Ethernet hardware type")]
    NotEthernet(String),

    /// Raw sockets or /dev/ppp require elevated privileges
    #[error("insufficient privileges: {0}")]
    InsufficientPrivileges(String),

    /// Inbound packet failed to parse
    #[error("malformed packet: {0}")]
    Malformed(String),

    /// A read deadline elapsed before any data arrived
    #[error("read timed out")]
    Timeout,

    /// The operation's context was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// The operation's context deadline passed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Discovery deadline passed with a concentrator found but no PADS received
    #[error("discovery ended without a session ID")]
    NoSession,

    /// A packet-oriented write completed partially
    #[error("short write: wrote {wrote} of {len} bytes")]
    ShortWrite { wrote: usize, len: usize },

    /// The connection has already been closed
    #[error("connection is closed")]
    Closed,
}

impl Error {
    /// Whether this error is a retryable read timeout.
    ///
    /// Covers both the explicit [`Error::Timeout`] marker and I/O errors
    /// produced by `SO_RCVTIMEO` expiry, which surface as `WouldBlock` or
    /// `TimedOut` depending on the kernel path.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout => true,
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Create a malformed-packet error with a custom message
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Error::Malformed(msg.into())
    }
}
