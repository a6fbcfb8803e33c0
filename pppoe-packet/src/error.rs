//! Codec error type

use thiserror::Error;

/// Parse error for the Discovery and LCP codecs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Input shorter than the fixed header, or a declared length that
    /// overruns the input
    #[error("packet too short")]
    Truncated,

    /// First byte of a Discovery packet is not version 1, type 1
    #[error("unknown PPPoE version byte {0:#04x}")]
    UnknownVersion(u8),

    /// Declared tag array length disagrees with the remaining packet
    #[error("tag array length {declared} doesn't match remaining packet length {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Leftover bytes at the end of the tag array too short to be a tag
    #[error("{0} bytes of trailing garbage at end of packet")]
    TrailingGarbage(usize),

    /// A tag's declared length is larger than the remaining packet
    #[error("tag declared length larger than remaining packet")]
    TagOverflow,

    /// A Service-Name tag carried a value; the client only speaks
    /// "any service"
    #[error("unexpected non-empty Service-Name tag")]
    NonEmptyServiceName,

    /// The PPP protocol field is not LCP (0xc021)
    #[error("not an LCP frame")]
    NotLcp,

    /// An LCP option header is inconsistent with the remaining payload
    #[error("option length {len} for option {option} is invalid")]
    BadOption { option: u8, len: u8 },

    /// A recognized LCP option has the wrong value length
    #[error("unexpected length for option {0}")]
    UnexpectedOptionLength(u8),

    /// An LCP code outside 1..=11
    #[error("unknown LCP packet type {0:#04x}")]
    UnknownCode(u8),
}

impl From<Error> for pppoe_core::Error {
    fn from(err: Error) -> Self {
        pppoe_core::Error::Malformed(err.to_string())
    }
}
