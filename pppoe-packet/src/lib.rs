//! Packet codecs for the PPPoE client
//!
//! This crate implements bit-exact parsing and serialization for the two
//! wire formats the client speaks directly:
//!
//! - [`discovery`] - PPPoE Discovery packets (PADI/PADO/PADR/PADS/PADT)
//!   and their tag TLVs (RFC 2516)
//! - [`lcp`] - PPP Link Control Protocol frames and their option TLVs
//!   (RFC 1661)
//!
//! Both parsers are defensive: every length field is validated before it
//! is used to index the input, and any violation is reported through the
//! precise [`Error`] type rather than a panic. Both encoders are
//! deterministic, emitting TLVs in ascending type order, so that
//! `parse(encode(p)) == p` holds for any packet whose fields are
//! internally consistent.

pub mod discovery;
pub mod error;
pub mod lcp;

pub use discovery::DiscoveryPacket;
pub use error::Error;
pub use lcp::LcpPacket;
