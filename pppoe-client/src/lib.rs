//! PPPoE session setup for Linux
//!
//! This crate drives the PPPoE Discovery handshake (RFC 2516) against a
//! remote access concentrator and exposes the resulting PPP channel as a
//! packet-oriented, deadline-capable connection.
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use pppoe_core::Context;
//! use pppoe_client::Connection;
//!
//! # fn main() -> pppoe_core::Result<()> {
//! let ctx = Context::with_timeout(Duration::from_secs(5));
//! let mut conn = Connection::open(&ctx, "eth0")?;
//! println!("session {} with {}", conn.remote_addr().session_id, conn.remote_addr());
//!
//! // The connection sends and receives raw PPP frames.
//! let mut buf = [0u8; 1500];
//! let n = conn.read(&mut buf)?;
//! # let _ = n;
//! conn.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! Opening a connection requires privileges for raw Ethernet sockets and
//! the `/dev/ppp` character device.

pub mod conn;
pub mod discovery;
pub mod port;
pub mod session;

// Re-export main types
pub use conn::{Connection, PeerAddr};
pub use discovery::{send_padt, Discovery, DiscoveryConfig, State};
pub use port::{DiscoveryPort, DiscoverySocket};
pub use session::{PppChannel, SessionSocket};
