//! The PPPoE connection facade
//!
//! Composes the discovery port, the kernel session binding and the PPP
//! channel into one connection that sends and receives whole PPP frames
//! with optional read/write deadlines.

use std::fmt;
use std::time::Instant;

use tracing::{debug, info, warn};

use pppoe_core::{Context, MacAddr, Result};

use crate::discovery::{send_padt, Discovery};
use crate::port::DiscoverySocket;
use crate::session::{PppChannel, SessionSocket};

/// Address of a PPPoE session endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddr {
    /// Name of the network interface the session runs over
    pub interface: String,
    /// Session identifier assigned by the concentrator
    pub session_id: u16,
    /// Ethernet address of the remote concentrator
    pub hardware_addr: MacAddr,
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hardware_addr)
    }
}

/// An established PPPoE session.
///
/// A `Connection` exclusively owns its discovery port, session socket
/// and PPP channel. It is not meant to be shared between threads;
/// deadlines configure future calls, not in-flight ones.
pub struct Connection {
    /// Kernel PPPoE framer/deframer. Kept open to keep the kernel
    /// object alive; frame I/O goes through the channel.
    session: SessionSocket,
    /// PPP channel wrapping the session object
    channel: PppChannel,
    /// Raw Discovery port, retained to send PADT at teardown
    discovery: DiscoverySocket,
    peer: PeerAddr,
    /// Tombstone so double-closes are safe
    closed: bool,
    read_deadline: Option<Instant>,
    write_deadline: Option<Instant>,
}

impl Connection {
    /// Run PPPoE Discovery on the named interface and bind the resulting
    /// session.
    ///
    /// `ctx` bounds the Discovery handshake. On any failure every
    /// already-acquired handle is released before returning.
    pub fn open(ctx: &Context, interface: &str) -> Result<Connection> {
        let discovery = DiscoverySocket::open(interface)?;

        // Create the session socket before executing discovery, because
        // the concentrator will immediately start sending PPP packets,
        // and having the session socket open means we catch them.
        let session = SessionSocket::open()?;

        let (concentrator, session_id) = Discovery::new(ctx, &discovery).run()?;

        session.connect(interface, concentrator, session_id)?;
        let channel = session.attach_channel()?;

        info!(
            "PPPoE session {} established with {} on {}",
            session_id, concentrator, interface
        );

        Ok(Connection {
            session,
            channel,
            discovery,
            peer: PeerAddr {
                interface: interface.to_string(),
                session_id,
                hardware_addr: concentrator,
            },
            closed: false,
            read_deadline: None,
            write_deadline: None,
        })
    }

    /// The local address of the connection. PPPoE connections don't have
    /// an interesting local address to share, so this returns `None`.
    pub fn local_addr(&self) -> Option<&PeerAddr> {
        None
    }

    /// Address of the connected concentrator
    pub fn remote_addr(&self) -> &PeerAddr {
        &self.peer
    }

    /// Read one PPP frame from the session
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.channel.read(buf, self.read_deadline)
    }

    /// Write one PPP frame to the session
    pub fn write(&mut self, frame: &[u8]) -> Result<usize> {
        self.channel.write(frame, self.write_deadline)
    }

    /// Set both the read and write deadlines for future `read` and
    /// `write` calls. `None` clears them. In-flight calls are not
    /// interrupted.
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.read_deadline = deadline;
        self.write_deadline = deadline;
    }

    /// Set the deadline for future `read` calls
    pub fn set_read_deadline(&mut self, deadline: Option<Instant>) {
        self.read_deadline = deadline;
    }

    /// Set the deadline for future `write` calls
    pub fn set_write_deadline(&mut self, deadline: Option<Instant>) {
        self.write_deadline = deadline;
    }

    /// Tear the session down: close the PPP channel, close the session
    /// binding, notify the concentrator with PADT, release the raw port.
    ///
    /// Every step runs regardless of earlier failures; the first error
    /// in that order is returned. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        debug!("closing PPPoE session {}", self.peer.session_id);

        let channel_err = self.channel.close();
        let session_err = self.session.close();
        // Best-effort: the concentrator will expire the session on its
        // own if the PADT is lost.
        let padt_err = send_padt(
            &self.discovery,
            self.peer.hardware_addr,
            self.peer.session_id,
        );
        if let Err(err) = &padt_err {
            warn!("failed to send PADT for session {}: {}", self.peer.session_id, err);
        }
        let port_err = self.discovery.close();

        channel_err?;
        session_err?;
        padt_err?;
        port_err?;
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Ensure the concentrator hears about the teardown even when the
        // caller forgot to close.
        let _ = self.close();
    }
}
