//! Kernel PPPoE session binding and PPP channel access
//!
//! The kernel owns PPPoE session framing: a connected `AF_PPPOX` socket
//! describes the session (interface, concentrator MAC, session ID), and a
//! PPP channel attached through `/dev/ppp` carries the PPP frames. The
//! session socket is opened *before* Discovery runs so that PPP frames
//! the concentrator sends immediately after PADS are not lost.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::mem;
use std::os::fd::{AsRawFd, RawFd};
use std::time::Instant;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::debug;

use pppoe_core::{Error, MacAddr, Result};

/// PPPoE transport under AF_PPPOX, from linux/if_pppox.h
const PX_PROTO_OE: i32 = 0;

/// _IOR('t', 55, int): fetch the channel index of a connected session
const PPPIOCGCHAN: libc::c_ulong = 0x8004_7437;
/// _IOW('t', 56, int): attach an fd to a channel
const PPPIOCATTCHAN: libc::c_ulong = 0x4004_7438;

/// A port of the `pppoe_addr` C data structure
#[repr(C)]
struct PppoeAddr {
    /// Session ID, in network byte order
    sid: u16,
    remote: [u8; 6],
    dev: [u8; libc::IFNAMSIZ],
}

/// A port of the `sockaddr_pppox` C data structure, which the kernel
/// declares packed
#[repr(C, packed)]
struct SockaddrPppox {
    sa_family: libc::sa_family_t,
    sa_protocol: u32,
    pppoe: PppoeAddr,
}

/// The kernel PPPoE framer/deframer object.
///
/// Holding the socket keeps the kernel object alive; frame I/O happens
/// through the attached [`PppChannel`].
pub struct SessionSocket {
    socket: Option<Socket>,
}

impl SessionSocket {
    /// Create an unconnected PPPoE session socket
    pub fn open() -> Result<Self> {
        let socket = Socket::new(
            Domain::from(libc::AF_PPPOX),
            Type::STREAM,
            Some(Protocol::from(PX_PROTO_OE)),
        )
        .map_err(|e| {
            if e.kind() == io::ErrorKind::PermissionDenied {
                Error::InsufficientPrivileges("opening PPPoE session socket".to_string())
            } else {
                Error::Io(e)
            }
        })?;
        Ok(Self {
            socket: Some(socket),
        })
    }

    /// Bind the session socket to a discovered session.
    ///
    /// This doesn't do much on its own, other than allow the channel
    /// ioctls to be applied afterwards.
    pub fn connect(&self, interface: &str, remote: MacAddr, session_id: u16) -> Result<()> {
        let socket = self.socket()?;

        if interface.len() >= libc::IFNAMSIZ {
            return Err(Error::InterfaceNotFound(interface.to_string()));
        }
        let mut dev = [0u8; libc::IFNAMSIZ];
        dev[..interface.len()].copy_from_slice(interface.as_bytes());

        let sa = SockaddrPppox {
            sa_family: libc::AF_PPPOX as libc::sa_family_t,
            sa_protocol: PX_PROTO_OE as u32,
            pppoe: PppoeAddr {
                sid: session_id.to_be(),
                remote: remote.octets(),
                dev,
            },
        };

        let addr = unsafe {
            let mut storage: libc::sockaddr_storage = mem::zeroed();
            std::ptr::copy_nonoverlapping(
                &sa as *const SockaddrPppox as *const u8,
                &mut storage as *mut libc::sockaddr_storage as *mut u8,
                mem::size_of::<SockaddrPppox>(),
            );
            SockAddr::new(storage, mem::size_of::<SockaddrPppox>() as libc::socklen_t)
        };
        socket.connect(&addr)?;

        debug!(
            "bound PPPoE session {} on {} to {}",
            session_id, interface, remote
        );
        Ok(())
    }

    /// Attach a PPP channel to the connected session.
    ///
    /// Looks up the kernel channel index for this session, then binds a
    /// fresh `/dev/ppp` handle to that channel. The channel carries the
    /// session's PPP frames.
    pub fn attach_channel(&self) -> Result<PppChannel> {
        let socket = self.socket()?;

        let mut index: libc::c_int = 0;
        if unsafe { libc::ioctl(socket.as_raw_fd(), PPPIOCGCHAN as _, &mut index) } < 0 {
            return Err(io::Error::last_os_error().into());
        }

        let file = OpenOptions::new().read(true).write(true).open("/dev/ppp")?;
        if unsafe { libc::ioctl(file.as_raw_fd(), PPPIOCATTCHAN as _, &index) } < 0 {
            return Err(io::Error::last_os_error().into());
        }

        Ok(PppChannel { file: Some(file) })
    }

    /// Release the session socket. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        self.socket.take();
        Ok(())
    }

    fn socket(&self) -> Result<&Socket> {
        self.socket.as_ref().ok_or(Error::Closed)
    }
}

/// A PPP channel bound to one PPPoE session.
///
/// Reads and writes move whole PPP frames. Deadlines are applied per
/// call through `poll(2)`; they bound the wait for readiness, not an
/// operation already in flight.
pub struct PppChannel {
    file: Option<File>,
}

impl PppChannel {
    /// Read one PPP frame, waiting at most until `deadline`
    pub fn read(&self, buf: &mut [u8], deadline: Option<Instant>) -> Result<usize> {
        let file = self.file()?;
        poll_fd(file.as_raw_fd(), libc::POLLIN, deadline)?;
        let n = (&mut &*file).read(buf)?;
        Ok(n)
    }

    /// Write one PPP frame, waiting at most until `deadline`.
    ///
    /// PPP channel writes are packet-oriented; a partial frame would be
    /// garbage on the wire, so partial completion fails `ShortWrite`.
    pub fn write(&self, frame: &[u8], deadline: Option<Instant>) -> Result<usize> {
        let file = self.file()?;
        poll_fd(file.as_raw_fd(), libc::POLLOUT, deadline)?;
        let n = (&mut &*file).write(frame)?;
        if n != frame.len() {
            return Err(Error::ShortWrite {
                wrote: n,
                len: frame.len(),
            });
        }
        Ok(n)
    }

    /// Release the channel. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        self.file.take();
        Ok(())
    }

    fn file(&self) -> Result<&File> {
        self.file.as_ref().ok_or(Error::Closed)
    }
}

/// Wait for `events` on `fd` until `deadline`. An expired deadline fails
/// `Timeout` without entering the wait.
fn poll_fd(fd: RawFd, events: libc::c_short, deadline: Option<Instant>) -> Result<()> {
    loop {
        let timeout_ms: libc::c_int = match deadline {
            None => -1,
            Some(deadline) => {
                let remaining = deadline
                    .checked_duration_since(Instant::now())
                    .ok_or(Error::Timeout)?;
                // Round sub-millisecond remainders up so we never spin.
                remaining.as_millis().clamp(1, libc::c_int::MAX as u128) as libc::c_int
            }
        };

        let mut pfd = libc::pollfd {
            fd,
            events,
            revents: 0,
        };
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err.into());
        }
        if rc == 0 {
            return Err(Error::Timeout);
        }
        return Ok(());
    }
}
