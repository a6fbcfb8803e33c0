//! Raw Ethernet access for the Discovery protocol
//!
//! Discovery frames travel directly on Ethernet with EtherType 0x8863.
//! The socket runs in cooked (`SOCK_DGRAM`) mode, so the kernel owns the
//! Ethernet header: sends name a destination MAC, receives yield the
//! source MAC alongside the payload.

use std::io;
use std::mem;
use std::os::fd::AsRawFd;
use std::time::{Duration, Instant};

use pnet_datalink::NetworkInterface;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::debug;

use pppoe_core::{types::ethertypes, Error, MacAddr, Result};

/// Frame transport used by the Discovery state machine.
///
/// Implemented by [`DiscoverySocket`] for real interfaces and by scripted
/// ports in tests.
pub trait DiscoveryPort {
    /// Send one Discovery payload to `dst`
    fn write_to(&self, payload: &[u8], dst: MacAddr) -> Result<()>;

    /// Receive one Discovery payload, returning its length and source MAC
    fn read_from(&self, buf: &mut [u8]) -> Result<(usize, MacAddr)>;

    /// Bound future reads. `None` clears the deadline; a deadline already
    /// in the past fails with a timeout without reading.
    fn set_read_deadline(&self, deadline: Option<Instant>) -> Result<()>;
}

/// A PPPoE Discovery socket bound to one Ethernet interface
#[derive(Debug)]
pub struct DiscoverySocket {
    socket: Option<Socket>,
    interface: String,
    ifindex: u32,
    local_mac: MacAddr,
}

impl DiscoverySocket {
    /// Open a Discovery socket on the named interface.
    ///
    /// The interface must exist and carry an Ethernet hardware address.
    pub fn open(interface: &str) -> Result<Self> {
        let iface = lookup_interface(interface)?;
        let local_mac = interface_mac(&iface)?;

        let proto = (ethertypes::PPPOE_DISCOVERY).to_be() as i32;
        let socket = Socket::new(
            Domain::from(libc::AF_PACKET),
            Type::DGRAM,
            Some(Protocol::from(proto)),
        )
        .map_err(|e| privilege_error(e, "opening PPPoE Discovery socket"))?;

        let sa = sockaddr_ll(iface.index, None);
        socket.bind(&packed_sockaddr(&sa))?;

        debug!(
            "opened PPPoE Discovery socket on {} ({})",
            interface, local_mac
        );

        Ok(Self {
            socket: Some(socket),
            interface: interface.to_string(),
            ifindex: iface.index,
            local_mac,
        })
    }

    /// Name of the bound interface
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Hardware address of the bound interface
    pub fn local_mac(&self) -> MacAddr {
        self.local_mac
    }

    /// Release the socket. Idempotent; reads and writes after close fail.
    pub fn close(&mut self) -> Result<()> {
        self.socket.take();
        Ok(())
    }

    fn socket(&self) -> Result<&Socket> {
        self.socket.as_ref().ok_or(Error::Closed)
    }
}

impl DiscoveryPort for DiscoverySocket {
    fn write_to(&self, payload: &[u8], dst: MacAddr) -> Result<()> {
        let socket = self.socket()?;
        let sa = sockaddr_ll(self.ifindex, Some(dst));
        let n = socket.send_to(payload, &packed_sockaddr(&sa))?;
        if n != payload.len() {
            return Err(Error::ShortWrite {
                wrote: n,
                len: payload.len(),
            });
        }
        Ok(())
    }

    fn read_from(&self, buf: &mut [u8]) -> Result<(usize, MacAddr)> {
        let socket = self.socket()?;

        let mut sa: libc::sockaddr_ll = unsafe { mem::zeroed() };
        let mut sa_len = mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t;
        let n = unsafe {
            libc::recvfrom(
                socket.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
                &mut sa as *mut libc::sockaddr_ll as *mut libc::sockaddr,
                &mut sa_len,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error().into());
        }

        let source = MacAddr::from_slice(&sa.sll_addr[..6]).unwrap_or(MacAddr::zero());
        Ok((n as usize, source))
    }

    fn set_read_deadline(&self, deadline: Option<Instant>) -> Result<()> {
        let socket = self.socket()?;
        match deadline {
            None => socket.set_read_timeout(None)?,
            Some(deadline) => {
                // SO_RCVTIMEO can't express "already passed"; fail the
                // attempt up front instead of blocking forever.
                let remaining = deadline
                    .checked_duration_since(Instant::now())
                    .ok_or(Error::Timeout)?;
                socket.set_read_timeout(Some(remaining.max(Duration::from_micros(1))))?;
            }
        }
        Ok(())
    }
}

fn lookup_interface(name: &str) -> Result<NetworkInterface> {
    pnet_datalink::interfaces()
        .into_iter()
        .find(|i| i.name == name)
        .ok_or_else(|| Error::InterfaceNotFound(name.to_string()))
}

fn interface_mac(iface: &NetworkInterface) -> Result<MacAddr> {
    match iface.mac {
        Some(mac) if mac != pnet_datalink::MacAddr::zero() => {
            Ok(MacAddr([mac.0, mac.1, mac.2, mac.3, mac.4, mac.5]))
        }
        _ => Err(Error::NotEthernet(iface.name.clone())),
    }
}

fn privilege_error(err: io::Error, what: &str) -> Error {
    if err.kind() == io::ErrorKind::PermissionDenied {
        Error::InsufficientPrivileges(what.to_string())
    } else {
        Error::Io(err)
    }
}

fn sockaddr_ll(ifindex: u32, dst: Option<MacAddr>) -> libc::sockaddr_ll {
    let mut sa: libc::sockaddr_ll = unsafe { mem::zeroed() };
    sa.sll_family = libc::AF_PACKET as libc::sa_family_t;
    sa.sll_protocol = (ethertypes::PPPOE_DISCOVERY).to_be();
    sa.sll_ifindex = ifindex as i32;
    if let Some(mac) = dst {
        sa.sll_halen = 6;
        sa.sll_addr[..6].copy_from_slice(mac.as_bytes());
    }
    sa
}

fn packed_sockaddr(sa: &libc::sockaddr_ll) -> SockAddr {
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    unsafe {
        std::ptr::copy_nonoverlapping(
            sa as *const libc::sockaddr_ll as *const u8,
            &mut storage as *mut libc::sockaddr_storage as *mut u8,
            mem::size_of::<libc::sockaddr_ll>(),
        );
        SockAddr::new(storage, mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t)
    }
}
