//! PPPoE Discovery state machine
//!
//! The client broadcasts PADI until a concentrator answers with a PADO
//! offer, then unicasts PADR until the concentrator confirms the session
//! with PADS. Both phases resend once per retransmit interval and only
//! give up when the [`Context`] is cancelled or its deadline passes.
//! Frames that fail to parse, carry the wrong code, or arrive from the
//! wrong peer are discarded without resetting the attempt timer.

use std::time::Duration;

use tracing::{debug, trace};

use pppoe_core::{Context, Error, MacAddr, Result};
use pppoe_packet::discovery::{codes, tags, DiscoveryPacket};

use crate::port::DiscoveryPort;

/// Discovery phases. `Established` and `Closed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Broadcasting PADI, waiting for a PADO offer
    LookForConcentrator,
    /// Unicasting PADR to the chosen concentrator, waiting for PADS
    RequestSession,
    /// A session ID has been confirmed
    Established,
    /// Discovery was abandoned
    Closed,
}

/// Tunables for the Discovery handshake
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// How long to wait for an answer before resending PADI or PADR
    pub retransmit_interval: Duration,
    /// Receive buffer size; Discovery packets fit in one MTU
    pub max_frame: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            retransmit_interval: Duration::from_secs(1),
            max_frame: 1500,
        }
    }
}

/// The Discovery handshake against one port
pub struct Discovery<'a, P: DiscoveryPort + ?Sized> {
    ctx: &'a Context,
    port: &'a P,
    config: DiscoveryConfig,
    state: State,
}

impl<'a, P: DiscoveryPort + ?Sized> Discovery<'a, P> {
    pub fn new(ctx: &'a Context, port: &'a P) -> Self {
        Self::with_config(ctx, port, DiscoveryConfig::default())
    }

    pub fn with_config(ctx: &'a Context, port: &'a P, config: DiscoveryConfig) -> Self {
        Self {
            ctx,
            port,
            config,
            state: State::LookForConcentrator,
        }
    }

    /// Current phase
    pub fn state(&self) -> State {
        self.state
    }

    /// Run Discovery to completion, returning the concentrator address
    /// and the confirmed session ID.
    pub fn run(&mut self) -> Result<(MacAddr, u16)> {
        let (concentrator, cookie) = self.look_for_concentrator()?;
        let session_id = self.request_session(concentrator, &cookie)?;
        Ok((concentrator, session_id))
    }

    /// Broadcast PADI until a concentrator offers a session. Returns the
    /// concentrator address and its cookie (empty when it didn't send
    /// one).
    fn look_for_concentrator(&mut self) -> Result<(MacAddr, Vec<u8>)> {
        let padi = DiscoveryPacket::padi().to_bytes();
        let mut buf = vec![0u8; self.config.max_frame];

        loop {
            if let Some(err) = self.ctx.done() {
                self.state = State::Closed;
                return Err(err);
            }

            if let Err(err) = self.port.write_to(&padi, MacAddr::broadcast()) {
                self.state = State::Closed;
                return Err(err);
            }

            match self.wait_for_pado(&mut buf) {
                Ok((concentrator, cookie)) => {
                    debug!("accepted PADO offer from {}", concentrator);
                    self.state = State::RequestSession;
                    return Ok((concentrator, cookie));
                }
                // Timed out waiting for PADO. Loop back around to
                // (maybe) try again.
                Err(err) if err.is_timeout() => continue,
                Err(err) => {
                    self.state = State::Closed;
                    return Err(err);
                }
            }
        }
    }

    fn wait_for_pado(&self, buf: &mut [u8]) -> Result<(MacAddr, Vec<u8>)> {
        let deadline = self.ctx.bounded_deadline(self.config.retransmit_interval);
        self.port.set_read_deadline(Some(deadline))?;

        loop {
            let (n, from) = self.port.read_from(buf)?;
            match parse_pado(&buf[..n]) {
                Some(cookie) => return Ok((from, cookie)),
                // Not a valid PADO, keep waiting.
                None => trace!("discarding non-PADO frame from {}", from),
            }
        }
    }

    /// Unicast PADR to the concentrator until it confirms a session
    fn request_session(&mut self, concentrator: MacAddr, cookie: &[u8]) -> Result<u16> {
        let padr = DiscoveryPacket::padr(cookie).to_bytes();
        let mut buf = vec![0u8; self.config.max_frame];

        loop {
            if let Some(err) = self.ctx.done() {
                self.state = State::Closed;
                // A concentrator answered but never confirmed a session.
                return Err(match err {
                    Error::DeadlineExceeded => Error::NoSession,
                    other => other,
                });
            }

            if let Err(err) = self.port.write_to(&padr, concentrator) {
                self.state = State::Closed;
                return Err(err);
            }

            match self.wait_for_pads(concentrator, &mut buf) {
                Ok(session_id) => {
                    debug!("session {} confirmed by {}", session_id, concentrator);
                    self.state = State::Established;
                    return Ok(session_id);
                }
                // Timed out waiting for PADS. Loop back around to
                // (maybe) try again.
                Err(err) if err.is_timeout() => continue,
                Err(err) => {
                    self.state = State::Closed;
                    return Err(err);
                }
            }
        }
    }

    fn wait_for_pads(&self, concentrator: MacAddr, buf: &mut [u8]) -> Result<u16> {
        let deadline = self.ctx.bounded_deadline(self.config.retransmit_interval);
        self.port.set_read_deadline(Some(deadline))?;

        loop {
            let (n, from) = self.port.read_from(buf)?;
            if from != concentrator {
                // Wrong peer, keep waiting.
                trace!("discarding frame from unexpected peer {}", from);
                continue;
            }

            match parse_pads(&buf[..n]) {
                Some(session_id) => return Ok(session_id),
                // Not a valid PADS, keep waiting.
                None => trace!("discarding non-PADS frame from {}", from),
            }
        }
    }
}

/// Extract the cookie from a valid PADO, or `None` if the frame isn't
/// one. A missing cookie is fine: its function is similar to syncookies,
/// an anti-DoS measure at the concentrator. If the concentrator doesn't
/// care, then neither do we.
fn parse_pado(frame: &[u8]) -> Option<Vec<u8>> {
    let pkt = DiscoveryPacket::from_bytes(frame).ok()?;
    if pkt.code != codes::PADO || pkt.session_id != 0 {
        return None;
    }
    Some(pkt.tag(tags::AC_COOKIE).unwrap_or_default().to_vec())
}

/// Extract the session ID from a valid PADS, or `None` if the frame
/// isn't one. A PADS must carry a non-zero session ID.
fn parse_pads(frame: &[u8]) -> Option<u16> {
    let pkt = DiscoveryPacket::from_bytes(frame).ok()?;
    if pkt.code != codes::PADS || pkt.session_id == 0 {
        return None;
    }
    Some(pkt.session_id)
}

/// Tear down an established session. PADT is fire-and-forget: there is
/// no acknowledgement to wait for.
pub fn send_padt<P: DiscoveryPort + ?Sized>(
    port: &P,
    concentrator: MacAddr,
    session_id: u16,
) -> Result<()> {
    port.write_to(&DiscoveryPacket::padt(session_id).to_bytes(), concentrator)
}
