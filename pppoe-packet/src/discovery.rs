//! PPPoE Discovery packet codec (RFC 2516)
//!
//! Discovery packets are a fixed 6-byte header followed by an array of
//! type-length-value tags. The client broadcasts PADI, accepts a PADO
//! offer, requests a session with PADR, learns the session ID from PADS,
//! and tears the session down with PADT.

use std::collections::BTreeMap;

use bytes::{BufMut, BytesMut};

use crate::error::Error;

/// Version 1, type 1: the only deployed PPPoE variant
const VERSION_TYPE: u8 = 0x11;

/// PPPoE Discovery packet codes
pub mod codes {
    /// "Hey, any PPPoE concentrators out there?" (client broadcast)
    pub const PADI: u8 = 0x09;
    /// "Hi, I'm a PPPoE concentrator" (server unicast)
    pub const PADO: u8 = 0x07;
    /// "Cool, can we set up a PPPoE session?" (client unicast)
    pub const PADR: u8 = 0x19;
    /// "Done, here's the session ID!" (server unicast)
    pub const PADS: u8 = 0x65;
    /// "I'm tearing down our session" (either party)
    pub const PADT: u8 = 0xa7;
}

/// PPPoE Discovery tag types
pub mod tags {
    /// Roughly speaking, the name of the ISP
    pub const SERVICE_NAME: u16 = 0x0101;
    /// Roughly speaking, the hostname of the PPPoE concentrator
    pub const AC_NAME: u16 = 0x0102;
    /// The PPPoE equivalent of a syncookie
    pub const AC_COOKIE: u16 = 0x0104;
}

/// A parsed PPPoE Discovery packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryPacket {
    /// The kind of Discovery packet, one of [`codes`]. Kept as a raw byte
    /// because unknown codes still parse; filtering is the state
    /// machine's job.
    pub code: u8,
    /// Session ID. Zero for all Discovery packets except PADS and PADT.
    pub session_id: u16,
    /// Tags attached to the packet, keyed by tag type. The ordered map
    /// makes encoding deterministic (ascending tag type).
    pub tags: BTreeMap<u16, Vec<u8>>,
}

impl DiscoveryPacket {
    fn new(code: u8, session_id: u16) -> Self {
        Self {
            code,
            session_id,
            tags: BTreeMap::new(),
        }
    }

    /// PADI soliciting session offers from any concentrator.
    ///
    /// By convention on single-ISP access networks the Service-Name tag
    /// is empty, meaning "don't care".
    pub fn padi() -> Self {
        let mut pkt = Self::new(codes::PADI, 0);
        pkt.tags.insert(tags::SERVICE_NAME, Vec::new());
        pkt
    }

    /// PADO offering a session. Built by the test harness playing the
    /// concentrator side.
    pub fn pado(cookie: &[u8]) -> Self {
        let mut pkt = Self::new(codes::PADO, 0);
        pkt.tags.insert(tags::SERVICE_NAME, Vec::new());
        if !cookie.is_empty() {
            pkt.tags.insert(tags::AC_COOKIE, cookie.to_vec());
        }
        pkt
    }

    /// PADR requesting a session from a concentrator, echoing its cookie
    /// when one was offered.
    pub fn padr(cookie: &[u8]) -> Self {
        let mut pkt = Self::new(codes::PADR, 0);
        pkt.tags.insert(tags::SERVICE_NAME, Vec::new());
        if !cookie.is_empty() {
            pkt.tags.insert(tags::AC_COOKIE, cookie.to_vec());
        }
        pkt
    }

    /// PADS confirming a session. Built by the test harness playing the
    /// concentrator side.
    pub fn pads(session_id: u16) -> Self {
        let mut pkt = Self::new(codes::PADS, session_id);
        pkt.tags.insert(tags::SERVICE_NAME, Vec::new());
        pkt
    }

    /// PADT terminating an established session. Carries no tags.
    pub fn padt(session_id: u16) -> Self {
        Self::new(codes::PADT, session_id)
    }

    /// Value of a tag, if present
    pub fn tag(&self, tag_type: u16) -> Option<&[u8]> {
        self.tags.get(&tag_type).map(|v| v.as_slice())
    }

    /// Parse a Discovery packet.
    ///
    /// Later occurrences of a tag type overwrite earlier ones; tag order
    /// carries no meaning on the wire.
    pub fn from_bytes(pkt: &[u8]) -> Result<Self, Error> {
        if pkt.len() < 6 {
            return Err(Error::Truncated);
        }
        if pkt[0] != VERSION_TYPE {
            return Err(Error::UnknownVersion(pkt[0]));
        }

        let mut ret = Self::new(pkt[1], u16::from_be_bytes([pkt[2], pkt[3]]));

        let declared = u16::from_be_bytes([pkt[4], pkt[5]]) as usize;
        let mut rest = &pkt[6..];
        if declared != rest.len() {
            return Err(Error::LengthMismatch {
                declared,
                actual: rest.len(),
            });
        }

        while !rest.is_empty() {
            if rest.len() < 4 {
                return Err(Error::TrailingGarbage(rest.len()));
            }

            let tag_type = u16::from_be_bytes([rest[0], rest[1]]);
            let tag_len = u16::from_be_bytes([rest[2], rest[3]]) as usize;
            if rest[4..].len() < tag_len {
                return Err(Error::TagOverflow);
            }

            if tag_type == tags::SERVICE_NAME && tag_len != 0 {
                return Err(Error::NonEmptyServiceName);
            }

            ret.tags.insert(tag_type, rest[4..4 + tag_len].to_vec());
            rest = &rest[4 + tag_len..];
        }

        Ok(ret)
    }

    /// Serialize the packet. Tags are emitted in ascending type order, so
    /// encoding is deterministic.
    pub fn to_bytes(&self) -> Vec<u8> {
        let payload_len: usize = self.tags.values().map(|v| 4 + v.len()).sum();

        let mut buf = BytesMut::with_capacity(6 + payload_len);
        buf.put_u8(VERSION_TYPE);
        buf.put_u8(self.code);
        buf.put_u16(self.session_id);
        buf.put_u16(payload_len as u16);

        for (tag_type, value) in &self.tags {
            buf.put_u16(*tag_type);
            buf.put_u16(value.len() as u16);
            buf.put_slice(value);
        }

        buf.to_vec()
    }
}
