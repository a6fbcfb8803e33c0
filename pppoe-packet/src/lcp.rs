//! PPP Link Control Protocol codec (RFC 1661)
//!
//! LCP frames ride inside PPP frames with protocol number 0xc021. The
//! framing layer is allowed to append padding after the declared packet
//! length, so the parser honors the length field and ignores the rest.

use std::collections::BTreeMap;

use bytes::{BufMut, BytesMut};

use crate::error::Error;

/// PPP protocol number for the Link Control Protocol
pub const PROTOCOL: u16 = 0xc021;

/// Authentication protocol numbers carried by the AuthProto option
pub const AUTH_PROTO_PAP: u16 = 0xc023;
/// CHAP; the option carries one extra algorithm byte
pub const AUTH_PROTO_CHAP: u16 = 0xc223;
/// CHAP with MD5, the common algorithm byte
pub const CHAP_MD5: u8 = 5;

const OPTION_MRU: u8 = 1;
const OPTION_AUTH_PROTO: u8 = 3;
const OPTION_MAGIC: u8 = 5;

/// The type of an LCP packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Code {
    ConfigureRequest = 1,
    ConfigureAck = 2,
    ConfigureNak = 3,
    ConfigureReject = 4,
    TerminateRequest = 5,
    TerminateAck = 6,
    CodeReject = 7,
    ProtocolReject = 8,
    EchoRequest = 9,
    EchoReply = 10,
    DiscardRequest = 11,
}

impl Code {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::ConfigureRequest),
            2 => Some(Self::ConfigureAck),
            3 => Some(Self::ConfigureNak),
            4 => Some(Self::ConfigureReject),
            5 => Some(Self::TerminateRequest),
            6 => Some(Self::TerminateAck),
            7 => Some(Self::CodeReject),
            8 => Some(Self::ProtocolReject),
            9 => Some(Self::EchoRequest),
            10 => Some(Self::EchoReply),
            11 => Some(Self::DiscardRequest),
            _ => None,
        }
    }

    /// Whether this code carries a configure-option payload
    pub fn is_configure(&self) -> bool {
        matches!(
            self,
            Self::ConfigureRequest | Self::ConfigureAck | Self::ConfigureNak | Self::ConfigureReject
        )
    }
}

/// A parsed LCP packet.
///
/// Which fields are meaningful depends on `code`: the configure family
/// uses the option fields (zero meaning absent), the terminate family and
/// Code-Reject carry raw `data`, Protocol-Reject adds the rejected
/// protocol number, and the echo family carries a magic number plus data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcpPacket {
    pub code: Code,
    pub id: u8,

    /// Maximum Receive Unit option. Zero when absent.
    pub mru: u16,
    /// Authentication protocol option. Zero when absent.
    pub auth_proto: u16,
    /// CHAP algorithm byte, present only when `auth_proto` is CHAP.
    pub chap_algorithm: u8,
    /// Magic number option (configure family) or field (echo family).
    /// Zero when absent.
    pub magic: u32,
    /// Options this codec doesn't recognize, keyed by option type.
    pub unknown_options: BTreeMap<u8, Vec<u8>>,

    /// Rejected protocol number, Protocol-Reject only.
    pub rejected_protocol: u16,
    /// Raw payload for the terminate, reject and echo families.
    pub data: Vec<u8>,
}

impl LcpPacket {
    /// An empty packet of the given code; fields default to absent
    pub fn new(code: Code, id: u8) -> Self {
        Self {
            code,
            id,
            mru: 0,
            auth_proto: 0,
            chap_algorithm: 0,
            magic: 0,
            unknown_options: BTreeMap::new(),
            rejected_protocol: 0,
            data: Vec::new(),
        }
    }

    /// Parse an LCP PPP frame.
    ///
    /// `b` may have trailing padding after the declared packet length,
    /// which is ignored.
    pub fn from_bytes(b: &[u8]) -> Result<Self, Error> {
        if b.len() < 6 {
            return Err(Error::Truncated);
        }
        if u16::from_be_bytes([b[0], b[1]]) != PROTOCOL {
            return Err(Error::NotLcp);
        }
        let b = &b[2..]; // Advance past the PPP protocol field.

        let code_byte = b[0];
        let id = b[1];
        let pkt_len = u16::from_be_bytes([b[2], b[3]]) as usize;
        // The declared length may be shorter than the buffer (padding),
        // but never nonsensically short nor longer than what arrived.
        if pkt_len < 4 || pkt_len > b.len() {
            return Err(Error::Truncated);
        }

        let code = Code::from_u8(code_byte).ok_or(Error::UnknownCode(code_byte))?;
        let payload = &b[4..pkt_len];

        let mut ret = Self::new(code, id);
        match code {
            Code::ConfigureRequest | Code::ConfigureAck | Code::ConfigureNak
            | Code::ConfigureReject => {
                let mut opts = parse_options(payload)?;

                if let Some(val) = opts.remove(&OPTION_MRU) {
                    if val.len() != 2 {
                        return Err(Error::UnexpectedOptionLength(OPTION_MRU));
                    }
                    ret.mru = u16::from_be_bytes([val[0], val[1]]);
                }
                if let Some(val) = opts.remove(&OPTION_AUTH_PROTO) {
                    if val.len() < 2 {
                        return Err(Error::Truncated);
                    }
                    ret.auth_proto = u16::from_be_bytes([val[0], val[1]]);
                    if ret.auth_proto == AUTH_PROTO_CHAP {
                        if val.len() != 3 {
                            return Err(Error::UnexpectedOptionLength(OPTION_AUTH_PROTO));
                        }
                        ret.chap_algorithm = val[2];
                    } else if val.len() != 2 {
                        return Err(Error::UnexpectedOptionLength(OPTION_AUTH_PROTO));
                    }
                }
                if let Some(val) = opts.remove(&OPTION_MAGIC) {
                    if val.len() != 4 {
                        return Err(Error::UnexpectedOptionLength(OPTION_MAGIC));
                    }
                    ret.magic = u32::from_be_bytes([val[0], val[1], val[2], val[3]]);
                }

                ret.unknown_options = opts;
            }

            Code::ProtocolReject => {
                if payload.len() < 2 {
                    return Err(Error::Truncated);
                }
                ret.rejected_protocol = u16::from_be_bytes([payload[0], payload[1]]);
                ret.data = payload[2..].to_vec();
            }

            Code::TerminateRequest | Code::TerminateAck | Code::CodeReject => {
                ret.data = payload.to_vec();
            }

            Code::EchoRequest | Code::EchoReply | Code::DiscardRequest => {
                if payload.len() < 4 {
                    return Err(Error::Truncated);
                }
                ret.magic = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
                ret.data = payload[4..].to_vec();
            }
        }

        Ok(ret)
    }

    /// Serialize into a PPP frame for transmission.
    ///
    /// Configure-family options are emitted in the fixed order MRU,
    /// AuthProto, Magic, then unknown options in ascending type order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u16(PROTOCOL);
        buf.put_u8(self.code as u8);
        buf.put_u8(self.id);
        // Total packet length, backpatched below.
        buf.put_u16(0);

        match self.code {
            Code::ConfigureRequest | Code::ConfigureAck | Code::ConfigureNak
            | Code::ConfigureReject => {
                if self.mru != 0 {
                    buf.put_u8(OPTION_MRU);
                    buf.put_u8(4);
                    buf.put_u16(self.mru);
                }
                if self.auth_proto != 0 {
                    buf.put_u8(OPTION_AUTH_PROTO);
                    buf.put_u8(if self.chap_algorithm != 0 { 5 } else { 4 });
                    buf.put_u16(self.auth_proto);
                    if self.chap_algorithm != 0 {
                        buf.put_u8(self.chap_algorithm);
                    }
                }
                if self.magic != 0 {
                    buf.put_u8(OPTION_MAGIC);
                    buf.put_u8(6);
                    buf.put_u32(self.magic);
                }
                for (opt, val) in &self.unknown_options {
                    buf.put_u8(*opt);
                    buf.put_u8(val.len() as u8 + 2);
                    buf.put_slice(val);
                }
            }

            Code::ProtocolReject => {
                buf.put_u16(self.rejected_protocol);
                buf.put_slice(&self.data);
            }

            Code::TerminateRequest | Code::TerminateAck | Code::CodeReject => {
                buf.put_slice(&self.data);
            }

            Code::EchoRequest | Code::EchoReply | Code::DiscardRequest => {
                buf.put_u32(self.magic);
                buf.put_slice(&self.data);
            }
        }

        let mut ret = buf.to_vec();
        // The LCP length covers everything except the 2-byte PPP
        // protocol prefix.
        let len = (ret.len() - 2) as u16;
        ret[4..6].copy_from_slice(&len.to_be_bytes());
        ret
    }
}

fn parse_options(mut b: &[u8]) -> Result<BTreeMap<u8, Vec<u8>>, Error> {
    let mut ret = BTreeMap::new();

    while !b.is_empty() {
        if b.len() < 2 {
            return Err(Error::Truncated);
        }
        let (option, len) = (b[0], b[1] as usize);
        if len < 2 || len > b.len() {
            return Err(Error::BadOption {
                option,
                len: b[1],
            });
        }
        ret.insert(option, b[2..len].to_vec());
        b = &b[len..];
    }

    Ok(ret)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ParseCase {
        desc: &'static str,
        raw: &'static [u8],
        want: Option<LcpPacket>,
        skip_unparse: bool,
    }

    fn configure_with_all_options(code: Code) -> LcpPacket {
        LcpPacket {
            mru: 1500,
            auth_proto: AUTH_PROTO_CHAP,
            chap_algorithm: CHAP_MD5,
            magic: 0x01020304,
            unknown_options: [(42u8, vec![1u8])].into_iter().collect(),
            ..LcpPacket::new(code, 1)
        }
    }

    #[test]
    fn test_parse_lcp() {
        let cases = [
            ParseCase {
                desc: "minimal Configure-Request",
                raw: &[0xc0, 0x21, 1, 1, 0, 4],
                want: Some(LcpPacket::new(Code::ConfigureRequest, 1)),
                skip_unparse: false,
            },
            ParseCase {
                desc: "Configure-Request with all options",
                raw: &[
                    0xc0, 0x21, // Frame type = LCP
                    1,    // Configure-Request
                    1,    // ID = 1
                    0, 22, // Packet length
                    1, 4, 5, 220, // MRU = 1500
                    3, 5, 0xc2, 0x23, 5, // AuthProto = CHAP-MD5
                    5, 6, 1, 2, 3, 4, // Magic = 0x01020304
                    42, 3, 1, // Some unknown option = 1
                ],
                want: Some(configure_with_all_options(Code::ConfigureRequest)),
                skip_unparse: false,
            },
            ParseCase {
                desc: "Configure-Ack with all options",
                raw: &[
                    0xc0, 0x21, 2, 1, 0, 22, 1, 4, 5, 220, 3, 5, 0xc2, 0x23, 5, 5, 6, 1, 2, 3, 4,
                    42, 3, 1,
                ],
                want: Some(configure_with_all_options(Code::ConfigureAck)),
                skip_unparse: false,
            },
            ParseCase {
                desc: "Configure-Nak with all options",
                raw: &[
                    0xc0, 0x21, 3, 1, 0, 22, 1, 4, 5, 220, 3, 5, 0xc2, 0x23, 5, 5, 6, 1, 2, 3, 4,
                    42, 3, 1,
                ],
                want: Some(configure_with_all_options(Code::ConfigureNak)),
                skip_unparse: false,
            },
            ParseCase {
                desc: "Configure-Reject with all options",
                raw: &[
                    0xc0, 0x21, 4, 1, 0, 22, 1, 4, 5, 220, 3, 5, 0xc2, 0x23, 5, 5, 6, 1, 2, 3, 4,
                    42, 3, 1,
                ],
                want: Some(configure_with_all_options(Code::ConfigureReject)),
                skip_unparse: false,
            },
            ParseCase {
                desc: "Terminate-Request",
                raw: &[0xc0, 0x21, 5, 1, 0, 12, 1, 2, 3, 4, 5, 6, 7, 8],
                want: Some(LcpPacket {
                    data: vec![1, 2, 3, 4, 5, 6, 7, 8],
                    ..LcpPacket::new(Code::TerminateRequest, 1)
                }),
                skip_unparse: false,
            },
            ParseCase {
                desc: "Terminate-Ack",
                raw: &[0xc0, 0x21, 6, 1, 0, 12, 1, 2, 3, 4, 5, 6, 7, 8],
                want: Some(LcpPacket {
                    data: vec![1, 2, 3, 4, 5, 6, 7, 8],
                    ..LcpPacket::new(Code::TerminateAck, 1)
                }),
                skip_unparse: false,
            },
            ParseCase {
                desc: "Code-Reject",
                raw: &[0xc0, 0x21, 7, 1, 0, 12, 1, 2, 3, 4, 5, 6, 7, 8],
                want: Some(LcpPacket {
                    data: vec![1, 2, 3, 4, 5, 6, 7, 8],
                    ..LcpPacket::new(Code::CodeReject, 1)
                }),
                skip_unparse: false,
            },
            ParseCase {
                desc: "Protocol-Reject",
                raw: &[
                    0xc0, 0x21, 8, 1, 0, 12, 0x12, 0x34, 1, 2, 3, 4, 5, 6,
                ],
                want: Some(LcpPacket {
                    rejected_protocol: 0x1234,
                    data: vec![1, 2, 3, 4, 5, 6],
                    ..LcpPacket::new(Code::ProtocolReject, 1)
                }),
                skip_unparse: false,
            },
            ParseCase {
                desc: "Echo-Request",
                raw: &[0xc0, 0x21, 9, 1, 0, 12, 1, 2, 3, 4, 5, 6, 7, 8],
                want: Some(LcpPacket {
                    magic: 0x01020304,
                    data: vec![5, 6, 7, 8],
                    ..LcpPacket::new(Code::EchoRequest, 1)
                }),
                skip_unparse: false,
            },
            ParseCase {
                desc: "Echo-Reply",
                raw: &[0xc0, 0x21, 10, 1, 0, 12, 1, 2, 3, 4, 5, 6, 7, 8],
                want: Some(LcpPacket {
                    magic: 0x01020304,
                    data: vec![5, 6, 7, 8],
                    ..LcpPacket::new(Code::EchoReply, 1)
                }),
                skip_unparse: false,
            },
            ParseCase {
                desc: "Discard-Request",
                raw: &[0xc0, 0x21, 11, 1, 0, 12, 1, 2, 3, 4, 5, 6, 7, 8],
                want: Some(LcpPacket {
                    magic: 0x01020304,
                    data: vec![5, 6, 7, 8],
                    ..LcpPacket::new(Code::DiscardRequest, 1)
                }),
                skip_unparse: false,
            },
            ParseCase {
                desc: "unknown code",
                raw: &[0xc0, 0x21, 12, 1, 0, 4],
                want: None,
                skip_unparse: false,
            },
            ParseCase {
                desc: "not LCP",
                raw: &[0xc0, 0x23, 1, 1, 0, 4],
                want: None,
                skip_unparse: false,
            },
            ParseCase {
                desc: "declared length too short",
                raw: &[0xc0, 0x21, 1, 1, 0, 3],
                want: None,
                skip_unparse: false,
            },
            ParseCase {
                desc: "declared length overflows",
                raw: &[0xc0, 0x21, 1, 1, 0, 200],
                want: None,
                skip_unparse: false,
            },
            ParseCase {
                desc: "option overflows payload",
                raw: &[0xc0, 0x21, 1, 1, 0, 8, 1, 200, 5, 220],
                want: None,
                skip_unparse: false,
            },
            ParseCase {
                desc: "option length below header size",
                raw: &[0xc0, 0x21, 1, 1, 0, 8, 1, 1, 5, 220],
                want: None,
                skip_unparse: false,
            },
            ParseCase {
                desc: "MRU with wrong length",
                raw: &[0xc0, 0x21, 1, 1, 0, 7, 1, 3, 5],
                want: None,
                skip_unparse: false,
            },
            ParseCase {
                desc: "CHAP missing algorithm byte",
                raw: &[0xc0, 0x21, 1, 1, 0, 8, 3, 4, 0xc2, 0x23],
                want: None,
                skip_unparse: false,
            },
            ParseCase {
                desc: "PAP with trailing algorithm byte",
                raw: &[0xc0, 0x21, 1, 1, 0, 9, 3, 5, 0xc0, 0x23, 1],
                want: None,
                skip_unparse: false,
            },
            ParseCase {
                desc: "short Echo-Request",
                raw: &[0xc0, 0x21, 9, 1, 0, 6, 1, 2],
                want: None,
                skip_unparse: false,
            },
            ParseCase {
                desc: "short Protocol-Reject",
                raw: &[0xc0, 0x21, 8, 1, 0, 5, 0x12],
                want: None,
                skip_unparse: false,
            },
            // Frames taken from a real pppd talking to us
            ParseCase {
                desc: "ISP Configure-Request",
                raw: &[
                    0xc0, 0x21, 0x01, 0x01, 0x00, 0x13, 0x01, 0x04, 0x05, 0xd4, 0x03, 0x05, 0xc2,
                    0x23, 0x05, 0x05, 0x06, 0x28, 0xa2, 0x88, 0x93,
                ],
                want: Some(LcpPacket {
                    mru: 1492,
                    auth_proto: AUTH_PROTO_CHAP,
                    chap_algorithm: CHAP_MD5,
                    magic: 0x28a28893,
                    ..LcpPacket::new(Code::ConfigureRequest, 1)
                }),
                skip_unparse: false,
            },
            ParseCase {
                desc: "ISP Terminate-Request",
                raw: &[
                    0xc0, 0x21, 0x05, 0x02, 0x00, 0x10, 0x55, 0x73, 0x65, 0x72, 0x20, 0x72, 0x65,
                    0x71, 0x75, 0x65, 0x73, 0x74,
                ],
                want: Some(LcpPacket {
                    data: b"User request".to_vec(),
                    ..LcpPacket::new(Code::TerminateRequest, 2)
                }),
                skip_unparse: false,
            },
        ];

        for case in &cases {
            let got = LcpPacket::from_bytes(case.raw);
            match &case.want {
                None => {
                    assert!(got.is_err(), "{}: unexpected success", case.desc);
                }
                Some(want) => {
                    let got = got.unwrap_or_else(|e| panic!("{}: unexpected error {e}", case.desc));
                    assert_eq!(&got, want, "{}: wrong parse", case.desc);

                    if !case.skip_unparse {
                        assert_eq!(got.to_bytes(), case.raw, "{}: wrong unparse", case.desc);
                    }
                }
            }
        }
    }

    #[test]
    fn test_trailing_padding_ignored() {
        // A valid Echo-Request followed by framing-layer padding parses
        // the same as the unpadded frame, and re-encodes without the
        // padding.
        let unpadded: &[u8] = &[0xc0, 0x21, 9, 1, 0, 12, 1, 2, 3, 4, 5, 6, 7, 8];
        let mut padded = unpadded.to_vec();
        padded.extend_from_slice(&[0x00; 6]);

        let want = LcpPacket::from_bytes(unpadded).unwrap();
        let got = LcpPacket::from_bytes(&padded).unwrap();
        assert_eq!(got, want);
        assert_eq!(got.to_bytes(), unpadded);
    }

    #[test]
    fn test_padded_configure_request() {
        let unpadded: &[u8] = &[0xc0, 0x21, 1, 1, 0, 8, 1, 4, 5, 220];
        let mut padded = unpadded.to_vec();
        padded.extend_from_slice(&[0x00; 4]);

        let got = LcpPacket::from_bytes(&padded).unwrap();
        assert_eq!(got.mru, 1500);
        assert_eq!(got.to_bytes(), unpadded);
    }

    #[test]
    fn test_truncated_inputs() {
        assert_eq!(LcpPacket::from_bytes(&[]), Err(Error::Truncated));
        assert_eq!(LcpPacket::from_bytes(&[0xc0, 0x21, 1, 1]), Err(Error::Truncated));
        assert_eq!(
            LcpPacket::from_bytes(&[0xc0, 0x23, 1, 1, 0, 4]),
            Err(Error::NotLcp)
        );
        assert_eq!(
            LcpPacket::from_bytes(&[0xc0, 0x21, 12, 1, 0, 4]),
            Err(Error::UnknownCode(12))
        );
    }

    #[test]
    fn test_parser_tolerates_mutations() {
        // Truncations and single-byte corruptions must parse cleanly or
        // fail cleanly, never panic or misindex. Re-encoding a surviving
        // parse must reproduce a prefix of the input (the parser may
        // legally treat corrupted bytes as padding).
        let valid: &[u8] = &[
            0xc0, 0x21, 1, 1, 0, 22, 1, 4, 5, 220, 3, 5, 0xc2, 0x23, 5, 5, 6, 1, 2, 3, 4, 42, 3,
            1,
        ];

        for end in 0..valid.len() {
            let _ = LcpPacket::from_bytes(&valid[..end]);
        }
        for pos in 0..valid.len() {
            for flip in [0x01u8, 0x80, 0xff] {
                let mut mutated = valid.to_vec();
                mutated[pos] ^= flip;
                if let Ok(pkt) = LcpPacket::from_bytes(&mutated) {
                    let reencoded = pkt.to_bytes();
                    assert!(reencoded.len() <= mutated.len());
                }
            }
        }
    }

    #[test]
    fn test_unknown_option_preserved() {
        let pkt = LcpPacket {
            unknown_options: [(42u8, vec![0xde, 0xad])].into_iter().collect(),
            ..LcpPacket::new(Code::ConfigureRequest, 7)
        };

        let reparsed = LcpPacket::from_bytes(&pkt.to_bytes()).unwrap();
        assert_eq!(reparsed, pkt);
    }

    #[test]
    fn test_configure_option_order() {
        let pkt = LcpPacket {
            mru: 1492,
            auth_proto: AUTH_PROTO_PAP,
            magic: 0xdeadbeef,
            ..LcpPacket::new(Code::ConfigureRequest, 3)
        };
        let bytes = pkt.to_bytes();

        // MRU, then AuthProto (no algorithm byte for PAP), then Magic.
        assert_eq!(
            bytes,
            &[
                0xc0, 0x21, 1, 3, 0, 18, 1, 4, 5, 0xd4, 3, 4, 0xc0, 0x23, 5, 6, 0xde, 0xad, 0xbe,
                0xef,
            ]
        );
    }
}
