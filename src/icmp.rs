//! ICMP echo packets carried over IPv4.
//!
//! ```text
//! 0        7        15       23       31
//! +--------+--------+--------+--------+
//! |  type  |  code  |     checksum    |
//! +--------+--------+--------+--------+
//! |       ID        |     sequence    |
//! +--------+--------+--------+--------+
//! |           DATA(optional)          |
//! +--------+--------+--------+--------+
//! ```

use std::net::Ipv4Addr;

use bytes::{BufMut, Bytes, BytesMut};
use nom::{
    bytes::complete::take,
    number::complete::{be_u16, be_u32, be_u8},
    IResult,
};
use tracing::debug;

use crate::errors::{CodecError, Result};

pub const ICMP_ECHO_REQUEST: u8 = 0x08;
pub const ICMP_ECHO_REPLY: u8 = 0x00;
pub const ICMP_ECHO_CODE: u8 = 0x00;

pub const ICMP_HEADER_LEN: usize = 8;
/// Fixed IPv4 header, options are not supported.
pub const IP_HEADER_LEN: usize = 20;

// NOTE: the running sum starts at 0xFFFF, not 0 as in RFC 1071. The result
// only differs when the words sum to zero: 0x0000 instead of 0xFFFF.
const CHECKSUM_SEED: u64 = 0xFFFF;

/// Internet checksum over `data`: 16-bit big-endian words, an odd trailing
/// byte padded with zero, carries folded twice, one's complement.
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum = CHECKSUM_SEED;

    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += u16::from_be_bytes([word[0], word[1]]) as u64;
    }
    if let [last] = words.remainder() {
        sum += u16::from_be_bytes([*last, 0]) as u64;
    }

    sum = (sum & 0xFFFF) + (sum >> 16);
    sum = (sum & 0xFFFF) + (sum >> 16);
    !(sum as u16)
}

/// Build an echo request carrying `payload`.
pub fn build_echo_request(payload: &[u8], id: u16, seq: u16) -> Bytes {
    let mut packet = BytesMut::with_capacity(ICMP_HEADER_LEN + payload.len());
    packet.put_u8(ICMP_ECHO_REQUEST);
    packet.put_u8(ICMP_ECHO_CODE);
    packet.put_u16(0); // checksum placeholder
    packet.put_u16(id);
    packet.put_u16(seq);
    packet.put_slice(payload);

    let checksum = internet_checksum(&packet);
    packet[2..4].copy_from_slice(&checksum.to_be_bytes());

    debug!(id, seq, checksum, "Built ICMP echo request with {} byte payload", payload.len());
    packet.freeze()
}

/// An ICMP message together with the IPv4 fields a ping client needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpFrame {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
    pub id: u16,
    pub seq: u16,
    pub ip_ttl: u8,
    pub ip_src_addr: u32,
    pub ip_dst_addr: u32,
    pub data: Vec<u8>,
}

impl IcmpFrame {
    pub fn src_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.ip_src_addr)
    }

    pub fn dst_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.ip_dst_addr)
    }

    pub fn is_echo_reply(&self) -> bool {
        self.icmp_type == ICMP_ECHO_REPLY && self.code == ICMP_ECHO_CODE
    }
}

fn parse_ipv4_icmp(input: &[u8]) -> IResult<&[u8], IcmpFrame> {
    // version/ihl, tos, total length, identification, flags/fragment offset
    let (input, _) = take(8usize)(input)?;
    let (input, ip_ttl) = be_u8(input)?;
    // protocol, header checksum
    let (input, _) = take(3usize)(input)?;
    let (input, ip_src_addr) = be_u32(input)?;
    let (input, ip_dst_addr) = be_u32(input)?;

    let (input, icmp_type) = be_u8(input)?;
    let (input, code) = be_u8(input)?;
    let (input, checksum) = be_u16(input)?;
    let (input, id) = be_u16(input)?;
    let (input, seq) = be_u16(input)?;

    let frame = IcmpFrame {
        icmp_type,
        code,
        checksum,
        id,
        seq,
        ip_ttl,
        ip_src_addr,
        ip_dst_addr,
        data: input.to_vec(),
    };
    Ok((&input[input.len()..], frame))
}

/// Parse a raw IPv4 datagram (as read from a raw ICMP socket).
///
/// The checksum is reported as received and not verified.
pub fn parse_captured_packet(raw: &[u8]) -> Result<IcmpFrame> {
    let needed = IP_HEADER_LEN + ICMP_HEADER_LEN;
    if raw.len() < needed {
        return Err(CodecError::TruncatedPacket {
            needed,
            available: raw.len(),
        });
    }

    let (_, frame) = parse_ipv4_icmp(raw)?;
    debug!(
        icmp_type = frame.icmp_type,
        id = frame.id,
        seq = frame.seq,
        ttl = frame.ip_ttl,
        "Parsed ICMP packet from {}",
        frame.src_ip()
    );
    Ok(frame)
}
