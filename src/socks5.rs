//! SOCKS5 destination header
//!
//! ```text
//! +------+----------+----------+
//! | ATYP | DST.ADDR | DST.PORT |
//! +------+----------+----------+
//! |  1   | Variable |    2     |
//! +------+----------+----------+
//! ```
//!
//! The parser is a complete-buffer re-parse: callers keep appending bytes
//! from the network and call [`parse_destination`] again until it reports
//! [`Socks5Parse::Complete`].

use std::borrow::Cow;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::{BufMut, Bytes, BytesMut};
use nom::{
    bytes::complete::take,
    number::complete::{be_u128, be_u16, be_u32, be_u8},
    IResult,
};
use tracing::debug;

use crate::errors::{CodecError, Result};

pub const SOCKS_VERSION: u8 = 0x05;
pub const REP_SUCCESS: u8 = 0x00;
pub const RSV: u8 = 0x00;

// address type ATYP
pub const ATYP_IPV4: u8 = 0x01;
pub const ATYP_DOMAIN: u8 = 0x03;
pub const ATYP_IPV6: u8 = 0x04;

/// Shortest header any address type can have: domain with a 1 byte name.
pub const MIN_HEADER_LEN: usize = 5;
pub const IPV4_HEADER_LEN: usize = 7;
pub const IPV6_HEADER_LEN: usize = 19;

const MAX_DOMAIN_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressType {
    Ipv4,
    Domain,
    Ipv6,
}

impl TryFrom<u8> for AddressType {
    type Error = CodecError;

    fn try_from(atyp: u8) -> Result<Self> {
        match atyp {
            ATYP_IPV4 => Ok(AddressType::Ipv4),
            ATYP_DOMAIN => Ok(AddressType::Domain),
            ATYP_IPV6 => Ok(AddressType::Ipv6),
            other => Err(CodecError::UnsupportedAddressType(other)),
        }
    }
}

impl From<AddressType> for u8 {
    fn from(atyp: AddressType) -> u8 {
        match atyp {
            AddressType::Ipv4 => ATYP_IPV4,
            AddressType::Domain => ATYP_DOMAIN,
            AddressType::Ipv6 => ATYP_IPV6,
        }
    }
}

/// Decoded destination of a SOCKS5 request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocksHeader {
    pub atyp: AddressType,
    /// Dotted-quad or IPv6 text for IP destinations, the raw hostname
    /// bytes for domain destinations.
    pub dest_addr: Vec<u8>,
    pub dest_port: u16,
}

impl SocksHeader {
    /// Build a destination from an address string, packing IP literals as
    /// IPv4/IPv6 and anything else as a hostname.
    pub fn from_target(addr: &str, port: u16) -> Result<Self> {
        let (atyp, dest_addr) = match addr.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => (AddressType::Ipv4, ip.to_string().into_bytes()),
            Ok(IpAddr::V6(ip)) => (AddressType::Ipv6, ip.to_string().into_bytes()),
            Err(_) => {
                if addr.is_empty() || addr.len() > MAX_DOMAIN_LEN {
                    return Err(CodecError::InvalidHostname(format!(
                        "SOCKS5 hostname must be 1 to {} bytes, got {}",
                        MAX_DOMAIN_LEN,
                        addr.len()
                    )));
                }
                (AddressType::Domain, addr.as_bytes().to_vec())
            }
        };

        Ok(SocksHeader {
            atyp,
            dest_addr,
            dest_port: port,
        })
    }

    /// Bytes this destination occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        match self.atyp {
            AddressType::Ipv4 => IPV4_HEADER_LEN,
            AddressType::Ipv6 => IPV6_HEADER_LEN,
            AddressType::Domain => 4 + self.dest_addr.len(),
        }
    }

    pub fn host(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.dest_addr)
    }

    /// The destination as a socket address, when it is an IP literal.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self.atyp {
            AddressType::Domain => None,
            _ => self
                .host()
                .parse::<IpAddr>()
                .ok()
                .map(|ip| SocketAddr::new(ip, self.dest_port)),
        }
    }
}

impl fmt::Display for SocksHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.atyp {
            AddressType::Ipv6 => write!(f, "[{}]:{}", self.host(), self.dest_port),
            _ => write!(f, "{}:{}", self.host(), self.dest_port),
        }
    }
}

/// Outcome of one parse attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Socks5Parse {
    Complete {
        header: SocksHeader,
        bytes_consumed: usize,
    },
    /// The buffer is a valid prefix; wait for `bytes_needed` more bytes.
    Incomplete { bytes_needed: usize },
}

impl Socks5Parse {
    fn need(required: usize, available: usize) -> Self {
        Socks5Parse::Incomplete {
            bytes_needed: required - available,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Socks5Parse::Complete { .. })
    }

    /// Single signed length: the bytes consumed when complete, otherwise
    /// `buffer length - required length`, which is zero or negative.
    pub fn header_length(&self) -> i64 {
        match self {
            Socks5Parse::Complete { bytes_consumed, .. } => *bytes_consumed as i64,
            Socks5Parse::Incomplete { bytes_needed } => -(*bytes_needed as i64),
        }
    }

    pub fn header(&self) -> Option<&SocksHeader> {
        match self {
            Socks5Parse::Complete { header, .. } => Some(header),
            Socks5Parse::Incomplete { .. } => None,
        }
    }
}

fn parse_ipv4_destination(input: &[u8]) -> IResult<&[u8], (Ipv4Addr, u16)> {
    let (input, addr) = be_u32(input)?;
    let (input, port) = be_u16(input)?;
    Ok((input, (Ipv4Addr::from(addr), port)))
}

fn parse_ipv6_destination(input: &[u8]) -> IResult<&[u8], (Ipv6Addr, u16)> {
    let (input, addr) = be_u128(input)?;
    let (input, port) = be_u16(input)?;
    Ok((input, (Ipv6Addr::from(addr), port)))
}

fn parse_domain_destination(input: &[u8]) -> IResult<&[u8], (&[u8], u16)> {
    let (input, length) = be_u8(input)?;
    let (input, name) = take(length as usize)(input)?;
    let (input, port) = be_u16(input)?;
    Ok((input, (name, port)))
}

/// Decode the destination segment at the start of `buffer`.
///
/// Returns [`Socks5Parse::Incomplete`] with the exact number of missing
/// bytes when the buffer is too short, and fails only for an unknown ATYP.
pub fn parse_destination(buffer: &[u8]) -> Result<Socks5Parse> {
    let size = buffer.len();
    if size < MIN_HEADER_LEN {
        return Ok(Socks5Parse::need(MIN_HEADER_LEN, size));
    }

    let atyp = AddressType::try_from(buffer[0])?;
    let body = &buffer[1..];

    let (dest_addr, dest_port, required) = match atyp {
        AddressType::Ipv4 => {
            if size < IPV4_HEADER_LEN {
                return Ok(Socks5Parse::need(IPV4_HEADER_LEN, size));
            }
            let (_, (addr, port)) = parse_ipv4_destination(body)?;
            (addr.to_string().into_bytes(), port, IPV4_HEADER_LEN)
        }
        AddressType::Ipv6 => {
            if size < IPV6_HEADER_LEN {
                return Ok(Socks5Parse::need(IPV6_HEADER_LEN, size));
            }
            let (_, (addr, port)) = parse_ipv6_destination(body)?;
            (addr.to_string().into_bytes(), port, IPV6_HEADER_LEN)
        }
        AddressType::Domain => {
            // atyp + length byte + name + port
            let required = 4 + buffer[1] as usize;
            if size < required {
                return Ok(Socks5Parse::need(required, size));
            }
            let (_, (name, port)) = parse_domain_destination(body)?;
            (name.to_vec(), port, required)
        }
    };

    let header = SocksHeader {
        atyp,
        dest_addr,
        dest_port,
    };
    debug!(atyp = ?atyp, "Parsed SOCKS5 destination {}", header);

    Ok(Socks5Parse::Complete {
        header,
        bytes_consumed: required,
    })
}

/// Append the wire form of `header` to `dst`.
pub fn encode_destination(header: &SocksHeader, dst: &mut BytesMut) -> Result<()> {
    dst.reserve(header.encoded_len());
    match header.atyp {
        AddressType::Ipv4 => {
            let ip: Ipv4Addr = header.host().parse().map_err(|_| {
                CodecError::InvalidHostname(format!("'{}' is not an IPv4 address", header.host()))
            })?;
            dst.put_u8(ATYP_IPV4);
            dst.put_slice(&ip.octets());
        }
        AddressType::Ipv6 => {
            let ip: Ipv6Addr = header.host().parse().map_err(|_| {
                CodecError::InvalidHostname(format!("'{}' is not an IPv6 address", header.host()))
            })?;
            dst.put_u8(ATYP_IPV6);
            dst.put_slice(&ip.octets());
        }
        AddressType::Domain => {
            if header.dest_addr.is_empty() || header.dest_addr.len() > MAX_DOMAIN_LEN {
                return Err(CodecError::InvalidHostname(format!(
                    "SOCKS5 hostname must be 1 to {} bytes, got {}",
                    MAX_DOMAIN_LEN,
                    header.dest_addr.len()
                )));
            }
            dst.put_u8(ATYP_DOMAIN);
            dst.put_u8(header.dest_addr.len() as u8);
            dst.put_slice(&header.dest_addr);
        }
    }
    dst.put_u16(header.dest_port);
    Ok(())
}

/// Append a success reply (`VER REP RSV` + bound address) to `dst`.
pub fn encode_reply(addr: &str, port: u16, dst: &mut BytesMut) -> Result<()> {
    let header = SocksHeader::from_target(addr, port)?;
    dst.reserve(3 + header.encoded_len());
    dst.put_slice(&[SOCKS_VERSION, REP_SUCCESS, RSV]);
    encode_destination(&header, dst)
}

pub fn reply_bytes(addr: &str, port: u16) -> Result<Bytes> {
    let mut dst = BytesMut::new();
    encode_reply(addr, port, &mut dst)?;
    Ok(dst.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_buffers_need_minimum_header() {
        let full = [ATYP_IPV4, 192, 168, 1, 100, 0x1f, 0x40];
        for len in 0..MIN_HEADER_LEN {
            let parsed = parse_destination(&full[..len]).unwrap();
            assert_eq!(
                parsed,
                Socks5Parse::Incomplete {
                    bytes_needed: MIN_HEADER_LEN - len
                }
            );
            assert_eq!(parsed.header_length(), len as i64 - 5);
            assert!(parsed.header().is_none());
        }
    }

    #[test]
    fn test_ipv4_one_byte_short() {
        let parsed = parse_destination(&[ATYP_IPV4, 192, 168, 1, 100, 0x1f]).unwrap();
        assert_eq!(parsed, Socks5Parse::Incomplete { bytes_needed: 1 });
        assert_eq!(parsed.header_length(), -1);
    }

    #[test]
    fn test_ipv4_complete() {
        let mut buf = vec![ATYP_IPV4, 192, 168, 1, 100, 0x1f, 0x40];
        buf.extend_from_slice(b"payload follows");

        let parsed = parse_destination(&buf).unwrap();
        assert_eq!(parsed.header_length(), 7);
        let header = parsed.header().unwrap();
        assert_eq!(header.atyp, AddressType::Ipv4);
        assert_eq!(header.dest_addr, b"192.168.1.100");
        assert_eq!(header.dest_port, 8000);
        assert_eq!(
            header.socket_addr(),
            Some("192.168.1.100:8000".parse().unwrap())
        );
    }

    #[test]
    fn test_ipv6_complete_and_short() {
        let ip: Ipv6Addr = "2001:db8::1".parse().unwrap();
        let mut buf = vec![ATYP_IPV6];
        buf.extend_from_slice(&ip.octets());
        buf.extend_from_slice(&443u16.to_be_bytes());

        let parsed = parse_destination(&buf).unwrap();
        assert_eq!(
            parsed,
            Socks5Parse::Complete {
                header: SocksHeader {
                    atyp: AddressType::Ipv6,
                    dest_addr: b"2001:db8::1".to_vec(),
                    dest_port: 443,
                },
                bytes_consumed: 19,
            }
        );
        assert_eq!(parsed.header().unwrap().to_string(), "[2001:db8::1]:443");

        let short = parse_destination(&buf[..10]).unwrap();
        assert_eq!(short, Socks5Parse::Incomplete { bytes_needed: 9 });
        assert_eq!(short.header_length(), -9);
    }

    #[test]
    fn test_domain_complete_and_short() {
        let mut buf = vec![ATYP_DOMAIN, 13];
        buf.extend_from_slice(b"www.baidu.com");
        buf.extend_from_slice(&80u16.to_be_bytes());
        buf.extend_from_slice(&[0xde, 0xad]);

        let parsed = parse_destination(&buf).unwrap();
        assert_eq!(parsed.header_length(), 17);
        let header = parsed.header().unwrap();
        assert_eq!(header.atyp, AddressType::Domain);
        assert_eq!(header.dest_addr, b"www.baidu.com");
        assert_eq!(header.dest_port, 80);
        assert_eq!(header.socket_addr(), None);
        assert_eq!(header.to_string(), "www.baidu.com:80");

        // "\x03\x0dwww.baidu.co" is missing the last name byte and the port
        let short = parse_destination(&buf[..14]).unwrap();
        assert_eq!(short, Socks5Parse::Incomplete { bytes_needed: 3 });
        assert_eq!(short.header_length(), 14 - 17);
    }

    #[test]
    fn test_zero_length_domain() {
        let parsed = parse_destination(&[ATYP_DOMAIN, 0, 0x00, 0x50, 0xff]).unwrap();
        let header = parsed.header().unwrap();
        assert!(header.dest_addr.is_empty());
        assert_eq!(header.dest_port, 80);
        assert_eq!(parsed.header_length(), 4);
    }

    #[test]
    fn test_unknown_address_type() {
        let result = parse_destination(&[0x09, 1, 2, 3, 4, 5, 6, 7]);
        assert!(matches!(
            result,
            Err(CodecError::UnsupportedAddressType(0x09))
        ));
    }

    #[test]
    fn test_reparse_with_growing_buffer() {
        let mut wire = BytesMut::new();
        let target = SocksHeader::from_target("example.org", 8443).unwrap();
        encode_destination(&target, &mut wire).unwrap();

        let mut received = Vec::new();
        let mut bytes = wire.iter().copied();
        let header = loop {
            match parse_destination(&received).unwrap() {
                Socks5Parse::Complete {
                    header,
                    bytes_consumed,
                } => {
                    assert_eq!(bytes_consumed, received.len());
                    break header;
                }
                Socks5Parse::Incomplete { bytes_needed } => {
                    for _ in 0..bytes_needed {
                        received.push(bytes.next().unwrap());
                    }
                }
            }
        };
        assert_eq!(header, target);
    }

    #[test]
    fn test_reply_bytes() {
        let reply = reply_bytes("127.0.0.1", 1080).unwrap();
        assert_eq!(
            &reply[..],
            &[0x05, 0x00, 0x00, ATYP_IPV4, 127, 0, 0, 1, 0x04, 0x38]
        );

        let reply = reply_bytes("::1", 53).unwrap();
        assert_eq!(reply.len(), 3 + IPV6_HEADER_LEN);
        assert_eq!(reply[3], ATYP_IPV6);

        let reply = reply_bytes("proxy.local", 1).unwrap();
        assert_eq!(&reply[3..5], &[ATYP_DOMAIN, 11]);
        assert_eq!(&reply[5..16], b"proxy.local");
        assert_eq!(&reply[16..], &[0x00u8, 0x01]);

        let too_long = "a".repeat(256);
        assert!(matches!(
            reply_bytes(&too_long, 1),
            Err(CodecError::InvalidHostname(_))
        ));
    }

    #[test]
    fn test_encode_destination_rejects_bad_ip_text() {
        let header = SocksHeader {
            atyp: AddressType::Ipv4,
            dest_addr: b"not-an-ip".to_vec(),
            dest_port: 1,
        };
        let mut dst = BytesMut::new();
        assert!(encode_destination(&header, &mut dst).is_err());
    }
}
