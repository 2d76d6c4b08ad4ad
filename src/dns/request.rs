//! DNS query encoding
//!
//! Builds the single-question, recursion-desired queries the resolver
//! sends. The transaction id is chosen by the caller.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::dns::protocol::{
    DnsHeader, QueryType, DNS_HEADER_LEN, MAX_HOSTNAME_LEN, MAX_LABEL_LEN, QCLASS_IN,
};
use crate::errors::{CodecError, Result};

/// Encode a query for `hostname` into a fresh buffer.
pub fn build_request(hostname: &[u8], qtype: QueryType, transaction_id: u16) -> Result<Bytes> {
    let mut dst = BytesMut::new();
    encode_request(hostname, qtype, transaction_id, &mut dst)?;
    Ok(dst.freeze())
}

/// Append a query for `hostname` to `dst`.
///
/// Nothing is written when the hostname is rejected.
pub fn encode_request(
    hostname: &[u8],
    qtype: QueryType,
    transaction_id: u16,
    dst: &mut BytesMut,
) -> Result<()> {
    validate_hostname(hostname)?;

    // header + (length byte per label, dots replaced) + terminator + qtype + qclass
    dst.reserve(DNS_HEADER_LEN + hostname.len() + 2 + 4);

    encode_header(&DnsHeader::query(transaction_id), dst);
    encode_domain_name(hostname, dst);
    dst.put_u16(qtype.into());
    dst.put_u16(QCLASS_IN);

    debug!(
        id = transaction_id,
        qtype = ?qtype,
        "Encoded DNS query for {}",
        String::from_utf8_lossy(hostname)
    );
    Ok(())
}

fn validate_hostname(hostname: &[u8]) -> Result<()> {
    if hostname.len() > MAX_HOSTNAME_LEN {
        return Err(CodecError::InvalidHostname(format!(
            "hostname is {} bytes, exceeds maximum of {}",
            hostname.len(),
            MAX_HOSTNAME_LEN
        )));
    }

    for label in hostname.split(|&b| b == b'.') {
        if label.is_empty() {
            return Err(CodecError::InvalidHostname(format!(
                "empty label in '{}'",
                String::from_utf8_lossy(hostname)
            )));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(CodecError::InvalidHostname(format!(
                "Label '{}' exceeds maximum length of {} bytes",
                String::from_utf8_lossy(label),
                MAX_LABEL_LEN
            )));
        }
    }
    Ok(())
}

/// Encode an already validated name as length-prefixed labels followed by
/// the zero terminator.
fn encode_domain_name(hostname: &[u8], dst: &mut BytesMut) {
    for label in hostname.split(|&b| b == b'.') {
        dst.put_u8(label.len() as u8);
        dst.put_slice(label);
    }
    dst.put_u8(0);
}

/// Write the 12-byte header: id, packed flags, then the four counts.
pub fn encode_header(header: &DnsHeader, dst: &mut BytesMut) {
    dst.reserve(DNS_HEADER_LEN);
    for word in [
        header.id,
        header.flags(),
        header.qdcount,
        header.ancount,
        header.nscount,
        header.arcount,
    ] {
        dst.put_u16(word);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::protocol::FLAGS_RECURSION_DESIRED;
    use hickory_resolver::proto::op::{Message, MessageType};
    use hickory_resolver::proto::rr::RecordType;

    #[test]
    fn test_build_request_example_com() {
        let request = build_request(b"example.com", QueryType::A, 0x1234).unwrap();
        let expected: &[u8] = &[
            0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // header
            0x07, b'e', b'x', b'a', b'm', b'p', b'l', b'e', // "example"
            0x03, b'c', b'o', b'm', // "com"
            0x00, // terminator
            0x00, 0x01, // QTYPE A
            0x00, 0x01, // QCLASS IN
        ];
        assert_eq!(&request[..], expected);
    }

    #[test]
    fn test_build_request_length() {
        // 12 header + 5 tail + hostname + 1 for the leading length byte
        let hostname = b"www.rust-lang.org";
        let request = build_request(hostname, QueryType::AAAA, 1).unwrap();
        assert_eq!(request.len(), 12 + 5 + hostname.len() + 1);
        assert_eq!(&request[request.len() - 4..], &[0x00u8, 28, 0x00, 0x01]);
    }

    #[test]
    fn test_build_request_query_types() {
        for (qtype, wire) in [
            (QueryType::A, 1u16),
            (QueryType::NS, 2),
            (QueryType::CNAME, 5),
            (QueryType::AAAA, 28),
            (QueryType::ANY, 255),
        ] {
            let request = build_request(b"example.org", qtype, 0).unwrap();
            let tail = &request[request.len() - 4..request.len() - 2];
            assert_eq!(u16::from_be_bytes([tail[0], tail[1]]), wire);
            assert_eq!(QueryType::try_from(wire), Ok(qtype));
        }
    }

    #[test]
    fn test_build_request_rejects_bad_labels() {
        let long_label = [b'a'; 64];
        let mut hostname = long_label.to_vec();
        hostname.extend_from_slice(b".com");

        for bad in [&b""[..], b".", b"example..com", b".example.com", b"example.com.", hostname.as_slice()] {
            assert!(
                matches!(
                    build_request(bad, QueryType::A, 0),
                    Err(CodecError::InvalidHostname(_))
                ),
                "{:?} should be rejected",
                String::from_utf8_lossy(bad)
            );
        }
    }

    #[test]
    fn test_build_request_label_limits() {
        let ok = [b'a'; 63];
        assert!(build_request(&ok, QueryType::A, 0).is_ok());

        // 4 labels of 63 bytes plus 3 dots is exactly 255
        let label = String::from_utf8(vec![b'b'; 63]).unwrap();
        let max = [label.as_str(); 4].join(".");
        assert_eq!(max.len(), 255);
        assert!(build_request(max.as_bytes(), QueryType::A, 0).is_ok());

        let too_long = format!("{}.cc", max);
        assert!(matches!(
            build_request(too_long.as_bytes(), QueryType::A, 0),
            Err(CodecError::InvalidHostname(_))
        ));
    }

    #[test]
    fn test_encode_request_leaves_buffer_untouched_on_error() {
        let mut buf = BytesMut::from(&b"prefix"[..]);
        assert!(encode_request(b"bad..name", QueryType::A, 0, &mut buf).is_err());
        assert_eq!(&buf[..], b"prefix");

        encode_request(b"ok.name", QueryType::A, 0, &mut buf).unwrap();
        assert_eq!(&buf[..6], b"prefix");
        assert_eq!(buf.len(), 6 + 12 + 9 + 4);
    }

    #[test]
    fn test_encode_header_flags() {
        let mut buf = BytesMut::new();
        let mut header = DnsHeader::query(0x5678);
        encode_header(&header, &mut buf);
        assert_eq!(
            u16::from_be_bytes([buf[2], buf[3]]),
            FLAGS_RECURSION_DESIRED
        );

        buf.clear();
        header.qr = true;
        header.aa = true;
        header.ra = true;
        encode_header(&header, &mut buf);
        // Expected: 0x8580 (binary: 1000 0101 1000 0000)
        assert_eq!(buf[2], 0x85);
        assert_eq!(buf[3], 0x80);
        assert_eq!(buf.len(), 12);
    }

    #[test]
    fn test_encode_header_matches_parser() {
        let header = DnsHeader {
            id: 0xfeed,
            qr: true,
            opcode: 2,
            aa: false,
            tc: true,
            rd: false,
            ra: true,
            z: 5,
            rcode: 3,
            qdcount: 1,
            ancount: 2,
            nscount: 3,
            arcount: 4,
        };
        assert_eq!(header.flags(), 0b1001_0010_1101_0011);

        let mut buf = BytesMut::new();
        encode_header(&header, &mut buf);
        assert_eq!(&buf[..4], &[0xfeu8, 0xed, 0x92, 0xd3]);
        assert_eq!(&buf[4..], &[0u8, 1, 0, 2, 0, 3, 0, 4]);

        let (rest, parsed) = crate::dns::parsers::parse_dns_header(&buf).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_request_accepted_by_hickory() {
        let request = build_request(b"mail.example.net", QueryType::AAAA, 0xabcd).unwrap();
        let message = Message::from_vec(&request).unwrap();

        assert_eq!(message.id(), 0xabcd);
        assert_eq!(message.message_type(), MessageType::Query);
        assert!(message.recursion_desired());
        assert_eq!(message.queries().len(), 1);
        assert_eq!(message.answers().len(), 0);

        let query = &message.queries()[0];
        assert_eq!(query.name().to_ascii(), "mail.example.net.");
        assert_eq!(query.query_type(), RecordType::AAAA);
    }
}
