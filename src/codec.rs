//! Codecs for tokio_util
//!
//! `Decoder`/`Encoder` implementations so the DNS and SOCKS5 wire formats
//! can be used with tokio's framed streams and UDP handling.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, error};

use crate::dns::protocol::{DnsResponse, QueryType, DNS_HEADER_LEN};
use crate::dns::{encode_request, DnsCursor};
use crate::errors::CodecError;
use crate::socks5::{parse_destination, Socks5Parse, SocksHeader};

/// An outgoing DNS question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuery {
    pub hostname: Vec<u8>,
    pub qtype: QueryType,
    pub transaction_id: u16,
}

impl DnsQuery {
    pub fn new(hostname: impl Into<Vec<u8>>, qtype: QueryType, transaction_id: u16) -> Self {
        DnsQuery {
            hostname: hostname.into(),
            qtype,
            transaction_id,
        }
    }
}

/// DNS codec for UDP datagrams: encodes queries, decodes responses.
#[derive(Debug, Default)]
pub struct DnsCodec;

impl DnsCodec {
    /// Create a new DNS codec instance
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for DnsCodec {
    type Item = DnsResponse;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // DNS packets need at least 12 bytes for the header
        if src.len() < DNS_HEADER_LEN {
            debug!("Insufficient bytes for DNS header: {} < {}", src.len(), DNS_HEADER_LEN);
            return Ok(None);
        }

        // A datagram is one whole message; compression pointers may refer to
        // any earlier byte, so the whole buffer is handed to the cursor.
        let result = DnsCursor::new(&src[..]).parse_response();
        match result {
            Ok(response) => {
                debug!(
                    "Decoded DNS response {} with {} records",
                    response.header.id,
                    response.records.len()
                );
                src.clear();
                Ok(Some(response))
            }
            Err(e) => {
                error!("DNS parsing error: {}", e);
                src.clear();
                Err(e)
            }
        }
    }
}

impl Encoder<DnsQuery> for DnsCodec {
    type Error = CodecError;

    fn encode(&mut self, item: DnsQuery, dst: &mut BytesMut) -> Result<(), Self::Error> {
        debug!("DnsCodec::encode called for query ID {}", item.transaction_id);
        encode_request(&item.hostname, item.qtype, item.transaction_id, dst)
    }
}

/// Stream codec yielding the destination header at the front of a SOCKS5
/// request, leaving whatever follows it in the buffer.
#[derive(Debug, Default)]
pub struct Socks5DestinationCodec;

impl Socks5DestinationCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for Socks5DestinationCodec {
    type Item = SocksHeader;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match parse_destination(src)? {
            Socks5Parse::Complete {
                header,
                bytes_consumed,
            } => {
                src.advance(bytes_consumed);
                Ok(Some(header))
            }
            Socks5Parse::Incomplete { bytes_needed } => {
                debug!("Incomplete SOCKS5 header, need {} more bytes", bytes_needed);
                src.reserve(bytes_needed);
                Ok(None)
            }
        }
    }
}
