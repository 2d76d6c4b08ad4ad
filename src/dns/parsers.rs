use std::net::{Ipv4Addr, Ipv6Addr};

use nom::{
    bytes::complete::take,
    number::complete::{be_u16, be_u32, be_u8},
    IResult,
};
use tracing::debug;

use crate::dns::protocol::{
    DnsHeader, DnsResponse, ResourceRecord, DNS_HEADER_LEN, MAX_NAME_LEN, QTYPE_A, QTYPE_AAAA,
};
use crate::errors::{CodecError, Result};

type WireError<'a> = nom::error::Error<&'a [u8]>;

const POINTER_MASK: u8 = 0b1100_0000;
const POINTER_OFFSET_MASK: u16 = 0x3FFF;

// Smallest possible record: 2-byte pointer name + type, class, ttl, rdlength
const MIN_RECORD_LEN: usize = 12;

pub fn parse_dns_header(input: &[u8]) -> IResult<&[u8], DnsHeader> {
    let (input, id) = be_u16(input)?;
    // take 1 bit for qr, 4 bits for opcode, 1 bit for aa,
    // 1 bit for tc, 1 bit for rd, 1 bit for ra, 3 bits for z,
    // and 4 bits for rcode
    let (input, flags) = be_u16(input)?;
    let (input, qdcount) = be_u16(input)?;
    let (input, ancount) = be_u16(input)?;
    let (input, nscount) = be_u16(input)?;
    let (input, arcount) = be_u16(input)?;

    let header = DnsHeader {
        id,
        qr: (flags & 0x8000) != 0,
        opcode: ((flags & 0x7800) >> 11) as u8,
        aa: (flags & 0x0400) != 0,
        tc: (flags & 0x0200) != 0,
        rd: (flags & 0x0100) != 0,
        ra: (flags & 0x0080) != 0,
        z: ((flags & 0x0070) >> 4) as u8,
        rcode: (flags & 0x000F) as u8,
        qdcount,
        ancount,
        nscount,
        arcount,
    };

    Ok((input, header))
}

/// A length-prefixed label: the length byte followed by that many bytes.
fn parse_label(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, length) = be_u8(input)?;
    take(length as usize)(input)
}

/// Fixed part of a resource record that follows its owner name:
/// type, class, ttl and rdata length.
fn parse_record_fields(input: &[u8]) -> IResult<&[u8], (u16, u16, u32, u16)> {
    let (input, qtype) = be_u16(input)?;
    let (input, qcls) = be_u16(input)?;
    let (input, ttl) = be_u32(input)?;
    let (input, rdata_length) = be_u16(input)?;
    Ok((input, (qtype, qcls, ttl, rdata_length)))
}

/// Read position over a complete DNS response.
///
/// `offset` always points at the next unconsumed byte of the linear part
/// of the message. Following a compression pointer while decoding a name
/// never moves it; only the bytes the name occupies on the wire do.
#[derive(Debug, Clone)]
pub struct DnsCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> DnsCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        DnsCursor { data, offset: 0 }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> &'a [u8] {
        self.data.get(self.offset..).unwrap_or_default()
    }

    /// Skip `nbytes` of the message.
    pub fn forward(&mut self, nbytes: usize) -> Result<()> {
        match self.offset.checked_add(nbytes) {
            Some(end) if end <= self.data.len() => {
                self.offset = end;
                Ok(())
            }
            _ => Err(CodecError::malformed(format!(
                "cannot skip {} bytes at offset {} of a {} byte message",
                nbytes,
                self.offset,
                self.data.len()
            ))),
        }
    }

    /// Run a nom parser at the cursor and advance past what it consumed.
    fn run<T, F>(&mut self, parser: F) -> Result<T>
    where
        F: FnOnce(&'a [u8]) -> IResult<&'a [u8], T>,
    {
        let input = self.remaining();
        let (rest, value) = parser(input)?;
        self.offset += input.len() - rest.len();
        Ok(value)
    }

    /// Decode the domain name starting at the cursor, following compression
    /// pointers. Labels are joined with `.` and no trailing dot is added.
    ///
    /// Every pointer has to land strictly before the segment it was found
    /// in, so the targets form a strictly decreasing sequence and the walk
    /// terminates on any input.
    pub fn parse_domain(&mut self) -> Result<Vec<u8>> {
        let data = self.data;
        let mut pos = self.offset;
        let mut segment_start = self.offset;
        let mut jumped = false;
        let mut consumed = 0usize;
        let mut name: Vec<u8> = Vec::new();

        loop {
            let input = data.get(pos..).unwrap_or_default();
            let (_, length) = be_u8::<_, WireError>(input)?;

            if length == 0 {
                if !jumped {
                    consumed += 1;
                }
                break;
            }

            if length & POINTER_MASK == POINTER_MASK {
                let (_, raw) = be_u16::<_, WireError>(input)?;
                let target = (raw & POINTER_OFFSET_MASK) as usize;
                if target >= segment_start {
                    return Err(CodecError::malformed(format!(
                        "compression pointer at offset {} targets {}, not before {}",
                        pos, target, segment_start
                    )));
                }
                if !jumped {
                    consumed += 2;
                    jumped = true;
                }
                segment_start = target;
                pos = target;
                continue;
            }

            let (_, label) = parse_label(input)?;
            if !name.is_empty() {
                name.push(b'.');
            }
            name.extend_from_slice(label);
            if name.len() > MAX_NAME_LEN {
                return Err(CodecError::malformed(format!(
                    "domain name at offset {} exceeds {} bytes",
                    self.offset, MAX_NAME_LEN
                )));
            }

            if !jumped {
                consumed += label.len() + 1;
            }
            pos += label.len() + 1;
        }

        if name.len() <= 1 {
            return Err(CodecError::malformed(format!(
                "empty domain name at offset {}",
                self.offset
            )));
        }

        self.offset += consumed;
        Ok(name)
    }

    /// Decode a whole response. The cursor must not have been used yet.
    pub fn parse_response(&mut self) -> Result<DnsResponse> {
        if self.offset != 0 {
            return Err(CodecError::InvalidState {
                offset: self.offset,
            });
        }

        let header = self.run(parse_dns_header)?;
        let query_domain = self.parse_domain()?;
        let query_type = self.run(be_u16)?;
        // question class
        self.forward(2)?;

        debug!(
            id = header.id,
            answer_count = header.ancount,
            authority_count = header.nscount,
            additional_count = header.arcount,
            "Parsing DNS response for {}",
            String::from_utf8_lossy(&query_domain)
        );

        // counts come off the wire; never reserve more than the message can hold
        let total = header.record_count();
        let mut records = Vec::with_capacity(total.min(self.remaining().len() / MIN_RECORD_LEN));
        for _ in 0..total {
            records.push(self.parse_record()?);
        }

        Ok(DnsResponse {
            header,
            query_domain,
            query_type,
            records,
        })
    }

    fn parse_record(&mut self) -> Result<ResourceRecord> {
        let domain_name = self.parse_domain()?;
        let (qtype, qcls, ttl, rdata_length) = self.run(parse_record_fields)?;

        let value = match qtype {
            QTYPE_A => {
                let rdata = self.run(|i| take(rdata_length as usize)(i))?;
                let octets = <[u8; 4]>::try_from(rdata).map_err(|_| {
                    CodecError::malformed(format!("A record with {} byte rdata", rdata_length))
                })?;
                Ipv4Addr::from(octets).to_string().into_bytes()
            }
            QTYPE_AAAA => {
                let rdata = self.run(|i| take(rdata_length as usize)(i))?;
                let octets = <[u8; 16]>::try_from(rdata).map_err(|_| {
                    CodecError::malformed(format!("AAAA record with {} byte rdata", rdata_length))
                })?;
                Ipv6Addr::from(octets).to_string().into_bytes()
            }
            // NS, CNAME and friends carry a name; rdata_length is not a bound
            _ => self.parse_domain()?,
        };

        Ok(ResourceRecord::new(domain_name, value, qtype, qcls, ttl))
    }
}

/// Decode a complete response buffer.
pub fn parse_response(message: &[u8]) -> Result<DnsResponse> {
    if message.len() < DNS_HEADER_LEN {
        return Err(CodecError::malformed(format!(
            "message is {} bytes, header alone needs {}",
            message.len(),
            DNS_HEADER_LEN
        )));
    }
    DnsCursor::new(message).parse_response()
}
