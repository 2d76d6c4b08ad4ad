// DNS message structures shared by the request encoder and the response parser

use std::fmt;

// DNS Record Type Constants
pub const QTYPE_A: u16 = 1; // IPv4 address
pub const QTYPE_NS: u16 = 2; // Name server
pub const QTYPE_CNAME: u16 = 5; // Canonical name
pub const QTYPE_AAAA: u16 = 28; // IPv6 address
pub const QTYPE_ANY: u16 = 255; // All records

// DNS Class Constants
pub const QCLASS_IN: u16 = 1; // Internet

pub const DNS_HEADER_LEN: usize = 12;
pub const MAX_LABEL_LEN: usize = 63;
pub const MAX_HOSTNAME_LEN: usize = 255;

/// Upper bound on the text form of a decoded name.
pub const MAX_NAME_LEN: usize = 255;

/// Flags word of an outgoing query: only RD (recursion desired) is set.
pub const FLAGS_RECURSION_DESIRED: u16 = 0x0100;

/// The query types a request can be built for.
/// https://www.rfc-editor.org/rfc/rfc1035#section-3.2.2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    A,
    NS,
    CNAME,
    AAAA,
    ANY,
}

impl From<QueryType> for u16 {
    fn from(qtype: QueryType) -> u16 {
        match qtype {
            QueryType::A => QTYPE_A,
            QueryType::NS => QTYPE_NS,
            QueryType::CNAME => QTYPE_CNAME,
            QueryType::AAAA => QTYPE_AAAA,
            QueryType::ANY => QTYPE_ANY,
        }
    }
}

impl TryFrom<u16> for QueryType {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            QTYPE_A => Ok(QueryType::A),
            QTYPE_NS => Ok(QueryType::NS),
            QTYPE_CNAME => Ok(QueryType::CNAME),
            QTYPE_AAAA => Ok(QueryType::AAAA),
            QTYPE_ANY => Ok(QueryType::ANY),
            other => Err(other),
        }
    }
}

impl std::str::FromStr for QueryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(QueryType::A),
            "NS" => Ok(QueryType::NS),
            "CNAME" => Ok(QueryType::CNAME),
            "AAAA" => Ok(QueryType::AAAA),
            "ANY" => Ok(QueryType::ANY),
            _ => Err(format!(
                "Unknown query type '{}'. Expected one of A, NS, CNAME, AAAA, ANY",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsHeader {
    pub id: u16,      // Identifier, 16 bits
    pub qr: bool,     // Query or Response, 1 bit
    pub opcode: u8,   // Operation code, 4 bits
    pub aa: bool,     // Authoritative answer, 1 bit
    pub tc: bool,     // Truncated, 1 bit
    pub rd: bool,     // Recursion desired, 1 bit
    pub ra: bool,     // Recursion available, 1 bit
    pub z: u8,        // Reserved for future use, 3 bits
    pub rcode: u8,    // Response code, 4 bits
    pub qdcount: u16, // Number of questions, 16 bits
    pub ancount: u16, // Number of answers, 16 bits
    pub nscount: u16, // Number of authority records, 16 bits
    pub arcount: u16, // Number of additional records, 16 bits
}

impl DnsHeader {
    /// Header of a single-question recursive query.
    pub fn query(id: u16) -> Self {
        DnsHeader {
            id,
            qr: false,
            opcode: 0,
            aa: false,
            tc: false,
            rd: true,
            ra: false,
            z: 0,
            rcode: 0,
            qdcount: 1,
            ancount: 0,
            nscount: 0,
            arcount: 0,
        }
    }

    /// The second header word: QR, OPCODE, AA, TC, RD, RA, Z and RCODE
    /// packed from the high bit down.
    pub fn flags(&self) -> u16 {
        let bit = |set: bool, mask: u16| if set { mask } else { 0 };
        bit(self.qr, 0x8000)
            | (u16::from(self.opcode) & 0x0F) << 11
            | bit(self.aa, 0x0400)
            | bit(self.tc, 0x0200)
            | bit(self.rd, FLAGS_RECURSION_DESIRED)
            | bit(self.ra, 0x0080)
            | (u16::from(self.z) & 0x07) << 4
            | u16::from(self.rcode) & 0x0F
    }

    /// Total number of resource records announced by the header.
    pub fn record_count(&self) -> usize {
        self.ancount as usize + self.nscount as usize + self.arcount as usize
    }
}

/// One answer, authority or additional entry of a response.
///
/// `value` holds the printable address for A/AAAA records and the decoded
/// domain name for everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    domain_name: Vec<u8>,
    value: Vec<u8>,
    qtype: u16,
    qcls: u16,
    ttl: u32,
}

impl ResourceRecord {
    pub(crate) fn new(domain_name: Vec<u8>, value: Vec<u8>, qtype: u16, qcls: u16, ttl: u32) -> Self {
        ResourceRecord {
            domain_name,
            value,
            qtype,
            qcls,
            ttl,
        }
    }

    pub fn domain_name(&self) -> &[u8] {
        &self.domain_name
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn qtype(&self) -> u16 {
        self.qtype
    }

    pub fn qcls(&self) -> u16 {
        self.qcls
    }

    /// Time to live in seconds
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn is_address(&self) -> bool {
        self.qtype == QTYPE_A || self.qtype == QTYPE_AAAA
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            String::from_utf8_lossy(&self.domain_name),
            self.ttl,
            self.qcls,
            self.qtype,
            String::from_utf8_lossy(&self.value)
        )
    }
}

/// A decoded response: the echoed question plus every record in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsResponse {
    pub header: DnsHeader,
    pub query_domain: Vec<u8>,
    pub query_type: u16,
    // answers, then authorities, then additionals
    pub records: Vec<ResourceRecord>,
}

impl DnsResponse {
    /// Addresses carried by A/AAAA records, in wire order.
    pub fn addresses(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.records.iter().filter(|rr| rr.is_address())
    }
}
