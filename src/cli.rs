use clap::{Parser, Subcommand};
use wirecodec::dns::QueryType;

#[derive(Parser, Debug)]
#[command(name = "wirecodec")]
#[command(about = "Encode and decode DNS, SOCKS5, ICMP echo and RC4 payloads", long_about = None)]
pub struct Args {
    /// Log decoding steps (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a DNS query and print it as hex
    DnsQuery {
        hostname: String,
        /// One of A, NS, CNAME, AAAA, ANY
        #[arg(short, long, default_value = "A")]
        qtype: QueryType,
        /// Transaction id, decimal or 0x-prefixed hex
        #[arg(short, long, default_value = "0", value_parser = parse_u16)]
        id: u16,
    },
    /// Decode a hex-encoded DNS response
    DnsResponse {
        message: HexBytes,
    },
    /// Decode a hex-encoded SOCKS5 destination header
    Socks5 {
        buffer: HexBytes,
    },
    /// Build an ICMP echo request carrying <payload> and print it as hex
    Ping {
        payload: String,
        #[arg(long, default_value = "0", value_parser = parse_u16)]
        id: u16,
        #[arg(long, default_value = "0", value_parser = parse_u16)]
        seq: u16,
    },
    /// Decode a hex-encoded IPv4 datagram carrying ICMP
    PingParse {
        packet: HexBytes,
    },
    /// RC4-transform hex input and print the result as hex
    Rc4 {
        data: HexBytes,
        #[arg(short, long)]
        key: String,
    },
}

/// Raw bytes given on the command line as hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl std::str::FromStr for HexBytes {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex(s).map(HexBytes)
    }
}

fn parse_u16(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(digits) => u16::from_str_radix(digits, 16),
        None => s.parse::<u16>(),
    };
    parsed.map_err(|_| format!("Invalid id: '{}'. Expected a value from 0 to 65535", s))
}

/// Accepts hex digits with optional whitespace or `:` between bytes.
fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    let digits: String = s
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && *c != ':')
        .collect();
    hex::decode(&digits).map_err(|e| format!("Invalid hex input '{}': {}", s, e))
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
