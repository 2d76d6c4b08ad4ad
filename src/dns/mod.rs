//! DNS query encoder and response decoder with name compression support.

pub mod parsers;
pub mod protocol;
pub mod request;

pub use parsers::{parse_response, DnsCursor};
pub use protocol::{DnsHeader, DnsResponse, QueryType, ResourceRecord};
pub use request::{build_request, encode_request};
