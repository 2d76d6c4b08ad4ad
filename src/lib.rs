//! Wire-format codecs for a lightweight proxy/resolver client: DNS queries
//! and responses, SOCKS5 destination headers, ICMP echo packets and RC4.
//!
//! Everything here transforms buffers already in memory; no sockets.

pub mod codec;
pub mod dns;
pub mod errors;
pub mod icmp;
pub mod rc4;
pub mod socks5;

pub use codec::{DnsCodec, DnsQuery, Socks5DestinationCodec};
pub use errors::{CodecError, Result};
