/// Errors that can occur while encoding or decoding any of the wire formats
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Invalid parser state: cursor offset is {offset}, expected 0")]
    InvalidState { offset: usize },

    #[error("Unsupported SOCKS5 address type: {0:#04x}")]
    UnsupportedAddressType(u8),

    #[error("Truncated packet: need at least {needed} bytes, have {available}")]
    TruncatedPacket { needed: usize, available: usize },

    #[error("RC4 key is empty")]
    EmptyKey,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CodecError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        CodecError::MalformedMessage(msg.into())
    }
}

/// Collapse a nom failure on a DNS read into a `MalformedMessage`.
impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for CodecError {
    fn from(err: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        match err {
            nom::Err::Incomplete(_) => CodecError::malformed("unexpected end of message"),
            nom::Err::Error(e) | nom::Err::Failure(e) => CodecError::MalformedMessage(format!(
                "{:?} with {} bytes remaining",
                e.code,
                e.input.len()
            )),
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
