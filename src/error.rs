//! Crate-wide error and result types.
//!
//! Each component reports failures through its own enum. [`Error`] gathers
//! them for applications that prefer a single error type at their boundary.

use thiserror::Error;

use crate::{
    address::AddressParseError,
    config::ConfigError,
    connection::{SendError, ValidationError},
    driver::DriverError,
    envelope::{DecodeError, EncodeError},
    fragment::{OutboundError, ReassemblyError},
    pairing::PairingError,
    transport::TransportError,
};

/// Top-level error type exposed by `pairwire`.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// An address string was malformed.
    #[error("invalid address: {0}")]
    Address(#[from] AddressParseError),
    /// A send precondition failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A message could not be queued.
    #[error("send failed: {0}")]
    Send(#[from] SendError),
    /// A pairing request failed.
    #[error("pairing failed: {0}")]
    Pairing(#[from] PairingError),
    /// The link layer refused an operation.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// An inbound frame was malformed.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    /// An envelope could not be written.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    /// A fragment could not be reassembled.
    #[error("reassembly error: {0}")]
    Reassembly(#[from] ReassemblyError),
    /// The outbound pool rejected a message.
    #[error("outbound error: {0}")]
    Outbound(#[from] OutboundError),
    /// The link driver rejected a request.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
}

/// Result alias used across `pairwire` public APIs.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Role;

    #[test]
    fn component_errors_convert_with_question_mark() {
        fn parse(text: &str) -> Result<crate::address::PeerAddress> { Ok(text.parse()?) }

        let err = parse("not-an-address").expect_err("malformed");
        assert!(matches!(err, Error::Address(_)));
        assert!(err.to_string().starts_with("invalid address"));
    }

    #[test]
    fn validation_errors_display_transparently() {
        let err = Error::from(ValidationError::WrongRole { role: Role::Server });
        assert_eq!(err.to_string(), "operation not available to a server");
    }
}
