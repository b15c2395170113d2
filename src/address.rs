//! Fixed-length hardware addresses identifying peers on the link.
//!
//! [`PeerAddress`] is a six-byte value type. It prints as twelve upper-case
//! hexadecimal characters and parses only from exactly twelve hexadecimal
//! characters, so addresses can be exchanged as short human-readable strings.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Number of bytes in a link-layer address.
pub const ADDRESS_LEN: usize = 6;

/// Number of characters in the textual form of an address.
pub const ADDRESS_HEX_LEN: usize = ADDRESS_LEN * 2;

/// Six-byte link-layer identifier of a peer.
///
/// Ordering exists only so addresses can key sorted lookups; it carries no
/// meaning.
///
/// # Examples
///
/// ```
/// use pairwire::PeerAddress;
///
/// let address: PeerAddress = "A0B1C2D3E4F5".parse().expect("valid address");
/// assert_eq!(address.octets(), [0xA0, 0xB1, 0xC2, 0xD3, 0xE4, 0xF5]);
/// assert_eq!(address.to_string(), "A0B1C2D3E4F5");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerAddress([u8; ADDRESS_LEN]);

impl PeerAddress {
    /// Address a client assumes while listening for a pairing broadcast.
    pub const DEFAULT_RENDEZVOUS: Self = Self([0xCE, 0x50, 0xE3, 0x15, 0xB7, 0x34]);

    /// Construct an address from raw octets.
    #[must_use]
    pub const fn new(octets: [u8; ADDRESS_LEN]) -> Self { Self(octets) }

    /// Return the raw octets.
    #[must_use]
    pub const fn octets(self) -> [u8; ADDRESS_LEN] { self.0 }

    /// Borrow the raw octets as a slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] { &self.0 }
}

impl From<[u8; ADDRESS_LEN]> for PeerAddress {
    fn from(octets: [u8; ADDRESS_LEN]) -> Self { Self(octets) }
}

impl From<PeerAddress> for [u8; ADDRESS_LEN] {
    fn from(address: PeerAddress) -> Self { address.0 }
}

impl TryFrom<&[u8]> for PeerAddress {
    type Error = AddressParseError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let octets: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| AddressParseError::ByteLength(bytes.len()))?;
        Ok(Self(octets))
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for octet in self.0 {
            write!(f, "{octet:02X}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerAddress({self})")
    }
}

impl FromStr for PeerAddress {
    type Err = AddressParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if text.len() != ADDRESS_HEX_LEN {
            return Err(AddressParseError::TextLength(text.len()));
        }
        if let Some(position) = text.bytes().position(|b| !b.is_ascii_hexdigit()) {
            return Err(AddressParseError::NotHex { position });
        }

        let mut octets = [0_u8; ADDRESS_LEN];
        for (octet, pair) in octets.iter_mut().zip(text.as_bytes().chunks_exact(2)) {
            *octet = (hex_value(pair[0]) << 4) | hex_value(pair[1]);
        }
        Ok(Self(octets))
    }
}

// Callers validate the digit first.
fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        b'A'..=b'F' => digit - b'A' + 10,
        _ => 0,
    }
}

/// Errors produced when converting text or bytes into a [`PeerAddress`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum AddressParseError {
    /// The text form was not exactly twelve characters long.
    #[error("address text must be {ADDRESS_HEX_LEN} characters, found {0}")]
    TextLength(usize),
    /// The text contained a non-hexadecimal character.
    #[error("address text has a non-hex character at position {position}")]
    NotHex { position: usize },
    /// The byte form was not exactly six bytes long.
    #[error("address must be {ADDRESS_LEN} bytes, found {0}")]
    ByteLength(usize),
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn formats_as_upper_case_hex() {
        let address = PeerAddress::new([0x0a, 0x1b, 0x2c, 0x3d, 0x4e, 0x5f]);
        assert_eq!(address.to_string(), "0A1B2C3D4E5F");
    }

    #[test]
    fn parses_mixed_case() {
        let address: PeerAddress = "ce50e315B734".parse().expect("valid address");
        assert_eq!(address, PeerAddress::DEFAULT_RENDEZVOUS);
    }

    #[rstest]
    #[case("", AddressParseError::TextLength(0))]
    #[case("CE50E315B7", AddressParseError::TextLength(10))]
    #[case("CE50E315B73412", AddressParseError::TextLength(14))]
    #[case("CE50E315B7G4", AddressParseError::NotHex { position: 10 })]
    #[case("CE:0E315B734", AddressParseError::NotHex { position: 2 })]
    fn rejects_malformed_text(#[case] text: &str, #[case] expected: AddressParseError) {
        assert_eq!(text.parse::<PeerAddress>(), Err(expected));
    }

    #[test]
    fn rejects_multibyte_text_of_matching_length() {
        // 12 bytes, but not 12 hex characters.
        let err = "ÄÄÄÄÄÄ".parse::<PeerAddress>().expect_err("must reject");
        assert_eq!(err, AddressParseError::NotHex { position: 0 });
    }

    #[test]
    fn converts_from_byte_slices() {
        let bytes = [1_u8, 2, 3, 4, 5, 6];
        let address = PeerAddress::try_from(&bytes[..]).expect("six bytes");
        assert_eq!(address.as_bytes(), &bytes);
        assert_eq!(
            PeerAddress::try_from(&bytes[..5]),
            Err(AddressParseError::ByteLength(5))
        );
    }

    #[test]
    fn display_and_parse_are_inverse() {
        let address = PeerAddress::new([0xff, 0, 0x10, 0x9a, 0xbc, 0x01]);
        let parsed: PeerAddress = address.to_string().parse().expect("round trip");
        assert_eq!(parsed, address);
    }
}
