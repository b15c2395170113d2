use std::fmt;

use super::DecodeError;

/// Purpose of an envelope, carried in the first header byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EnvelopeKind {
    /// Application payload, possibly one fragment of a larger message.
    Data = 0x01,
    /// Pairing handshake step carrying the sender's address.
    Pair = 0x02,
    /// Announcement of the sender's chosen counterpart address.
    Connect = 0x03,
}

impl EnvelopeKind {
    /// Wire value of the kind.
    #[must_use]
    pub const fn as_u8(self) -> u8 { self as u8 }

    /// Lower-case label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Pair => "pair",
            Self::Connect => "connect",
        }
    }
}

impl TryFrom<u8> for EnvelopeKind {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Data),
            0x02 => Ok(Self::Pair),
            0x03 => Ok(Self::Connect),
            other => Err(DecodeError::UnknownKind(other)),
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}
