//! Typed payloads carried inside DATA messages.
//!
//! Payloads on the wire are plain byte strings. Applications that prefer
//! structured messages derive bincode's [`Encode`] and [`BorrowDecode`] and
//! get [`Message`] for free; [`Connection::send_typed`] and
//! [`ReceivedMessage::decode`] then handle the conversion.
//!
//! [`Connection::send_typed`]: crate::connection::Connection::send_typed
//! [`ReceivedMessage::decode`]: crate::connection::ReceivedMessage::decode

use bincode::{
    BorrowDecode,
    Encode,
    borrow_decode_from_slice,
    config,
    encode_to_vec,
    error::{DecodeError, EncodeError},
};

/// Structured payload encoded with bincode's standard configuration.
///
/// ```
/// use bincode::{Decode, Encode};
/// use pairwire::message::Message;
///
/// #[derive(Debug, PartialEq, Encode, Decode)]
/// struct Reading {
///     sensor: u8,
///     millivolts: u16,
/// }
///
/// let bytes = Reading { sensor: 2, millivolts: 3300 }.to_bytes().unwrap();
/// let (decoded, used) = Reading::from_bytes(&bytes).unwrap();
/// assert_eq!(decoded, Reading { sensor: 2, millivolts: 3300 });
/// assert_eq!(used, bytes.len());
/// ```
pub trait Message: Encode + for<'de> BorrowDecode<'de, ()> {
    /// Encode into a fresh payload buffer.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodeError`] if the value cannot be encoded.
    fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> { encode_to_vec(self, config::standard()) }

    /// Decode from the front of `bytes`, returning the value and the number
    /// of bytes it occupied.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if `bytes` does not start with a valid
    /// encoding.
    fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), DecodeError>
    where
        Self: Sized,
    {
        borrow_decode_from_slice(bytes, config::standard())
    }
}

impl<T> Message for T where for<'de> T: Encode + BorrowDecode<'de, ()> {}

#[cfg(test)]
mod tests {
    use bincode::Decode;

    use super::*;

    #[derive(Debug, PartialEq, Encode, Decode)]
    enum Command {
        Blink { times: u8 },
        Reboot,
    }

    #[test]
    fn short_input_is_rejected() {
        let bytes = Command::Blink { times: 3 }.to_bytes().expect("encode");
        assert!(Command::from_bytes(&bytes[..1]).is_err());
    }

    #[test]
    fn trailing_bytes_are_left_unread() {
        let mut bytes = Command::Reboot.to_bytes().expect("encode");
        let used = bytes.len();
        bytes.extend_from_slice(&[0xff, 0xff]);
        let (decoded, consumed) = Command::from_bytes(&bytes).expect("decode");
        assert_eq!(decoded, Command::Reboot);
        assert_eq!(consumed, used);
    }
}
