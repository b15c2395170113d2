//! Network byte-order conversions for envelope header fields.
//!
//! The envelope header stores its message identifier as a big-endian `u32`.
//! Keeping the conversions here scopes the Clippy expectation to one place.

/// Serialise a `u32` in network byte order (big-endian).
///
/// # Examples
///
/// ```
/// use pairwire::byte_order::write_network_u32;
///
/// assert_eq!(write_network_u32(0x1234_5678), [0x12, 0x34, 0x56, 0x78]);
/// ```
#[must_use]
pub fn write_network_u32(value: u32) -> [u8; 4] {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    value.to_be_bytes()
}

/// Parse a network-order `u32` from its on-wire representation.
///
/// # Examples
///
/// ```
/// use pairwire::byte_order::read_network_u32;
///
/// assert_eq!(read_network_u32([0x12, 0x34, 0x56, 0x78]), 0x1234_5678);
/// ```
#[must_use]
pub fn read_network_u32(bytes: [u8; 4]) -> u32 {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    u32::from_be_bytes(bytes)
}

/// Read a network-order `u32` starting at `offset`, or `None` when `bytes`
/// is too short.
#[must_use]
pub fn read_network_u32_at(bytes: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let field: [u8; 4] = bytes.get(offset..end)?.try_into().ok()?;
    Some(read_network_u32(field))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{read_network_u32, read_network_u32_at, write_network_u32};

    #[rstest]
    #[case(0, [0, 0, 0, 0])]
    #[case(0x1234_5678, [0x12, 0x34, 0x56, 0x78])]
    #[case(u32::MAX, [0xff, 0xff, 0xff, 0xff])]
    fn network_u32_round_trip(#[case] value: u32, #[case] bytes: [u8; 4]) {
        assert_eq!(write_network_u32(value), bytes);
        assert_eq!(read_network_u32(bytes), value);
    }

    #[test]
    fn reads_at_offset_and_rejects_short_input() {
        let bytes = [9_u8, 0xde, 0xad, 0xbe, 0xef];
        assert_eq!(read_network_u32_at(&bytes, 1), Some(0xdead_beef));
        assert_eq!(read_network_u32_at(&bytes, 2), None);
        assert_eq!(read_network_u32_at(&bytes, usize::MAX), None);
    }
}
