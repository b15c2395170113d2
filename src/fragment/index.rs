//! One-based fragment positioning within logical messages.
//!
//! Provides [`FragmentIndex`], a type-safe wrapper around the single header
//! byte that records a fragment's position.

use derive_more::{Display, From};

/// One-based ordinal describing a fragment's position within its message.
///
/// A message of `n` fragments carries indices `1..=n`; zero never appears on
/// the wire.
///
/// # Examples
///
/// ```
/// use pairwire::FragmentIndex;
/// let index = FragmentIndex::new(3);
/// assert_eq!(index.get(), 3);
/// assert!(index.is_within(3));
/// assert!(!index.is_within(2));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From)]
#[display("{_0}")]
pub struct FragmentIndex(u8);

impl FragmentIndex {
    /// Construct an index from its wire value.
    #[must_use]
    pub const fn new(value: u8) -> Self { Self(value) }

    /// Return the first valid fragment index.
    #[must_use]
    pub const fn first() -> Self { Self(1) }

    /// Return the underlying wire value.
    #[must_use]
    pub const fn get(self) -> u8 { self.0 }

    /// Whether the index lies in `1..=fragment_count`.
    #[must_use]
    pub const fn is_within(self, fragment_count: u8) -> bool {
        self.0 >= 1 && self.0 <= fragment_count
    }

    /// Zero-based offset of this fragment, for slicing payloads.
    #[must_use]
    pub const fn offset(self) -> usize { self.0.saturating_sub(1) as usize }

    /// Increment the index, returning `None` on overflow.
    #[must_use]
    pub fn checked_increment(self) -> Option<Self> { self.0.checked_add(1).map(Self) }
}

impl From<FragmentIndex> for u8 {
    fn from(value: FragmentIndex) -> Self { value.0 }
}
