//! Pairing timeout normalisation.
//!
//! Retries fire on a fixed [`PAIRING_RETRY_INTERVAL`], so timeouts shorter
//! than one interval would never produce an attempt. Requested timeouts are
//! widened per role and converted into a retry budget.

use std::time::Duration;

use crate::config::{DEFAULT_CLIENT_PAIRING_TIMEOUT_SECS, Role};

/// Cadence of pairing retries.
pub const PAIRING_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Shortest server timeout that still allows one broadcast.
pub const SERVER_MIN_TIMEOUT_SECS: u32 = 5;

/// Shortest client listening window.
pub const CLIENT_MIN_TIMEOUT_SECS: u32 = 10;

/// Longest client listening window.
pub const CLIENT_MAX_TIMEOUT_SECS: u32 = 120;

const RETRY_INTERVAL_SECS: u32 = 5;

/// Widen `requested` to a timeout the retry cadence can honour.
///
/// Servers keep zero, meaning retry indefinitely, and raise anything
/// shorter than one interval. Clients default zero to
/// [`DEFAULT_CLIENT_PAIRING_TIMEOUT_SECS`] and clamp to
/// [`CLIENT_MIN_TIMEOUT_SECS`]`..=`[`CLIENT_MAX_TIMEOUT_SECS`].
///
/// # Examples
///
/// ```
/// use pairwire::{Role, pairing::normalize_timeout};
///
/// assert_eq!(normalize_timeout(Role::Server, 3), 5);
/// assert_eq!(normalize_timeout(Role::Server, 0), 0);
/// assert_eq!(normalize_timeout(Role::Client, 0), 30);
/// assert_eq!(normalize_timeout(Role::Client, 500), 120);
/// ```
#[must_use]
pub fn normalize_timeout(role: Role, requested: u32) -> u32 {
    match role {
        Role::Server if requested == 0 => 0,
        Role::Server => requested.max(SERVER_MIN_TIMEOUT_SECS),
        Role::Client if requested == 0 => DEFAULT_CLIENT_PAIRING_TIMEOUT_SECS,
        Role::Client => requested.clamp(CLIENT_MIN_TIMEOUT_SECS, CLIENT_MAX_TIMEOUT_SECS),
    }
}

/// Number of retry ticks a normalised timeout allows; `None` is unbounded.
#[must_use]
pub fn retry_budget(timeout_secs: u32) -> Option<u32> {
    (timeout_secs > 0).then(|| (timeout_secs / RETRY_INTERVAL_SECS).max(1))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Role::Server, 0, 0)]
    #[case(Role::Server, 1, 5)]
    #[case(Role::Server, 4, 5)]
    #[case(Role::Server, 5, 5)]
    #[case(Role::Server, 600, 600)]
    #[case(Role::Client, 0, 30)]
    #[case(Role::Client, 1, 10)]
    #[case(Role::Client, 10, 10)]
    #[case(Role::Client, 45, 45)]
    #[case(Role::Client, 121, 120)]
    fn normalises_per_role(#[case] role: Role, #[case] requested: u32, #[case] expected: u32) {
        assert_eq!(normalize_timeout(role, requested), expected);
    }

    #[rstest]
    #[case(0, None)]
    #[case(5, Some(1))]
    #[case(10, Some(2))]
    #[case(12, Some(2))]
    #[case(120, Some(24))]
    fn budgets_one_retry_per_interval(#[case] timeout: u32, #[case] expected: Option<u32>) {
        assert_eq!(retry_budget(timeout), expected);
    }
}
