//! Blink state for the pairing indicator.

use std::time::Duration;

use crate::config::IndicatorConfig;

/// Period between indicator toggles while pairing.
pub const BLINK_INTERVAL: Duration = Duration::from_millis(500);

/// Tracks the level of the optional pairing indicator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndicatorBlink {
    config: Option<IndicatorConfig>,
    lit: bool,
}

impl IndicatorBlink {
    /// Track `config`, starting dark.
    #[must_use]
    pub const fn new(config: Option<IndicatorConfig>) -> Self { Self { config, lit: false } }

    /// Whether the indicator is currently lit.
    #[must_use]
    pub const fn is_lit(&self) -> bool { self.lit }

    /// Flip the indicator, returning the pin and level to write.
    pub fn toggle(&mut self) -> Option<(u8, bool)> {
        let config = self.config?;
        self.lit = !self.lit;
        let level = if self.lit { config.lit_level() } else { config.idle_level() };
        Some((config.pin, level))
    }

    /// Return the indicator to its idle level.
    pub fn reset(&mut self) -> Option<(u8, bool)> {
        let config = self.config?;
        self.lit = false;
        Some((config.pin, config.idle_level()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_between_levels_respecting_polarity() {
        let mut blink = IndicatorBlink::new(Some(IndicatorConfig {
            pin: 2,
            active_high: false,
        }));
        assert_eq!(blink.toggle(), Some((2, false)));
        assert_eq!(blink.toggle(), Some((2, true)));
        assert_eq!(blink.toggle(), Some((2, false)));
        assert_eq!(blink.reset(), Some((2, true)));
        assert!(!blink.is_lit());
    }

    #[test]
    fn absent_indicator_writes_nothing() {
        let mut blink = IndicatorBlink::new(None);
        assert_eq!(blink.toggle(), None);
        assert_eq!(blink.reset(), None);
    }
}
