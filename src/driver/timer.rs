//! Cancellable periodic timer used by the driver loop.

use std::future;

use tokio::time::{self, Duration, Instant, Interval, MissedTickBehavior};

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Periodic tick source that can be attached and detached at runtime.
///
/// A detached timer never fires. Attaching starts a fresh schedule whose
/// first tick lands one full period later.
#[derive(Debug)]
pub struct PeriodicTimer {
    period: Duration,
    interval: Option<Interval>,
}

impl PeriodicTimer {
    /// Create a detached timer firing every `period`.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(MIN_PERIOD),
            interval: None,
        }
    }

    /// Tick period.
    #[must_use]
    pub const fn period(&self) -> Duration { self.period }

    /// Start ticking. Does nothing if already attached.
    pub fn attach(&mut self) {
        if self.interval.is_none() {
            let mut interval = time::interval_at(Instant::now() + self.period, self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.interval = Some(interval);
        }
    }

    /// Stop ticking.
    pub fn detach(&mut self) { self.interval = None; }

    /// Attach or detach to match `attached`.
    pub fn set_attached(&mut self, attached: bool) {
        if attached {
            self.attach();
        } else {
            self.detach();
        }
    }

    /// Whether the timer is attached.
    #[must_use]
    pub const fn is_attached(&self) -> bool { self.interval.is_some() }

    /// Wait for the next tick; pends forever while detached.
    pub async fn tick(&mut self) -> Instant {
        match self.interval.as_mut() {
            Some(interval) => interval.tick().await,
            None => future::pending().await,
        }
    }
}
