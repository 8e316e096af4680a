//! Time source for completion checks and log timestamps.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use time::{Duration, OffsetDateTime};

/// Supplies the current instant in UTC.
pub trait Clock {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Settable clock; clones share the same instant.
#[derive(Debug, Clone)]
pub struct FixedClock {
    at: Arc<Mutex<OffsetDateTime>>,
}

impl FixedClock {
    pub fn new(at: OffsetDateTime) -> Self {
        Self {
            at: Arc::new(Mutex::new(at)),
        }
    }

    pub fn set(&self, at: OffsetDateTime) {
        *self.instant() = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut at = self.instant();
        *at = at.saturating_add(by);
    }

    fn instant(&self) -> MutexGuard<'_, OffsetDateTime> {
        // A poisoned lock still holds a valid instant.
        self.at.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        *self.instant()
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, FixedClock};
    use time::macros::datetime;
    use time::Duration;

    #[test]
    fn clones_share_the_same_instant() {
        let clock = FixedClock::new(datetime!(2024-01-31 08:00 UTC));
        let observer = clock.clone();

        clock.advance(Duration::days(1));
        assert_eq!(observer.now(), datetime!(2024-02-01 08:00 UTC));

        clock.set(datetime!(2025-06-01 00:00 UTC));
        assert_eq!(observer.now(), datetime!(2025-06-01 00:00 UTC));
    }

    #[test]
    fn keeps_sub_second_precision() {
        let at = datetime!(2024-01-31 09:00:00.123456789 UTC);
        let clock = FixedClock::new(at);
        assert_eq!(clock.now(), at);

        clock.advance(Duration::milliseconds(1));
        assert_eq!(clock.now(), datetime!(2024-01-31 09:00:00.124456789 UTC));
    }
}
