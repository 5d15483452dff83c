//! Time source for the services.
//!
//! Production terminals read the system clock. Tests pin a manual clock so
//! day boundaries and session windows are deterministic.

use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    System,
    /// Whole seconds since the Unix epoch, shared between clones.
    Manual(Arc<AtomicI64>),
}

impl Clock {
    pub fn manual(start: DateTime<Utc>) -> Self {
        Clock::Manual(Arc::new(AtomicI64::new(start.timestamp())))
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Manual(secs) => DateTime::from_timestamp(secs.load(Ordering::SeqCst), 0).unwrap_or_else(Utc::now),
        }
    }

    /// No-op on the system clock.
    pub fn set(&self, at: DateTime<Utc>) {
        if let Clock::Manual(secs) = self {
            secs.store(at.timestamp(), Ordering::SeqCst);
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Clock::Manual(secs) = self {
            secs.fetch_add(by.num_seconds(), Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_is_shared() {
        let start = Utc.with_ymd_and_hms(2025, 11, 1, 5, 30, 0).unwrap();
        let clock = Clock::manual(start);
        let other = clock.clone();

        other.advance(Duration::minutes(45));
        assert_eq!(clock.now(), start + Duration::minutes(45));

        clock.set(start);
        assert_eq!(other.now(), start);
    }
}
