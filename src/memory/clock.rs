//! memory::clock
//!
//! Time source for commit dates and default messages.
//!
//! The implementation is picked once, when the facade is built:
//! [`clock_from_env`] returns a [`FixedClock`] when `SOURCE_DATE_EPOCH` holds
//! a valid Unix timestamp and a [`SystemClock`] otherwise. Nothing looks up
//! a time source at call time.

use chrono::{DateTime, TimeZone, Utc};
use tracing::warn;

/// Environment variable pinning all timestamps (reproducible builds convention).
pub const SOURCE_DATE_EPOCH: &str = "SOURCE_DATE_EPOCH";

/// A source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Clock fixed at `secs` after the Unix epoch, `None` if out of range.
    pub fn from_unix(secs: i64) -> Option<Self> {
        Utc.timestamp_opt(secs, 0).single().map(Self)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Choose the clock for this process.
pub fn clock_from_env() -> Box<dyn Clock> {
    clock_from_epoch(std::env::var(SOURCE_DATE_EPOCH).ok().as_deref())
}

fn clock_from_epoch(value: Option<&str>) -> Box<dyn Clock> {
    let Some(raw) = value else {
        return Box::new(SystemClock);
    };
    match raw.trim().parse::<i64>().ok().and_then(FixedClock::from_unix) {
        Some(clock) => Box::new(clock),
        None => {
            warn!(value = raw, "ignoring unparsable {}", SOURCE_DATE_EPOCH);
            Box::new(SystemClock)
        }
    }
}
