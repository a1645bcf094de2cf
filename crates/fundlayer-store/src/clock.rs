//! Time source used for cache expiry and circuit cooldowns.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::{OffsetDateTime, PrimitiveDateTime};

/// Supplies the current UTC time.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Manually driven clock for deterministic tests.
///
/// Clones share the same instant, so a clock handed to a store can be
/// advanced from the test body.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<OffsetDateTime>>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Starts at 2024-01-01T00:00:00Z.
    pub fn at_epoch_2024() -> Self {
        Self::new(
            OffsetDateTime::from_unix_timestamp(1_704_067_200)
                .expect("2024-01-01 is a valid unix timestamp"),
        )
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("manual clock mutex poisoned");
        *now += by;
    }

    pub fn set(&self, instant: OffsetDateTime) {
        *self.now.lock().expect("manual clock mutex poisoned") = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().expect("manual clock mutex poisoned")
    }
}

/// Milliseconds since the unix epoch, the on-disk timestamp unit.
pub fn unix_millis(instant: OffsetDateTime) -> i64 {
    let millis = instant.unix_timestamp_nanos() / 1_000_000;
    i64::try_from(millis).unwrap_or(i64::MAX)
}

/// Latest instant, in unix milliseconds, that reads back as a timestamp.
pub fn max_unix_millis() -> i64 {
    unix_millis(PrimitiveDateTime::MAX.assume_utc())
}

pub(crate) fn from_unix_millis(millis: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}
