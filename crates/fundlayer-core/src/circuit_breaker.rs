use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::UtcDateTime;

/// Logical circuit state of one source at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Eligible; fewer than `failure_threshold` consecutive failures.
    Closed,
    /// Not eligible until the cooldown elapses.
    Open,
    /// Cooldown elapsed; the next attempt decides. One failure re-opens.
    HalfOpen,
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct CircuitInner {
    fail_count: u32,
    last_failure_at: Option<OffsetDateTime>,
    open_until: Option<OffsetDateTime>,
}

/// Point-in-time copy of a tracker's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub fail_count: u32,
    pub last_failure_at: Option<UtcDateTime>,
    pub open_until: Option<UtcDateTime>,
}

/// Per-source failure counter and cooldown clock.
///
/// All transitions happen under one lock so concurrent attempts against the
/// same source cannot lose an increment or a reset.
#[derive(Debug)]
pub struct CircuitTracker {
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
}

impl Default for CircuitTracker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitTracker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CircuitInner::default()),
        }
    }

    pub fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    /// Whether the source may be attempted at `now`.
    pub fn is_eligible(&self, now: OffsetDateTime) -> bool {
        let inner = self.lock();
        inner.open_until.map_or(true, |until| now >= until)
    }

    pub fn state(&self, now: OffsetDateTime) -> CircuitState {
        let inner = self.lock();
        match inner.open_until {
            None => CircuitState::Closed,
            Some(until) if now < until => CircuitState::Open,
            Some(_) => CircuitState::HalfOpen,
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.fail_count = 0;
        inner.open_until = None;
    }

    /// Count one failure at `now`. Returns `true` when this failure opened
    /// (or re-opened) the circuit.
    pub fn record_failure(&self, now: OffsetDateTime) -> bool {
        let mut inner = self.lock();
        inner.fail_count = inner.fail_count.saturating_add(1);
        inner.last_failure_at = Some(now);

        if inner.fail_count >= self.config.failure_threshold {
            inner.open_until = Some(reopen_at(now, self.config.cooldown));
            true
        } else {
            false
        }
    }

    pub fn fail_count(&self) -> u32 {
        self.lock().fail_count
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = *self.lock();
        CircuitSnapshot {
            fail_count: inner.fail_count,
            last_failure_at: inner.last_failure_at.map(UtcDateTime::from),
            open_until: inner.open_until.map(UtcDateTime::from),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CircuitInner> {
        self.inner
            .lock()
            .expect("circuit tracker lock is not poisoned")
    }
}

/// `now + cooldown`, saturating at the latest representable instant.
fn reopen_at(now: OffsetDateTime, cooldown: Duration) -> OffsetDateTime {
    time::Duration::try_from(cooldown)
        .ok()
        .and_then(|cooldown| now.checked_add(cooldown))
        .unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc())
}
