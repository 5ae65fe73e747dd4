//! Commit instants
//!
//! Every mutation takes its timestamp from a `Clock`. Version chains
//! require strictly increasing instants per resource, so both clocks
//! here never return the same instant twice.

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeZone, Utc};

pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

fn to_micros(t: DateTime<Utc>) -> i64 {
    t.timestamp() * 1_000_000 + i64::from(t.timestamp_subsec_micros())
}

fn from_micros(micros: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(
        micros.div_euclid(1_000_000),
        (micros.rem_euclid(1_000_000) * 1_000) as u32,
    )
    .single()
    .unwrap_or_else(Utc::now)
}

/// Wall clock at microsecond precision, bumped forward on ties
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let wall = to_micros(Utc::now());
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return from_micros(next),
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Test clock. Each reading returns the current instant and then moves
/// it forward by one microsecond.
#[derive(Debug)]
pub struct ManualClock {
    micros: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            micros: AtomicI64::new(to_micros(start)),
        }
    }

    pub fn set(&self, t: DateTime<Utc>) {
        self.micros.store(to_micros(t), Ordering::SeqCst);
    }

    pub fn advance(&self, by: chrono::Duration) {
        let delta = by.num_microseconds().unwrap_or(i64::MAX / 2);
        self.micros.fetch_add(delta, Ordering::SeqCst);
    }

    /// Instant the next reading will return
    pub fn peek(&self) -> DateTime<Utc> {
        from_micros(self.micros.load(Ordering::SeqCst))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        from_micros(self.micros.fetch_add(1, Ordering::SeqCst))
    }
}
