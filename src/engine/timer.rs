// src/engine/timer.rs

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::engine::subtest::Subtest;

/// Wall-clock source. A trait seam so remaining-time arithmetic is testable
/// without sleeping.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Key of one live countdown: one user, one simulation, one subtest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnchorKey {
    pub user_email: String,
    pub simulation_id: i64,
    pub subtest: Subtest,
}

/// Keyed store of countdown anchors.
///
/// An anchor is the wall-clock timestamp at which a subtest was first
/// entered; remaining time is always recomputed from it, never stored as a
/// mutable countdown. The store is passed around as an explicit handle;
/// nothing reads it through a global.
pub struct AnchorStore {
    anchors: Mutex<HashMap<AnchorKey, DateTime<Utc>>>,
}

impl AnchorStore {
    pub fn new() -> Self {
        Self {
            anchors: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the existing anchor for the key, or creates one at `now`.
    /// Idempotent: a reload lands on the same start timestamp.
    pub fn get_or_start(&self, key: &AnchorKey, now: DateTime<Utc>) -> DateTime<Utc> {
        *self
            .anchors
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_insert(now)
    }

    /// Remaining seconds: `max(0, limit - (now - start))`, a pure function
    /// of wall-clock time. A key with no anchor reads as the full limit
    /// (countdown not started).
    pub fn remaining(&self, key: &AnchorKey, time_limit_secs: i64, now: DateTime<Utc>) -> i64 {
        let anchors = self.anchors.lock().unwrap();
        match anchors.get(key) {
            Some(start) => {
                let elapsed = (now - *start).num_seconds();
                (time_limit_secs - elapsed).max(0)
            }
            None => time_limit_secs,
        }
    }

    /// Deletes the anchor. Called on subtest completion/expiry or logout.
    pub fn clear(&self, key: &AnchorKey) {
        self.anchors.lock().unwrap().remove(key);
    }

    pub fn has_anchor(&self, key: &AnchorKey) -> bool {
        self.anchors.lock().unwrap().contains_key(key)
    }
}

impl Default for AnchorStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Settable clock for tests.
#[cfg(test)]
pub struct ManualClock(pub Mutex<DateTime<Utc>>);

#[cfg(test)]
impl ManualClock {
    pub fn at(start: DateTime<Utc>) -> Self {
        Self(Mutex::new(start))
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.0.lock().unwrap();
        *now += chrono::Duration::seconds(secs);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> AnchorKey {
        AnchorKey {
            user_email: "siti@example.com".to_string(),
            simulation_id: 1,
            subtest: Subtest::Tps,
        }
    }

    #[test]
    fn remaining_is_full_limit_at_start() {
        let clock = ManualClock::at(Utc::now());
        let store = AnchorStore::new();
        let now = clock.now();

        store.get_or_start(&key(), now);
        for subtest in Subtest::SEQUENCE {
            let k = AnchorKey {
                subtest,
                ..key()
            };
            store.get_or_start(&k, now);
            assert_eq!(
                store.remaining(&k, subtest.time_limit_secs(), clock.now()),
                subtest.time_limit_secs()
            );
        }
    }

    #[test]
    fn remaining_never_goes_negative() {
        let clock = ManualClock::at(Utc::now());
        let store = AnchorStore::new();
        store.get_or_start(&key(), clock.now());

        clock.advance_secs(5400);
        assert_eq!(store.remaining(&key(), 5400, clock.now()), 0);
        clock.advance_secs(9999);
        assert_eq!(store.remaining(&key(), 5400, clock.now()), 0);
    }

    #[test]
    fn get_or_start_is_idempotent() {
        let clock = ManualClock::at(Utc::now());
        let store = AnchorStore::new();

        let first = store.get_or_start(&key(), clock.now());
        clock.advance_secs(120);
        let second = store.get_or_start(&key(), clock.now());
        assert_eq!(first, second);
        assert_eq!(store.remaining(&key(), 5400, clock.now()), 5280);
    }

    #[test]
    fn remaining_self_corrects_after_a_gap() {
        // Tab suspension: no ticks for 100s, the next read catches up.
        let clock = ManualClock::at(Utc::now());
        let store = AnchorStore::new();
        store.get_or_start(&key(), clock.now());

        clock.advance_secs(1);
        assert_eq!(store.remaining(&key(), 300, clock.now()), 299);
        clock.advance_secs(100);
        assert_eq!(store.remaining(&key(), 300, clock.now()), 199);
    }

    #[test]
    fn clear_removes_the_anchor() {
        let clock = ManualClock::at(Utc::now());
        let store = AnchorStore::new();
        store.get_or_start(&key(), clock.now());
        assert!(store.has_anchor(&key()));

        store.clear(&key());
        assert!(!store.has_anchor(&key()));
        assert_eq!(store.remaining(&key(), 5400, clock.now()), 5400);
    }
}
