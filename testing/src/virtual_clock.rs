//! Virtual time for deterministic tests
//!
//! A [`VirtualClock`] never moves on its own. Work scheduled on it waits
//! until the test advances time past the work's due instant; due work then
//! runs on the test's thread, in due-time order, ties broken by scheduling
//! order.

use cadence_core::environment::{Callback, Clock, Scheduled};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

struct Timeline {
    now: DateTime<Utc>,
    next_seq: u64,
    pending: BTreeMap<(DateTime<Utc>, u64), Callback>,
}

/// Clock whose time only moves when the test says so.
///
/// Clones share the same timeline, so the clock handed to a store and the
/// one the test advances can be the same clock.
///
/// # Example
///
/// ```
/// use cadence_core::environment::Clock;
/// use cadence_testing::VirtualClock;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = VirtualClock::new();
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&fired);
///
/// clock.schedule(Duration::from_secs(1), Box::new(move || flag.store(true, Ordering::SeqCst)));
///
/// clock.advance(Duration::from_millis(999));
/// assert!(!fired.load(Ordering::SeqCst));
///
/// clock.advance(Duration::from_millis(1));
/// assert!(fired.load(Ordering::SeqCst));
/// ```
#[derive(Clone)]
pub struct VirtualClock {
    timeline: Arc<Mutex<Timeline>>,
}

impl VirtualClock {
    /// Clock starting at 2025-01-01 00:00:00 UTC
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(reference_instant())
    }

    /// Clock starting at `now`
    #[must_use]
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            timeline: Arc::new(Mutex::new(Timeline {
                now,
                next_seq: 0,
                pending: BTreeMap::new(),
            })),
        }
    }

    /// Move time forward by `by`, running everything that falls due
    ///
    /// # Panics
    ///
    /// Panics if the resulting instant is not representable.
    #[track_caller]
    #[allow(clippy::expect_used)] // Test clock: overflow is a broken test
    pub fn advance(&self, by: Duration) {
        let target = {
            let timeline = self.lock();
            TimeDelta::from_std(by)
                .ok()
                .and_then(|delta| timeline.now.checked_add_signed(delta))
                .expect("virtual time overflowed")
        };
        self.advance_to(target);
    }

    /// Move time forward to `instant`, running everything due at or before it
    ///
    /// Work is run one item at a time with time set to that item's due
    /// instant. Work an item schedules that falls due at or before `instant`
    /// also runs within this call.
    ///
    /// # Panics
    ///
    /// Panics if `instant` is earlier than the current time.
    #[track_caller]
    #[allow(clippy::panic)] // Moving backwards is a broken test
    pub fn advance_to(&self, instant: DateTime<Utc>) {
        {
            let timeline = self.lock();
            if instant < timeline.now {
                panic!(
                    "VirtualClock cannot move backwards: now is {}, asked to advance to {}",
                    timeline.now, instant
                );
            }
        }

        loop {
            let due = {
                let mut timeline = self.lock();
                match timeline.pending.first_key_value() {
                    Some((&(at, _), _)) if at <= instant => {
                        timeline.now = at;
                        timeline.pending.pop_first().map(|(_, callback)| callback)
                    },
                    _ => None,
                }
            };

            match due {
                Some(callback) => callback(),
                None => break,
            }
        }

        let mut timeline = self.lock();
        if timeline.now < instant {
            timeline.now = instant;
        }
    }

    /// Run everything scheduled, advancing to the last due instant
    ///
    /// Work that keeps rescheduling itself makes this loop forever.
    pub fn run(&self) {
        loop {
            let last = self
                .lock()
                .pending
                .last_key_value()
                .map(|(&(at, _), _)| at);
            match last {
                Some(at) => self.advance_to(at),
                None => break,
            }
        }
    }

    /// Number of callbacks waiting to fire
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    fn lock(&self) -> MutexGuard<'_, Timeline> {
        self.timeline.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VirtualClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let timeline = self.lock();
        f.debug_struct("VirtualClock")
            .field("now", &timeline.now)
            .field("pending", &timeline.pending.len())
            .finish()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> DateTime<Utc> {
        self.lock().now
    }

    fn schedule(&self, delay: Duration, callback: Callback) -> Scheduled {
        let key = {
            let mut timeline = self.lock();
            let at = TimeDelta::from_std(delay)
                .ok()
                .and_then(|delta| timeline.now.checked_add_signed(delta))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            let seq = timeline.next_seq;
            timeline.next_seq += 1;
            timeline.pending.insert((at, seq), callback);
            (at, seq)
        };

        let timeline = Arc::downgrade(&self.timeline);
        Scheduled::new(move || {
            if let Some(timeline) = timeline.upgrade() {
                // Drop the callback outside the lock; its captures may have destructors
                let removed = timeline
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .pending
                    .remove(&key);
                drop(removed);
            }
        })
    }
}

/// 2025-01-01 00:00:00 UTC
#[allow(clippy::expect_used)]
fn reference_instant() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
        .expect("hardcoded timestamp should always parse")
        .with_timezone(&Utc)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Callback) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |label: &'static str| -> Callback {
            let sink = Arc::clone(&sink);
            Box::new(move || sink.lock().unwrap().push(label))
        };
        (log, make)
    }

    #[test]
    fn starts_at_reference_instant() {
        let clock = VirtualClock::new();
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn fires_in_due_order_with_fifo_ties() {
        let clock = VirtualClock::new();
        let (log, make) = recorder();

        clock.schedule(Duration::from_secs(2), make("late"));
        clock.schedule(Duration::from_secs(1), make("first"));
        clock.schedule(Duration::from_secs(1), make("second"));

        clock.advance(Duration::from_secs(5));
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "late"]);
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn time_during_callback_is_the_due_instant() {
        let clock = VirtualClock::new();
        let start = clock.now();
        let seen = Arc::new(Mutex::new(None));

        let probe = clock.clone();
        let slot = Arc::clone(&seen);
        clock.schedule(
            Duration::from_millis(300),
            Box::new(move || *slot.lock().unwrap() = Some(probe.now())),
        );

        clock.advance(Duration::from_secs(1));
        assert_eq!(
            *seen.lock().unwrap(),
            Some(start + TimeDelta::milliseconds(300))
        );
        assert_eq!(clock.now(), start + TimeDelta::seconds(1));
    }

    #[test]
    fn zero_advance_runs_work_due_now() {
        let clock = VirtualClock::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        clock.schedule(
            Duration::ZERO,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(count.load(Ordering::SeqCst), 0);

        clock.advance(Duration::ZERO);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reentrant_schedule_inside_window_fires_same_advance() {
        let clock = VirtualClock::new();
        let (log, make) = recorder();

        let inner_clock = clock.clone();
        let inner = make("inner");
        let outer = make("outer");
        clock.schedule(
            Duration::from_millis(100),
            Box::new(move || {
                outer();
                inner_clock.schedule(Duration::from_millis(100), inner);
            }),
        );

        clock.advance(Duration::from_millis(200));
        assert_eq!(*log.lock().unwrap(), vec!["outer", "inner"]);
    }

    #[test]
    fn reentrant_schedule_past_window_waits() {
        let clock = VirtualClock::new();
        let (log, make) = recorder();

        let inner_clock = clock.clone();
        let inner = make("inner");
        clock.schedule(
            Duration::from_millis(100),
            Box::new(move || {
                inner_clock.schedule(Duration::from_millis(200), inner);
            }),
        );

        clock.advance(Duration::from_millis(200));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(clock.pending(), 1);

        clock.advance(Duration::from_millis(100));
        assert_eq!(*log.lock().unwrap(), vec!["inner"]);
    }

    #[test]
    fn run_drains_everything() {
        let clock = VirtualClock::new();
        let (log, make) = recorder();

        clock.schedule(Duration::from_secs(60), make("minute"));
        clock.schedule(Duration::from_secs(3600), make("hour"));

        clock.run();
        assert_eq!(*log.lock().unwrap(), vec!["minute", "hour"]);
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn cancelled_work_leaves_the_timeline() {
        let clock = VirtualClock::new();
        let (log, make) = recorder();

        let dropped = clock.schedule(Duration::from_secs(1), make("dropped"));
        clock.schedule(Duration::from_secs(2), make("kept"));
        assert_eq!(clock.pending(), 2);

        dropped.cancel();
        assert_eq!(clock.pending(), 1);

        clock.advance(Duration::from_secs(5));
        assert_eq!(*log.lock().unwrap(), vec!["kept"]);
    }

    #[test]
    fn cancelling_fired_work_is_a_no_op() {
        let clock = VirtualClock::new();
        let (log, make) = recorder();

        let fired = clock.schedule(Duration::from_secs(1), make("fired"));
        clock.advance(Duration::from_secs(1));
        fired.cancel();

        assert_eq!(*log.lock().unwrap(), vec!["fired"]);
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    #[should_panic(expected = "cannot move backwards")]
    fn moving_backwards_is_fatal() {
        let clock = VirtualClock::new();
        let earlier = clock.now() - TimeDelta::seconds(1);
        clock.advance_to(earlier);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn firing_order_is_due_then_schedule_order(
                delays in prop::collection::vec(0u64..50, 1..20),
                step in 1u64..20,
            ) {
                let clock = VirtualClock::new();
                let fired = Arc::new(Mutex::new(Vec::new()));

                for (index, delay) in delays.iter().enumerate() {
                    let sink = Arc::clone(&fired);
                    clock.schedule(
                        Duration::from_millis(*delay),
                        Box::new(move || sink.lock().unwrap().push(index)),
                    );
                }

                while clock.pending() > 0 {
                    clock.advance(Duration::from_millis(step));
                }

                let mut expected: Vec<usize> = (0..delays.len()).collect();
                expected.sort_by_key(|index| delays[*index]);
                prop_assert_eq!(fired.lock().unwrap().clone(), expected);
            }
        }
    }
}
