//! Fixed-window counting.
//!
//! A window opens on the first attempt for a key and lasts `window`. Every
//! attempt inside it increments the count, allowed or not. The first attempt
//! that arrives strictly after `window_start + window` replaces the entry
//! with a fresh window.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::to_delta;

/// One key's current counting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub attempt_count: u32,
    pub window_start: DateTime<Utc>,
}

impl RateLimitEntry {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            attempt_count: 1,
            window_start: now,
        }
    }

    /// Time elapsed since the window opened. Zero if the clock went backwards.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.window_start)
            .to_std()
            .unwrap_or_default()
    }

    fn has_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.age(now) > window
    }

    fn resets_at(&self, window: Duration) -> DateTime<Utc> {
        self.window_start
            .checked_add_signed(to_delta(window))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Outcome of evaluating one attempt against one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, rounded up, never negative.
    pub fn retry_after(&self, now: DateTime<Utc>) -> u64 {
        let millis = self.reset_at.signed_duration_since(now).num_milliseconds();
        if millis <= 0 {
            0
        } else {
            (millis as u64).div_ceil(1000)
        }
    }
}

/// Opens a new window for a key that has no live entry.
pub(crate) fn open(
    now: DateTime<Utc>,
    cap: u32,
    window: Duration,
) -> (RateLimitEntry, RateLimitDecision) {
    let entry = RateLimitEntry::new(now);
    let decision = RateLimitDecision {
        allowed: true,
        remaining: cap.saturating_sub(1),
        reset_at: entry.resets_at(window),
    };
    (entry, decision)
}

/// Records one attempt against an existing entry, mutating it in place.
pub(crate) fn advance(
    entry: &mut RateLimitEntry,
    now: DateTime<Utc>,
    cap: u32,
    window: Duration,
) -> RateLimitDecision {
    if entry.has_expired(now, window) {
        let (fresh, decision) = open(now, cap, window);
        *entry = fresh;
        return decision;
    }

    entry.attempt_count = entry.attempt_count.saturating_add(1);
    let reset_at = entry.resets_at(window);

    if entry.attempt_count > cap {
        RateLimitDecision {
            allowed: false,
            remaining: 0,
            reset_at,
        }
    } else {
        RateLimitDecision {
            allowed: true,
            remaining: cap - entry.attempt_count,
            reset_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    const WINDOW: Duration = Duration::from_secs(15 * 60);

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn open_starts_at_one() {
        let (entry, decision) = open(t0(), 5, WINDOW);
        assert_eq!(entry.attempt_count, 1);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 4);
        assert_eq!(decision.reset_at, t0() + TimeDelta::minutes(15));
    }

    #[test]
    fn cap_attempts_allowed_then_denied() {
        let (mut entry, _) = open(t0(), 3, WINDOW);
        assert_eq!(advance(&mut entry, t0(), 3, WINDOW).remaining, 1);
        assert_eq!(advance(&mut entry, t0(), 3, WINDOW).remaining, 0);

        let denied = advance(&mut entry, t0(), 3, WINDOW);
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(entry.attempt_count, 4);
    }

    #[test]
    fn denied_attempts_still_count() {
        let (mut entry, _) = open(t0(), 1, WINDOW);
        for _ in 0..10 {
            advance(&mut entry, t0(), 1, WINDOW);
        }
        assert_eq!(entry.attempt_count, 11);
    }

    #[test]
    fn exactly_window_elapsed_is_still_inside() {
        let (mut entry, _) = open(t0(), 2, WINDOW);
        let edge = t0() + TimeDelta::minutes(15);
        let decision = advance(&mut entry, edge, 2, WINDOW);
        assert_eq!(entry.attempt_count, 2);
        assert_eq!(entry.window_start, t0());
        assert_eq!(decision.reset_at, edge);
    }

    #[test]
    fn expired_window_is_replaced_not_incremented() {
        let (mut entry, _) = open(t0(), 2, WINDOW);
        for _ in 0..5 {
            advance(&mut entry, t0(), 2, WINDOW);
        }

        let later = t0() + TimeDelta::minutes(15) + TimeDelta::milliseconds(1);
        let decision = advance(&mut entry, later, 2, WINDOW);

        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
        assert_eq!(entry, RateLimitEntry::new(later));
    }

    #[test]
    fn retry_after_rounds_up_and_clamps() {
        let decision = RateLimitDecision {
            allowed: false,
            remaining: 0,
            reset_at: t0() + TimeDelta::milliseconds(1500),
        };
        assert_eq!(decision.retry_after(t0()), 2);
        assert_eq!(decision.retry_after(t0() + TimeDelta::seconds(5)), 0);
    }

    #[test]
    fn age_is_zero_when_clock_goes_backwards() {
        let entry = RateLimitEntry::new(t0());
        assert_eq!(entry.age(t0() - TimeDelta::seconds(10)), Duration::ZERO);
    }
}
