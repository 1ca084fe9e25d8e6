// src/core/budget.rs

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::core::errors::GovernorError;
use crate::core::models::RequestKind;

pub const REASON_RATE_LIMIT: &str = "rate limit exceeded";
pub const REASON_TOTAL_BUDGET: &str = "total budget exhausted";

const WINDOW: Duration = Duration::from_secs(60);

/// Numeric caps bounding a run's request volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BudgetConfig {
    pub max_requests_per_minute: u32,
    /// Optional cap on the whole run; `None` leaves only the per-minute cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_total_requests: Option<u32>,
}

impl BudgetConfig {
    pub fn new(
        max_requests_per_minute: u32,
        max_total_requests: Option<u32>,
    ) -> Result<Self, GovernorError> {
        if max_requests_per_minute == 0 {
            return Err(GovernorError::InvalidPolicy(
                "max-requests-per-minute must be greater than zero".to_string(),
            ));
        }
        if max_total_requests == Some(0) {
            return Err(GovernorError::InvalidPolicy(
                "max-total-requests must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            max_requests_per_minute,
            max_total_requests,
        })
    }
}

/// The answer to one admission question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub granted: bool,
    /// Budget clause that denied, empty when granted.
    pub reason: &'static str,
}

impl Admission {
    fn granted() -> Self {
        Self {
            granted: true,
            reason: "",
        }
    }

    fn denied(reason: &'static str) -> Self {
        Self {
            granted: false,
            reason,
        }
    }
}

/// Per-run request counters: a sliding one-minute window plus a lifetime
/// count.
///
/// Owned by the run context and handed to the governor by reference, never a
/// module-level singleton, so concurrent runs (and tests) stay isolated. The
/// governor serializes access; the tracker itself carries no lock.
#[derive(Debug)]
pub struct BudgetTracker {
    config: BudgetConfig,
    window: VecDeque<Instant>,
    total: u64,
}

impl BudgetTracker {
    pub fn new(config: BudgetConfig) -> Self {
        Self {
            config,
            window: VecDeque::new(),
            total: 0,
        }
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    /// Asks for one request slot, consuming it when granted.
    ///
    /// Evaluation order: lifetime cap first, then the trailing 60-second
    /// window. The slot is consumed at grant time; a request that later fails
    /// or times out does not give it back.
    pub fn try_consume(&mut self, kind: RequestKind) -> Admission {
        self.try_consume_at(kind, Instant::now())
    }

    fn try_consume_at(&mut self, kind: RequestKind, now: Instant) -> Admission {
        if let Some(max_total) = self.config.max_total_requests {
            if self.total >= u64::from(max_total) {
                debug!(%kind, total = self.total, "budget denial: lifetime cap reached");
                return Admission::denied(REASON_TOTAL_BUDGET);
            }
        }

        // A timestamp exactly 60s old still counts against the window
        // (inclusive boundary, conservative toward denial).
        while let Some(front) = self.window.front() {
            if now.duration_since(*front) > WINDOW {
                self.window.pop_front();
            } else {
                break;
            }
        }

        if self.window.len() >= self.config.max_requests_per_minute as usize {
            debug!(%kind, in_window = self.window.len(), "budget denial: rate limit");
            return Admission::denied(REASON_RATE_LIMIT);
        }

        self.window.push_back(now);
        self.total += 1;
        Admission::granted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(per_minute: u32, total: Option<u32>) -> BudgetTracker {
        BudgetTracker::new(BudgetConfig::new(per_minute, total).unwrap())
    }

    #[test]
    fn rejects_zero_caps() {
        assert!(BudgetConfig::new(0, None).is_err());
        assert!(BudgetConfig::new(10, Some(0)).is_err());
    }

    #[test]
    fn grants_exactly_the_per_minute_cap_within_one_minute() {
        let mut tracker = tracker(60, None);
        let now = Instant::now();
        let mut granted = 0;
        let mut denied = Vec::new();
        for _ in 0..61 {
            let admission = tracker.try_consume_at(RequestKind::Http, now);
            if admission.granted {
                granted += 1;
            } else {
                denied.push(admission.reason);
            }
        }
        assert_eq!(granted, 60);
        assert_eq!(denied, vec![REASON_RATE_LIMIT]);
    }

    #[test]
    fn lifetime_cap_wins_over_rate_limit() {
        let mut tracker = tracker(100, Some(2));
        let now = Instant::now();
        assert!(tracker.try_consume_at(RequestKind::Dns, now).granted);
        assert!(tracker.try_consume_at(RequestKind::Dns, now).granted);
        let third = tracker.try_consume_at(RequestKind::Dns, now);
        assert!(!third.granted);
        assert_eq!(third.reason, REASON_TOTAL_BUDGET);
    }

    #[test]
    fn minute_boundary_is_inclusive() {
        let mut tracker = tracker(1, None);
        let base = Instant::now();
        assert!(tracker.try_consume_at(RequestKind::Dns, base).granted);

        // Exactly 60s later the first request is still inside the window.
        let at_boundary = base + Duration::from_secs(60);
        let denied = tracker.try_consume_at(RequestKind::Dns, at_boundary);
        assert!(!denied.granted);
        assert_eq!(denied.reason, REASON_RATE_LIMIT);

        // Strictly past the boundary the slot frees up.
        let past = base + Duration::from_secs(60) + Duration::from_millis(1);
        assert!(tracker.try_consume_at(RequestKind::Dns, past).granted);
    }

    #[test]
    fn window_slides_but_lifetime_count_does_not() {
        let mut tracker = tracker(2, Some(3));
        let base = Instant::now();
        assert!(tracker.try_consume_at(RequestKind::Http, base).granted);
        assert!(tracker.try_consume_at(RequestKind::Http, base).granted);

        let later = base + Duration::from_secs(120);
        assert!(tracker.try_consume_at(RequestKind::Http, later).granted);
        let fourth = tracker.try_consume_at(RequestKind::Http, later);
        assert!(!fourth.granted);
        assert_eq!(fourth.reason, REASON_TOTAL_BUDGET);
    }
}
