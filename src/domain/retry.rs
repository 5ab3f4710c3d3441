//! Retry policy and fallback ladder for the source fetcher.
//!
//! Both are plain values: the policy decides what happens after an attempt and
//! how long to wait, the ladder lists the windows to try. Neither sleeps; the
//! fetcher owns the side effects.

use crate::domain::error::AnalyticsError;
use crate::domain::period::FetchWindow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Where a retry loop stands after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// Attempt number `n` (1-based) is next.
    Attempting(u32),
    Success,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// `max_retries` is the total number of attempts per window and must be at
    /// least 1.
    pub fn new(max_retries: u32, base_delay: Duration) -> Result<Self, AnalyticsError> {
        if max_retries == 0 {
            return Err(AnalyticsError::ConfigInvalid {
                section: "fetch".into(),
                key: "max_retries".into(),
                reason: "max_retries must be at least 1".into(),
            });
        }
        Ok(Self {
            max_retries,
            base_delay,
        })
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn start(&self) -> AttemptState {
        AttemptState::Attempting(1)
    }

    /// Delay to wait after failed attempt `attempt`: `base × 2^(attempt−1)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Transition after attempt `attempt` finished with `succeeded`.
    pub fn next(&self, attempt: u32, succeeded: bool) -> AttemptState {
        if succeeded {
            AttemptState::Success
        } else if attempt < self.max_retries {
            AttemptState::Attempting(attempt + 1)
        } else {
            AttemptState::Exhausted
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

/// A rung of the fallback ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LadderStep {
    pub label: &'static str,
    pub window: FetchWindow,
}

/// Ordered degradation steps, consumed left to right, each strictly narrower
/// than the one before.
#[derive(Debug, Clone)]
pub struct FallbackLadder {
    steps: Vec<LadderStep>,
}

impl FallbackLadder {
    /// Requested window first, then one month, then five days, all daily and
    /// anchored at the requested end. Rungs at least as wide as the requested
    /// window are left out.
    pub fn for_request(label: &'static str, requested: FetchWindow) -> Self {
        let end = requested.end;
        let candidates = [
            LadderStep {
                label,
                window: requested,
            },
            LadderStep {
                label: "1M",
                window: FetchWindow::trailing_days(end, 30),
            },
            LadderStep {
                label: "5D",
                window: FetchWindow::trailing_days(end, 5),
            },
        ];
        Self::from_steps(candidates)
    }

    /// Build from explicit steps, dropping any that does not narrow the
    /// previous kept step.
    pub fn from_steps(candidates: impl IntoIterator<Item = LadderStep>) -> Self {
        let mut steps: Vec<LadderStep> = Vec::new();
        for step in candidates {
            if steps.last().is_none_or(|prev| step.window.span() < prev.window.span()) {
                steps.push(step);
            }
        }
        Self { steps }
    }

    pub fn steps(&self) -> &[LadderStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Shared flag a caller flips to abort a fetch before its next attempt.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
