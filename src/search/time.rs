//! Search time management.
//!
//! Allocates a nominal slice from the clock, extends it while the root is
//! unstable, and promotes expiry to the shared cancellation flag at a coarse
//! node granularity.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::params::TimeParams;

/// Time budget for a search: a fixed slice, or a running clock with
/// increment and optional moves-to-go.
#[derive(Clone, Copy, Debug)]
pub enum TimeControl {
    /// Spend exactly this long.
    Fixed(Duration),
    /// Allocate from remaining time.
    Clock {
        remaining: Duration,
        increment: Duration,
        moves_to_go: Option<u32>,
    },
}

/// Soft and hard deadlines derived from a [`TimeControl`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct TimeAllocation {
    pub(crate) soft: Duration,
    pub(crate) hard: Duration,
}

impl TimeAllocation {
    pub(crate) fn from_control(tc: &TimeControl, params: &TimeParams) -> Self {
        let margin = Duration::from_millis(params.safety_margin_ms);
        match *tc {
            TimeControl::Fixed(slice) => {
                let slice = slice.saturating_sub(margin / 2);
                TimeAllocation {
                    soft: slice,
                    hard: slice,
                }
            }
            TimeControl::Clock {
                remaining,
                increment,
                moves_to_go,
            } => {
                let mtg = moves_to_go.unwrap_or(params.avg_moves_to_go).max(1);
                let base = remaining / mtg
                    + increment * params.increment_permille / 1000;
                let ceiling = remaining.saturating_sub(margin);
                let soft = base.min(ceiling);
                let hard = (base * params.hard_factor).min(ceiling);
                TimeAllocation { soft, hard }
            }
        }
    }
}

/// The clock a running search polls. Shared with the controlling thread so
/// deadlines can be dropped on a stop request.
pub(crate) struct SearchClock {
    start: Instant,
    allocation: Mutex<Option<TimeAllocation>>,
}

impl SearchClock {
    pub(crate) fn new(allocation: Option<TimeAllocation>) -> Self {
        SearchClock {
            start: Instant::now(),
            allocation: Mutex::new(allocation),
        }
    }

    #[inline]
    pub(crate) fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub(crate) fn hard_expired(&self) -> bool {
        let allocation = *self.allocation.lock();
        allocation.map_or(false, |a| self.start.elapsed() >= a.hard)
    }

    /// Soft-deadline test applied between iterations; `stretch_permille`
    /// widens the slice while the root is unstable.
    pub(crate) fn soft_expired(&self, stretch_permille: u32) -> bool {
        let allocation = *self.allocation.lock();
        allocation.map_or(false, |a| {
            let stretched = a.soft * stretch_permille / 1000;
            self.start.elapsed() >= stretched.min(a.hard)
        })
    }
}
