//! Time and node/depth limiters (spec.md §4.8).
//!
//! `Limits` is the union of everything a `go` command can specify; a single
//! [`Clock`] tracks the wall-clock soft/hard deadlines derived from it. Node
//! and depth limits are plain counters compared directly against
//! [`crate::search::Worker`] state, so they live on `Limits` rather than here.

use std::time::{Duration, Instant};

/// Every limit kind spec.md §4.8 names. `moves_to_go` and `infinite` are
/// carried as reserved fields (spec.md §9 open question: "exist in the
/// source but are not consumed by the limiter") — accepted from the driver,
/// never read by the search loop.
#[derive(Clone, Debug, Default)]
pub struct Limits {
    pub depth: Option<u8>,
    pub soft_nodes: Option<u64>,
    pub hard_nodes: Option<u64>,
    pub soft_time: Option<Duration>,
    pub hard_time: Option<Duration>,
    /// Stop once a mate in this many moves is found.
    pub mate: Option<u8>,
    /// Reserved, unused (spec.md §9).
    pub moves_to_go: Option<u32>,
    /// Reserved, unused (spec.md §9): `go infinite` is instead modeled by
    /// leaving every other limit `None`.
    pub infinite: bool,
}

impl Limits {
    #[must_use]
    pub fn depth_only(depth: u8) -> Self {
        Limits {
            depth: Some(depth),
            ..Limits::default()
        }
    }

    #[must_use]
    pub fn time(soft: Duration, hard: Duration) -> Self {
        Limits {
            soft_time: Some(soft),
            hard_time: Some(hard),
            ..Limits::default()
        }
    }
}

/// Wall-clock bookkeeping for one search (spec.md §4.8). Hard expiry is only
/// ever consulted by the main thread (spec.md §5 "Timeouts: enforced only by
/// the main thread").
pub struct Clock {
    start: Instant,
    soft: Option<Duration>,
    hard: Option<Duration>,
    move_overhead: Duration,
}

impl Clock {
    #[must_use]
    pub fn new(start: Instant, soft: Option<Duration>, hard: Option<Duration>, move_overhead: Duration) -> Self {
        Clock {
            start,
            soft: soft.map(|d| d.saturating_sub(move_overhead)),
            hard: hard.map(|d| d.saturating_sub(move_overhead)),
            move_overhead,
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    #[must_use]
    pub fn expired_soft(&self) -> bool {
        self.soft.is_some_and(|soft| self.elapsed() >= soft)
    }

    #[must_use]
    pub fn expired_hard(&self) -> bool {
        self.hard.is_some_and(|hard| self.elapsed() >= hard)
    }

    #[must_use]
    pub fn soft(&self) -> Option<Duration> {
        self.soft
    }

    #[must_use]
    pub fn hard(&self) -> Option<Duration> {
        self.hard
    }

    /// Node-TM scaling (spec.md §4.8): `softTime *= nodeTmBaseOffset -
    /// bestMoveNodeFraction * nodeTmScaleFactor`, clamped to the hard bound
    /// and never invoked before depth 5.
    pub fn scale_soft_by_node_fraction(&mut self, best_move_node_fraction: f64) {
        let Some(soft) = self.soft else { return };
        const NODE_TM_BASE_OFFSET: f64 = 1.50;
        const NODE_TM_SCALE_FACTOR: f64 = 1.10;
        let factor = (NODE_TM_BASE_OFFSET - best_move_node_fraction * NODE_TM_SCALE_FACTOR).max(0.25);
        let scaled = soft.mul_f64(factor);
        self.soft = Some(match self.hard {
            Some(hard) => scaled.min(hard),
            None => scaled,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_limit_expires_after_duration() {
        let clock = Clock::new(
            Instant::now() - Duration::from_millis(200),
            None,
            Some(Duration::from_millis(100)),
            Duration::ZERO,
        );
        assert!(clock.expired_hard());
    }

    #[test]
    fn move_overhead_shrinks_both_bounds() {
        let clock = Clock::new(
            Instant::now(),
            Some(Duration::from_millis(100)),
            Some(Duration::from_millis(200)),
            Duration::from_millis(20),
        );
        assert_eq!(clock.soft(), Some(Duration::from_millis(80)));
        assert_eq!(clock.hard(), Some(Duration::from_millis(180)));
    }

    #[test]
    fn node_fraction_scaling_shrinks_soft_bound_when_best_move_dominates() {
        let mut clock = Clock::new(Instant::now(), Some(Duration::from_millis(1000)), None, Duration::ZERO);
        clock.scale_soft_by_node_fraction(0.9);
        assert!(clock.soft().unwrap() < Duration::from_millis(1000));
    }
}
