//! Idle detection.

use log::{debug, info};

use crate::event::TimerEvent;
use crate::timer::{TimerId, Timers};

/// Tracks input recency and owns the single idle countdown.
///
/// The monitor never reloads anything itself. When the countdown fires the
/// session asks [`ActivityMonitor::expire`] whether the expiry is genuine
/// and, if so, calls the host's reload.
#[derive(Debug)]
pub struct ActivityMonitor {
    timeout: f32,
    last_activity: Option<f32>,
    pending: Option<TimerId>,
}

impl ActivityMonitor {
    pub fn new(timeout: f32) -> Self {
        Self {
            timeout,
            last_activity: None,
            pending: None,
        }
    }

    /// Restart the idle countdown from `now`.
    pub fn record_activity(&mut self, now: f32, timers: &mut Timers<TimerEvent>) {
        if let Some(id) = self.pending.take() {
            timers.cancel(id);
        }
        self.last_activity = Some(now);
        self.pending = Some(timers.schedule(now, self.timeout, TimerEvent::IdleTimeout));
    }

    /// Called when an idle timer fires. Returns `true` if the session should
    /// reload, which happens once per uninterrupted idle period.
    pub fn expire(&mut self, id: TimerId) -> bool {
        if self.pending != Some(id) {
            debug!("ignoring stale idle timer {id}");
            return false;
        }
        self.pending = None;
        info!(
            "no activity for {:.0}s, reloading",
            self.timeout
        );
        true
    }

    pub fn last_activity(&self) -> Option<f32> {
        self.last_activity
    }

    pub fn pending(&self) -> Option<TimerId> {
        self.pending
    }

    pub fn timeout(&self) -> f32 {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Runs the monitor against a list of activity times and returns how
    /// many reloads would have happened by `end`.
    fn reloads(timeout: f32, activity: &[f32], end: f32) -> usize {
        let mut timers = Timers::new();
        let mut monitor = ActivityMonitor::new(timeout);
        let mut count = 0;
        let mut fire = |timers: &mut Timers<TimerEvent>, monitor: &mut ActivityMonitor, now| {
            while let Some((id, event)) = timers.pop_due(now) {
                assert_eq!(event, TimerEvent::IdleTimeout);
                if monitor.expire(id) {
                    count += 1;
                }
            }
        };
        for &t in activity {
            fire(&mut timers, &mut monitor, t);
            monitor.record_activity(t, &mut timers);
        }
        fire(&mut timers, &mut monitor, end);
        count
    }

    #[test]
    fn activity_inside_the_window_never_reloads() {
        let activity: Vec<f32> = (0..20).map(|i| i as f32 * 290.0).collect();
        assert_eq!(reloads(300.0, &activity, 19.0 * 290.0 + 299.0), 0);
    }

    #[test]
    fn one_long_gap_reloads_exactly_once() {
        assert_eq!(reloads(300.0, &[0.0, 100.0], 10_000.0), 1);
    }

    #[test]
    fn gap_of_exactly_the_timeout_reloads() {
        assert_eq!(reloads(300.0, &[0.0], 300.0), 1);
    }

    #[test]
    fn rearming_cancels_the_previous_countdown() {
        let mut timers = Timers::new();
        let mut monitor = ActivityMonitor::new(300.0);
        monitor.record_activity(0.0, &mut timers);
        let first = monitor.pending().unwrap();
        monitor.record_activity(10.0, &mut timers);
        assert!(!timers.is_pending(first));
        assert_eq!(timers.len(), 1);
        assert_eq!(monitor.last_activity(), Some(10.0));
    }
}
