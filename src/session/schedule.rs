use std::time::{Duration, Instant};

/// A cancellable repeating task, polled by its owner.
///
/// Nothing runs on its own: the owner calls [`ScheduledTask::poll`] with the
/// current instant and does the work when it returns true. A task fires at
/// most once per poll and reschedules from the poll time, so a late poll
/// never produces a burst of catch-up runs.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    interval: Duration,
    next_due: Instant,
    cancelled: bool,
}

impl ScheduledTask {
    /// First due one interval after `now`.
    pub fn new(interval: Duration, now: Instant) -> Self {
        ScheduledTask {
            interval,
            next_due: now + interval,
            cancelled: false,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_due(&self, now: Instant) -> bool {
        !self.cancelled && now >= self.next_due
    }

    /// True when due; the next run is then one interval after `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.next_due = now + self.interval;
        true
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }
}
