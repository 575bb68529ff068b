use std::time::Instant;

use chime_common::Time;

/// Software wall clock: a base time of day plus the monotonic time elapsed
/// since it was set. Nothing survives a restart.
#[derive(Debug, Clone)]
pub struct HostClock {
    base: Time,
    set_at: Instant,
}

impl HostClock {
    pub fn new(now: Time) -> Self {
        Self::new_at(now, Instant::now())
    }

    fn new_at(base: Time, set_at: Instant) -> Self {
        Self { base, set_at }
    }

    pub fn set(&mut self, time: Time) {
        self.base = time;
        self.set_at = Instant::now();
    }

    pub fn now(&self) -> Time {
        self.at(Instant::now())
    }

    fn at(&self, instant: Instant) -> Time {
        let elapsed = instant.saturating_duration_since(self.set_at);
        Time::from_seconds_of_day(self.base.seconds_of_day() + elapsed.as_secs())
    }
}

/// Turns a stream of clock readings into minute-change events.
#[derive(Debug, Clone, Default)]
pub struct MinuteWatch {
    last: Option<(u8, u8)>,
}

impl MinuteWatch {
    /// Remembers `now` without reporting a change. Used after the clock is
    /// rebased so calibration itself is not mistaken for a rollover.
    pub fn reset(&mut self, now: Time) {
        self.last = Some((now.hour(), now.minute()));
    }

    /// True when `now` lies in a different minute than the last reading.
    pub fn observe(&mut self, now: Time) -> bool {
        let current = (now.hour(), now.minute());
        match self.last.replace(current) {
            Some(previous) => previous != current,
            None => false,
        }
    }
}
