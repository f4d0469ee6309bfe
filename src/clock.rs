use chrono::{Local, NaiveDateTime};
use std::cell::Cell;
use std::thread;
use std::time::Duration as StdDuration;

/// Time source seam. Production code reads the wall clock; tests drive a
/// [`ManualClock`] so session boundaries can be crossed instantly.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;

    /// Block until `deadline`. Returns immediately if it is already past.
    fn wait_until(&self, deadline: NaiveDateTime);
}

/// Wall clock in local time, matching the timestamps people see on the
/// attendance sheet.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn wait_until(&self, deadline: NaiveDateTime) {
        // One-second slices so a suspended laptop does not oversleep by the
        // whole gap after resume.
        while self.now() < deadline {
            thread::sleep(StdDuration::from_secs(1));
        }
    }
}

/// Hand-cranked clock for tests. `wait_until` jumps straight to the
/// deadline instead of sleeping.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn set(&self, t: NaiveDateTime) {
        self.now.set(t);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        self.now.get()
    }

    fn wait_until(&self, deadline: NaiveDateTime) {
        if self.now.get() < deadline {
            self.now.set(deadline);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn manual_clock_reports_what_it_was_told() {
        let clock = ManualClock::new(at(9, 0));
        assert_eq!(clock.now(), at(9, 0));
        clock.set(at(9, 30));
        assert_eq!(clock.now(), at(9, 30));
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), at(9, 35));
    }

    #[test]
    fn manual_wait_jumps_forward_never_backward() {
        let clock = ManualClock::new(at(9, 0));
        clock.wait_until(at(10, 10));
        assert_eq!(clock.now(), at(10, 10));
        clock.wait_until(at(9, 30));
        assert_eq!(clock.now(), at(10, 10));
    }
}
