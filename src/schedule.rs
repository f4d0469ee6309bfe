use chrono::{Duration, NaiveDateTime};
use std::fmt;

// Daily window policy. The first 70 minute session (09:00-10:10) followed by
// hourly sessions until the 20:00 ceiling mirrors the timetable this tool was
// written for; these are policy constants, not derived values.
pub const DAY_START_HOUR: i64 = 9;
pub const FIRST_SESSION_END_MINUTES: i64 = 10 * 60 + 10;
pub const SESSION_MINUTES: i64 = 60;
pub const DAY_END_HOUR: i64 = 20;

/// One scheduled tracking window. Sessions for a day are contiguous,
/// non-overlapping and known in full up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Session {
    /// Half-open membership: `start <= t < end`.
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t < self.end
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// Truncate a timestamp to midnight of its day.
pub fn day_anchor(now: NaiveDateTime) -> NaiveDateTime {
    now.date()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time of day")
}

/// Build the full session plan for one day.
///
/// The first session runs from `anchor + 9h` to `anchor + 10h10m`; every
/// later session starts where the previous one ended and runs for an hour,
/// except the last, which is clamped to the `anchor + 20h` ceiling.
pub fn generate_sessions(day_anchor: NaiveDateTime) -> Vec<Session> {
    let ceiling = day_anchor + Duration::hours(DAY_END_HOUR);
    let start = day_anchor + Duration::hours(DAY_START_HOUR);
    let mut end = day_anchor + Duration::minutes(FIRST_SESSION_END_MINUTES);

    let mut sessions = vec![Session { start, end }];
    while end < ceiling {
        let start = end;
        end = start + Duration::minutes(SESSION_MINUTES);
        if end > ceiling {
            end = ceiling;
        }
        sessions.push(Session { start, end });
    }
    sessions
}
