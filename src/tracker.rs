use crate::schedule::Session;
use chrono::{Duration, NaiveDateTime};

/// Result of resolving one face query against the enrolled set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Known(String),
    Unknown,
}

/// One timestamped identity resolution fed to the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub who: Identity,
    pub at: NaiveDateTime,
}

/// Lifecycle of one recognized person inside a single session.
///
/// There is no `Unseen` variant: a person who has not been observed simply
/// has no record. `Reappeared` is terminal for the session; nothing mutates
/// a record after it latches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    Entered,
    Reappeared { at: NaiveDateTime },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceRecord {
    pub name: String,
    pub entry_time: NaiveDateTime,
    pub state: PresenceState,
}

/// State transitions worth reacting to outside the tracker. `Reappeared`
/// fires at most once per person per session; callers hang snapshot and log
/// side effects off it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    Entered {
        name: String,
        at: NaiveDateTime,
    },
    Reappeared {
        name: String,
        entry_time: NaiveDateTime,
        at: NaiveDateTime,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Status {
    Present,
    Absent,
}

/// Finalized call for one person in one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub name: String,
    pub entry_time: NaiveDateTime,
    pub check_time: NaiveDateTime,
    pub status: Status,
}

/// Per-session presence state machine.
///
/// Owns every per-person record for exactly one session: records are created
/// on first sight, promoted to `Reappeared` by the first observation at or
/// past `entry_time + min_duration`, and consumed by [`close`], which turns
/// each one into a [`Verdict`]. Nothing survives into the next session.
///
/// [`close`]: PresenceTracker::close
#[derive(Debug)]
pub struct PresenceTracker {
    session: Session,
    min_duration: Duration,
    records: Vec<PresenceRecord>,
}

impl PresenceTracker {
    pub fn new(session: Session, min_duration: Duration) -> Self {
        Self {
            session,
            min_duration,
            records: Vec::new(),
        }
    }

    pub fn session(&self) -> Session {
        self.session
    }

    /// Records seen so far, in first-observation order.
    pub fn records(&self) -> &[PresenceRecord] {
        &self.records
    }

    /// Feed one observation through the state machine.
    ///
    /// Unknown identities are discarded without creating state. The
    /// reappearance check is level-triggered: it runs on every observation
    /// of an `Entered` person, so an observation one second short of the
    /// threshold changes nothing while any later one at or past it latches.
    pub fn observe(&mut self, obs: Observation) -> Option<PresenceEvent> {
        let name = match obs.who {
            Identity::Known(name) => name,
            Identity::Unknown => return None,
        };

        match self.records.iter_mut().find(|r| r.name == name) {
            None => {
                self.records.push(PresenceRecord {
                    name: name.clone(),
                    entry_time: obs.at,
                    state: PresenceState::Entered,
                });
                Some(PresenceEvent::Entered { name, at: obs.at })
            }
            Some(record) => match record.state {
                PresenceState::Entered
                    if obs.at >= record.entry_time + self.min_duration =>
                {
                    record.state = PresenceState::Reappeared { at: obs.at };
                    Some(PresenceEvent::Reappeared {
                        name,
                        entry_time: record.entry_time,
                        at: obs.at,
                    })
                }
                // Early re-sighting, or already latched.
                _ => None,
            },
        }
    }

    /// Close the session and emit one verdict per person ever seen, in
    /// first-observation order. `Absent` verdicts carry the session end as
    /// their check time.
    pub fn close(self) -> Vec<Verdict> {
        let session_end = self.session.end;
        self.records
            .into_iter()
            .map(|record| match record.state {
                PresenceState::Reappeared { at } => Verdict {
                    name: record.name,
                    entry_time: record.entry_time,
                    check_time: at,
                    status: Status::Present,
                },
                PresenceState::Entered => Verdict {
                    name: record.name,
                    entry_time: record.entry_time,
                    check_time: session_end,
                    status: Status::Absent,
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn first_session() -> Session {
        Session {
            start: at(9, 0, 0),
            end: at(10, 10, 0),
        }
    }

    fn tracker() -> PresenceTracker {
        PresenceTracker::new(first_session(), Duration::minutes(30))
    }

    fn known(name: &str, t: NaiveDateTime) -> Observation {
        Observation {
            who: Identity::Known(name.to_string()),
            at: t,
        }
    }

    #[test]
    fn first_sight_creates_a_record_and_reports_entry() {
        let mut tracker = tracker();
        let event = tracker.observe(known("A", at(9, 5, 0)));
        assert_matches!(event, Some(PresenceEvent::Entered { ref name, .. }) if name == "A");
        assert_eq!(tracker.records().len(), 1);
        assert_eq!(tracker.records()[0].entry_time, at(9, 5, 0));
        assert_matches!(tracker.records()[0].state, PresenceState::Entered);
    }

    #[test]
    fn never_reobserved_finalizes_absent_with_session_end_check() {
        let mut tracker = tracker();
        tracker.observe(known("B", at(9, 58, 0)));

        let verdicts = tracker.close();
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].name, "B");
        assert_eq!(verdicts[0].entry_time, at(9, 58, 0));
        assert_eq!(verdicts[0].check_time, at(10, 10, 0));
        assert_eq!(verdicts[0].status, Status::Absent);
    }

    #[test]
    fn reappearance_at_the_exact_threshold_counts() {
        let mut tracker = tracker();
        tracker.observe(known("A", at(9, 5, 0)));

        let event = tracker.observe(known("A", at(9, 35, 0)));
        assert_matches!(
            event,
            Some(PresenceEvent::Reappeared { ref name, at, .. })
                if name == "A" && at == self::at(9, 35, 0)
        );

        let verdicts = tracker.close();
        assert_eq!(verdicts[0].status, Status::Present);
        assert_eq!(verdicts[0].check_time, at(9, 35, 0));
    }

    #[test]
    fn check_is_level_triggered_not_edge_triggered() {
        let mut tracker = tracker();
        tracker.observe(known("A", at(9, 5, 0)));

        // One second short of the threshold: nothing happens.
        assert_eq!(tracker.observe(known("A", at(9, 34, 59))), None);
        assert_matches!(tracker.records()[0].state, PresenceState::Entered);

        // The next observation past the threshold still latches.
        let event = tracker.observe(known("A", at(9, 41, 3)));
        assert_matches!(event, Some(PresenceEvent::Reappeared { .. }));

        let verdicts = tracker.close();
        assert_eq!(verdicts[0].status, Status::Present);
        assert_eq!(verdicts[0].check_time, at(9, 41, 3));
    }

    #[test]
    fn reappearance_latch_is_one_shot() {
        let mut tracker = tracker();
        tracker.observe(known("A", at(9, 5, 0)));
        assert_matches!(
            tracker.observe(known("A", at(9, 40, 0))),
            Some(PresenceEvent::Reappeared { .. })
        );

        // Later observations neither re-fire nor move the reappear time.
        assert_eq!(tracker.observe(known("A", at(9, 55, 0))), None);
        assert_eq!(tracker.observe(known("A", at(10, 5, 0))), None);

        let verdicts = tracker.close();
        assert_eq!(verdicts[0].check_time, at(9, 40, 0));
    }

    #[test]
    fn unknown_observations_never_create_state() {
        let mut tracker = tracker();
        assert_eq!(
            tracker.observe(Observation {
                who: Identity::Unknown,
                at: at(9, 5, 0),
            }),
            None
        );
        assert_eq!(
            tracker.observe(Observation {
                who: Identity::Unknown,
                at: at(9, 45, 0),
            }),
            None
        );
        assert!(tracker.close().is_empty());
    }

    #[test]
    fn identities_are_tracked_independently() {
        let mut tracker = tracker();
        tracker.observe(known("A", at(9, 5, 0)));
        tracker.observe(known("B", at(9, 20, 0)));
        tracker.observe(known("A", at(9, 40, 0))); // A reappears
        tracker.observe(known("B", at(9, 45, 0))); // 25 min: too early for B

        let verdicts = tracker.close();
        assert_eq!(verdicts.len(), 2);
        assert_eq!(verdicts[0].name, "A");
        assert_eq!(verdicts[0].status, Status::Present);
        assert_eq!(verdicts[1].name, "B");
        assert_eq!(verdicts[1].status, Status::Absent);
    }

    #[test]
    fn verdicts_come_out_in_first_observation_order() {
        let mut tracker = tracker();
        for name in ["C", "A", "B"] {
            tracker.observe(known(name, at(9, 10, 0)));
        }
        let order: Vec<_> = tracker.close().into_iter().map(|v| v.name).collect();
        assert_eq!(order, ["C", "A", "B"]);
    }

    #[test]
    fn duplicate_label_in_one_frame_is_idempotent() {
        // Two faces resolving to the same person at the same instant: the
        // second observation is a plain early re-sighting.
        let mut tracker = tracker();
        assert_matches!(
            tracker.observe(known("A", at(9, 5, 0))),
            Some(PresenceEvent::Entered { .. })
        );
        assert_eq!(tracker.observe(known("A", at(9, 5, 0))), None);
        assert_eq!(tracker.records().len(), 1);
    }

    #[test]
    fn status_renders_the_recorded_words() {
        assert_eq!(Status::Present.to_string(), "Present");
        assert_eq!(Status::Absent.to_string(), "Absent");
    }
}
