// Replays a recorded day end to end: frames are grouped into the day's
// sessions, tracked per session, and the verdicts land in the sheet and
// the history database.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use rollcall::history::AttendanceDb;
use rollcall::matcher::NearestMatcher;
use rollcall::recorder::CsvRecorder;
use rollcall::roster::Roster;
use rollcall::runtime::{persist_verdicts, replay_day, CapturedFrame};
use rollcall::schedule::generate_sessions;
use rollcall::snapshot::MemorySnapshotSink;
use rollcall::tracker::Status;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    day().and_hms_opt(h, m, s).unwrap()
}

fn frame(at: NaiveDateTime, faces: Vec<Vec<f32>>) -> CapturedFrame {
    CapturedFrame {
        at: Some(at),
        faces,
        image: None,
    }
}

fn asha() -> Vec<f32> {
    vec![1.0, 0.0, 0.0, 0.0]
}

fn ravi() -> Vec<f32> {
    vec![0.0, 1.0, 0.0, 0.0]
}

fn meera() -> Vec<f32> {
    vec![0.0, 0.0, 1.0, 0.0]
}

#[test]
fn replay_produces_per_session_verdicts() {
    let sessions = generate_sessions(day().and_hms_opt(0, 0, 0).unwrap());
    let matcher = NearestMatcher::new(Roster::bundled().matcher_entries(), 0.4);

    let frames = vec![
        // Before the day starts: dropped.
        frame(at(8, 30, 0), vec![asha()]),
        // First session: Asha reappears, Meera does not.
        frame(at(9, 5, 0), vec![asha(), meera()]),
        frame(at(9, 40, 0), vec![asha()]),
        // Second session (10:10-11:10): Ravi reappears.
        frame(at(10, 15, 0), vec![ravi()]),
        frame(at(10, 50, 0), vec![ravi()]),
        // No timestamp: dropped in replay.
        CapturedFrame {
            at: None,
            faces: vec![asha()],
            image: None,
        },
    ];

    let mut snapshots = MemorySnapshotSink::default();
    let outcomes = replay_day(
        frames,
        &sessions,
        Duration::minutes(30),
        &matcher,
        &mut snapshots,
    );

    // Only the two sessions that actually had frames.
    assert_eq!(outcomes.len(), 2);

    let (first, first_outcome) = &outcomes[0];
    assert_eq!(first.start, at(9, 0, 0));
    assert_eq!(first_outcome.verdicts.len(), 2);
    assert_eq!(first_outcome.verdicts[0].name, "Asha Rao");
    assert_eq!(first_outcome.verdicts[0].status, Status::Present);
    assert_eq!(first_outcome.verdicts[1].name, "Meera Pillai");
    assert_eq!(first_outcome.verdicts[1].status, Status::Absent);
    // Absent check time is that session's end, not the day's.
    assert_eq!(first_outcome.verdicts[1].check_time, at(10, 10, 0));

    let (second, second_outcome) = &outcomes[1];
    assert_eq!(second.start, at(10, 10, 0));
    assert_eq!(second_outcome.verdicts.len(), 1);
    assert_eq!(second_outcome.verdicts[0].name, "Ravi Iyer");
    assert_eq!(second_outcome.verdicts[0].status, Status::Present);
    assert_eq!(second_outcome.verdicts[0].check_time, at(10, 50, 0));
}

#[test]
fn replay_handles_out_of_order_frames() {
    let sessions = generate_sessions(day().and_hms_opt(0, 0, 0).unwrap());
    let matcher = NearestMatcher::new(Roster::bundled().matcher_entries(), 0.4);

    // Same session, delivered reversed. Entry must still be 09:05.
    let frames = vec![
        frame(at(9, 40, 0), vec![asha()]),
        frame(at(9, 5, 0), vec![asha()]),
    ];

    let mut snapshots = MemorySnapshotSink::default();
    let outcomes = replay_day(
        frames,
        &sessions,
        Duration::minutes(30),
        &matcher,
        &mut snapshots,
    );

    assert_eq!(outcomes.len(), 1);
    let verdicts = &outcomes[0].1.verdicts;
    assert_eq!(verdicts[0].entry_time, at(9, 5, 0));
    assert_eq!(verdicts[0].status, Status::Present);
    assert_eq!(verdicts[0].check_time, at(9, 40, 0));
}

#[test]
fn replayed_day_lands_in_sheet_and_history() {
    let sessions = generate_sessions(day().and_hms_opt(0, 0, 0).unwrap());
    let matcher = NearestMatcher::new(Roster::bundled().matcher_entries(), 0.4);
    let roster = Roster::bundled();

    let frames = vec![
        frame(at(9, 5, 0), vec![asha()]),
        frame(at(9, 40, 0), vec![asha()]),
        frame(at(10, 15, 0), vec![ravi()]),
    ];

    let mut snapshots = MemorySnapshotSink::default();
    let outcomes = replay_day(
        frames,
        &sessions,
        Duration::minutes(30),
        &matcher,
        &mut snapshots,
    );

    let dir = tempfile::tempdir().unwrap();
    let mut recorder = CsvRecorder::for_day(dir.path(), day()).unwrap();
    let history = AttendanceDb::open_in_memory().unwrap();

    for (_, outcome) in &outcomes {
        persist_verdicts(
            day(),
            &outcome.verdicts,
            &roster,
            "VLSI",
            &mut recorder,
            Some(&history),
            &mut snapshots,
            outcome.last_image.as_deref(),
        );
    }

    let sheet = std::fs::read_to_string(recorder.path()).unwrap();
    assert_eq!(sheet.lines().count(), 3); // header + two verdicts

    let summary = history.summary().unwrap();
    assert_eq!(summary.len(), 2);
    assert_eq!(summary[0].name, "Asha Rao");
    assert_eq!(summary[0].present, 1);
    assert_eq!(summary[1].name, "Ravi Iyer");
    assert_eq!(summary[1].absent, 1);
}
