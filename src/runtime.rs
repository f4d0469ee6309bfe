use std::collections::{HashMap, VecDeque};
use std::io::{self, BufRead};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{Clock, ManualClock};
use crate::history::AttendanceDb;
use crate::matcher::Classifier;
use crate::recorder::AttendanceSink;
use crate::roster::Roster;
use crate::schedule::Session;
use crate::snapshot::SnapshotSink;
use crate::tracker::{Observation, PresenceEvent, PresenceTracker, Status, Verdict};

/// One capture from the camera pipeline: an embedding per detected face,
/// optionally the encoded frame image for snapshots. `at` is filled from
/// the clock when the producer leaves it out.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CapturedFrame {
    #[serde(default)]
    pub at: Option<NaiveDateTime>,
    pub faces: Vec<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Vec<u8>>,
}

/// Unified event type consumed by the session loop
#[derive(Clone, Debug)]
pub enum WatchEvent {
    Frame(CapturedFrame),
    Interrupt,
    Tick,
}

/// Source of capture events (frames, stream end, etc.)
pub trait FrameSource {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&mut self, timeout: Duration) -> Result<WatchEvent, RecvTimeoutError>;
}

/// Production frame source reading JSON frames from stdin, one per line.
/// An upstream capture process pipes embeddings in; EOF ends the watch.
pub struct StdinSource {
    rx: Receiver<WatchEvent>,
}

impl StdinSource {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(_) => break,
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<CapturedFrame>(&line) {
                    Ok(frame) => {
                        if tx.send(WatchEvent::Frame(frame)).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(?e, "skipping malformed frame"),
                }
            }
        });

        Self { rx }
    }
}

impl FrameSource for StdinSource {
    fn recv_timeout(&mut self, timeout: Duration) -> Result<WatchEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Channel-backed frame source; whatever owns the sender drives the loop.
pub struct ChannelSource {
    rx: Receiver<WatchEvent>,
}

impl ChannelSource {
    pub fn new(rx: Receiver<WatchEvent>) -> Self {
        Self { rx }
    }
}

impl FrameSource for ChannelSource {
    fn recv_timeout(&mut self, timeout: Duration) -> Result<WatchEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Scripted frame source for tests. Each queued event can move the shared
/// manual clock first, so frame timestamps and the loop's idea of "now"
/// advance in lockstep. A drained script reads as a disconnect.
pub struct ScriptedSource {
    clock: Rc<ManualClock>,
    script: VecDeque<(Option<NaiveDateTime>, WatchEvent)>,
}

impl ScriptedSource {
    pub fn new(clock: Rc<ManualClock>) -> Self {
        Self {
            clock,
            script: VecDeque::new(),
        }
    }

    pub fn frame(&mut self, at: NaiveDateTime, faces: Vec<Vec<f32>>) {
        self.push_frame(CapturedFrame {
            at: Some(at),
            faces,
            image: None,
        });
    }

    pub fn frame_with_image(&mut self, at: NaiveDateTime, faces: Vec<Vec<f32>>, image: Vec<u8>) {
        self.push_frame(CapturedFrame {
            at: Some(at),
            faces,
            image: Some(image),
        });
    }

    pub fn push_frame(&mut self, frame: CapturedFrame) {
        self.script.push_back((frame.at, WatchEvent::Frame(frame)));
    }

    pub fn tick(&mut self, at: NaiveDateTime) {
        self.script.push_back((Some(at), WatchEvent::Tick));
    }

    pub fn interrupt(&mut self) {
        self.script.push_back((None, WatchEvent::Interrupt));
    }
}

impl FrameSource for ScriptedSource {
    fn recv_timeout(&mut self, _timeout: Duration) -> Result<WatchEvent, RecvTimeoutError> {
        match self.script.pop_front() {
            Some((set_clock, event)) => {
                if let Some(t) = set_clock {
                    self.clock.set(t);
                }
                Ok(event)
            }
            None => Err(RecvTimeoutError::Disconnected),
        }
    }
}

/// What one tracked session produced.
#[derive(Debug)]
pub struct SessionOutcome {
    pub verdicts: Vec<Verdict>,
    /// True when the source ended before the session did.
    pub interrupted: bool,
    /// Most recent frame image seen inside the session, for final snapshots.
    pub last_image: Option<Vec<u8>>,
}

/// Track one session to its end (or until the source goes away) and return
/// the finalized verdicts.
pub fn run_session(
    session: Session,
    min_duration: chrono::Duration,
    source: &mut dyn FrameSource,
    classifier: &dyn Classifier,
    snapshots: &mut dyn SnapshotSink,
    clock: &dyn Clock,
) -> SessionOutcome {
    let mut tracker = PresenceTracker::new(session, min_duration);
    let mut last_image: Option<Vec<u8>> = None;
    let mut interrupted = false;

    loop {
        if clock.now() >= session.end {
            break;
        }

        let event = match source.recv_timeout(Duration::from_millis(crate::TICK_RATE_MS)) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => WatchEvent::Tick,
            Err(RecvTimeoutError::Disconnected) => WatchEvent::Interrupt,
        };

        match event {
            WatchEvent::Frame(frame) => {
                process_frame(
                    frame,
                    &mut tracker,
                    classifier,
                    snapshots,
                    clock,
                    &mut last_image,
                );
            }
            WatchEvent::Tick => {}
            WatchEvent::Interrupt => {
                info!(session = %session, "source ended, closing session early");
                interrupted = true;
                break;
            }
        }
    }

    SessionOutcome {
        verdicts: tracker.close(),
        interrupted,
        last_image,
    }
}

fn process_frame(
    frame: CapturedFrame,
    tracker: &mut PresenceTracker,
    classifier: &dyn Classifier,
    snapshots: &mut dyn SnapshotSink,
    clock: &dyn Clock,
    last_image: &mut Option<Vec<u8>>,
) {
    let at = frame.at.unwrap_or_else(|| clock.now());
    if !tracker.session().contains(at) {
        debug!(at = %at, "frame outside the session window, dropped");
        return;
    }

    if let Some(image) = frame.image {
        *last_image = Some(image);
    }

    for face in &frame.faces {
        let who = classifier.resolve(face);
        match tracker.observe(Observation { who, at }) {
            Some(PresenceEvent::Entered { name, at }) => {
                info!(name = %name, at = %at.format("%H:%M:%S"), "entered");
            }
            Some(PresenceEvent::Reappeared {
                name,
                entry_time,
                at,
            }) => {
                info!(name = %name, at = %at.format("%H:%M:%S"), "presence confirmed");
                if let Err(e) =
                    snapshots.save_reappearance(&name, entry_time, at, last_image.as_deref())
                {
                    warn!(?e, "reappearance snapshot failed");
                }
            }
            None => {}
        }
    }
}

/// Write one session's verdicts to every sink: sheet row, history row and,
/// for Absent calls, the final snapshot. Sink failures are logged; the
/// remaining verdicts still land.
pub fn persist_verdicts(
    date: NaiveDate,
    verdicts: &[Verdict],
    roster: &Roster,
    default_branch: &str,
    recorder: &mut dyn AttendanceSink,
    history: Option<&AttendanceDb>,
    snapshots: &mut dyn SnapshotSink,
    last_image: Option<&[u8]>,
) {
    for verdict in verdicts {
        let branch = roster.branch_of(&verdict.name).unwrap_or(default_branch);
        info!(
            name = %verdict.name,
            status = %verdict.status,
            check = %verdict.check_time.format("%H:%M:%S"),
            "verdict"
        );

        if let Err(e) = recorder.record(verdict, branch) {
            warn!(?e, name = %verdict.name, "verdict not written to sheet");
        }

        if let Some(db) = history {
            if let Err(e) = db.record_verdict(date, verdict, branch) {
                warn!(?e, name = %verdict.name, "verdict not written to history");
            }
        }

        if verdict.status == Status::Absent {
            if let Err(e) = snapshots.save_final(
                &verdict.name,
                date,
                verdict.entry_time,
                verdict.check_time,
                last_image,
            ) {
                warn!(?e, name = %verdict.name, "final snapshot failed");
            }
        }
    }
}

/// Re-run a recorded day. Frames are grouped into the day's sessions by
/// timestamp and each session is tracked exactly as it would have been
/// live. Sessions with no frames are skipped; frames without a timestamp
/// or outside every window are dropped.
pub fn replay_day(
    frames: Vec<CapturedFrame>,
    sessions: &[Session],
    min_duration: chrono::Duration,
    classifier: &dyn Classifier,
    snapshots: &mut dyn SnapshotSink,
) -> Vec<(Session, SessionOutcome)> {
    let mut grouped: HashMap<usize, Vec<CapturedFrame>> = frames
        .into_iter()
        .filter_map(|frame| match frame.at {
            None => {
                warn!("replay frame without a timestamp, dropped");
                None
            }
            Some(at) => match sessions.iter().position(|s| s.contains(at)) {
                Some(idx) => Some((idx, frame)),
                None => {
                    warn!(at = %at, "frame outside every session, dropped");
                    None
                }
            },
        })
        .into_group_map();

    let mut results = Vec::new();
    for (idx, session) in sessions.iter().enumerate() {
        let Some(mut session_frames) = grouped.remove(&idx) else {
            continue;
        };
        session_frames.sort_by_key(|f| f.at);

        let mut tracker = PresenceTracker::new(*session, min_duration);
        let clock = ManualClock::new(session.start);
        let mut last_image = None;
        for frame in session_frames {
            if let Some(at) = frame.at {
                clock.set(at);
            }
            process_frame(
                frame,
                &mut tracker,
                classifier,
                snapshots,
                &clock,
                &mut last_image,
            );
        }

        results.push((
            *session,
            SessionOutcome {
                verdicts: tracker.close(),
                interrupted: false,
                last_image,
            },
        ));
    }

    results
}
