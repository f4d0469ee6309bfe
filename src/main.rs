use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use time_humanize::HumanTime;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;

use rollcall::app_dirs::AppDirs;
use rollcall::clock::{Clock, SystemClock};
use rollcall::config::{Config, ConfigStore, FileConfigStore};
use rollcall::history::AttendanceDb;
use rollcall::matcher::NearestMatcher;
use rollcall::recorder::CsvRecorder;
use rollcall::roster::Roster;
use rollcall::runtime::{persist_verdicts, replay_day, run_session, CapturedFrame, StdinSource};
use rollcall::schedule::{day_anchor, generate_sessions};
use rollcall::snapshot::FileSnapshotSink;

/// session attendance tracker driven by face embeddings
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Tracks who is present during scheduled sessions. Frames with face \
embeddings arrive on stdin; someone who reappears after the minimum dwell time is \
marked Present, everyone else seen is marked Absent when the session closes."
)]
pub struct Cli {
    /// minutes someone must stay before a re-sighting marks them present [default: 30]
    #[clap(short = 'm', long)]
    min_duration: Option<i64>,

    /// embedding distance below which a face matches an enrollment [default: 0.4]
    #[clap(short = 't', long)]
    threshold: Option<f32>,

    /// roster file to load instead of the bundled sample
    #[clap(short = 'r', long)]
    roster: Option<PathBuf>,

    /// directory for sheets, snapshots and the history database
    #[clap(long)]
    data_dir: Option<PathBuf>,

    /// branch recorded when a name has no roster entry [default: VLSI]
    #[clap(long)]
    default_branch: Option<String>,

    /// replay a recorded frame log (one JSON frame per line) instead of watching stdin
    #[clap(long)]
    replay: Option<PathBuf>,

    /// day to schedule sessions for, e.g. 2024-01-01 (defaults to today)
    #[clap(long)]
    day: Option<NaiveDate>,

    /// print the day's session windows and exit
    #[clap(long)]
    print_sessions: bool,

    /// print per-person attendance totals from the history database and exit
    #[clap(long)]
    summary: bool,

    /// log verbosity
    #[clap(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

#[derive(Copy, Clone, Debug, ValueEnum, strum_macros::Display)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

impl Cli {
    /// Stored config with this invocation's flags layered on top.
    fn effective_config(&self, stored: Config) -> Config {
        Config {
            min_duration_minutes: self.min_duration.unwrap_or(stored.min_duration_minutes),
            match_threshold: self.threshold.unwrap_or(stored.match_threshold),
            default_branch: self
                .default_branch
                .clone()
                .unwrap_or(stored.default_branch),
            roster: self.roster.clone().or(stored.roster),
            data_dir: self.data_dir.clone().or(stored.data_dir),
        }
    }
}

/// Where this run keeps its sheets, snapshots and history database.
#[derive(Debug, Clone, PartialEq)]
struct DataPaths {
    sheets: PathBuf,
    snapshots: PathBuf,
    db: PathBuf,
}

impl DataPaths {
    fn resolve(data_dir: Option<&Path>) -> Self {
        match data_dir {
            Some(dir) => Self {
                sheets: dir.join("sheets"),
                snapshots: dir.join("snapshots"),
                db: dir.join("attendance.db"),
            },
            None => Self {
                sheets: AppDirs::sheets_dir().unwrap_or_else(|| PathBuf::from("sheets")),
                snapshots: AppDirs::snapshots_dir().unwrap_or_else(|| PathBuf::from("snapshots")),
                db: AppDirs::db_path().unwrap_or_else(|| PathBuf::from("rollcall_attendance.db")),
            },
        }
    }
}

fn read_frame_log(path: &Path) -> Result<Vec<CapturedFrame>, Box<dyn Error>> {
    let file = File::open(path)?;
    let mut frames = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<CapturedFrame>(&line) {
            Ok(frame) => frames.push(frame),
            Err(e) => warn!(?e, "skipping malformed frame"),
        }
    }
    Ok(frames)
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from(cli.log_level))
        .init();

    let config = cli.effective_config(FileConfigStore::new().load());
    let paths = DataPaths::resolve(config.data_dir.as_deref());

    let clock = SystemClock;
    let anchor = match cli.day {
        Some(day) => day
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time of day"),
        None => day_anchor(clock.now()),
    };
    let date = anchor.date();
    let sessions = generate_sessions(anchor);

    if cli.print_sessions {
        for session in &sessions {
            println!("{session}");
        }
        return Ok(());
    }

    if cli.summary {
        let db = AttendanceDb::open(&paths.db)?;
        for person in db.summary()? {
            println!(
                "{}: {} present, {} absent ({:.0}%)",
                person.name,
                person.present,
                person.absent,
                person.presence_rate()
            );
        }
        return Ok(());
    }

    let roster = match &config.roster {
        Some(path) => Roster::from_file(path)?,
        None => Roster::bundled(),
    };
    let matcher = NearestMatcher::new(roster.matcher_entries(), config.match_threshold);
    if matcher.is_empty() {
        warn!("no usable enrollments, every face will be unknown");
    }

    let history = match AttendanceDb::open(&paths.db) {
        Ok(db) => Some(db),
        Err(e) => {
            warn!(?e, "history database unavailable, continuing without it");
            None
        }
    };
    let mut snapshots = FileSnapshotSink::new(paths.snapshots.clone());
    let mut recorder = CsvRecorder::for_day(&paths.sheets, date)?;

    if let Some(log_path) = &cli.replay {
        let frames = read_frame_log(log_path)?;
        info!(frames = frames.len(), date = %date, "replaying recorded frames");

        let outcomes = replay_day(
            frames,
            &sessions,
            config.min_duration(),
            &matcher,
            &mut snapshots,
        );
        for (session, outcome) in outcomes {
            info!(session = %session, verdicts = outcome.verdicts.len(), "session replayed");
            persist_verdicts(
                date,
                &outcome.verdicts,
                &roster,
                &config.default_branch,
                &mut recorder,
                history.as_ref(),
                &mut snapshots,
                outcome.last_image.as_deref(),
            );
        }
        return Ok(());
    }

    info!(
        date = %date,
        sessions = sessions.len(),
        sheet = %recorder.path().display(),
        "watching for presence"
    );
    let mut source = StdinSource::spawn();

    for session in &sessions {
        if clock.now() >= session.end {
            info!(session = %session, "session already over, skipping");
            continue;
        }
        if clock.now() < session.start {
            let wait = session.start - clock.now();
            info!(
                session = %session,
                starts = %HumanTime::from(wait.to_std().unwrap_or_default()),
                "waiting for session start"
            );
            clock.wait_until(session.start);
        }

        info!(session = %session, "session open");
        let outcome = run_session(
            *session,
            config.min_duration(),
            &mut source,
            &matcher,
            &mut snapshots,
            &clock,
        );
        persist_verdicts(
            date,
            &outcome.verdicts,
            &roster,
            &config.default_branch,
            &mut recorder,
            history.as_ref(),
            &mut snapshots,
            outcome.last_image.as_deref(),
        );

        if outcome.interrupted {
            info!("input ended, stopping the watch");
            break;
        }
    }

    info!("done for the day");
    Ok(())
}
