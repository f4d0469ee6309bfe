use crate::tracker::Verdict;
use chrono::NaiveDate;
use std::error::Error;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const HEADER: [&str; 6] = ["Name", "Date", "Entry Time", "Check Time", "Status", "Branch"];

/// Destination for finalized verdicts. One row per person per session.
pub trait AttendanceSink {
    fn record(&mut self, verdict: &Verdict, branch: &str) -> Result<(), Box<dyn Error>>;
}

/// Appends verdicts to `<dir>/<YYYY-MM-DD>.csv`, one file per day.
///
/// The header row is written only when the file is empty, so restarting the
/// tool mid-day keeps appending to the same sheet without repeating it.
pub struct CsvRecorder {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl CsvRecorder {
    pub fn for_day(dir: &Path, date: NaiveDate) -> csv::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{date}.csv"));

        let file = OpenOptions::new().append(true).create(true).open(&path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer.write_record(HEADER)?;
            writer.flush()?;
        }

        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AttendanceSink for CsvRecorder {
    fn record(&mut self, verdict: &Verdict, branch: &str) -> Result<(), Box<dyn Error>> {
        // The Date column belongs to the verdict, not the sheet: it is the
        // day of the entry observation.
        self.writer.write_record([
            verdict.name.as_str(),
            &verdict.entry_time.date().to_string(),
            &verdict.entry_time.format("%H:%M:%S").to_string(),
            &verdict.check_time.format("%H:%M:%S").to_string(),
            &verdict.status.to_string(),
            branch,
        ])?;
        // Flush per row so a crash mid-day loses nothing already decided.
        self.writer.flush()?;
        Ok(())
    }
}
