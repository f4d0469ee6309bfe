use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::io;
use std::path::PathBuf;

/// Side channel for the evidence images that back up the attendance sheet.
///
/// `save_reappearance` fires at the moment a presence check succeeds;
/// `save_final` fires when a session closes someone out as Absent.
pub trait SnapshotSink {
    fn save_reappearance(
        &mut self,
        name: &str,
        entry_time: NaiveDateTime,
        at: NaiveDateTime,
        image: Option<&[u8]>,
    ) -> io::Result<()>;

    fn save_final(
        &mut self,
        name: &str,
        date: NaiveDate,
        entry_time: NaiveDateTime,
        check_time: NaiveDateTime,
        image: Option<&[u8]>,
    ) -> io::Result<()>;
}

pub fn reappear_filename(name: &str, entry_time: NaiveDateTime, at: NaiveDateTime) -> String {
    format!(
        "{}_{}_reappear_{}.jpg",
        name,
        entry_time.format("%H-%M-%S"),
        at.format("%H-%M-%S")
    )
}

pub fn final_filename(
    name: &str,
    date: NaiveDate,
    entry_time: NaiveDateTime,
    check_time: NaiveDateTime,
) -> String {
    format!(
        "{}_{}_{}_to_{}.jpg",
        name,
        date,
        entry_time.format("%H-%M-%S"),
        check_time.format("%H-%M-%S")
    )
}

/// Writes snapshot images into one directory. Frames arrive without an
/// image when the capture side sends embeddings only; those saves are
/// silent no-ops.
pub struct FileSnapshotSink {
    dir: PathBuf,
}

impl FileSnapshotSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn write(&self, filename: String, image: Option<&[u8]>) -> io::Result<()> {
        let Some(bytes) = image else {
            return Ok(());
        };
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(filename), bytes)
    }
}

impl SnapshotSink for FileSnapshotSink {
    fn save_reappearance(
        &mut self,
        name: &str,
        entry_time: NaiveDateTime,
        at: NaiveDateTime,
        image: Option<&[u8]>,
    ) -> io::Result<()> {
        self.write(reappear_filename(name, entry_time, at), image)
    }

    fn save_final(
        &mut self,
        name: &str,
        date: NaiveDate,
        entry_time: NaiveDateTime,
        check_time: NaiveDateTime,
        image: Option<&[u8]>,
    ) -> io::Result<()> {
        self.write(final_filename(name, date, entry_time, check_time), image)
    }
}

/// Records the filenames it was asked to save. Lets tests assert on
/// snapshot behavior without touching the filesystem.
#[derive(Debug, Default)]
pub struct MemorySnapshotSink {
    pub saved: Vec<String>,
}

impl SnapshotSink for MemorySnapshotSink {
    fn save_reappearance(
        &mut self,
        name: &str,
        entry_time: NaiveDateTime,
        at: NaiveDateTime,
        _image: Option<&[u8]>,
    ) -> io::Result<()> {
        self.saved.push(reappear_filename(name, entry_time, at));
        Ok(())
    }

    fn save_final(
        &mut self,
        name: &str,
        date: NaiveDate,
        entry_time: NaiveDateTime,
        check_time: NaiveDateTime,
        _image: Option<&[u8]>,
    ) -> io::Result<()> {
        self.saved
            .push(final_filename(name, date, entry_time, check_time));
        Ok(())
    }
}
