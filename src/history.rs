use crate::app_dirs::AppDirs;
use crate::tracker::{Status, Verdict};
use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection, Result};
use std::path::{Path, PathBuf};

/// One attendance verdict as stored in the history database.
#[derive(Debug, Clone)]
pub struct AttendanceRow {
    pub name: String,
    pub date: NaiveDate,
    pub entry_time: NaiveTime,
    pub check_time: NaiveTime,
    pub status: Status,
    pub branch: String,
}

/// Per-person totals across every recorded day.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonSummary {
    pub name: String,
    pub present: i64,
    pub absent: i64,
}

impl PersonSummary {
    pub fn sessions(&self) -> i64 {
        self.present + self.absent
    }

    /// Share of sessions marked Present, as a percentage.
    pub fn presence_rate(&self) -> f64 {
        if self.sessions() == 0 {
            0.0
        } else {
            (self.present as f64 / self.sessions() as f64) * 100.0
        }
    }
}

/// Database manager for the attendance history
#[derive(Debug)]
pub struct AttendanceDb {
    conn: Connection,
}

impl AttendanceDb {
    /// Open the database in its default location and create tables if needed
    pub fn new() -> Result<Self> {
        let db_path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("rollcall_attendance.db"));
        Self::open(&db_path)
    }

    pub fn open(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }

        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS attendance (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                date TEXT NOT NULL,
                entry_time TEXT NOT NULL,
                check_time TEXT NOT NULL,
                status TEXT NOT NULL,
                branch TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_attendance_name ON attendance(name)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(date)",
            [],
        )?;

        Ok(AttendanceDb { conn })
    }

    /// Record one finalized verdict
    pub fn record_verdict(&self, date: NaiveDate, verdict: &Verdict, branch: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO attendance
            (name, date, entry_time, check_time, status, branch)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                verdict.name,
                date.to_string(),
                verdict.entry_time.format("%H:%M:%S").to_string(),
                verdict.check_time.format("%H:%M:%S").to_string(),
                verdict.status.to_string(),
                branch,
            ],
        )?;

        Ok(())
    }

    /// All verdicts recorded for one day, in insertion order
    pub fn rows_for_day(&self, date: NaiveDate) -> Result<Vec<AttendanceRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT name, date, entry_time, check_time, status, branch
            FROM attendance
            WHERE date = ?1
            ORDER BY id
            "#,
        )?;

        let row_iter = stmt.query_map([date.to_string()], |row| {
            let date_str: String = row.get(1)?;
            let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|_| {
                rusqlite::Error::InvalidColumnType(1, "date".to_string(), rusqlite::types::Type::Text)
            })?;
            let entry_str: String = row.get(2)?;
            let entry_time = NaiveTime::parse_from_str(&entry_str, "%H:%M:%S").map_err(|_| {
                rusqlite::Error::InvalidColumnType(
                    2,
                    "entry_time".to_string(),
                    rusqlite::types::Type::Text,
                )
            })?;
            let check_str: String = row.get(3)?;
            let check_time = NaiveTime::parse_from_str(&check_str, "%H:%M:%S").map_err(|_| {
                rusqlite::Error::InvalidColumnType(
                    3,
                    "check_time".to_string(),
                    rusqlite::types::Type::Text,
                )
            })?;
            let status_str: String = row.get(4)?;
            let status = match status_str.as_str() {
                "Present" => Status::Present,
                "Absent" => Status::Absent,
                _ => {
                    return Err(rusqlite::Error::InvalidColumnType(
                        4,
                        "status".to_string(),
                        rusqlite::types::Type::Text,
                    ))
                }
            };

            Ok(AttendanceRow {
                name: row.get(0)?,
                date,
                entry_time,
                check_time,
                status,
                branch: row.get(5)?,
            })
        })?;

        let mut rows = Vec::new();
        for row in row_iter {
            rows.push(row?);
        }

        Ok(rows)
    }

    /// Per-person presence totals across all recorded days
    pub fn summary(&self) -> Result<Vec<PersonSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                name,
                SUM(CASE WHEN status = 'Present' THEN 1 ELSE 0 END) as present,
                SUM(CASE WHEN status = 'Absent' THEN 1 ELSE 0 END) as absent
            FROM attendance
            GROUP BY name
            ORDER BY name
            "#,
        )?;

        let summary_iter = stmt.query_map([], |row| {
            Ok(PersonSummary {
                name: row.get(0)?,
                present: row.get(1)?,
                absent: row.get(2)?,
            })
        })?;

        let mut summary = Vec::new();
        for item in summary_iter {
            summary.push(item?);
        }

        Ok(summary)
    }
}
