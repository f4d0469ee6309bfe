use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// State root under $HOME/.local/state/rollcall, with a
    /// platform-specific fallback when HOME is unset.
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("rollcall"),
            )
        } else {
            ProjectDirs::from("", "", "rollcall")
                .map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("attendance.db"))
    }

    pub fn sheets_dir() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("sheets"))
    }

    pub fn snapshots_dir() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("snapshots"))
    }
}
