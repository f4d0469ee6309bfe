use chrono::Duration;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MIN_DURATION_MINUTES: i64 = 30;
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.4;
pub const DEFAULT_BRANCH: &str = "VLSI";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Minutes someone must stay before a re-sighting counts as presence.
    pub min_duration_minutes: i64,
    /// Embedding distance below which a face matches an enrollment.
    pub match_threshold: f32,
    /// Branch written for verdicts whose name has no roster entry.
    pub default_branch: String,
    /// Roster file to load instead of the bundled sample.
    pub roster: Option<PathBuf>,
    /// Where sheets, snapshots and the history database live.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_duration_minutes: DEFAULT_MIN_DURATION_MINUTES,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            default_branch: DEFAULT_BRANCH.to_string(),
            roster: None,
            data_dir: None,
        }
    }
}

impl Config {
    pub fn min_duration(&self) -> Duration {
        Duration::minutes(self.min_duration_minutes)
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "rollcall") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("rollcall_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg;
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            min_duration_minutes: 45,
            match_threshold: 0.35,
            default_branch: "CSE".into(),
            roster: Some(PathBuf::from("/etc/rollcall/roster.json")),
            data_dir: Some(PathBuf::from("/var/lib/rollcall")),
        };
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn missing_or_garbled_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let store = FileConfigStore::with_path(&path);
        assert_eq!(store.load(), Config::default());

        fs::write(&path, b"not json at all").unwrap();
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn min_duration_converts_minutes() {
        let cfg = Config::default();
        assert_eq!(cfg.min_duration(), Duration::minutes(30));
    }
}
