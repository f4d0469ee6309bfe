// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod history;
pub mod matcher;
pub mod recorder;
pub mod roster;
pub mod runtime;
pub mod schedule;
pub mod snapshot;
pub mod tracker;

/// Poll interval for the session loop when no frames are arriving.
pub const TICK_RATE_MS: u64 = 250;
