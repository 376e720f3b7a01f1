//! Scheduler configuration.
//!
//! Three process-wide settings: the application entry point, an optional
//! launcher placed in front of it, and the lock directory. Spawned workers
//! receive them through `KAIROS_*` environment variables so both sides agree.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const ENV_ENTRY_POINT: &str = "KAIROS_ENTRY_POINT";
pub const ENV_WORKER: &str = "KAIROS_WORKER";
pub const ENV_LOCKS_DIR: &str = "KAIROS_LOCKS_DIR";

const FALLBACK_ENTRY_POINT: &str = "./kairos";
const LOCKS_DIR_NAME: &str = "cron_locks";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Executable (or script) that accepts `cron <task-id> <force>`.
    pub entry_point: PathBuf,
    /// Launcher for the entry point, e.g. an interpreter. `None` runs the
    /// entry point directly.
    pub worker_executable: Option<PathBuf>,
    pub locks_dir: PathBuf,
}

impl SchedulerConfig {
    /// Config for `entry_point`, with the lock directory next to it.
    pub fn new(entry_point: impl Into<PathBuf>) -> Self {
        let entry_point = entry_point.into();
        let locks_dir = default_locks_dir(&entry_point);
        Self {
            entry_point,
            worker_executable: None,
            locks_dir,
        }
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<PathBuf>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    pub fn with_worker_executable(mut self, worker: impl Into<PathBuf>) -> Self {
        self.worker_executable = Some(worker.into());
        self
    }

    pub fn with_locks_dir(mut self, locks_dir: impl Into<PathBuf>) -> Self {
        self.locks_dir = locks_dir.into();
        self
    }

    /// Defaults overridden by `KAIROS_*` variables of this process.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars_os().filter_map(|(key, value)| {
            key.into_string().ok().map(|key| (key, value))
        }))
    }

    /// Defaults overridden by the given variables. Unknown keys and empty
    /// values are ignored.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, OsString)>,
    {
        let mut entry_point = None;
        let mut worker = None;
        let mut locks_dir = None;
        for (key, value) in vars {
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                ENV_ENTRY_POINT => entry_point = Some(PathBuf::from(value)),
                ENV_WORKER => worker = Some(PathBuf::from(value)),
                ENV_LOCKS_DIR => locks_dir = Some(PathBuf::from(value)),
                _ => {}
            }
        }

        let mut config = match entry_point {
            Some(entry_point) => Self::new(entry_point),
            None => Self::default(),
        };
        config.worker_executable = worker;
        if let Some(locks_dir) = locks_dir {
            config.locks_dir = locks_dir;
        }
        config
    }

    /// Variables that reproduce this config in a child process.
    pub fn to_env(&self) -> Vec<(String, OsString)> {
        let mut vars = vec![
            (ENV_ENTRY_POINT.to_string(), self.entry_point.clone().into_os_string()),
            (ENV_LOCKS_DIR.to_string(), self.locks_dir.clone().into_os_string()),
        ];
        if let Some(worker) = &self.worker_executable {
            vars.push((ENV_WORKER.to_string(), worker.clone().into_os_string()));
        }
        vars
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let entry_point =
            std::env::current_exe().unwrap_or_else(|_| PathBuf::from(FALLBACK_ENTRY_POINT));
        Self::new(entry_point)
    }
}

fn default_locks_dir(entry_point: &Path) -> PathBuf {
    match entry_point.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(LOCKS_DIR_NAME),
        _ => PathBuf::from(LOCKS_DIR_NAME),
    }
}
