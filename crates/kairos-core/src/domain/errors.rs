//! Errors - エラー型と分類
//!
//! # 分類
//! - **ScheduleError**: スケジュール文字列の構文エラー（登録時に検出する）
//! - **RegistryError**: タスク登録時のエラー
//! - **CronError**: ディスパッチ / ロック / 実行時のエラー
//! - **HandlerError**: タスク本体が返すエラー
//!
//! ロック競合（別プロセスが同じタスクを実行中）はエラーではない。
//! `RunOutcome::Busy` として扱う。

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::ids::{ParseTaskIdError, TaskId};

/// ScheduleError はスケジュール文字列の解析エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("schedule is empty")]
    Empty,

    #[error("invalid time of day '{0}': expected HH:MM[:SS]")]
    InvalidTimeOfDay(String),

    #[error("time of day '{0}' is out of range")]
    TimeOutOfRange(String),

    #[error("invalid interval '{0}': expected '<amount> <unit>' pairs")]
    InvalidInterval(String),

    #[error("interval '{0}' is too long to evaluate")]
    IntervalOutOfRange(String),

    #[error("unknown interval unit '{unit}' in '{input}'")]
    UnknownUnit { input: String, unit: String },
}

/// RegistryError は TaskRegistry への登録エラー
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("cannot encode arguments of task '{name}': {source}")]
    EncodeArgs {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// CronError はディスパッチ時のエラー
#[derive(Debug, Error)]
pub enum CronError {
    #[error("entry point not found: {}", .0.display())]
    EntryPointMissing(PathBuf),

    #[error(transparent)]
    InvalidTaskId(#[from] ParseTaskIdError),

    #[error("cannot create lock directory {}: {source}", path.display())]
    LockDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot lock cron task {task_id}: {source}")]
    LockAcquisition {
        task_id: TaskId,
        #[source]
        source: io::Error,
    },

    #[error("cron task {task_id} has failed: {reason}")]
    TaskFailed { task_id: TaskId, reason: String },
}

impl CronError {
    /// Configuration errors abort the whole dispatch, not just one task.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::EntryPointMissing(_) | Self::InvalidTaskId(_))
    }
}

/// Error returned by a task body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}
