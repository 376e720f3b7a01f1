//! LockCoordinator - タスクごとのファイルロック
//!
//! # ロックファイル
//! - パス: `<locks_dir>/<task_id>`
//! - 中身: 最後に実行を開始した Unix 秒（10 進数のみ）
//! - 初回実行時に作成し、削除しない
//!
//! # 状態遷移
//! ```text
//! Idle → LockAttempted → Running → Released
//!                      ↘ Busy（別プロセスが実行中。エラーではない）
//! ```
//!
//! 排他は `flock(LOCK_EX | LOCK_NB)` のみ。ロックはファイル記述子に紐づくので、
//! ワーカーが落ちても OS が解放する。
//! タイムスタンプは本体を実行する「前」に書く。失敗しても巻き戻さない。

use std::fmt;
use std::fs::{DirBuilder, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tracing::{error, warn};

use crate::domain::{CronError, TaskId};

/// Directory holding one lock file per task id.
#[derive(Debug, Clone)]
pub struct LockDir {
    path: PathBuf,
}

impl LockDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the directory (recursively, mode 0777 before umask) if missing.
    pub fn ensure(&self) -> Result<(), CronError> {
        if self.path.is_dir() {
            return Ok(());
        }
        DirBuilder::new()
            .recursive(true)
            .mode(0o777)
            .create(&self.path)
            .map_err(|source| CronError::LockDir {
                path: self.path.clone(),
                source,
            })
    }

    pub fn lock_path(&self, task_id: &TaskId) -> PathBuf {
        self.path.join(task_id.to_string())
    }

    /// Last recorded run start, read without taking the lock.
    ///
    /// Missing, empty or unparsable files count as "never ran".
    pub fn last_run(&self, task_id: &TaskId) -> Option<i64> {
        let contents = std::fs::read_to_string(self.lock_path(task_id)).ok()?;
        parse_timestamp(&contents)
    }

    /// Try to take the exclusive lock without blocking.
    ///
    /// `Ok(None)` means another process holds it.
    pub fn try_lock(&self, task_id: &TaskId) -> Result<Option<TaskLock>, CronError> {
        let acquisition_error = |source: io::Error| CronError::LockAcquisition {
            task_id: *task_id,
            source,
        };

        // 他プロセスの記録を消さないよう、ロック取得前には truncate しない
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path(task_id))
            .map_err(acquisition_error)?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(file) => Ok(Some(TaskLock {
                task_id: *task_id,
                file: Some(file),
                released: false,
            })),
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => Ok(None),
            Err((_, errno)) => Err(acquisition_error(io::Error::from(errno))),
        }
    }
}

fn parse_timestamp(contents: &str) -> Option<i64> {
    contents.trim().parse().ok()
}

/// Exclusive hold on one task's lock file.
///
/// Release it with [`TaskLock::release`]. A guard dropped without release
/// (early return, unwinding) is treated as a failed run: it is logged and the
/// OS lock is dropped with the file.
pub struct TaskLock {
    task_id: TaskId,
    file: Option<Flock<File>>,
    released: bool,
}

impl TaskLock {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Last recorded run start, read under the lock.
    pub fn last_run(&mut self) -> Option<i64> {
        let file = self.file.as_mut()?;
        let mut contents = String::new();
        file.seek(SeekFrom::Start(0)).ok()?;
        file.read_to_string(&mut contents).ok()?;
        parse_timestamp(&contents)
    }

    /// Overwrite the file with `timestamp`.
    pub fn record_start(&mut self, timestamp: i64) -> io::Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Err(io::Error::other("lock already released"));
        };
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(timestamp.to_string().as_bytes())?;
        file.sync_data()
    }

    /// Unlock and close, then surface the outcome of the run.
    pub fn release(mut self, outcome: Result<(), String>) -> Result<(), CronError> {
        self.released = true;
        self.unlock();
        outcome.map_err(|reason| {
            error!(task_id = %self.task_id, %reason, "cron task has failed");
            CronError::TaskFailed {
                task_id: self.task_id,
                reason,
            }
        })
    }

    fn unlock(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };
        if let Err((_, errno)) = file.unlock() {
            // close でもロックは外れる
            warn!(task_id = %self.task_id, %errno, "explicit unlock failed");
        }
    }
}

impl fmt::Debug for TaskLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskLock")
            .field("task_id", &self.task_id)
            .field("held", &self.file.is_some())
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for TaskLock {
    fn drop(&mut self) {
        if !self.released {
            error!(
                task_id = %self.task_id,
                "cron task has failed: lock released without completion"
            );
        }
        self.unlock();
    }
}
