//! Scheduler - ディスパッチの入口
//!
//! # 2 つのモード
//! - **run-all** (`route = None`): 登録済みタスクごとにワーカープロセスを起動して終わる。
//!   起動したプロセスの結果は観測しない。
//! - **worker** (`route = Some(id)`): 自分が担当する 1 タスクだけを
//!   due 判定 → ロック → 実行する。他のタスクはスキップ。
//!
//! # 実行フロー（worker）
//! 1. ロックなしで最終実行時刻を読み、due でなければ終了（ファイルを作らない）
//! 2. 非ブロッキングの排他ロック。取れなければ Busy（エラーではない）
//! 3. ロック下で再判定（直前に兄弟ワーカーが実行していた場合に備える）
//! 4. 現在時刻を書き込んでから本体を実行
//! 5. 成否に関わらずロックを解放し、失敗なら `CronError::TaskFailed`

use std::any::Any;
use std::ffi::OsString;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::domain::{CronError, Task, TaskId};
use crate::impls::CommandSpawner;
use crate::lock::LockDir;
use crate::ports::{Clock, ProcessSpawner, SpawnRequest, SystemClock};
use crate::registry::TaskRegistry;

/// Literal first argument that routes an invocation to the scheduler.
pub const CRON_COMMAND: &str = "cron";

/// Result of one attempt to run a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The body ran to completion.
    Completed,
    /// Not due yet; nothing was written.
    NotDue,
    /// Another process holds the lock.
    Busy,
}

/// What one dispatch pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub spawned: Vec<TaskId>,
    pub spawn_failed: Vec<TaskId>,
    pub completed: Vec<TaskId>,
    pub not_due: Vec<TaskId>,
    pub busy: Vec<TaskId>,
    /// Tasks passed over because they did not match the route.
    pub skipped: usize,
}

impl DispatchReport {
    fn record(&mut self, task_id: TaskId, outcome: RunOutcome) {
        match outcome {
            RunOutcome::Completed => self.completed.push(task_id),
            RunOutcome::NotDue => self.not_due.push(task_id),
            RunOutcome::Busy => self.busy.push(task_id),
        }
    }
}

pub struct Scheduler {
    registry: Arc<TaskRegistry>,
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    spawner: Arc<dyn ProcessSpawner>,
}

impl Scheduler {
    pub fn new(registry: Arc<TaskRegistry>, config: SchedulerConfig) -> Self {
        Self::from_parts(
            registry,
            config,
            Arc::new(SystemClock),
            Arc::new(CommandSpawner::new()),
        )
    }

    pub(crate) fn from_parts(
        registry: Arc<TaskRegistry>,
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
        spawner: Arc<dyn ProcessSpawner>,
    ) -> Self {
        Self {
            registry,
            config,
            clock,
            spawner,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_spawner(mut self, spawner: impl ProcessSpawner + 'static) -> Self {
        self.spawner = Arc::new(spawner);
        self
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Dispatch pass.
    ///
    /// Without a route every task gets a detached worker process. With a route
    /// only the matching task is evaluated and run in this process.
    pub async fn run(&self, route: Option<&TaskId>, force: bool) -> Result<DispatchReport, CronError> {
        let mut report = DispatchReport::default();
        if self.registry.is_empty() {
            return Ok(report);
        }

        let Some(route) = route else {
            self.spawn_all(force, &mut report)?;
            return Ok(report);
        };

        for task in self.registry.iter() {
            if task.id() != *route {
                report.skipped += 1;
                continue;
            }
            let outcome = self.execute(task, force).await?;
            report.record(task.id(), outcome);
        }

        if report.completed.is_empty() && report.not_due.is_empty() && report.busy.is_empty() {
            debug!(task_id = %route, "no registered task matches the route");
        }
        Ok(report)
    }

    /// Hook for "the current request has been answered": dispatch everything.
    pub async fn after_response(&self) -> Result<DispatchReport, CronError> {
        self.run(None, false).await
    }

    /// Run one task in this process, skipping the spawn step.
    ///
    /// `Ok(None)` when no task with this id is registered.
    pub async fn run_task(&self, task_id: &TaskId, force: bool) -> Result<Option<RunOutcome>, CronError> {
        match self.registry.get(task_id) {
            Some(task) => self.execute(task, force).await.map(Some),
            None => Ok(None),
        }
    }

    /// Command line a worker for `task_id` is started with.
    pub fn spawn_request(&self, task_id: &TaskId, force: bool) -> SpawnRequest {
        let (program, mut args) = match &self.config.worker_executable {
            Some(worker) => (
                worker.clone(),
                vec![self.config.entry_point.clone().into_os_string()],
            ),
            None => (self.config.entry_point.clone(), Vec::new()),
        };
        args.push(OsString::from(CRON_COMMAND));
        args.push(OsString::from(task_id.to_string()));
        args.push(OsString::from(if force { "1" } else { "0" }));

        SpawnRequest {
            program,
            args,
            envs: self.config.to_env(),
        }
    }

    fn spawn_all(&self, force: bool, report: &mut DispatchReport) -> Result<(), CronError> {
        if !self.config.entry_point.is_file() {
            return Err(CronError::EntryPointMissing(self.config.entry_point.clone()));
        }

        for task in self.registry.iter() {
            let request = self.spawn_request(&task.id(), force);
            match self.spawner.spawn_detached(&request) {
                Ok(()) => {
                    debug!(task_id = %task.id(), command = %request.command_line(), "spawned cron worker");
                    report.spawned.push(task.id());
                }
                Err(e) => {
                    warn!(task_id = %task.id(), command = %request.command_line(), error = %e, "failed to spawn cron worker");
                    report.spawn_failed.push(task.id());
                }
            }
        }
        Ok(())
    }

    async fn execute(&self, task: &Task, force: bool) -> Result<RunOutcome, CronError> {
        let task_id = task.id();
        let now = self.clock.now();
        let lock_dir = LockDir::new(&self.config.locks_dir);
        lock_dir.ensure()?;

        if !force && !self.clock.is_due(lock_dir.last_run(&task_id), task.spec()) {
            debug!(task_id = %task_id, schedule = task.schedule(), "cron task is not due");
            return Ok(RunOutcome::NotDue);
        }

        let Some(mut lock) = lock_dir.try_lock(&task_id)? else {
            debug!(task_id = %task_id, "cron task is busy");
            return Ok(RunOutcome::Busy);
        };

        if !force && !self.clock.is_due(lock.last_run(), task.spec()) {
            debug!(task_id = %task_id, schedule = task.schedule(), "cron task ran meanwhile");
            lock.release(Ok(()))?;
            return Ok(RunOutcome::NotDue);
        }

        if let Err(source) = lock.record_start(now.timestamp()) {
            // 本体は実行していないので失敗扱いにはしない
            lock.release(Ok(()))?;
            return Err(CronError::LockAcquisition { task_id, source });
        }

        info!(task_id = %task_id, name = task.name(), schedule = task.schedule(), force, "running cron task");

        // ロックは本体と同じタスクが持つ。呼び出し側の future が drop されても
        // 本体が終わるまで解放されない
        let body = task.clone();
        let supervisor = tokio::spawn(async move {
            // 本体は別タスクで実行して panic も失敗として観測する
            let result = match tokio::spawn(async move { body.invoke().await }).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(join_error) if join_error.is_panic() => {
                    Err(panic_message(&*join_error.into_panic()))
                }
                Err(join_error) => Err(join_error.to_string()),
            };
            lock.release(result)
        });

        match supervisor.await {
            Ok(released) => released?,
            Err(join_error) => {
                return Err(CronError::TaskFailed {
                    task_id,
                    reason: join_error.to_string(),
                });
            }
        }
        info!(task_id = %task_id, name = task.name(), "cron task finished");
        Ok(RunOutcome::Completed)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
