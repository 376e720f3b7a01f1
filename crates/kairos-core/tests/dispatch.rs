//! End-to-end dispatch: spawning process → recorded command line → worker.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use kairos_core::impls::RecordingSpawner;
use kairos_core::lock::LockDir;
use kairos_core::ports::FixedClock;
use kairos_core::typed::CronHandler;
use kairos_core::{
    CronError, HandlerError, Invocation, RunOutcome, Scheduler, SchedulerConfig, TaskId,
    TaskRegistry,
};
use serde_json::{Value, json};

struct Counters {
    cleanup: Arc<AtomicUsize>,
    report: Arc<AtomicUsize>,
}

/// Both the spawning process and the worker register through this, so ids match.
fn register(registry: &mut TaskRegistry) -> Counters {
    let cleanup = Arc::new(AtomicUsize::new(0));
    let report = Arc::new(AtomicUsize::new(0));

    let seen = Arc::clone(&cleanup);
    registry
        .add_fn("5 minutes", "cleanup", vec![json!("/tmp/app")], move |_: &[Value]| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    let seen = Arc::clone(&report);
    registry
        .add_fn("03:00:00", "report", vec![], move |_: &[Value]| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    Counters { cleanup, report }
}

fn config(root: &Path) -> SchedulerConfig {
    let entry_point = root.join("app");
    std::fs::write(&entry_point, "").unwrap();
    SchedulerConfig::new(entry_point).with_locks_dir(root.join("locks"))
}

fn clock() -> FixedClock {
    FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 2, 2, 0, 0).unwrap())
}

#[tokio::test]
async fn spawned_command_lines_drive_workers() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());

    // 起動側: 全タスクについてワーカーを起動するだけ
    let mut registry = TaskRegistry::new();
    let front_counters = register(&mut registry);
    let spawner = RecordingSpawner::new();
    let front = Scheduler::new(Arc::new(registry), config.clone())
        .with_clock(clock())
        .with_spawner(spawner.clone());

    let report = front.after_response().await.unwrap();
    assert_eq!(report.spawned.len(), 2);
    assert_eq!(front_counters.cleanup.load(Ordering::SeqCst), 0);
    assert_eq!(front_counters.report.load(Ordering::SeqCst), 0);

    // ワーカー側: 同じ登録をして、記録されたコマンドラインで起動されたものとして振る舞う
    let mut registry = TaskRegistry::new();
    let worker_counters = register(&mut registry);
    let worker = Scheduler::new(Arc::new(registry), config.clone())
        .with_clock(clock())
        .with_spawner(RecordingSpawner::failing());

    for request in spawner.requests() {
        assert_eq!(request.program, config.entry_point);
        assert!(request.envs.iter().any(|(key, _)| key == "KAIROS_LOCKS_DIR"));

        let args: Vec<String> = request
            .args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        let invocation = Invocation::from_args(&args).unwrap();
        let report = invocation.dispatch(&worker).await.unwrap().unwrap();

        assert_eq!(report.completed.len(), 1);
        assert_eq!(report.skipped, 1);
    }

    assert_eq!(worker_counters.cleanup.load(Ordering::SeqCst), 1);
    assert_eq!(worker_counters.report.load(Ordering::SeqCst), 1);

    let locks = LockDir::new(&config.locks_dir);
    let now = clock_timestamp();
    for task in worker.registry().iter() {
        assert_eq!(locks.last_run(&task.id()), Some(now));
    }
}

fn clock_timestamp() -> i64 {
    Utc.with_ymd_and_hms(2024, 1, 2, 2, 0, 0).unwrap().timestamp()
}

#[tokio::test]
async fn contended_task_is_skipped_without_touching_timestamp() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let mut registry = TaskRegistry::new();
    let counters = register(&mut registry);
    let scheduler = Scheduler::new(Arc::new(registry), config.clone()).with_clock(clock());
    let cleanup_id = scheduler
        .registry()
        .iter()
        .find(|task| task.name() == "cleanup")
        .map(|task| task.id())
        .unwrap();

    // 別プロセスが実行中の状態を再現する
    let locks = LockDir::new(&config.locks_dir);
    locks.ensure().unwrap();
    let mut held = locks.try_lock(&cleanup_id).unwrap().unwrap();
    held.record_start(1).unwrap();

    let outcome = scheduler.run_task(&cleanup_id, false).await.unwrap();
    assert_eq!(outcome, Some(RunOutcome::Busy));
    assert_eq!(counters.cleanup.load(Ordering::SeqCst), 0);
    assert_eq!(locks.last_run(&cleanup_id), Some(1));

    // 強制実行でもロックは越えられない
    let outcome = scheduler.run_task(&cleanup_id, true).await.unwrap();
    assert_eq!(outcome, Some(RunOutcome::Busy));

    held.release(Ok(())).unwrap();
    let outcome = scheduler.run_task(&cleanup_id, false).await.unwrap();
    assert_eq!(outcome, Some(RunOutcome::Completed));
    assert_eq!(counters.cleanup.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn panicking_task_fails_but_frees_the_lock() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let mut registry = TaskRegistry::new();
    let id = registry
        .add_fn("1 hour", "explode", vec![], |_: &[Value]| -> Result<(), HandlerError> {
            panic!("kaboom")
        })
        .unwrap();
    let scheduler = Scheduler::new(Arc::new(registry), config.clone()).with_clock(clock());

    let err = scheduler.run_task(&id, false).await.unwrap_err();
    match &err {
        CronError::TaskFailed { task_id, reason } => {
            assert_eq!(*task_id, id);
            assert!(reason.contains("kaboom"));
        }
        other => panic!("unexpected error: {other}"),
    }

    let locks = LockDir::new(&config.locks_dir);
    assert!(locks.try_lock(&id).unwrap().is_some());

    // 開始時刻は先に記録済みなので、同じ時間枠では再実行されない
    assert_eq!(locks.last_run(&id), Some(clock_timestamp()));
    let outcome = scheduler.run_task(&id, false).await.unwrap();
    assert_eq!(outcome, Some(RunOutcome::NotDue));
}

#[tokio::test]
async fn spawn_failures_are_reported_not_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let mut registry = TaskRegistry::new();
    register(&mut registry);
    let scheduler = Scheduler::new(Arc::new(registry), config(tmp.path()))
        .with_spawner(RecordingSpawner::failing());

    let report = scheduler.run(None, false).await.unwrap();
    assert!(report.spawned.is_empty());
    assert_eq!(report.spawn_failed.len(), 2);
}

#[tokio::test]
async fn unrelated_task_ignores_foreign_lock() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let mut registry = TaskRegistry::new();
    let counters = register(&mut registry);
    let scheduler = Scheduler::new(Arc::new(registry), config.clone()).with_clock(clock());

    let ids: Vec<TaskId> = scheduler.registry().iter().map(|task| task.id()).collect();
    let (locked, free) = (ids[0], ids[1]);

    let locks = LockDir::new(&config.locks_dir);
    locks.ensure().unwrap();
    let held = locks.try_lock(&locked).unwrap().unwrap();

    let report = scheduler.run(Some(&free), false).await.unwrap();
    assert_eq!(report.completed, vec![free]);
    assert_eq!(
        counters.cleanup.load(Ordering::SeqCst) + counters.report.load(Ordering::SeqCst),
        1
    );

    held.release(Ok(())).unwrap();
}

struct SlowTask {
    done: Arc<AtomicUsize>,
}

#[async_trait]
impl CronHandler for SlowTask {
    async fn handle(&self, _args: &[Value]) -> Result<(), HandlerError> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        self.done.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn abandoned_dispatch_keeps_the_lock_until_the_body_ends() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let done = Arc::new(AtomicUsize::new(0));
    let mut registry = TaskRegistry::new();
    let id = registry
        .add_task(
            "1 hour",
            "slow",
            Arc::new(SlowTask {
                done: Arc::clone(&done),
            }),
            vec![],
        )
        .unwrap();
    let scheduler = Scheduler::new(Arc::new(registry), config.clone()).with_clock(clock());

    // 呼び出し側が待つのをやめても本体は走り続ける
    let abandoned = tokio::time::timeout(Duration::from_millis(50), scheduler.run_task(&id, false)).await;
    assert!(abandoned.is_err());

    let locks = LockDir::new(&config.locks_dir);
    assert!(locks.try_lock(&id).unwrap().is_none());
    assert_eq!(done.load(Ordering::SeqCst), 0);

    let freed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(lock) = locks.try_lock(&id).unwrap() {
                return lock;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(done.load(Ordering::SeqCst), 1);
    freed.release(Ok(())).unwrap();
}

#[tokio::test]
async fn empty_route_runs_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let mut registry = TaskRegistry::new();
    let counters = register(&mut registry);
    let scheduler = Scheduler::new(Arc::new(registry), config(tmp.path()))
        .with_clock(clock())
        .with_spawner(RecordingSpawner::failing());

    let invocation = Invocation::from_args(["cron", "", "1"]).unwrap();
    let report = invocation.dispatch(&scheduler).await.unwrap().unwrap();

    assert!(report.spawned.is_empty());
    assert!(report.completed.is_empty());
    assert_eq!(report.skipped, 2);
    assert_eq!(
        counters.cleanup.load(Ordering::SeqCst) + counters.report.load(Ordering::SeqCst),
        0
    );
}
