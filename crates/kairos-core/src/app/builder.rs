//! SchedulerBuilder - Scheduler の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::sync::Arc;

use serde_json::Value;

use super::scheduler::Scheduler;
use crate::config::SchedulerConfig;
use crate::domain::errors::{HandlerError, RegistryError};
use crate::impls::CommandSpawner;
use crate::ports::{Clock, ProcessSpawner, SystemClock};
use crate::registry::TaskRegistry;
use crate::typed::{Handler, Job};

/// SchedulerBuilder はタスク登録と設定をまとめて Scheduler を生成
///
/// # 使用例
/// ```ignore
/// let scheduler = SchedulerBuilder::new(SchedulerConfig::from_env())
///     .register("03:00:00", RotateLogsHandler, RotateLogs { keep: 7 })?
///     .add_fn("5 minutes", "heartbeat", vec![], |_| Ok(()))?
///     .expect_tasks(&["ops.rotate_logs", "heartbeat"])
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - スケジュール文字列は登録時に検証（RegistryError）
/// - expect_tasks() で期待されるタスク名を設定
/// - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
pub struct SchedulerBuilder {
    registry: TaskRegistry,
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    spawner: Arc<dyn ProcessSpawner>,
    expected_tasks: Option<Vec<String>>,
}

/// BuildError は Scheduler 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing cron tasks: {0:?}. These tasks were expected but not registered.")]
    MissingTasks(Vec<String>),
}

impl SchedulerBuilder {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            registry: TaskRegistry::new(),
            config,
            clock: Arc::new(SystemClock),
            spawner: Arc::new(CommandSpawner::new()),
            expected_tasks: None,
        }
    }

    /// 型付き Handler を登録
    pub fn register<J: Job, H: Handler<J> + 'static>(
        mut self,
        schedule: &str,
        handler: H,
        job: J,
    ) -> Result<Self, RegistryError> {
        self.registry.register(schedule, handler, job)?;
        Ok(self)
    }

    /// クロージャを登録
    pub fn add_fn<F>(
        mut self,
        schedule: &str,
        name: &str,
        args: Vec<Value>,
        f: F,
    ) -> Result<Self, RegistryError>
    where
        F: Fn(&[Value]) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.registry.add_fn(schedule, name, args, f)?;
        Ok(self)
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn spawner(mut self, spawner: impl ProcessSpawner + 'static) -> Self {
        self.spawner = Arc::new(spawner);
        self
    }

    /// 期待されるタスク名のリストを設定
    pub fn expect_tasks(mut self, names: &[&str]) -> Self {
        self.expected_tasks = Some(names.iter().map(|name| name.to_string()).collect());
        self
    }

    /// Scheduler を生成
    ///
    /// # 検証
    /// - expect_tasks() で設定された名前が全て登録されているかチェック
    /// - 不足があれば BuildError::MissingTasks を返す
    pub fn build(self) -> Result<Scheduler, BuildError> {
        if let Some(expected_tasks) = &self.expected_tasks {
            let registered = self.registry.task_names();
            let missing: Vec<String> = expected_tasks
                .iter()
                .filter(|name| !registered.contains(name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingTasks(missing));
            }
        }

        Ok(Scheduler::from_parts(
            Arc::new(self.registry),
            self.config,
            self.clock,
            self.spawner,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::RecordingSpawner;

    fn noop(_: &[Value]) -> Result<(), HandlerError> {
        Ok(())
    }

    #[test]
    fn test_build_success() {
        let scheduler = SchedulerBuilder::new(SchedulerConfig::new("/srv/app/kairos"))
            .add_fn("5 minutes", "heartbeat", vec![], noop)
            .unwrap()
            .expect_tasks(&["heartbeat"])
            .build();
        assert!(scheduler.is_ok());
        assert_eq!(scheduler.unwrap().registry().len(), 1);
    }

    #[test]
    fn test_build_missing_tasks() {
        let scheduler = SchedulerBuilder::new(SchedulerConfig::new("/srv/app/kairos"))
            .add_fn("5 minutes", "heartbeat", vec![], noop)
            .unwrap()
            .expect_tasks(&["heartbeat", "rotate_logs"])
            .build();
        assert!(matches!(
            scheduler,
            Err(BuildError::MissingTasks(missing)) if missing == vec!["rotate_logs".to_string()]
        ));
    }

    #[test]
    fn test_build_rejects_bad_schedule_early() {
        let result = SchedulerBuilder::new(SchedulerConfig::new("/srv/app/kairos"))
            .add_fn("25:00", "heartbeat", vec![], noop);
        assert!(matches!(result, Err(RegistryError::Schedule(_))));
    }

    #[tokio::test]
    async fn test_build_wires_spawner() {
        let tmp = tempfile::tempdir().unwrap();
        let entry_point = tmp.path().join("kairos");
        std::fs::write(&entry_point, "").unwrap();

        let spawner = RecordingSpawner::new();
        let scheduler = SchedulerBuilder::new(SchedulerConfig::new(&entry_point))
            .add_fn("5 minutes", "heartbeat", vec![], noop)
            .unwrap()
            .spawner(spawner.clone())
            .build()
            .unwrap();

        let report = scheduler.after_response().await.unwrap();
        assert_eq!(report.spawned.len(), 1);
        assert_eq!(spawner.requests().len(), 1);
    }
}
