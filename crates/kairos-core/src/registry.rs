//! TaskRegistry - タスクの登録と管理
//!
//! # 学習ポイント
//! - HashMap での型消去された trait object の管理
//! - Generic methods での登録と型安全性
//! - Arc による共有所有権
//!
//! # 設計
//! - 起動時に構築（mutable）
//! - ディスパッチ時は `Arc<TaskRegistry>` として共有（immutable）
//! - 同じ (schedule, name, args) の再登録は同じ TaskId になり、後勝ちで上書き

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::domain::errors::{HandlerError, RegistryError};
use crate::domain::{Task, TaskId};
use crate::typed::{CronHandler, FnHandler, Handler, Job, TypedHandler};

/// TaskRegistry は TaskId → Task の対応を保持
///
/// # 使用例
/// ```ignore
/// let mut registry = TaskRegistry::new();
/// registry.register("03:00:00", RotateLogsHandler, RotateLogs { keep: 7 })?;
/// registry.add_fn("5 minutes", "heartbeat", vec![], |_| Ok(()))?;
///
/// let scheduler = Scheduler::new(Arc::new(registry), config);
/// ```
#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<TaskId, Task>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }

    /// Register a task body under a stable name.
    ///
    /// The schedule is validated here; a malformed schedule never reaches dispatch.
    pub fn add_task(
        &mut self,
        schedule: &str,
        name: &str,
        handler: Arc<dyn CronHandler>,
        args: Vec<Value>,
    ) -> Result<TaskId, RegistryError> {
        let task = Task::new(schedule, name, handler, args)?;
        let id = task.id();
        if self.tasks.insert(id, task).is_some() {
            debug!(task_id = %id, name, "replaced identical cron task registration");
        }
        Ok(id)
    }

    /// Register a synchronous closure.
    pub fn add_fn<F>(
        &mut self,
        schedule: &str,
        name: &str,
        args: Vec<Value>,
        f: F,
    ) -> Result<TaskId, RegistryError>
    where
        F: Fn(&[Value]) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.add_task(schedule, name, Arc::new(FnHandler::new(f)), args)
    }

    /// Register a typed handler. `job` becomes the single bound argument.
    pub fn register<J: Job, H: Handler<J> + 'static>(
        &mut self,
        schedule: &str,
        handler: H,
        job: J,
    ) -> Result<TaskId, RegistryError> {
        let payload = serde_json::to_value(&job).map_err(|source| RegistryError::EncodeArgs {
            name: J::NAME.to_string(),
            source,
        })?;
        let typed_handler = TypedHandler::<J, H>::new(handler);
        self.add_task(schedule, J::NAME, Arc::new(typed_handler), vec![payload])
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// All registered tasks. Iteration order carries no meaning.
    pub fn tasks(&self) -> &HashMap<TaskId, Task> {
        &self.tasks
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn task_names(&self) -> Vec<String> {
        self.tasks.values().map(|task| task.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}
