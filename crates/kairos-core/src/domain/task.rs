use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::errors::{HandlerError, ScheduleError};
use super::ids::TaskId;
use super::schedule::ScheduleSpec;
use crate::typed::CronHandler;

/// A registered periodic task.
///
/// Held for the lifetime of the process and never persisted. Every process
/// (the spawning one and the worker) registers the same tasks, so ids match.
#[derive(Clone)]
pub struct Task {
    id: TaskId,
    schedule: String,
    spec: ScheduleSpec,
    name: String,
    handler: Arc<dyn CronHandler>,
    args: Vec<Value>,
}

impl Task {
    pub fn new(
        schedule: &str,
        name: &str,
        handler: Arc<dyn CronHandler>,
        args: Vec<Value>,
    ) -> Result<Self, ScheduleError> {
        let spec = ScheduleSpec::parse(schedule)?;
        let schedule = schedule.trim().to_string();
        let id = TaskId::derive(&schedule, name, &args);
        Ok(Self {
            id,
            schedule,
            spec,
            name: name.to_string(),
            handler,
            args,
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The schedule text as registered.
    pub fn schedule(&self) -> &str {
        &self.schedule
    }

    pub fn spec(&self) -> &ScheduleSpec {
        &self.spec
    }

    /// Stable callable name supplied at registration.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Run the body with its bound arguments.
    pub async fn invoke(&self) -> Result<(), HandlerError> {
        self.handler.handle(&self.args).await
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("schedule", &self.schedule)
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}
