//! Domain model (task ids, schedules, tasks, errors).
//!
//! - ids: 決定的に導出される TaskId
//! - schedule: "HH:MM:SS" / "N units" の 2 種類のスケジュール
//! - task: 登録済みタスク（スケジュール + 呼び出し対象 + 引数）
//! - errors: エラー型

pub mod errors;
pub mod ids;
pub mod schedule;
pub mod task;

pub use self::errors::{CronError, HandlerError, RegistryError, ScheduleError};
pub use self::ids::{ParseTaskIdError, TaskId};
pub use self::schedule::{IntervalSpec, IntervalUnit, ScheduleSpec};
pub use self::task::Task;
