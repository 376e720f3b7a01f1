//! kairos-core
//!
//! Core building blocks for the Kairos scheduler: periodic tasks embedded in
//! a host application, without an external cron daemon.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（TaskId, ScheduleSpec, Task, errors）
//! - **typed**: タスク本体の API（Job trait, Handler trait, CronHandler）
//! - **registry**: TaskRegistry
//! - **due**: 実行タイミングの判定（純粋関数）
//! - **lock**: タスクごとのファイルロックと最終実行時刻
//! - **ports**: 抽象化レイヤー（Clock, ProcessSpawner）
//! - **impls**: ports の実装（CommandSpawner, RecordingSpawner）
//! - **app**: Scheduler と SchedulerBuilder
//! - **config**: SchedulerConfig
//! - **trigger**: 起動引数の判定（`cron <task-id> <force>`）

pub mod app;
pub mod config;
pub mod domain;
pub mod due;
pub mod impls;
pub mod lock;
pub mod ports;
pub mod registry;
pub mod trigger;
pub mod typed;

pub use app::{BuildError, DispatchReport, RunOutcome, Scheduler, SchedulerBuilder};
pub use config::SchedulerConfig;
pub use domain::{CronError, HandlerError, RegistryError, ScheduleError, ScheduleSpec, Task, TaskId};
pub use registry::TaskRegistry;
pub use trigger::Invocation;
