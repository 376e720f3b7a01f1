//! App - アプリケーション層
//!
//! このモジュールは、registry / lock / ports を組み合わせてディスパッチを実装します。
//!
//! # 主要コンポーネント
//! - **SchedulerBuilder**: 構築とワイヤリング（起動時検証つき）
//! - **Scheduler**: run-all（プロセス起動）と worker（単一タスク実行）

pub mod builder;
pub mod scheduler;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, SchedulerBuilder};
pub use self::scheduler::{CRON_COMMAND, DispatchReport, RunOutcome, Scheduler};
