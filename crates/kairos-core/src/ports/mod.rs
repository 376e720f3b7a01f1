//! Ports - 抽象化レイヤー
//!
//! Scheduler が外部（時計・OS プロセス）に触れる箇所を trait にしています。
//! テストでは FixedClock / RecordingSpawner に差し替えます。

pub mod clock;
pub mod spawner;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::spawner::{ProcessSpawner, SpawnRequest};
