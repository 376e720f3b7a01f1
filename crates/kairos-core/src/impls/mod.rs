//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **CommandSpawner**: 本番用。`std::process::Command` で切り離して起動
//! - **RecordingSpawner**: テスト用。起動要求を記録するだけ

pub mod command;
pub mod recording;

// 主要な型を再エクスポート
pub use self::command::CommandSpawner;
pub use self::recording::RecordingSpawner;
