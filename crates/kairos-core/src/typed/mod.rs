//! Typed - タスク本体の API
//!
//! # 二層構造
//! - **表層（Typed）**: `Job` trait, `Handler<J>` trait - 引数を型で受け取る
//! - **内部（Dyn）**: `CronHandler` trait - object-safe, JSON 引数列を受け取る
//!
//! Registry は `Arc<dyn CronHandler>` だけを保持します。

pub mod handler;
pub mod job;

pub use self::handler::{CronHandler, FnHandler, Handler, TypedHandler};
pub use self::job::Job;
