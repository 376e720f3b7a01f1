//! Handler trait - タスク本体の定義
//!
//! # 学習ポイント
//! - ジェネリック trait (Handler<J>)
//! - Object-safe trait (CronHandler)
//! - Type erasure パターン (TypedHandler<J, H> → CronHandler)

use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;

use super::job::Job;
use crate::domain::errors::HandlerError;

/// CronHandler は object-safe なタスク本体
///
/// 引数は登録時に束縛された JSON 値の列（順序あり）です。
#[async_trait]
pub trait CronHandler: Send + Sync {
    async fn handle(&self, args: &[Value]) -> Result<(), HandlerError>;
}

/// Handler は Job を受け取って実行する
///
/// # 使用例
/// ```ignore
/// struct RotateLogsHandler;
///
/// #[async_trait]
/// impl Handler<RotateLogs> for RotateLogsHandler {
///     async fn handle(&self, job: RotateLogs) -> Result<(), HandlerError> {
///         rotate(job.keep)?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<J: Job>: Send + Sync {
    async fn handle(&self, job: J) -> Result<(), HandlerError>;
}

pub struct TypedHandler<J: Job, H: Handler<J>> {
    handler: H,
    _marker: PhantomData<J>,
}

impl<J: Job, H: Handler<J>> TypedHandler<J, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<J: Job, H: Handler<J>> CronHandler for TypedHandler<J, H> {
    async fn handle(&self, args: &[Value]) -> Result<(), HandlerError> {
        let payload = args.first().cloned().unwrap_or(Value::Null);
        let job: J = serde_json::from_value(payload)
            .map_err(|e| HandlerError::new(format!("json decode: {e}")))?;
        self.handler.handle(job).await
    }
}

/// Adapts a synchronous closure into a `CronHandler`.
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&[Value]) -> Result<(), HandlerError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> CronHandler for FnHandler<F>
where
    F: Fn(&[Value]) -> Result<(), HandlerError> + Send + Sync,
{
    async fn handle(&self, args: &[Value]) -> Result<(), HandlerError> {
        (self.f)(args)
    }
}
