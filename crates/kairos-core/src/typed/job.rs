//! Job trait - 型付きの引数
//!
//! # 学習ポイント
//! - Associated Constants (`const NAME`)
//! - Trait bounds の組み合わせ (Serialize + DeserializeOwned + Send + Sync + 'static)

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Job は呼び出し名と引数の型を対応付ける
///
/// # 使用例
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct RotateLogs {
///     keep: u32,
/// }
///
/// impl Job for RotateLogs {
///     const NAME: &'static str = "ops.rotate_logs";
/// }
/// ```
///
/// `NAME` は TaskId の導出に使われるので、リリース間で変えないこと。
/// Job の値そのものが唯一の引数として JSON で保持されます。
pub trait Job: Serialize + DeserializeOwned + Send + Sync + 'static {
    const NAME: &'static str;
}
