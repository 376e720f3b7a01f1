//! TaskId - 決定的なタスク識別子
//!
//! TaskId は `(schedule, callable name, args)` から導出されます。
//! 起動側プロセスとワーカープロセスが同じ登録を行えば、同じ ID になります。
//!
//! ## 導出方法
//! - `[schedule, name, args]` を JSON にエンコード
//! - SHA-256 の先頭 16 bytes を取り出して 128-bit 値にする
//! - 表示は小文字 hex 32 文字（ロックファイル名としてそのまま使える）

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(u128);

/// ParseTaskIdError は hex 文字列からの変換エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid task id '{0}': expected {len} lowercase hex characters", len = TaskId::HEX_LEN)]
pub struct ParseTaskIdError(String);

impl TaskId {
    /// Length of the hex rendering.
    pub const HEX_LEN: usize = 32;

    pub fn from_u128(value: u128) -> Self {
        Self(value)
    }

    pub fn as_u128(&self) -> u128 {
        self.0
    }

    /// Derive the id of a task from its registration.
    ///
    /// Argument order is significant.
    pub fn derive(schedule: &str, name: &str, args: &[Value]) -> Self {
        let material = serde_json::json!([schedule, name, args]);

        let mut hasher = Sha256::new();
        hasher.update(material.to_string().as_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Self(u128::from_be_bytes(bytes))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0.to_be_bytes()))
    }
}

impl FromStr for TaskId {
    type Err = ParseTaskIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ファイル名に使うので、正規形（小文字 hex 32 文字）以外は受け付けない
        let canonical = s.len() == Self::HEX_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !canonical {
            return Err(ParseTaskIdError(s.to_string()));
        }

        let mut bytes = [0u8; 16];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| ParseTaskIdError(s.to_string()))?;
        Ok(Self(u128::from_be_bytes(bytes)))
    }
}

impl TryFrom<String> for TaskId {
    type Error = ParseTaskIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.to_string()
    }
}
