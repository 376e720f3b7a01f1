//! ProcessSpawner port - 切り離されたワーカープロセスの起動
//!
//! 起動したプロセスの終了は待たない（fire-and-forget）。
//! 起動そのものの失敗だけが呼び出し側に返ります。

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

/// A detached command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Extra environment for the child, on top of the inherited one.
    pub envs: Vec<(String, OsString)>,
}

impl SpawnRequest {
    /// Human readable command line for logs.
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

pub trait ProcessSpawner: Send + Sync {
    /// Start the process with all output discarded and return without waiting.
    fn spawn_detached(&self, request: &SpawnRequest) -> io::Result<()>;
}
