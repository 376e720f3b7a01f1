//! CommandSpawner - OS プロセスとしてワーカーを起動
//!
//! # 実装詳細
//! - stdin / stdout / stderr はすべて /dev/null
//! - 新しいプロセスグループで起動（親の端末シグナルを受けない）
//! - 終了は待たない。ゾンビ化を防ぐため回収用スレッドで wait する

use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::ports::{ProcessSpawner, SpawnRequest};

#[derive(Debug, Clone, Copy, Default)]
pub struct CommandSpawner;

impl CommandSpawner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessSpawner for CommandSpawner {
    fn spawn_detached(&self, request: &SpawnRequest) -> io::Result<()> {
        let mut child = Command::new(&request.program)
            .args(&request.args)
            .envs(request.envs.iter().map(|(key, value)| (key, value)))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()?;

        let pid = child.id();
        let reaper = std::thread::Builder::new()
            .name(format!("kairos-reap-{pid}"))
            .spawn(move || {
                let _ = child.wait();
            });
        if let Err(e) = reaper {
            // 起動自体は成功している。回収できないだけなので続行する
            debug!(pid, error = %e, "could not start reaper thread");
        }
        Ok(())
    }
}
