//! RecordingSpawner - テスト用の ProcessSpawner
//!
//! プロセスは起動せず、要求を記録するだけです。
//! `failing()` で作ると常に起動失敗を返します。

use std::io;
use std::sync::{Arc, Mutex};

use crate::ports::{ProcessSpawner, SpawnRequest};

#[derive(Debug, Clone, Default)]
pub struct RecordingSpawner {
    requests: Arc<Mutex<Vec<SpawnRequest>>>,
    fail: bool,
}

impl RecordingSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A spawner whose every spawn attempt fails.
    pub fn failing() -> Self {
        Self {
            requests: Arc::default(),
            fail: true,
        }
    }

    /// Requests received so far, failed attempts included.
    pub fn requests(&self) -> Vec<SpawnRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ProcessSpawner for RecordingSpawner {
    fn spawn_detached(&self, request: &SpawnRequest) -> io::Result<()> {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }
        if self.fail {
            return Err(io::Error::other("spawn refused"));
        }
        Ok(())
    }
}
