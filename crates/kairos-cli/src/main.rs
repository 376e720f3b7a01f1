//! kairos - demo host application
//!
//! The binary is its own scheduler entry point: `kairos tick` plays the role of
//! a finished request and spawns `kairos cron <task-id> <force>` per task.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kairos_core::app::CRON_COMMAND;
use kairos_core::config::{ENV_ENTRY_POINT, ENV_LOCKS_DIR, ENV_WORKER};
use kairos_core::typed::{Handler, Job};
use kairos_core::{HandlerError, Invocation, RegistryError, Scheduler, SchedulerConfig, TaskRegistry};

#[derive(Parser)]
#[command(name = "kairos", about = "Self-triggering periodic task scheduler")]
struct Cli {
    /// Entry point spawned for each task (defaults to this executable)
    #[arg(long, global = true, env = ENV_ENTRY_POINT)]
    entry_point: Option<PathBuf>,

    /// Launcher placed in front of the entry point
    #[arg(long, global = true, env = ENV_WORKER)]
    worker: Option<PathBuf>,

    /// Directory holding one lock file per task
    #[arg(long, global = true, env = ENV_LOCKS_DIR)]
    locks_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run-all (no task id) or run one task as a worker
    Cron {
        task_id: Option<String>,
        /// 1/true to ignore the schedule
        force: Option<String>,
    },
    /// List registered tasks and their ids
    List,
    /// Act as if a request just finished: spawn a worker per task
    Tick,
}

impl Cli {
    fn config(&self) -> SchedulerConfig {
        let mut config = match &self.entry_point {
            Some(entry_point) => SchedulerConfig::new(entry_point),
            None => SchedulerConfig::default(),
        };
        if let Some(worker) = &self.worker {
            config = config.with_worker_executable(worker);
        }
        if let Some(locks_dir) = &self.locks_dir {
            config = config.with_locks_dir(locks_dir);
        }
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RotateLogs {
    dir: String,
    keep: u32,
}

impl Job for RotateLogs {
    const NAME: &'static str = "ops.rotate_logs";
}

struct RotateLogsHandler;

#[async_trait]
impl Handler<RotateLogs> for RotateLogsHandler {
    async fn handle(&self, job: RotateLogs) -> Result<(), HandlerError> {
        info!(dir = %job.dir, keep = job.keep, "rotating logs");
        Ok(())
    }
}

fn heartbeat(args: &[Value]) -> Result<(), HandlerError> {
    let source = args
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| HandlerError::new("heartbeat source argument missing"))?;
    info!(source, "heartbeat");
    Ok(())
}

/// Registration shared by the spawning process and every worker.
fn build_registry() -> Result<TaskRegistry, RegistryError> {
    let mut registry = TaskRegistry::new();
    registry.register(
        "03:00:00",
        RotateLogsHandler,
        RotateLogs {
            dir: "/var/log/kairos".to_string(),
            keep: 7,
        },
    )?;
    registry.add_fn("5 minutes", "heartbeat", vec![Value::from("kairos")], heartbeat)?;
    registry.add_fn(
        "1 hour 30 minutes",
        "purge_sessions",
        vec![Value::from(3600)],
        |args: &[Value]| {
            let max_age = args
                .first()
                .and_then(Value::as_u64)
                .ok_or_else(|| HandlerError::new("max age argument missing"))?;
            info!(max_age, "purging sessions");
            Ok(())
        },
    )?;
    Ok(registry)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let scheduler = Scheduler::new(Arc::new(build_registry()?), cli.config());

    match cli.command.unwrap_or(Command::Tick) {
        Command::Cron { task_id, force } => {
            // ワーカーと同じ規則で解釈する（空の task id は何も実行しない）
            let args = std::iter::once(CRON_COMMAND.to_string())
                .chain(task_id)
                .chain(force);
            let invocation = Invocation::from_args(args)?;
            if let Some(report) = invocation.dispatch(&scheduler).await? {
                info!(
                    spawned = report.spawned.len(),
                    completed = report.completed.len(),
                    not_due = report.not_due.len(),
                    busy = report.busy.len(),
                    "cron dispatch done"
                );
            }
        }
        Command::List => {
            let mut tasks: Vec<_> = scheduler.registry().iter().collect();
            tasks.sort_by(|a, b| a.name().cmp(b.name()));
            for task in tasks {
                println!("{}  {:<20} {}", task.id(), task.schedule(), task.name());
            }
        }
        Command::Tick => {
            let report = scheduler.after_response().await?;
            info!(
                spawned = report.spawned.len(),
                failed = report.spawn_failed.len(),
                "dispatched cron workers"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use kairos_core::TaskId;

    #[test]
    fn cli_parses_worker_invocation() {
        let id = TaskId::from_u128(42);
        let cli = Cli::try_parse_from(["kairos", "cron", &id.to_string(), "1"]).unwrap();
        match cli.command {
            Some(Command::Cron { task_id, force }) => {
                assert_eq!(task_id, Some(id.to_string()));
                assert_eq!(force.as_deref(), Some("1"));
            }
            _ => panic!("expected cron command"),
        }
    }

    #[test]
    fn cli_accepts_empty_task_id() {
        let cli = Cli::try_parse_from(["kairos", "cron", "", "0"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Cron { task_id: Some(ref id), .. }) if id.is_empty()
        ));
    }

    #[test]
    fn heartbeat_without_source_is_an_error() {
        assert!(heartbeat(&[]).is_err());
        assert!(heartbeat(&[Value::from(1)]).is_err());
        assert!(heartbeat(&[Value::from("kairos")]).is_ok());
    }

    #[test]
    fn registry_is_deterministic_across_processes() {
        let a = build_registry().unwrap();
        let b = build_registry().unwrap();

        let mut ids_a: Vec<_> = a.tasks().keys().copied().collect();
        let mut ids_b: Vec<_> = b.tasks().keys().copied().collect();
        ids_a.sort();
        ids_b.sort();
        assert_eq!(ids_a, ids_b);
        assert_eq!(ids_a.len(), 3);
    }
}
