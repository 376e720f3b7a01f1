//! Trigger detection: how was this process started?
//!
//! `<entry point> cron [task-id] [force]` is a scheduler invocation; anything
//! else is a normal serving process that calls
//! [`Scheduler::after_response`](crate::app::Scheduler::after_response) once a
//! request has been answered.

use crate::app::{CRON_COMMAND, DispatchReport, Scheduler};
use crate::domain::{CronError, TaskId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// `cron` with an optional task id (worker mode) and force flag.
    Cron { route: Option<TaskId>, force: bool },
    /// `cron` with an empty task id: matches no task, so nothing runs.
    EmptyRoute,
    /// Not a scheduler invocation.
    Serve,
}

impl Invocation {
    /// Classify positional arguments, program name excluded.
    pub fn from_args<I, S>(args: I) -> Result<Self, CronError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut args = args.into_iter();
        match args.next() {
            Some(first) if first.as_ref() == CRON_COMMAND => {}
            _ => return Ok(Self::Serve),
        }

        let route = match args.next() {
            Some(id) if id.as_ref().is_empty() => return Ok(Self::EmptyRoute),
            Some(id) => Some(id.as_ref().parse::<TaskId>()?),
            None => None,
        };
        let force = args.next().is_some_and(|flag| parse_force(flag.as_ref()));
        Ok(Self::Cron { route, force })
    }

    /// Classify this process's own arguments.
    pub fn from_env() -> Result<Self, CronError> {
        Self::from_args(std::env::args().skip(1))
    }

    /// Run the dispatch a scheduler invocation asks for.
    ///
    /// `Serve` does nothing here; `None` is returned.
    pub async fn dispatch(&self, scheduler: &Scheduler) -> Result<Option<DispatchReport>, CronError> {
        match self {
            Self::Cron { route, force } => scheduler.run(route.as_ref(), *force).await.map(Some),
            Self::EmptyRoute => Ok(Some(DispatchReport {
                skipped: scheduler.registry().len(),
                ..DispatchReport::default()
            })),
            Self::Serve => Ok(None),
        }
    }
}

/// Loose boolean: empty, `0` and `false` are false, anything else is true.
pub fn parse_force(flag: &str) -> bool {
    let flag = flag.trim();
    !(flag.is_empty() || flag == "0" || flag.eq_ignore_ascii_case("false"))
}
