//! Due-time evaluation: "should this task run now?"
//!
//! Pure functions over the last recorded run (Unix seconds) and `now`.

use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};

use crate::domain::ScheduleSpec;

/// Decide whether a task with `spec` is due at `now`.
///
/// - No recorded run: always due.
/// - `TimeOfDay`: due when the last run is strictly before the most recent
///   scheduled instant at or before `now`.
/// - `Interval`: due when the last run is at or before `now - interval`.
pub fn is_due<Tz: TimeZone>(last_run: Option<i64>, spec: &ScheduleSpec, now: &DateTime<Tz>) -> bool {
    let Some(last_run) = last_run else {
        return true;
    };

    match spec {
        ScheduleSpec::TimeOfDay { .. } => {
            let occurrence = spec
                .naive_time()
                .and_then(|time| most_recent_occurrence(time, now));
            match occurrence {
                Some(at) => last_run < at.timestamp(),
                None => true,
            }
        }
        ScheduleSpec::Interval(interval) => match interval.subtract_from(now) {
            Some(threshold) => last_run <= threshold.timestamp(),
            None => false,
        },
    }
}

/// `force` bypasses the evaluation entirely.
pub fn should_run<Tz: TimeZone>(
    force: bool,
    last_run: Option<i64>,
    spec: &ScheduleSpec,
    now: &DateTime<Tz>,
) -> bool {
    force || is_due(last_run, spec, now)
}

/// Today at `time` in `now`'s zone, or yesterday when that is still ahead of `now`.
///
/// The zone's own rules apply, so with a DST-aware zone the window stays on
/// the wall-clock time across offset changes.
pub fn most_recent_occurrence<Tz: TimeZone>(
    time: NaiveTime,
    now: &DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    let zone = now.timezone();
    let today = now.date_naive();

    let candidate = resolve_local(&zone, today.and_time(time))?;
    if candidate <= *now {
        return Some(candidate);
    }

    let yesterday = today.pred_opt()?;
    resolve_local(&zone, yesterday.and_time(time))
}

/// Ambiguous times take the earlier instant; times skipped by a DST gap are
/// moved forward past the gap.
fn resolve_local<Tz: TimeZone>(zone: &Tz, at: NaiveDateTime) -> Option<DateTime<Tz>> {
    zone.from_local_datetime(&at).earliest().or_else(|| {
        let shifted = at.checked_add_signed(TimeDelta::hours(1))?;
        zone.from_local_datetime(&shifted).earliest()
    })
}
