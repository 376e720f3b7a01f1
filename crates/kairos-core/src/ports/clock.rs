//! Clock port - 時刻の抽象化

use chrono::{DateTime, FixedOffset, Local, TimeZone};

use crate::domain::ScheduleSpec;
use crate::due;

/// Clock は現在時刻を提供
///
/// # テスト容易性
/// - trait により時刻を差し替え可能
/// - テストでは FixedClock を使用
///
/// 既定の `is_due` は TimeOfDay を `now()` のオフセットで解釈します。
/// タイムゾーン規則（夏時間）を持つ時計は `is_due` を上書きします。
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;

    /// Due check at the current instant.
    fn is_due(&self, last_run: Option<i64>, spec: &ScheduleSpec) -> bool {
        due::is_due(last_run, spec, &self.now())
    }
}

/// Local wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }

    /// Evaluated in the local zone, so daily windows keep their wall-clock
    /// time on DST transition days.
    fn is_due(&self, last_run: Option<i64>, spec: &ScheduleSpec) -> bool {
        due::is_due(last_run, spec, &Local::now())
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<FixedOffset>,
}

impl FixedClock {
    pub fn new<Tz: TimeZone>(now: DateTime<Tz>) -> Self {
        Self {
            now: now.fixed_offset(),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn fixed_clock_keeps_the_instant() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 2, 0, 0).unwrap();
        let clock = FixedClock::new(at);

        assert_eq!(clock.now(), at);
        assert_eq!(clock.now().timestamp(), at.timestamp());
    }

    #[test]
    fn fixed_clock_evaluates_at_its_instant() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 2, 0, 0).unwrap();
        let clock = FixedClock::new(at);
        let daily = ScheduleSpec::parse("03:00:00").unwrap();

        let window = Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap().timestamp();
        assert!(clock.is_due(Some(window - 1), &daily));
        assert!(!clock.is_due(Some(window), &daily));
    }

    #[test]
    fn system_clock_evaluates_in_the_local_zone() {
        let clock = SystemClock;
        let daily = ScheduleSpec::parse("03:00:00").unwrap();
        let hourly = ScheduleSpec::parse("1 hour").unwrap();

        assert!(clock.is_due(None, &daily));
        assert!(!clock.is_due(Some(clock.now().timestamp()), &hourly));

        let occurrence = due::most_recent_occurrence(
            daily.naive_time().unwrap(),
            &Local::now(),
        )
        .unwrap();
        assert!(clock.is_due(Some(occurrence.timestamp() - 1), &daily));
        assert!(!clock.is_due(Some(occurrence.timestamp()), &daily));
    }
}
