//! ScheduleSpec - いつ実行するか
//!
//! # 2 種類のみ
//! - **TimeOfDay**: `"03:00:00"` / `"03:00"`（毎日その時刻）
//! - **Interval**: `"5 minutes"` / `"1 hour 30 minutes"`（前回実行からの経過）
//!
//! `:` を含む文字列は TimeOfDay、それ以外は Interval として解釈します。
//! 不正な文字列は登録時に `ScheduleError` になります。

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Months, NaiveTime, TimeDelta, TimeZone, Utc};

use super::errors::ScheduleError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleSpec {
    /// Every day at the given wall-clock time.
    TimeOfDay { hour: u32, minute: u32, second: u32 },

    /// At least this much time since the last run.
    Interval(IntervalSpec),
}

impl ScheduleSpec {
    pub fn parse(input: &str) -> Result<Self, ScheduleError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ScheduleError::Empty);
        }

        if input.contains(':') {
            parse_time_of_day(input)
        } else {
            IntervalSpec::parse(input).map(Self::Interval)
        }
    }

    pub fn time_of_day(hour: u32, minute: u32, second: u32) -> Result<Self, ScheduleError> {
        if NaiveTime::from_hms_opt(hour, minute, second).is_none() {
            return Err(ScheduleError::TimeOutOfRange(format!(
                "{hour:02}:{minute:02}:{second:02}"
            )));
        }
        Ok(Self::TimeOfDay {
            hour,
            minute,
            second,
        })
    }

    /// Wall-clock time for `TimeOfDay`, `None` for intervals.
    pub fn naive_time(&self) -> Option<NaiveTime> {
        match self {
            Self::TimeOfDay {
                hour,
                minute,
                second,
            } => NaiveTime::from_hms_opt(*hour, *minute, *second),
            Self::Interval(_) => None,
        }
    }
}

impl FromStr for ScheduleSpec {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ScheduleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimeOfDay {
                hour,
                minute,
                second,
            } => write!(f, "{hour:02}:{minute:02}:{second:02}"),
            Self::Interval(interval) => f.write_str(interval.raw()),
        }
    }
}

fn parse_time_of_day(input: &str) -> Result<ScheduleSpec, ScheduleError> {
    let invalid = || ScheduleError::InvalidTimeOfDay(input.to_string());

    let fields = input
        .split(':')
        .map(|field| {
            let field = field.trim();
            if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            field.parse::<u32>().map_err(|_| invalid())
        })
        .collect::<Result<Vec<u32>, ScheduleError>>()?;

    let (hour, minute, second) = match fields.as_slice() {
        [h, m] => (*h, *m, 0),
        [h, m, s] => (*h, *m, *s),
        _ => return Err(invalid()),
    };

    ScheduleSpec::time_of_day(hour, minute, second)
        .map_err(|_| ScheduleError::TimeOutOfRange(input.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl IntervalUnit {
    /// Accepts singular, plural and short forms (`min`, `mins`, `minute`, `minutes`).
    /// `fortnight` is returned as two weeks.
    fn parse(word: &str) -> Option<(Self, u32)> {
        let word = word.to_ascii_lowercase();
        let unit = match word.as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" => (Self::Second, 1),
            "min" | "mins" | "minute" | "minutes" => (Self::Minute, 1),
            "h" | "hour" | "hours" => (Self::Hour, 1),
            "day" | "days" => (Self::Day, 1),
            "week" | "weeks" => (Self::Week, 1),
            "fortnight" | "fortnights" => (Self::Week, 2),
            "month" | "months" => (Self::Month, 1),
            "year" | "years" => (Self::Year, 1),
            _ => return None,
        };
        Some(unit)
    }

    fn seconds(self) -> Option<i64> {
        match self {
            Self::Second => Some(1),
            Self::Minute => Some(60),
            Self::Hour => Some(3_600),
            Self::Day => Some(86_400),
            Self::Week => Some(604_800),
            // カレンダー単位は秒数に換算しない
            Self::Month | Self::Year => None,
        }
    }
}

/// A parsed "N units" interval.
///
/// The raw text is kept because it is part of the task identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalSpec {
    raw: String,
    parts: Vec<(u32, IntervalUnit)>,
}

impl IntervalSpec {
    pub fn parse(input: &str) -> Result<Self, ScheduleError> {
        let raw = input.trim();
        let invalid = || ScheduleError::InvalidInterval(raw.to_string());

        let mut parts = Vec::new();
        let mut tokens = raw.split_whitespace();
        while let Some(token) = tokens.next() {
            // "5 minutes" と "5minutes" の両方を受け付ける
            let digits = token.bytes().take_while(|b| b.is_ascii_digit()).count();
            if digits == 0 {
                return Err(invalid());
            }
            let amount: u32 = token[..digits].parse().map_err(|_| invalid())?;

            let unit_word = if digits < token.len() {
                &token[digits..]
            } else {
                tokens.next().ok_or_else(invalid)?
            };
            let (unit, factor) =
                IntervalUnit::parse(unit_word).ok_or_else(|| ScheduleError::UnknownUnit {
                    input: raw.to_string(),
                    unit: unit_word.to_string(),
                })?;
            let amount = amount.checked_mul(factor).ok_or_else(invalid)?;
            parts.push((amount, unit));
        }

        if parts.is_empty() {
            return Err(invalid());
        }

        let spec = Self {
            raw: raw.to_string(),
            parts,
        };
        // 1970 から引けない間隔はどの現在時刻からも引けない
        if spec.subtract_from(&DateTime::<Utc>::UNIX_EPOCH).is_none() {
            return Err(ScheduleError::IntervalOutOfRange(spec.raw));
        }
        Ok(spec)
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn parts(&self) -> &[(u32, IntervalUnit)] {
        &self.parts
    }

    /// `now - interval`. Months and years are subtracted on the calendar.
    ///
    /// Returns `None` when the result is not representable.
    pub fn subtract_from<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let mut at = now.clone();
        for &(amount, unit) in &self.parts {
            at = match unit {
                IntervalUnit::Month => at.checked_sub_months(Months::new(amount))?,
                IntervalUnit::Year => at.checked_sub_months(Months::new(amount.checked_mul(12)?))?,
                _ => {
                    let seconds = i64::from(amount).checked_mul(unit.seconds()?)?;
                    at.checked_sub_signed(TimeDelta::try_seconds(seconds)?)?
                }
            };
        }
        Some(at)
    }
}
