use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Calendar period used as the caching unit for insights.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    Week,
    Month,
    Quarter,
}

impl TimePeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Quarter => "quarter",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "quarter" => Some(Self::Quarter),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodBounds {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Canonical bounds of the period containing `reference`.
///
/// Weeks start on Sunday. The end bound is inclusive at millisecond
/// precision (23:59:59.999 of the period's last day).
pub fn period_bounds(reference: NaiveDate, period: TimePeriod) -> PeriodBounds {
    let (first_day, last_day) = match period {
        TimePeriod::Week => {
            let back = reference.weekday().num_days_from_sunday() as i64;
            let sunday = reference - Duration::days(back);
            (sunday, sunday + Duration::days(6))
        }
        TimePeriod::Month => {
            let first = first_of_month(reference.year(), reference.month());
            (first, last_of_month(reference.year(), reference.month()))
        }
        TimePeriod::Quarter => {
            let start_month = ((reference.month() - 1) / 3) * 3 + 1;
            let end_month = start_month + 2;
            (
                first_of_month(reference.year(), start_month),
                last_of_month(reference.year(), end_month),
            )
        }
    };

    PeriodBounds {
        start: first_day.and_time(day_start()),
        end: last_day.and_time(day_end()),
    }
}

/// Partition key for day-scoped queries, `YYYY-MM-DD`.
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).expect("first of month is always valid")
}

fn last_of_month(year: i32, month: u32) -> NaiveDate {
    let next = if month == 12 {
        first_of_month(year + 1, 1)
    } else {
        first_of_month(year, month + 1)
    };
    next - Duration::days(1)
}

fn day_start() -> NaiveTime {
    NaiveTime::from_hms_opt(0, 0, 0).expect("valid midnight")
}

fn day_end() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).expect("valid end of day")
}
