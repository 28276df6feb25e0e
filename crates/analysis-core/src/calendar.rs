//! Trading-calendar arithmetic.
//!
//! Business days are Monday through Friday; no exchange holiday calendar is applied.
//! Session windows are expressed in the market's fixed UTC offset and converted to
//! UTC instants for querying the data source.

use chrono::{DateTime, Datelike, Days, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Whether `date` falls on Monday-Friday.
pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Step backward one calendar day at a time until a weekday is reached.
/// Returns `date` unchanged if it is already a weekday.
pub fn previous_business_day(date: NaiveDate) -> NaiveDate {
    let mut day = date;
    while !is_business_day(day) {
        day -= Duration::days(1);
    }
    day
}

/// Resolve the (analysis day, comparison day) pair for a run.
///
/// `day_offset` is the number of calendar days to step back from `today` before
/// snapping to a business day: 0 screens the most recent business day, 1 the one
/// before it. Fails when the offset steps outside the representable calendar.
pub fn resolve_analysis_days(
    today: NaiveDate,
    day_offset: u32,
) -> Result<(NaiveDate, NaiveDate), AnalysisError> {
    let out_of_range =
        || AnalysisError::InvalidData(format!("day offset {} from {} is out of range", day_offset, today));

    let shifted = today
        .checked_sub_days(Days::new(u64::from(day_offset)))
        .ok_or_else(out_of_range)?;
    let analysis_day = checked_business_day(shifted).ok_or_else(out_of_range)?;
    let comparison_day = analysis_day
        .pred_opt()
        .and_then(checked_business_day)
        .ok_or_else(out_of_range)?;
    Ok((analysis_day, comparison_day))
}

fn checked_business_day(date: NaiveDate) -> Option<NaiveDate> {
    let mut day = date;
    while !is_business_day(day) {
        day = day.pred_opt()?;
    }
    Some(day)
}

/// Calendar date of a UTC instant in the market's offset.
pub fn market_date(timestamp: DateTime<Utc>, offset: &FixedOffset) -> NaiveDate {
    timestamp.with_timezone(offset).date_naive()
}

/// Intraday bounds of one trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SessionWindow {
    /// Build the window `[date open, date close]` in the given market offset.
    pub fn new(date: NaiveDate, open: NaiveTime, close: NaiveTime, offset: &FixedOffset) -> Self {
        Self {
            date,
            start: to_utc(date, open, offset),
            end: to_utc(date, close, offset),
        }
    }

    /// `(start, end)` as a fetch range
    pub fn range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start, self.end)
    }
}

fn to_utc(date: NaiveDate, time: NaiveTime, offset: &FixedOffset) -> DateTime<Utc> {
    // Fixed offsets have no gaps or folds, so the mapping is always single.
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(time)))
}
