//! Recency window used to keep only articles from the last N calendar months.
//!
//! Times are local wall-clock times: the site publishes epoch milliseconds
//! and the robot reports them in the machine's timezone.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};

/// Inclusive `[start, end]` interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecencyWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl RecencyWindow {
    /// Window ending at `now` and starting at midnight on the first day of
    /// the month `months - 1` months before `now`'s month.
    ///
    /// `months = 1` covers the current month so far. A start before the
    /// earliest representable date clamps to it.
    ///
    /// # Arguments
    ///
    /// * `months` - Calendar months to cover, counting the current one
    /// * `now` - Local wall-clock reference time; becomes `end`
    ///
    /// # Returns
    ///
    /// The inclusive window `[start, now]`. Year boundaries roll back, so
    /// `compute(14, 2024-01-15)` starts on 2022-12-01.
    pub fn compute(months: u32, now: NaiveDateTime) -> Self {
        let back = i64::from(months.max(1) - 1);
        let index = i64::from(now.year()) * 12 + i64::from(now.month0()) - back;
        let year = index.div_euclid(12);
        let month = index.rem_euclid(12) as u32 + 1;

        let first_day = i32::try_from(year)
            .ok()
            .and_then(|y| NaiveDate::from_ymd_opt(y, month, 1))
            .unwrap_or(NaiveDate::MIN);

        Self {
            start: first_day.and_time(chrono::NaiveTime::MIN),
            end: now,
        }
    }

    /// Window ending at the current local time.
    pub fn ending_now(months: u32) -> Self {
        Self::compute(months, Local::now().naive_local())
    }

    /// Inclusive at both ends. An unknown timestamp is never within a window.
    pub fn contains(&self, timestamp: Option<NaiveDateTime>) -> bool {
        match timestamp {
            Some(ts) => self.start <= ts && ts <= self.end,
            None => false,
        }
    }
}
