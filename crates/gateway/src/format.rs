//! Formatting helpers shared by the dispatcher and the scheduler.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::message::PickerBounds;

/// Display format for reminder times.
pub const DISPLAY_FORMAT: &str = "%Y/%m/%d %H:%M";

/// Format a reminder time for users.
pub fn display_time(time: NaiveDateTime) -> String {
    time.format(DISPLAY_FORMAT).to_string()
}

/// Date picker bounds relative to `now`.
///
/// `min` is the current minute, `initial` is one hour ahead rounded down to
/// the hour, and `max` is the last minute of the year `horizon_years` after
/// the current one.
pub fn picker_bounds(now: NaiveDateTime, horizon_years: i32) -> PickerBounds {
    let min = truncate_to_minute(now);

    let ahead = now + Duration::hours(1);
    let initial = ahead
        .date()
        .and_hms_opt(ahead.hour(), 0, 0)
        .unwrap_or(min);

    let max = NaiveDate::from_ymd_opt(now.year() + horizon_years, 12, 31)
        .and_then(|d| d.and_hms_opt(23, 59, 0))
        .unwrap_or(NaiveDateTime::MAX);

    PickerBounds { min, max, initial }
}

fn truncate_to_minute(time: NaiveDateTime) -> NaiveDateTime {
    time.date()
        .and_hms_opt(time.hour(), time.minute(), 0)
        .unwrap_or(time)
}

/// Render reminders as `time \ncontent` blocks separated by blank lines.
///
/// Returns `None` when there is nothing to list.
pub fn reminder_list<'a, I>(entries: I) -> Option<String>
where
    I: IntoIterator<Item = (NaiveDateTime, &'a str)>,
{
    let blocks: Vec<String> = entries
        .into_iter()
        .map(|(time, content)| format!("{} \n{}", display_time(time), content))
        .collect();

    if blocks.is_empty() {
        None
    } else {
        Some(blocks.join("\n\n"))
    }
}

/// Text pushed when a reminder fires.
pub fn reminder_due(content: &str) -> String {
    format!("It's time: 「{}」", content)
}
