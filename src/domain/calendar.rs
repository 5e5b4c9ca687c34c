use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use chrono_tz::Asia::Kolkata;

/// "October 2026" style label for the month containing `now`, in IST.
pub fn month_label(now: DateTime<Utc>) -> String {
    now.with_timezone(&Kolkata).format("%B %Y").to_string()
}

/// Labels for the last `count` months ending with the current one,
/// oldest first.
pub fn recent_month_labels(now: DateTime<Utc>, count: u32) -> Vec<String> {
    let local = now.with_timezone(&Kolkata).date_naive();
    let first_of_month = NaiveDate::from_ymd_opt(local.year(), local.month(), 1).unwrap_or(local);

    (0..count)
        .rev()
        .filter_map(|offset| first_of_month.checked_sub_months(Months::new(offset)))
        .map(|date| date.format("%B %Y").to_string())
        .collect()
}
