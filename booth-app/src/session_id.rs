//! Day rollover of session ids for daily repetitions (`subject_YYMMDD[_...]`).

use chrono::{Days, NaiveDate};

const DATE: &str = "%y%m%d";

fn next_day(segment: &str) -> Option<String> {
    let day = NaiveDate::parse_from_str(segment, DATE).ok()?;
    let next = day.checked_add_days(Days::new(1))?;
    Some(next.format(DATE).to_string())
}

/// Id of the next day's session. The date is looked for in the second
/// `_`-separated segment, then in the last one; an id without a date gets
/// `today` appended.
pub fn next_session_id(id: &str, today: NaiveDate) -> String {
    let mut segments: Vec<String> = id.split('_').map(String::from).collect();
    let last = segments.len() - 1;
    for i in [1, last] {
        if i == 0 || i > last {
            continue;
        }
        if let Some(next) = next_day(&segments[i]) {
            segments[i] = next;
            return segments.join("_");
        }
    }
    format!("{id}_{}", today.format(DATE))
}
