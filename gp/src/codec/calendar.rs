//! iCalendar export of a plan
//!
//! One `VEVENT` per plan day, placed in the week that starts on the next
//! Monday, 08:00 to 09:00.

use chrono::{Datelike, Days, NaiveDate};
use tracing::debug;

use crate::domain::Plan;

/// Offset from Monday for a day label's first word, or `None` if it is not a weekday
fn weekday_offset(day: &str) -> Option<u64> {
    let offset = match day.split(' ').next()? {
        "Monday" => 0,
        "Tuesday" => 1,
        "Wednesday" => 2,
        "Thursday" => 3,
        "Friday" => 4,
        "Saturday" => 5,
        "Sunday" => 6,
        _ => return None,
    };
    Some(offset)
}

/// First Monday strictly after `today`
pub fn next_monday(today: NaiveDate) -> NaiveDate {
    let ahead = 7 - u64::from(today.weekday().num_days_from_monday());
    today + Days::new(ahead)
}

/// Render `plan` as an iCalendar file for `name`
pub fn encode_calendar(plan: &Plan, name: &str, today: NaiveDate) -> String {
    debug!(%name, days = plan.len(), %today, "encode_calendar: called");
    let start = next_monday(today);
    let mut ics = String::from("BEGIN:VCALENDAR\nVERSION:2.0\nPRODID:-//Workout Planner//EN\nCALSCALE:GREGORIAN\n");

    for (day, exercises) in plan.days() {
        let Some(offset) = weekday_offset(day) else {
            debug!(%day, "encode_calendar: skipping unrecognised day");
            continue;
        };
        let date = (start + Days::new(offset)).format("%Y%m%d");
        let description = exercises
            .iter()
            .map(|e| e.summary())
            .collect::<Vec<_>>()
            .join("\\n")
            .replace(',', "\\,");

        ics.push_str("BEGIN:VEVENT\n");
        ics.push_str(&format!("DTSTART:{}T080000\n", date));
        ics.push_str(&format!("DTEND:{}T090000\n", date));
        ics.push_str(&format!("SUMMARY:{}'s Workout - {}\n", name, day));
        ics.push_str(&format!("DESCRIPTION:{}\n", description));
        ics.push_str("END:VEVENT\n");
    }

    ics.push_str("END:VCALENDAR");
    ics
}
