//! Portable documents: chat export, plan export and calendar export
//!
//! Decoding validates the whole document before anything is returned, so a
//! failed import never hands back partial state.

mod calendar;
mod chat;
mod plan;

use chrono::NaiveDate;
use thiserror::Error;

pub use calendar::{encode_calendar, next_monday};
pub use chat::{ChatDocument, decode_chat};
pub use plan::{PlanDocument, decode_plan};

/// Errors from encoding or decoding documents
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid document: {0}")]
    Validation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// `chat_history_<YYYY-MM-DD>.json`
pub fn chat_file_name(date: NaiveDate) -> String {
    format!("chat_history_{}.json", date.format("%Y-%m-%d"))
}

/// `<name>_workout_plan.json`
pub fn plan_file_name(name: &str) -> String {
    format!("{}_workout_plan.json", name)
}

/// `<name>_workout_calendar.ics`
pub fn calendar_file_name(name: &str) -> String {
    format!("{}_workout_calendar.ics", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(chat_file_name(date), "chat_history_2024-03-09.json");
        assert_eq!(plan_file_name("Ada"), "Ada_workout_plan.json");
        assert_eq!(calendar_file_name("Ada"), "Ada_workout_calendar.ics");
    }
}
