//! Workout plan as returned by the service

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One exercise line: a plain label, or a map of named attributes (sets, reps, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExerciseEntry {
    Label(String),
    Detailed(IndexMap<String, Value>),
}

impl ExerciseEntry {
    /// Stable identity used when asking for an explanation and as the cache key
    ///
    /// Attribute maps render as compact JSON in server order.
    pub fn identity(&self) -> String {
        match self {
            Self::Label(label) => label.clone(),
            Self::Detailed(attrs) => serde_json::to_string(attrs).unwrap_or_default(),
        }
    }

    /// One-line `key: value, key: value` rendering
    pub fn summary(&self) -> String {
        match self {
            Self::Label(label) => label.clone(),
            Self::Detailed(attrs) => attrs
                .iter()
                .map(|(k, v)| format!("{}: {}", k, render_value(v)))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Day label to ordered exercises; day order is the server's order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    days: IndexMap<String, Vec<ExerciseEntry>>,
}

impl Plan {
    pub fn days(&self) -> impl Iterator<Item = (&str, &[ExerciseEntry])> {
        self.days.iter().map(|(day, exercises)| (day.as_str(), exercises.as_slice()))
    }

    /// Exercise by day and zero-based position
    pub fn exercise(&self, day: &str, index: usize) -> Option<&ExerciseEntry> {
        self.days.get(day).and_then(|exercises| exercises.get(index))
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}
