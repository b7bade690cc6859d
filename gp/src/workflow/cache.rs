//! Explanation cache

use std::collections::HashMap;

/// Explanations keyed by (day, exercise identity)
///
/// Entries are never evicted; the cache only empties when a new plan is
/// started.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExplanationCache {
    entries: HashMap<(String, String), String>,
}

impl ExplanationCache {
    pub fn get(&self, day: &str, exercise: &str) -> Option<&str> {
        self.entries
            .get(&(day.to_string(), exercise.to_string()))
            .map(String::as_str)
    }

    pub fn insert(&mut self, day: &str, exercise: &str, explanation: String) {
        self.entries.insert((day.to_string(), exercise.to_string()), explanation);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_day_and_exercise() {
        let mut cache = ExplanationCache::default();
        cache.insert("Monday", "Squat", "Legs".to_string());

        assert_eq!(cache.get("Monday", "Squat"), Some("Legs"));
        assert_eq!(cache.get("Tuesday", "Squat"), None);
        assert_eq!(cache.get("Monday", "Bench"), None);
    }

    #[test]
    fn test_dash_in_names_does_not_collide() {
        let mut cache = ExplanationCache::default();
        cache.insert("Mon-day", "Squat", "a".to_string());
        cache.insert("Mon", "day-Squat", "b".to_string());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("Mon-day", "Squat"), Some("a"));
    }
}
