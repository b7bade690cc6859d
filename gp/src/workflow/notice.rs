//! Transient notices that hide themselves after a while

use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    expires_at: Instant,
}

impl Notice {
    pub fn new(text: impl Into<String>, shown_at: Instant, ttl: Duration) -> Self {
        Self {
            text: text.into(),
            expires_at: shown_at + ttl,
        }
    }

    pub fn is_active(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_expires() {
        let start = Instant::now();
        let notice = Notice::new("Prefers mornings", start, Duration::from_secs(10));
        assert!(notice.is_active(start));
        assert!(notice.is_active(start + Duration::from_secs(9)));
        assert!(!notice.is_active(start + Duration::from_secs(10)));
    }
}
