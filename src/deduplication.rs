// 🔁 Live-scan deduplication - suppress reader bounce
//
// A handheld reader held over a stationary tag re-triggers. The same tag id
// accepted less than the window ago is a bounce: dropped, not recorded.
// Only the most recently accepted tag is tracked, not a per-tag history.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanDecision {
    Accept,
    Bounce,
}

impl ScanDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ScanDecision::Accept)
    }
}

pub struct ScanDebouncer {
    /// Bounce window (default: 1.5s)
    pub window: Duration,

    last: Option<(String, DateTime<Utc>)>,
}

impl ScanDebouncer {
    pub fn new() -> Self {
        Self::with_window(Duration::milliseconds(1500))
    }

    pub fn with_window(window: Duration) -> Self {
        ScanDebouncer { window, last: None }
    }

    /// Decide on one read. Accepted reads become the new reference.
    pub fn accept_scan(&mut self, tag_id: &str, now: DateTime<Utc>) -> ScanDecision {
        if let Some((last_tag, last_at)) = &self.last {
            if last_tag == tag_id && now - *last_at < self.window {
                tracing::debug!("bounce: {} re-read after {}ms", tag_id, (now - *last_at).num_milliseconds());
                return ScanDecision::Bounce;
            }
        }

        self.last = Some((tag_id.to_string(), now));
        ScanDecision::Accept
    }

    pub fn last_accepted(&self) -> Option<&str> {
        self.last.as_ref().map(|(tag, _)| tag.as_str())
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

impl Default for ScanDebouncer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_bounce_within_window() {
        let mut d = ScanDebouncer::new();
        assert_eq!(d.accept_scan("ABC123", t0()), ScanDecision::Accept);
        assert_eq!(
            d.accept_scan("ABC123", t0() + Duration::milliseconds(1000)),
            ScanDecision::Bounce
        );
        assert_eq!(
            d.accept_scan("ABC123", t0() + Duration::milliseconds(1600)),
            ScanDecision::Accept
        );
    }

    #[test]
    fn test_window_boundary_accepts() {
        let mut d = ScanDebouncer::new();
        d.accept_scan("ABC123", t0());
        assert!(d
            .accept_scan("ABC123", t0() + Duration::milliseconds(1500))
            .is_accepted());
    }

    #[test]
    fn test_bounce_does_not_move_reference() {
        let mut d = ScanDebouncer::new();
        d.accept_scan("ABC123", t0());
        d.accept_scan("ABC123", t0() + Duration::milliseconds(1000));
        // 1600ms after the ACCEPTED read, even though only 600ms after the bounce
        assert!(d
            .accept_scan("ABC123", t0() + Duration::milliseconds(1600))
            .is_accepted());
    }

    #[test]
    fn test_only_latest_tag_tracked() {
        let mut d = ScanDebouncer::new();
        d.accept_scan("AAA111", t0());
        d.accept_scan("BBB222", t0() + Duration::milliseconds(100));
        // AAA111 is no longer the reference, so it is accepted again
        assert!(d
            .accept_scan("AAA111", t0() + Duration::milliseconds(200))
            .is_accepted());
        assert_eq!(d.last_accepted(), Some("AAA111"));
    }

    #[test]
    fn test_reset() {
        let mut d = ScanDebouncer::new();
        d.accept_scan("ABC123", t0());
        d.reset();
        assert!(d.accept_scan("ABC123", t0()).is_accepted());
    }
}
