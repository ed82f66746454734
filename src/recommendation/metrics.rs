//! Recommendation request metrics
//!
//! Thin layer over the `metrics` facade plus a timer that logs slow requests.
//! Nothing is recorded unless an exporter is installed.

use std::time::{Duration, Instant};

pub const REQUESTS_TOTAL: &str = "friendgraph_recommendation_requests_total";
pub const REQUEST_DURATION_MS: &str = "friendgraph_recommendation_duration_ms";
pub const CANDIDATES_RANKED: &str = "friendgraph_candidates_ranked";

/// Outcome label for a finished request
pub fn record_request(outcome: &'static str, elapsed: Duration, candidates: usize) {
    metrics::counter!(REQUESTS_TOTAL, "outcome" => outcome).increment(1);
    metrics::histogram!(REQUEST_DURATION_MS).record(elapsed.as_secs_f64() * 1000.0);
    if outcome == "ok" {
        metrics::histogram!(CANDIDATES_RANKED).record(candidates as f64);
    }
}

/// Performance timer for tracking operation duration
pub struct RequestTimer {
    start: Instant,
    label: &'static str,
    slow_threshold: Duration,
}

impl RequestTimer {
    pub fn new(label: &'static str, slow_threshold: Duration) -> Self {
        Self {
            start: Instant::now(),
            label,
            slow_threshold,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    pub fn is_slow(&self) -> bool {
        self.elapsed() > self.slow_threshold
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let elapsed = self.elapsed_ms();
        if self.is_slow() {
            tracing::warn!(
                "Slow operation: {} took {}ms (threshold: {}ms)",
                self.label,
                elapsed,
                self.slow_threshold.as_millis()
            );
        } else {
            tracing::debug!("{} completed in {}ms", self.label, elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_slow_detection() {
        let fast = RequestTimer::new("fast", Duration::from_secs(60));
        assert!(!fast.is_slow());

        let slow = RequestTimer::new("slow", Duration::ZERO);
        std::thread::sleep(Duration::from_millis(2));
        assert!(slow.is_slow());
        assert!(slow.elapsed_ms() >= 2);
    }

    #[test]
    fn test_record_request_without_exporter_is_noop() {
        record_request("ok", Duration::from_millis(5), 3);
        record_request("invalid_argument", Duration::from_millis(1), 0);
    }
}
