//! Metrics recorder for measurement sessions

use crate::session::{SessionOutcome, SessionState};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return; // Already initialized
    }

    describe_counter!(
        "thpt_sessions_started_total",
        "Total number of measurement sessions started"
    );
    describe_counter!(
        "thpt_sessions_completed_total",
        "Total number of sessions that delivered a result without failing"
    );
    describe_counter!(
        "thpt_sessions_failed_total",
        "Total number of sessions that took the failure path"
    );
    describe_counter!(
        "thpt_responses_undelivered_total",
        "Total number of results the client never received"
    );

    describe_gauge!(
        "thpt_active_sessions",
        "Number of sessions currently in progress"
    );

    describe_histogram!(
        "thpt_session_duration_seconds",
        "Time from start message to response"
    );
}

/// Record a session starting
pub fn record_session_started() {
    counter!("thpt_sessions_started_total").increment(1);
    gauge!("thpt_active_sessions").increment(1.0);
}

/// Record a session ending, however it ended
pub fn record_session_finished(outcome: &SessionOutcome, failed_phase: Option<&str>, duration: Duration) {
    gauge!("thpt_active_sessions").decrement(1.0);
    histogram!("thpt_session_duration_seconds").record(duration.as_secs_f64());

    if let Some(phase) = failed_phase {
        counter!("thpt_sessions_failed_total", "phase" => phase.to_string()).increment(1);
    }

    if counts_as_completed(outcome) {
        counter!("thpt_sessions_completed_total").increment(1);
    }

    if outcome.state == SessionState::Closed {
        counter!("thpt_responses_undelivered_total").increment(1);
    }
}

/// A failed session only ever carries a partial result, and a `Closed` one
/// never reached the client
fn counts_as_completed(outcome: &SessionOutcome) -> bool {
    outcome.is_clean()
}

/// Helper struct to time a session and record how it ended
pub struct SessionMetrics {
    start_time: Instant,
    failed_phase: Option<&'static str>,
}

impl SessionMetrics {
    /// Start tracking a new session
    pub fn start() -> Self {
        record_session_started();

        Self {
            start_time: Instant::now(),
            failed_phase: None,
        }
    }

    /// Remember the phase the session failed in
    pub fn mark_failed(&mut self, phase: &'static str) {
        self.failed_phase.get_or_insert(phase);
    }

    pub fn failed_phase(&self) -> Option<&'static str> {
        self.failed_phase
    }

    pub fn finish(self, outcome: &SessionOutcome) {
        record_session_finished(outcome, self.failed_phase, self.start_time.elapsed());
    }

    /// Get current duration
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MeasurementResult;

    #[test]
    fn test_init_metrics() {
        // Should not panic when called multiple times
        init_metrics();
        init_metrics();
    }

    #[test]
    fn test_first_failed_phase_wins() {
        let mut metrics = SessionMetrics::start();
        assert_eq!(metrics.failed_phase(), None);

        metrics.mark_failed("measuring");
        metrics.mark_failed("responding");
        assert_eq!(metrics.failed_phase(), Some("measuring"));
        assert!(metrics.elapsed() >= Duration::ZERO);

        // Recording without an installed recorder is a no-op
        metrics.finish(&SessionOutcome {
            session_id: "test-session".into(),
            state: SessionState::Done,
            result: MeasurementResult::default(),
            failure: Some("capturer did not start".into()),
        });
    }

    fn outcome(state: SessionState, failure: Option<&str>) -> SessionOutcome {
        SessionOutcome {
            session_id: "test-session".into(),
            state,
            result: MeasurementResult::default(),
            failure: failure.map(String::from),
        }
    }

    #[test]
    fn test_completed_only_when_delivered_without_failure() {
        assert!(counts_as_completed(&outcome(SessionState::Done, None)));

        // Partial result after a failure
        assert!(!counts_as_completed(&outcome(
            SessionState::Done,
            Some("missing SERVER_IP")
        )));
        // Result never reached the client
        assert!(!counts_as_completed(&outcome(SessionState::Closed, None)));
        assert!(!counts_as_completed(&outcome(
            SessionState::Closed,
            Some("capturer did not start")
        )));
    }
}
