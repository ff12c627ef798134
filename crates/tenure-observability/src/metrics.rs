//! Metrics for the election engine.
//!
//! Metrics are emitted through the `metrics` facade; the embedding process
//! decides which exporter (if any) is installed. Without a recorder every call
//! here is a no-op.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use std::sync::Once;

static REGISTER: Once = Once::new();

/// Records election progress for a single instance.
///
/// Every metric is labelled with the election name so that one process can
/// take part in several election domains.
#[derive(Debug, Clone)]
pub struct ElectionMetrics {
    election: String,
}

impl ElectionMetrics {
    /// Creates a recorder for the given election and registers descriptions
    /// on first use.
    pub fn new(election: impl Into<String>) -> Self {
        REGISTER.call_once(Self::register_metrics);
        Self {
            election: election.into(),
        }
    }

    /// Returns the election this recorder labels its metrics with.
    pub fn election(&self) -> &str {
        &self.election
    }

    fn register_metrics() {
        describe_counter!(
            "tenure_election_attempts_total",
            "Total number of lock create attempts"
        );
        describe_counter!(
            "tenure_election_contentions_total",
            "Total number of create attempts that found an existing lock"
        );
        describe_counter!(
            "tenure_stale_locks_reclaimed_total",
            "Total number of locks deleted after their owner was proven dead"
        );
        describe_counter!(
            "tenure_leadership_acquired_total",
            "Total number of successful leadership acquisitions"
        );
        describe_counter!(
            "tenure_election_errors_total",
            "Total number of elections aborted with an error"
        );
        describe_gauge!(
            "tenure_is_leader",
            "1 when this instance holds the election lock"
        );
    }

    /// Records a lock create attempt.
    pub fn record_attempt(&self) {
        counter!("tenure_election_attempts_total", "election" => self.election.clone())
            .increment(1);
    }

    /// Records a create attempt that found an existing lock.
    pub fn record_contention(&self) {
        counter!("tenure_election_contentions_total", "election" => self.election.clone())
            .increment(1);
    }

    /// Records the deletion of a stale lock, labelled by why the owner was judged dead.
    pub fn record_stale_lock_reclaimed(&self, verdict: &str) {
        counter!(
            "tenure_stale_locks_reclaimed_total",
            "election" => self.election.clone(),
            "verdict" => verdict.to_string()
        )
        .increment(1);
    }

    /// Records that this instance became the leader.
    pub fn record_acquired(&self) {
        counter!("tenure_leadership_acquired_total", "election" => self.election.clone())
            .increment(1);
        gauge!("tenure_is_leader", "election" => self.election.clone()).set(1.0);
    }

    /// Records an election aborted with an error.
    pub fn record_error(&self, kind: &str) {
        counter!(
            "tenure_election_errors_total",
            "election" => self.election.clone(),
            "kind" => kind.to_string()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let metrics = ElectionMetrics::new("scheduler");
        metrics.record_attempt();
        metrics.record_contention();
        metrics.record_stale_lock_reclaimed("dead_not_found");
        metrics.record_acquired();
        metrics.record_error("store");
        assert_eq!(metrics.election(), "scheduler");
    }

    #[test]
    fn test_register_is_idempotent() {
        let a = ElectionMetrics::new("a");
        let b = ElectionMetrics::new("b");
        assert_ne!(a.election(), b.election());
    }
}
