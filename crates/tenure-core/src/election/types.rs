//! Types for leader election.
//!
//! This module defines:
//! - `ElectionConfig`: how an instance identifies itself and how it waits
//! - `Leadership`: the result of a successful election
//! - `ElectionStats`: counters describing how the election went

use super::backoff::Backoff;
use crate::identity::{Identity, IdentityConfig};
use crate::store::Lock;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for an election attempt.
///
/// Durations use humantime notation when deserialized (`"500ms"`, `"16s"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectionConfig {
    /// Where the instance name and namespace come from.
    pub identity: IdentityConfig,

    /// Wait after finding a live leader, before retrying.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// When set, the wait doubles after every retry up to this bound.
    /// Unset means every wait is `poll_interval`.
    #[serde(with = "humantime_serde")]
    pub max_poll_interval: Option<Duration>,

    /// Each wait is stretched by a random factor in `[0, jitter]`.
    pub jitter: f64,

    /// Give up with [`ElectionError::DeadlineExceeded`](super::ElectionError::DeadlineExceeded)
    /// after this long. Unbounded when unset.
    #[serde(with = "humantime_serde")]
    pub deadline: Option<Duration>,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            identity: IdentityConfig::default(),
            poll_interval: Duration::from_secs(1),
            max_poll_interval: None,
            jitter: 0.0,
            deadline: None,
        }
    }
}

impl ElectionConfig {
    pub fn new(identity: IdentityConfig) -> Self {
        Self {
            identity,
            ..Default::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_poll_interval(mut self, interval: Duration) -> Self {
        self.max_poll_interval = Some(interval);
        self
    }

    /// Polls at exactly `interval`, without growth or jitter.
    pub fn with_fixed_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self.max_poll_interval = None;
        self.jitter = 0.0;
        self
    }

    /// Doubles the wait from `poll_interval` up to `max`, stretching each
    /// wait by up to `jitter` of itself.
    pub fn with_exponential_backoff(mut self, max: Duration, jitter: f64) -> Self {
        self.max_poll_interval = Some(max);
        self.jitter = jitter;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.identity.name_override.is_none() && self.identity.name_env.is_empty() {
            return Err("identity.name_env cannot be empty".to_string());
        }

        if self.poll_interval.is_zero() {
            return Err("poll_interval must be greater than zero".to_string());
        }

        if let Some(max) = self.max_poll_interval {
            if max < self.poll_interval {
                return Err(format!(
                    "max_poll_interval ({:?}) must not be less than poll_interval ({:?})",
                    max, self.poll_interval
                ));
            }
        }

        if !(0.0..1.0).contains(&self.jitter) {
            return Err(format!("jitter ({}) must be in [0, 1)", self.jitter));
        }

        if matches!(self.deadline, Some(d) if d.is_zero()) {
            return Err("deadline must be greater than zero".to_string());
        }

        Ok(())
    }

    pub(crate) fn backoff(&self) -> Backoff {
        Backoff::new(
            self.poll_interval,
            self.max_poll_interval.unwrap_or(self.poll_interval),
            self.jitter,
        )
    }
}

/// How leadership was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acquisition {
    /// This call created the lock.
    Created,
    /// The lock already named this instance, e.g. after a restart.
    AlreadyHeld,
}

/// Counters describing one election attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionStats {
    /// Lock create calls issued.
    pub create_attempts: u64,
    /// Create calls that found an existing lock.
    pub contentions: u64,
    /// Waits after finding a live (or unjudgeable) owner.
    pub polls: u64,
    /// Stale locks this instance deleted.
    pub stale_locks_reclaimed: u64,
}

/// Proof of leadership returned by a successful election.
///
/// There is nothing to renew or release: the lock is held until the instance
/// record disappears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leadership {
    pub election: String,
    pub identity: Identity,
    /// The lock as stored.
    pub lock: Lock,
    pub acquisition: Acquisition,
    pub stats: ElectionStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ElectionConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.max_poll_interval, None);
        assert_eq!(config.jitter, 0.0);
        assert!(config.deadline.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_polls_at_a_fixed_interval() {
        let mut backoff = ElectionConfig::default().backoff();
        for _ in 0..10 {
            assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        }
    }

    #[test]
    fn test_exponential_backoff_is_opt_in() {
        let mut backoff = ElectionConfig::default()
            .with_exponential_backoff(Duration::from_secs(16), 0.0)
            .backoff();
        let delays: Vec<u64> = (0..6).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 16]);
    }

    #[test]
    fn test_builder() {
        let config = ElectionConfig::default()
            .with_poll_interval(Duration::from_millis(100))
            .with_max_poll_interval(Duration::from_secs(2))
            .with_jitter(0.5)
            .with_deadline(Duration::from_secs(30));

        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.max_poll_interval, Some(Duration::from_secs(2)));
        assert_eq!(config.jitter, 0.5);
        assert_eq!(config.deadline, Some(Duration::from_secs(30)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fixed_poll_interval() {
        let config = ElectionConfig::default()
            .with_exponential_backoff(Duration::from_secs(16), 0.2)
            .with_fixed_poll_interval(Duration::from_millis(250));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.max_poll_interval, None);
        assert_eq!(config.jitter, 0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let zero_interval = ElectionConfig::default().with_poll_interval(Duration::ZERO);
        assert!(zero_interval.validate().is_err());

        let inverted = ElectionConfig::default()
            .with_poll_interval(Duration::from_secs(10))
            .with_max_poll_interval(Duration::from_secs(5));
        assert!(inverted.validate().is_err());

        assert!(ElectionConfig::default().with_jitter(1.0).validate().is_err());
        assert!(ElectionConfig::default().with_jitter(-0.1).validate().is_err());

        let zero_deadline = ElectionConfig::default().with_deadline(Duration::ZERO);
        assert!(zero_deadline.validate().is_err());

        let no_name_source = ElectionConfig::new(IdentityConfig::default().with_name_env(""));
        assert!(no_name_source.validate().is_err());

        let name_override =
            ElectionConfig::new(IdentityConfig::default().with_name_env("").with_name("pod-a"));
        assert!(name_override.validate().is_ok());
    }

    #[test]
    fn test_deserialize_humantime() {
        let config: ElectionConfig = serde_json::from_value(serde_json::json!({
            "identity": { "namespace_override": "testns" },
            "poll_interval": "250ms",
            "max_poll_interval": "4s",
            "deadline": "1m"
        }))
        .unwrap();

        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.max_poll_interval, Some(Duration::from_secs(4)));
        assert_eq!(config.deadline, Some(Duration::from_secs(60)));
        assert_eq!(config.jitter, 0.0);
        assert_eq!(config.identity.name_env, "POD_NAME");
        assert_eq!(config.identity.namespace_override.as_deref(), Some("testns"));
    }

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: ElectionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ElectionConfig::default());
    }
}
