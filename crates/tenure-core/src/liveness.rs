//! Judging whether a lock owner is provably dead.
//!
//! Without heartbeats there are only two signals that prove an owner will
//! never act again: the platform evicted it, or the host it was placed on
//! reports not-ready. A missing instance record counts as well. Anything else,
//! including errors while reading the host, is treated as alive.

use crate::store::{
    ConditionStatus, ConditionType, DynObjectStore, Host, Instance, InstancePhase,
    OwnerReference, StoreError, EVICTED_REASON,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Outcome of a liveness check on a lock owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessVerdict {
    /// Not provably dead.
    Alive,
    /// The owner's instance record no longer exists.
    DeadNotFound,
    /// The owner failed with the platform's eviction reason.
    DeadEvicted,
    /// The owner's host reports `Ready=False`.
    DeadNodeNotReady,
}

impl LivenessVerdict {
    pub fn is_dead(&self) -> bool {
        !matches!(self, LivenessVerdict::Alive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LivenessVerdict::Alive => "alive",
            LivenessVerdict::DeadNotFound => "dead_not_found",
            LivenessVerdict::DeadEvicted => "dead_evicted",
            LivenessVerdict::DeadNodeNotReady => "dead_node_not_ready",
        }
    }
}

impl fmt::Display for LivenessVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns `true` if the instance failed because the platform evicted it.
pub fn is_evicted(instance: &Instance) -> bool {
    instance.status.phase == InstancePhase::Failed
        && instance.status.reason.as_deref() == Some(EVICTED_REASON)
}

/// Returns `true` only if the host explicitly reports `Ready=False`.
///
/// A missing `Ready` condition and `Ready=Unknown` both mean "not known to be
/// down".
pub fn is_not_ready(host: &Host) -> bool {
    host.condition(ConditionType::Ready)
        .map_or(false, |c| c.status == ConditionStatus::False)
}

/// Decides whether a lock owner is dead by reading its instance and host.
#[derive(Clone)]
pub struct LivenessOracle {
    store: DynObjectStore,
}

impl fmt::Debug for LivenessOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LivenessOracle").finish_non_exhaustive()
    }
}

impl LivenessOracle {
    pub fn new(store: DynObjectStore) -> Self {
        Self { store }
    }

    /// Judges the owner named by `owner` in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns the store error if the owner's instance cannot be read for any
    /// reason other than not existing.
    pub async fn verdict(
        &self,
        namespace: &str,
        owner: &OwnerReference,
    ) -> Result<LivenessVerdict, StoreError> {
        let instance = match self.store.get_instance(namespace, &owner.name).await {
            Ok(instance) => instance,
            Err(e) if e.is_not_found() => {
                debug!(owner = %owner.name, "Owner instance no longer exists");
                return Ok(LivenessVerdict::DeadNotFound);
            }
            Err(e) => return Err(e),
        };

        if is_evicted(&instance) {
            debug!(owner = %owner.name, "Owner instance was evicted");
            return Ok(LivenessVerdict::DeadEvicted);
        }

        if let Some(host) = instance.host_name.as_deref().filter(|h| !h.is_empty()) {
            if self.host_not_ready(host).await {
                debug!(owner = %owner.name, host = %host, "Owner's host is not ready");
                return Ok(LivenessVerdict::DeadNodeNotReady);
            }
        }

        Ok(LivenessVerdict::Alive)
    }

    /// Returns `true` if the named host exists and reports `Ready=False`.
    pub async fn host_not_ready(&self, host: &str) -> bool {
        match self.store.get_host(host).await {
            Ok(host) => is_not_ready(&host),
            Err(e) => {
                warn!(host = %host, error = %e, "Could not read host, assuming it is ready");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, ObjectKind, Reaction, ReactorStore, Verb};
    use std::sync::Arc;

    fn oracle(objects: Vec<crate::store::Object>) -> LivenessOracle {
        LivenessOracle::new(Arc::new(MemoryStore::with_objects(objects)))
    }

    #[test]
    fn test_is_evicted_empty_status() {
        let mut instance = Instance::new("leader", "testns");
        instance.status = Default::default();
        assert!(!is_evicted(&instance));
    }

    #[test]
    fn test_is_evicted_wrong_reason() {
        let instance =
            Instance::new("leader", "testns").with_status(InstancePhase::Failed, Some("invalid"));
        assert!(!is_evicted(&instance));
    }

    #[test]
    fn test_is_evicted_wrong_phase() {
        let instance = Instance::new("leader", "testns")
            .with_status(InstancePhase::Running, Some(EVICTED_REASON));
        assert!(!is_evicted(&instance));
    }

    #[test]
    fn test_is_evicted_reason_is_case_sensitive() {
        let instance =
            Instance::new("leader", "testns").with_status(InstancePhase::Failed, Some("evicted"));
        assert!(!is_evicted(&instance));
    }

    #[test]
    fn test_is_evicted() {
        let instance = Instance::new("leader", "testns")
            .with_status(InstancePhase::Failed, Some(EVICTED_REASON));
        assert!(is_evicted(&instance));
    }

    #[test]
    fn test_is_not_ready_only_on_explicit_false() {
        assert!(!is_not_ready(&Host::new("node")));
        assert!(!is_not_ready(
            &Host::new("node").with_condition(ConditionType::Ready, ConditionStatus::Unknown)
        ));
        assert!(!is_not_ready(
            &Host::new("node").with_condition(ConditionType::Ready, ConditionStatus::True)
        ));
        assert!(is_not_ready(
            &Host::new("node").with_condition(ConditionType::Ready, ConditionStatus::False)
        ));
    }

    #[test]
    fn test_is_not_ready_ignores_other_conditions() {
        let host =
            Host::new("node").with_condition(ConditionType::MemoryPressure, ConditionStatus::False);
        assert!(!is_not_ready(&host));
    }

    #[tokio::test]
    async fn test_verdict_missing_instance() {
        let oracle = oracle(vec![]);
        let verdict = oracle
            .verdict("testns", &OwnerReference::instance("leader"))
            .await
            .unwrap();
        assert_eq!(verdict, LivenessVerdict::DeadNotFound);
    }

    #[tokio::test]
    async fn test_verdict_evicted_instance() {
        let oracle = oracle(vec![Instance::new("leader", "testns")
            .on_host("node")
            .with_status(InstancePhase::Failed, Some(EVICTED_REASON))
            .into()]);
        let verdict = oracle
            .verdict("testns", &OwnerReference::instance("leader"))
            .await
            .unwrap();
        assert_eq!(verdict, LivenessVerdict::DeadEvicted);
    }

    #[tokio::test]
    async fn test_verdict_over_host_readiness_states() {
        let cases = [
            (None, LivenessVerdict::Alive),
            (Some(ConditionStatus::Unknown), LivenessVerdict::Alive),
            (Some(ConditionStatus::True), LivenessVerdict::Alive),
            (Some(ConditionStatus::False), LivenessVerdict::DeadNodeNotReady),
        ];

        for (ready, expected) in cases {
            let mut host = Host::new("node");
            if let Some(status) = ready {
                host = host.with_condition(ConditionType::Ready, status);
            }
            let oracle = oracle(vec![
                Instance::new("leader", "testns").on_host("node").into(),
                host.into(),
            ]);

            let verdict = oracle
                .verdict("testns", &OwnerReference::instance("leader"))
                .await
                .unwrap();
            assert_eq!(verdict, expected, "ready condition {:?}", ready);
        }
    }

    #[tokio::test]
    async fn test_verdict_unscheduled_instance_is_alive() {
        let oracle = oracle(vec![Instance::new("leader", "testns").into()]);
        let verdict = oracle
            .verdict("testns", &OwnerReference::instance("leader"))
            .await
            .unwrap();
        assert_eq!(verdict, LivenessVerdict::Alive);
    }

    #[tokio::test]
    async fn test_verdict_missing_host_is_alive() {
        let oracle = oracle(vec![Instance::new("leader", "testns").on_host("gone").into()]);
        assert!(!oracle.host_not_ready("gone").await);
        let verdict = oracle
            .verdict("testns", &OwnerReference::instance("leader"))
            .await
            .unwrap();
        assert_eq!(verdict, LivenessVerdict::Alive);
    }

    #[tokio::test]
    async fn test_verdict_propagates_instance_read_errors() {
        let store = ReactorStore::new(Arc::new(MemoryStore::new()));
        store
            .prepend_reactor(Verb::Get, ObjectKind::Instance, |_| {
                Reaction::Error(StoreError::Connection("refused".to_string()))
            })
            .await;
        let oracle = LivenessOracle::new(Arc::new(store));

        let err = oracle
            .verdict("testns", &OwnerReference::instance("leader"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Connection(_)));
    }

    #[tokio::test]
    async fn test_verdict_host_read_error_is_alive() {
        let memory = MemoryStore::with_objects(vec![
            Instance::new("leader", "testns").on_host("node").into(),
            Host::new("node")
                .with_condition(ConditionType::Ready, ConditionStatus::False)
                .into(),
        ]);
        let store = ReactorStore::new(Arc::new(memory));
        store
            .prepend_reactor(Verb::Get, ObjectKind::Host, |_| {
                Reaction::Error(StoreError::unknown("random error"))
            })
            .await;
        let oracle = LivenessOracle::new(Arc::new(store));

        let verdict = oracle
            .verdict("testns", &OwnerReference::instance("leader"))
            .await
            .unwrap();
        assert_eq!(verdict, LivenessVerdict::Alive);
    }

    #[test]
    fn test_verdict_labels() {
        assert!(!LivenessVerdict::Alive.is_dead());
        assert!(LivenessVerdict::DeadNotFound.is_dead());
        assert_eq!(LivenessVerdict::DeadNodeNotReady.to_string(), "dead_node_not_ready");
    }
}
