//! Leader-for-life election.
//!
//! An instance becomes leader by creating the election's lock object with
//! itself as the only owner. The lock is never renewed and never released:
//! leadership ends only when another instance proves the owner dead and
//! deletes the lock.
//!
//! # Algorithm
//!
//! ```text
//!                 ┌───────────┐
//!                 │ Resolving │── config / identity error ──▶ Failed
//!                 └─────┬─────┘
//!                       ▼
//!   ┌───────────▶ ┌───────────┐  created   ┌──────────┐
//!   │             │ Creating  │──────────▶ │ Acquired │
//!   │             └─────┬─────┘            └──────────┘
//!   │        exists     │                       ▲
//!   │                   ▼                       │ lock names self
//!   │  lock gone  ┌────────────┐────────────────┘
//!   ├──────────── │ Contending │── other store error ──▶ Failed
//!   │             └─────┬──────┘
//!   │        dead owner │ alive owner
//!   │   (delete lock)   │
//!   │                   ▼
//!   └─────────────── wait (backoff, cancellable)
//! ```
//!
//! The store's create conflict is the only arbiter between racing
//! instances. Stale locks are deleted with a uid precondition, so an instance
//! can only ever delete the exact lock it judged stale.
//!
//! Shutdown and the deadline are observed only before a create is issued and
//! while waiting. A store call that has been issued always runs to
//! completion, so a lock that was created is always reported as acquired.
//!
//! # Example
//!
//! ```rust,no_run
//! use tenure_core::election::{become_leader, ElectionConfig};
//! use tenure_core::store::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let leadership = become_leader(store, "my-operator-lock", ElectionConfig::default()).await?;
//!     println!("Leading as {}", leadership.identity.name);
//!     Ok(())
//! }
//! ```

mod backoff;
mod error;
mod types;

pub use error::ElectionError;
pub use types::{Acquisition, ElectionConfig, ElectionStats, Leadership};

use crate::identity::{Identity, IdentityResolver};
use crate::liveness::{LivenessOracle, LivenessVerdict};
use crate::store::{DynObjectStore, Lock, ObjectKey, Precondition};
use backoff::Backoff;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tenure_observability::ElectionMetrics;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Runs leader-for-life elections against an injected store.
pub struct LeaderElection {
    store: DynObjectStore,
    config: ElectionConfig,
    shutdown: Option<watch::Receiver<bool>>,
}

impl fmt::Debug for LeaderElection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaderElection")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LeaderElection {
    pub fn new(store: DynObjectStore, config: ElectionConfig) -> Self {
        Self {
            store,
            config,
            shutdown: None,
        }
    }

    /// Cancels waiting elections once `true` is sent on the channel.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn config(&self) -> &ElectionConfig {
        &self.config
    }

    /// Blocks until this instance holds the lock named `election`.
    ///
    /// Returns immediately if the lock already names this instance (the
    /// process was restarted). Otherwise waits for the current owner to be
    /// proven dead, for as long as it takes unless a deadline or shutdown
    /// signal is configured.
    ///
    /// # Errors
    ///
    /// * [`ElectionError::InvalidConfig`], [`ElectionError::NoNamespace`],
    ///   [`ElectionError::MissingIdentity`] before the store is contacted
    /// * [`ElectionError::Store`] for any store error other than the expected
    ///   contention signals, unchanged
    /// * [`ElectionError::Cancelled`] / [`ElectionError::DeadlineExceeded`]
    ///   when the signal or deadline is observed before a create or during a
    ///   wait; never while a store call is in flight
    #[instrument(skip(self))]
    pub async fn become_leader(&self, election: &str) -> Result<Leadership, ElectionError> {
        let metrics = ElectionMetrics::new(election);

        let result = self.elect(election, &metrics).await;

        match &result {
            Ok(leadership) => {
                metrics.record_acquired();
                info!(
                    instance = %leadership.identity.name,
                    acquisition = ?leadership.acquisition,
                    attempts = leadership.stats.create_attempts,
                    "Became the leader"
                );
            }
            Err(e) => {
                metrics.record_error(e.kind());
                if e.is_cancelled() {
                    info!(error = %e, "Leader election stopped");
                } else {
                    error!(error = %e, "Leader election failed");
                }
            }
        }

        result
    }

    async fn elect(
        &self,
        election: &str,
        metrics: &ElectionMetrics,
    ) -> Result<Leadership, ElectionError> {
        self.config
            .validate()
            .map_err(ElectionError::invalid_config)?;
        let deadline = self.config.deadline.map(Deadline::starting_now);
        let identity = IdentityResolver::new(self.config.identity.clone()).resolve()?;

        info!(
            instance = %identity.name,
            namespace = %identity.namespace,
            "Trying to become the leader"
        );

        let mut attempt = Attempt {
            election,
            store: Arc::clone(&self.store),
            oracle: LivenessOracle::new(Arc::clone(&self.store)),
            backoff: self.config.backoff(),
            shutdown: self.shutdown.clone(),
            deadline,
            metrics,
            stats: ElectionStats::default(),
            identity,
        };

        let (lock, acquisition) = attempt.run().await?;
        Ok(Leadership {
            election: election.to_string(),
            identity: attempt.identity,
            lock,
            acquisition,
            stats: attempt.stats,
        })
    }
}

/// Runs one election with a one-off engine.
pub async fn become_leader(
    store: DynObjectStore,
    election: &str,
    config: ElectionConfig,
) -> Result<Leadership, ElectionError> {
    LeaderElection::new(store, config)
        .become_leader(election)
        .await
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    fn starting_now(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
            limit,
        }
    }

    fn is_past(&self) -> bool {
        Instant::now() >= self.at
    }

    fn exceeded(&self) -> ElectionError {
        ElectionError::DeadlineExceeded {
            deadline: self.limit,
        }
    }
}

enum Step {
    Create,
    Contend,
    Wait,
    Acquired(Lock, Acquisition),
}

/// State of a single `become_leader` call.
struct Attempt<'a> {
    election: &'a str,
    identity: Identity,
    store: DynObjectStore,
    oracle: LivenessOracle,
    backoff: Backoff,
    shutdown: Option<watch::Receiver<bool>>,
    deadline: Option<Deadline>,
    metrics: &'a ElectionMetrics,
    stats: ElectionStats,
}

impl Attempt<'_> {
    async fn run(&mut self) -> Result<(Lock, Acquisition), ElectionError> {
        let mut step = Step::Create;
        loop {
            step = match step {
                Step::Create => self.create().await?,
                Step::Contend => self.contend().await?,
                Step::Wait => {
                    self.wait().await?;
                    Step::Create
                }
                Step::Acquired(lock, acquisition) => return Ok((lock, acquisition)),
            };
        }
    }

    fn lock_key(&self) -> ObjectKey {
        ObjectKey::lock(&self.identity.namespace, self.election)
    }

    async fn create(&mut self) -> Result<Step, ElectionError> {
        self.ensure_not_cancelled()?;
        self.stats.create_attempts += 1;
        self.metrics.record_attempt();

        let lock = Lock::new(
            self.election,
            &self.identity.namespace,
            self.identity.owner_reference(),
        );

        match self.store.create(lock.into()).await {
            Ok(stored) => Ok(Step::Acquired(stored.into_lock()?, Acquisition::Created)),
            Err(e) if e.is_already_exists() => {
                self.stats.contentions += 1;
                self.metrics.record_contention();
                debug!("Lock already exists");
                Ok(Step::Contend)
            }
            Err(e) => {
                error!(error = %e, "Unknown error creating lock");
                Err(e.into())
            }
        }
    }

    async fn contend(&mut self) -> Result<Step, ElectionError> {
        let existing = match self
            .store
            .get_lock(&self.identity.namespace, self.election)
            .await
        {
            Ok(lock) => lock,
            Err(e) if e.is_not_found() => {
                info!("Lock disappeared before it could be read, retrying");
                return Ok(Step::Create);
            }
            Err(e) => {
                error!(error = %e, "Unknown error reading lock");
                return Err(e.into());
            }
        };

        if existing.is_owned_by(&self.identity.name) {
            info!("Found existing lock with my name, I was likely restarted");
            return Ok(Step::Acquired(existing, Acquisition::AlreadyHeld));
        }

        let Some(owner) = existing.sole_owner().cloned() else {
            warn!(
                owners = ?existing.owner_references(),
                "Lock must have exactly one instance owner reference, waiting"
            );
            return Ok(Step::Wait);
        };

        let verdict = self
            .oracle
            .verdict(&self.identity.namespace, &owner)
            .await?;

        if !verdict.is_dead() {
            info!(owner = %owner.name, "Not the leader, waiting");
            return Ok(Step::Wait);
        }

        info!(owner = %owner.name, verdict = %verdict, "Lock owner is dead, deleting stale lock");
        Ok(self.reclaim(&existing, verdict).await)
    }

    /// Deletes the exact lock that was judged stale.
    async fn reclaim(&mut self, stale: &Lock, verdict: LivenessVerdict) -> Step {
        let precondition = stale.metadata.uid.map(Precondition::uid);

        match self.store.delete(&self.lock_key(), precondition).await {
            Ok(()) => {
                self.stats.stale_locks_reclaimed += 1;
                self.metrics.record_stale_lock_reclaimed(verdict.as_str());
                debug!("Deleted stale lock");
                Step::Create
            }
            Err(e) if e.is_not_found() => {
                debug!("Stale lock was already deleted by another instance");
                Step::Create
            }
            Err(e) if e.is_conflict() => {
                debug!("Stale lock was replaced before it could be deleted");
                Step::Create
            }
            Err(e) => {
                warn!(error = %e, "Failed to delete stale lock, retrying after backoff");
                Step::Wait
            }
        }
    }

    async fn wait(&mut self) -> Result<(), ElectionError> {
        let delay = self.backoff.next_delay();
        self.stats.polls += 1;
        debug!(delay_ms = delay.as_millis() as u64, "Waiting before retrying");

        let deadline = self.deadline;
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = shutdown_requested(self.shutdown.as_mut()) => Err(ElectionError::Cancelled),
            e = deadline_reached(deadline) => Err(e),
        }
    }

    /// Checked before every create; an issued create is never abandoned.
    fn ensure_not_cancelled(&self) -> Result<(), ElectionError> {
        if matches!(&self.shutdown, Some(shutdown) if *shutdown.borrow()) {
            return Err(ElectionError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline.is_past() => Err(deadline.exceeded()),
            _ => Ok(()),
        }
    }
}

/// Resolves once `true` is observed. Never resolves without a receiver, or if
/// the sender is dropped without signalling.
async fn shutdown_requested(shutdown: Option<&mut watch::Receiver<bool>>) {
    let Some(shutdown) = shutdown else {
        return std::future::pending().await;
    };
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn deadline_reached(deadline: Option<Deadline>) -> ElectionError {
    match deadline {
        Some(deadline) => {
            tokio::time::sleep_until(deadline.at).await;
            deadline.exceeded()
        }
        None => std::future::pending().await,
    }
}
