//! Tenure core library.
//!
//! Leader-for-life election for replicated operator processes. Exactly one
//! instance holds the election's lock at a time, and holds it until it
//! provably dies. There are no leases and no renewals: the lock carries an
//! owner reference to the leader's instance record and is reclaimed only
//! when that record is gone, evicted, or placed on a host that reports
//! not-ready.
//!
//! - [`identity`]: who "self" is (instance name and namespace)
//! - [`store`]: the object store abstraction and its in-process implementations
//! - [`liveness`]: deciding whether a lock owner is dead
//! - [`election`]: the acquisition loop

pub mod election;
pub mod identity;
pub mod liveness;
pub mod store;

pub use election::{
    become_leader, Acquisition, ElectionConfig, ElectionError, ElectionStats, LeaderElection,
    Leadership,
};
pub use identity::{Identity, IdentityConfig, IdentityResolver};
pub use liveness::{LivenessOracle, LivenessVerdict};
pub use store::{DynObjectStore, MemoryStore, ObjectStore, StoreError};
