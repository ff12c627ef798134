//! Object store abstraction the election engine runs against.
//!
//! The store is a strongly consistent, namespaced key/value store of typed
//! records, in the shape of a cluster API server. The engine relies on two
//! properties only:
//!
//! 1. `create` fails with [`StoreError::AlreadyExists`] when the key is taken,
//!    and a successful create is immediately visible to every reader.
//! 2. `delete` with a [`Precondition`] fails with [`StoreError::Conflict`] when
//!    the stored object is not the one the caller observed.
//!
//! # Implementations
//!
//! - [`MemoryStore`]: in-memory store for tests and local development
//! - [`ReactorStore`]: wraps another store and lets tests inject responses
//! - [`CompositeStore`]: routes reads and writes to different stores
//!
//! A client for a real API server implements [`ObjectStore`] in the
//! embedding application.

mod composite;
mod error;
mod memory;
mod reactor;
mod types;

pub use composite::CompositeStore;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use reactor::{Action, Reaction, ReactorStore, Verb};
pub use types::{
    ConditionStatus, ConditionType, Host, HostCondition, Instance, InstancePhase,
    InstanceStatus, Lock, Object, ObjectKey, ObjectKind, ObjectMeta, OwnerReference,
    Precondition, EVICTED_REASON, INSTANCE_API_VERSION, INSTANCE_KIND,
};

use async_trait::async_trait;
use std::sync::Arc;

/// Shared handle to a store, as injected into the election engine.
pub type DynObjectStore = Arc<dyn ObjectStore>;

/// Trait for object store clients.
///
/// Implementations must be `Send + Sync + 'static` so a single client can be
/// shared between the engine and its liveness checks.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Fetches the object stored under `key`.
    ///
    /// Returns [`StoreError::NotFound`] if there is none.
    async fn get(&self, key: &ObjectKey) -> Result<Object, StoreError>;

    /// Lists objects of one kind.
    ///
    /// `namespace = None` lists across all namespaces. Results are ordered by
    /// name.
    async fn list(
        &self,
        kind: ObjectKind,
        namespace: Option<&str>,
    ) -> Result<Vec<Object>, StoreError>;

    /// Stores a new object and returns the stored copy (with `uid` and
    /// `creation_timestamp` assigned).
    ///
    /// Returns [`StoreError::AlreadyExists`] if the key is taken; never
    /// overwrites.
    async fn create(&self, object: Object) -> Result<Object, StoreError>;

    /// Replaces an existing object.
    ///
    /// Returns [`StoreError::NotFound`] if there is none, and
    /// [`StoreError::Conflict`] if `object` carries a `uid` that differs from
    /// the stored one.
    async fn update(&self, object: Object) -> Result<Object, StoreError>;

    /// Deletes the object stored under `key`.
    ///
    /// With a precondition the delete only happens if the stored object's
    /// `uid` matches; otherwise [`StoreError::Conflict`] is returned.
    async fn delete(
        &self,
        key: &ObjectKey,
        precondition: Option<Precondition>,
    ) -> Result<(), StoreError>;

    /// Fetches a lock.
    async fn get_lock(&self, namespace: &str, name: &str) -> Result<Lock, StoreError> {
        self.get(&ObjectKey::lock(namespace, name))
            .await?
            .into_lock()
    }

    /// Fetches an instance.
    async fn get_instance(&self, namespace: &str, name: &str) -> Result<Instance, StoreError> {
        self.get(&ObjectKey::instance(namespace, name))
            .await?
            .into_instance()
    }

    /// Fetches a host.
    async fn get_host(&self, name: &str) -> Result<Host, StoreError> {
        self.get(&ObjectKey::host(name)).await?.into_host()
    }
}
