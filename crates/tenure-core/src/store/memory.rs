//! In-memory implementation of the ObjectStore trait.
//!
//! This module provides `MemoryStore`, a strongly consistent store held in a
//! single `HashMap`. Every mutation takes the write lock, so create-if-absent
//! and delete-if-uid-matches are atomic, which is all the election engine
//! needs from a real API server.

use super::{Object, ObjectKey, ObjectKind, ObjectStore, Precondition, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::trace;
use uuid::Uuid;

/// An in-memory object store.
///
/// Clones share the same underlying objects, so several engines (one per
/// simulated instance) can contend on one store.
///
/// # Example
///
/// ```rust
/// use tenure_core::store::{Lock, MemoryStore, ObjectStore, OwnerReference};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// let lock = Lock::new("scheduler", "testns", OwnerReference::instance("pod-a"));
/// store.create(lock.clone().into()).await?;
///
/// // A second create of the same key loses.
/// assert!(store.create(lock.into()).await.unwrap_err().is_already_exists());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<HashMap<ObjectKey, Object>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `objects`.
    ///
    /// Objects are stored as if created, receiving a fresh `uid` and
    /// `creation_timestamp`. Later objects replace earlier ones with the same
    /// key.
    pub fn with_objects(objects: impl IntoIterator<Item = Object>) -> Self {
        let map = objects
            .into_iter()
            .map(|mut object| {
                stamp(&mut object);
                (object.key(), object)
            })
            .collect();
        Self {
            objects: Arc::new(RwLock::new(map)),
        }
    }

    /// Returns the number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Returns `true` if the store holds no objects.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Removes every object.
    pub async fn clear(&self) {
        self.objects.write().await.clear();
    }
}

/// Assigns the fields the store owns.
fn stamp(object: &mut Object) {
    let meta = object.metadata_mut();
    meta.uid = Some(Uuid::new_v4());
    meta.creation_timestamp = Some(Utc::now());
}

fn validate_key(key: &ObjectKey) -> Result<(), StoreError> {
    if key.name.is_empty() {
        return Err(StoreError::Invalid(format!("{} name cannot be empty", key.kind)));
    }
    if key.kind.is_namespaced() && key.namespace.as_deref().map_or(true, str::is_empty) {
        return Err(StoreError::Invalid(format!(
            "{} '{}' requires a namespace",
            key.kind, key.name
        )));
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Object, StoreError> {
        let objects = self.objects.read().await;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(key.kind, &key.name))
    }

    async fn list(
        &self,
        kind: ObjectKind,
        namespace: Option<&str>,
    ) -> Result<Vec<Object>, StoreError> {
        let objects = self.objects.read().await;
        let mut items: Vec<Object> = objects
            .iter()
            .filter(|(key, _)| key.kind == kind)
            .filter(|(key, _)| namespace.is_none() || key.namespace.as_deref() == namespace)
            .map(|(_, object)| object.clone())
            .collect();
        items.sort_by(|a, b| a.metadata().name.cmp(&b.metadata().name));
        Ok(items)
    }

    async fn create(&self, mut object: Object) -> Result<Object, StoreError> {
        let key = object.key();
        validate_key(&key)?;

        let mut objects = self.objects.write().await;
        if objects.contains_key(&key) {
            trace!(key = %key, "Create rejected, object exists");
            return Err(StoreError::already_exists(key.kind, key.name));
        }

        stamp(&mut object);
        objects.insert(key, object.clone());
        Ok(object)
    }

    async fn update(&self, mut object: Object) -> Result<Object, StoreError> {
        let key = object.key();
        validate_key(&key)?;

        let mut objects = self.objects.write().await;
        let stored = objects
            .get(&key)
            .ok_or_else(|| StoreError::not_found(key.kind, &key.name))?;

        let stored_meta = stored.metadata();
        if let Some(uid) = object.metadata().uid {
            if stored_meta.uid != Some(uid) {
                return Err(StoreError::conflict(
                    key.kind,
                    &key.name,
                    "the object has been replaced since it was read",
                ));
            }
        }

        let uid = stored_meta.uid;
        let creation_timestamp = stored_meta.creation_timestamp;
        let meta = object.metadata_mut();
        meta.uid = uid;
        meta.creation_timestamp = creation_timestamp;

        objects.insert(key, object.clone());
        Ok(object)
    }

    async fn delete(
        &self,
        key: &ObjectKey,
        precondition: Option<Precondition>,
    ) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;
        let stored = objects
            .get(key)
            .ok_or_else(|| StoreError::not_found(key.kind, &key.name))?;

        if let Some(precondition) = precondition {
            if stored.metadata().uid != Some(precondition.uid) {
                return Err(StoreError::conflict(
                    key.kind,
                    &key.name,
                    format!("precondition failed: uid {}", precondition.uid),
                ));
            }
        }

        objects.remove(key);
        Ok(())
    }
}
