//! Store that splits reads and writes between two backends.

use super::{DynObjectStore, Object, ObjectKey, ObjectKind, ObjectStore, Precondition, StoreError};
use async_trait::async_trait;
use std::fmt;

/// Routes `get`/`list` to a reader and `create`/`update`/`delete` to a writer.
///
/// Typical use is reading through a cache while writing to the API server, or
/// in tests, injecting faults into one direction only.
pub struct CompositeStore {
    reader: DynObjectStore,
    writer: DynObjectStore,
}

impl CompositeStore {
    pub fn new(reader: DynObjectStore, writer: DynObjectStore) -> Self {
        Self { reader, writer }
    }
}

impl fmt::Debug for CompositeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl ObjectStore for CompositeStore {
    async fn get(&self, key: &ObjectKey) -> Result<Object, StoreError> {
        self.reader.get(key).await
    }

    async fn list(
        &self,
        kind: ObjectKind,
        namespace: Option<&str>,
    ) -> Result<Vec<Object>, StoreError> {
        self.reader.list(kind, namespace).await
    }

    async fn create(&self, object: Object) -> Result<Object, StoreError> {
        self.writer.create(object).await
    }

    async fn update(&self, object: Object) -> Result<Object, StoreError> {
        self.writer.update(object).await
    }

    async fn delete(
        &self,
        key: &ObjectKey,
        precondition: Option<Precondition>,
    ) -> Result<(), StoreError> {
        self.writer.delete(key, precondition).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Lock, MemoryStore, OwnerReference};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_reads_and_writes_are_routed() {
        let reader = Arc::new(MemoryStore::new());
        let writer = Arc::new(MemoryStore::new());
        let store = CompositeStore::new(reader.clone(), writer.clone());

        let lock = Lock::new("scheduler", "testns", OwnerReference::instance("pod-a"));
        store.create(lock.into()).await.unwrap();

        assert_eq!(writer.len().await, 1);
        assert!(reader.is_empty().await);
        assert!(store.get_lock("testns", "scheduler").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_shared_backend_behaves_like_one_store() {
        let memory = Arc::new(MemoryStore::new());
        let store = CompositeStore::new(memory.clone(), memory.clone());

        let lock = Lock::new("scheduler", "testns", OwnerReference::instance("pod-a"));
        store.create(lock.into()).await.unwrap();
        let stored = store.get_lock("testns", "scheduler").await.unwrap();

        store
            .delete(
                &ObjectKey::lock("testns", "scheduler"),
                stored.metadata.uid.map(Precondition::uid),
            )
            .await
            .unwrap();
        assert!(memory.is_empty().await);
    }
}
