//! Fault-injecting store wrapper for tests.
//!
//! [`ReactorStore`] forwards every call to a wrapped store unless a reactor
//! registered for the call's verb and kind decides to answer it instead. This
//! lets tests script conflicts, lost objects and arbitrary errors at exact
//! points of the election loop without a real API server.
//!
//! # Behavior
//!
//! - Reactors are consulted newest first (`prepend_reactor`)
//! - The first reactor that returns something other than [`Reaction::Pass`]
//!   answers the call; the wrapped store is not touched
//! - Every call is recorded as an [`Action`], whether a reactor answered it or not

use super::{DynObjectStore, Object, ObjectKey, ObjectKind, ObjectStore, Precondition, StoreError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::trace;

/// Store operations a reactor can intercept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    List,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Verb::Get => "get",
            Verb::List => "list",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
        };
        f.write_str(verb)
    }
}

/// A recorded store call.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub verb: Verb,
    pub kind: ObjectKind,
    pub namespace: Option<String>,
    /// Empty for `list`.
    pub name: String,
    /// The object passed to `create` or `update`.
    pub object: Option<Object>,
}

impl Action {
    fn for_key(verb: Verb, key: &ObjectKey) -> Self {
        Self {
            verb,
            kind: key.kind,
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            object: None,
        }
    }

    fn for_object(verb: Verb, object: &Object) -> Self {
        let key = object.key();
        Self {
            verb,
            kind: key.kind,
            namespace: key.namespace,
            name: key.name,
            object: Some(object.clone()),
        }
    }
}

/// What a reactor does with an intercepted call.
#[derive(Debug, Clone)]
pub enum Reaction {
    /// Let the next reactor, or the wrapped store, handle the call.
    Pass,
    /// Fail the call with this error.
    Error(StoreError),
    /// Answer a `get`, `create` or `update` with this object.
    Object(Object),
    /// Answer a `list` with these objects.
    Objects(Vec<Object>),
    /// Report success without touching the wrapped store. For `create` and
    /// `update` the input object is echoed back.
    Done,
}

type ReactorFn = Arc<dyn Fn(&Action) -> Reaction + Send + Sync>;

struct Reactor {
    verb: Verb,
    kind: ObjectKind,
    react: ReactorFn,
}

/// A store that lets tests intercept calls before they reach another store.
///
/// # Example
///
/// ```rust
/// use tenure_core::store::{
///     MemoryStore, ObjectKind, ObjectStore, Reaction, ReactorStore, StoreError, Verb,
/// };
/// use std::sync::Arc;
///
/// # async fn example() {
/// let store = ReactorStore::new(Arc::new(MemoryStore::new()));
/// store
///     .prepend_reactor(Verb::Get, ObjectKind::Lock, |_| {
///         Reaction::Error(StoreError::unknown("random error"))
///     })
///     .await;
///
/// let err = store.get_lock("testns", "scheduler").await.unwrap_err();
/// assert_eq!(err.to_string(), "random error");
/// # }
/// ```
pub struct ReactorStore {
    inner: DynObjectStore,
    reactors: RwLock<Vec<Reactor>>,
    actions: RwLock<Vec<Action>>,
}

impl fmt::Debug for ReactorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactorStore").finish_non_exhaustive()
    }
}

impl ReactorStore {
    /// Wraps `inner`. With no reactors every call passes straight through.
    pub fn new(inner: DynObjectStore) -> Self {
        Self {
            inner,
            reactors: RwLock::new(Vec::new()),
            actions: RwLock::new(Vec::new()),
        }
    }

    /// Registers a reactor for `verb` on `kind`, ahead of all existing ones.
    pub async fn prepend_reactor<F>(&self, verb: Verb, kind: ObjectKind, react: F)
    where
        F: Fn(&Action) -> Reaction + Send + Sync + 'static,
    {
        let mut reactors = self.reactors.write().await;
        reactors.insert(
            0,
            Reactor {
                verb,
                kind,
                react: Arc::new(react),
            },
        );
    }

    /// Removes every reactor.
    pub async fn clear_reactors(&self) {
        self.reactors.write().await.clear();
    }

    /// Returns every call made so far, oldest first.
    pub async fn actions(&self) -> Vec<Action> {
        self.actions.read().await.clone()
    }

    /// Returns the calls made so far with the given verb on the given kind.
    pub async fn actions_for(&self, verb: Verb, kind: ObjectKind) -> Vec<Action> {
        self.actions
            .read()
            .await
            .iter()
            .filter(|a| a.verb == verb && a.kind == kind)
            .cloned()
            .collect()
    }

    /// Records `action` and asks the matching reactors about it.
    async fn invoke(&self, action: Action) -> Reaction {
        let reaction = {
            let reactors = self.reactors.read().await;
            reactors
                .iter()
                .filter(|r| r.verb == action.verb && r.kind == action.kind)
                .map(|r| (r.react)(&action))
                .find(|reaction| !matches!(reaction, Reaction::Pass))
                .unwrap_or(Reaction::Pass)
        };

        trace!(
            verb = %action.verb,
            kind = %action.kind,
            name = %action.name,
            reaction = ?reaction,
            "Store call"
        );
        self.actions.write().await.push(action);
        reaction
    }
}

fn misfit(verb: Verb, reaction: &Reaction) -> StoreError {
    StoreError::unknown(format!("reaction {:?} cannot answer a {} call", reaction, verb))
}

#[async_trait]
impl ObjectStore for ReactorStore {
    async fn get(&self, key: &ObjectKey) -> Result<Object, StoreError> {
        match self.invoke(Action::for_key(Verb::Get, key)).await {
            Reaction::Pass => self.inner.get(key).await,
            Reaction::Error(e) => Err(e),
            Reaction::Object(object) => Ok(object),
            other => Err(misfit(Verb::Get, &other)),
        }
    }

    async fn list(
        &self,
        kind: ObjectKind,
        namespace: Option<&str>,
    ) -> Result<Vec<Object>, StoreError> {
        let action = Action {
            verb: Verb::List,
            kind,
            namespace: namespace.map(str::to_string),
            name: String::new(),
            object: None,
        };
        match self.invoke(action).await {
            Reaction::Pass => self.inner.list(kind, namespace).await,
            Reaction::Error(e) => Err(e),
            Reaction::Objects(objects) => Ok(objects),
            other => Err(misfit(Verb::List, &other)),
        }
    }

    async fn create(&self, object: Object) -> Result<Object, StoreError> {
        match self.invoke(Action::for_object(Verb::Create, &object)).await {
            Reaction::Pass => self.inner.create(object).await,
            Reaction::Error(e) => Err(e),
            Reaction::Object(stored) => Ok(stored),
            Reaction::Done => Ok(object),
            other => Err(misfit(Verb::Create, &other)),
        }
    }

    async fn update(&self, object: Object) -> Result<Object, StoreError> {
        match self.invoke(Action::for_object(Verb::Update, &object)).await {
            Reaction::Pass => self.inner.update(object).await,
            Reaction::Error(e) => Err(e),
            Reaction::Object(stored) => Ok(stored),
            Reaction::Done => Ok(object),
            other => Err(misfit(Verb::Update, &other)),
        }
    }

    async fn delete(
        &self,
        key: &ObjectKey,
        precondition: Option<Precondition>,
    ) -> Result<(), StoreError> {
        match self.invoke(Action::for_key(Verb::Delete, key)).await {
            Reaction::Pass => self.inner.delete(key, precondition).await,
            Reaction::Error(e) => Err(e),
            Reaction::Done => Ok(()),
            other => Err(misfit(Verb::Delete, &other)),
        }
    }
}
