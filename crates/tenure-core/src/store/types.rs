//! Object shapes stored in the cluster object store.
//!
//! This module defines the records the election engine reads and writes:
//! - `Lock`: the election lock, owned by exactly one instance
//! - `Instance`: a running process (a pod) and its placement
//! - `Host`: the node an instance is placed on, with readiness conditions
//!
//! Every record carries an [`ObjectMeta`] with its name, namespace and the
//! ownership-reference list.

use super::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// API version written into owner references that point at an instance.
pub const INSTANCE_API_VERSION: &str = "v1";

/// Kind written into owner references that point at an instance.
pub const INSTANCE_KIND: &str = "Pod";

/// Status reason the platform records on an instance it evicted.
pub const EVICTED_REASON: &str = "Evicted";

/// The kinds of object the store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Lock,
    Instance,
    Host,
}

impl ObjectKind {
    /// Hosts are cluster-scoped; everything else lives in a namespace.
    pub fn is_namespaced(&self) -> bool {
        !matches!(self, ObjectKind::Host)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Lock => "Lock",
            ObjectKind::Instance => "Instance",
            ObjectKind::Host => "Host",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one object in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub kind: ObjectKind,
    /// `None` for cluster-scoped kinds.
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn lock(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: ObjectKind::Lock,
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn instance(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: ObjectKind::Instance,
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn host(name: impl Into<String>) -> Self {
        Self {
            kind: ObjectKind::Host,
            namespace: None,
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// A back-reference from an object to the object that owns it.
///
/// This is a lookup key, not a pointer: resolving it means fetching the
/// named object from the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
}

impl OwnerReference {
    /// Creates a reference to the instance with the given name.
    pub fn instance(name: impl Into<String>) -> Self {
        Self {
            api_version: INSTANCE_API_VERSION.to_string(),
            kind: INSTANCE_KIND.to_string(),
            name: name.into(),
        }
    }

    /// Returns `true` if this reference points at an instance.
    pub fn is_instance(&self) -> bool {
        self.kind == INSTANCE_KIND
    }
}

/// Metadata shared by every stored object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Assigned by the store on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,
    /// Assigned by the store on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn namespaced(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }
}

/// The election lock.
///
/// The lock's existence means "someone is leader"; its single owner
/// reference names who.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lock {
    pub metadata: ObjectMeta,
}

impl Lock {
    /// Creates a lock for `election` in `namespace` owned by `owner`.
    pub fn new(
        election: impl Into<String>,
        namespace: impl Into<String>,
        owner: OwnerReference,
    ) -> Self {
        let mut metadata = ObjectMeta::namespaced(election, namespace);
        metadata.owner_references.push(owner);
        Self { metadata }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn owner_references(&self) -> &[OwnerReference] {
        &self.metadata.owner_references
    }

    /// Returns the owner if the lock carries exactly one reference and it
    /// points at an instance.
    pub fn sole_owner(&self) -> Option<&OwnerReference> {
        match self.metadata.owner_references.as_slice() {
            [owner] if owner.is_instance() => Some(owner),
            _ => None,
        }
    }

    /// Returns `true` if any owner reference of the instance kind names the
    /// given instance.
    ///
    /// References of other kinds never match, even with an equal name: a
    /// workload object that happens to share the instance's name is not proof
    /// that this instance created the lock.
    pub fn is_owned_by(&self, instance: &str) -> bool {
        self.metadata
            .owner_references
            .iter()
            .any(|owner| owner.is_instance() && owner.name == instance)
    }
}

/// Lifecycle phase of an instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstancePhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStatus {
    pub phase: InstancePhase,
    /// Short machine-readable reason for the current phase, e.g. `Evicted`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A running process taking part in an election.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub metadata: ObjectMeta,
    /// Name of the host the instance was placed on, once scheduled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(default)]
    pub status: InstanceStatus,
}

impl Instance {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::namespaced(name, namespace),
            host_name: None,
            status: InstanceStatus {
                phase: InstancePhase::Running,
                reason: None,
            },
        }
    }

    pub fn on_host(mut self, host: impl Into<String>) -> Self {
        self.host_name = Some(host.into());
        self
    }

    pub fn with_status(mut self, phase: InstancePhase, reason: Option<&str>) -> Self {
        self.status = InstanceStatus {
            phase,
            reason: reason.map(str::to_string),
        };
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    Ready,
    MemoryPressure,
    DiskPressure,
    PidPressure,
    NetworkUnavailable,
}

/// Tri-state condition status. Only an explicit `False` means "not".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCondition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
}

/// A cluster node that instances are placed on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub conditions: Vec<HostCondition>,
}

impl Host {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(name),
            conditions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition_type: ConditionType, status: ConditionStatus) -> Self {
        self.conditions.push(HostCondition {
            condition_type,
            status,
        });
        self
    }

    /// Returns the first condition of the given type.
    pub fn condition(&self, condition_type: ConditionType) -> Option<&HostCondition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }
}

/// Any object the store can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Object {
    Lock(Lock),
    Instance(Instance),
    Host(Host),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Lock(_) => ObjectKind::Lock,
            Object::Instance(_) => ObjectKind::Instance,
            Object::Host(_) => ObjectKind::Host,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Object::Lock(o) => &o.metadata,
            Object::Instance(o) => &o.metadata,
            Object::Host(o) => &o.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Object::Lock(o) => &mut o.metadata,
            Object::Instance(o) => &mut o.metadata,
            Object::Host(o) => &mut o.metadata,
        }
    }

    /// Builds the key this object is stored under.
    ///
    /// The namespace is dropped for cluster-scoped kinds.
    pub fn key(&self) -> ObjectKey {
        let kind = self.kind();
        let meta = self.metadata();
        ObjectKey {
            kind,
            namespace: if kind.is_namespaced() {
                meta.namespace.clone()
            } else {
                None
            },
            name: meta.name.clone(),
        }
    }

    pub fn into_lock(self) -> Result<Lock, StoreError> {
        match self {
            Object::Lock(lock) => Ok(lock),
            other => Err(StoreError::unexpected_kind(ObjectKind::Lock, other.kind())),
        }
    }

    pub fn into_instance(self) -> Result<Instance, StoreError> {
        match self {
            Object::Instance(instance) => Ok(instance),
            other => Err(StoreError::unexpected_kind(
                ObjectKind::Instance,
                other.kind(),
            )),
        }
    }

    pub fn into_host(self) -> Result<Host, StoreError> {
        match self {
            Object::Host(host) => Ok(host),
            other => Err(StoreError::unexpected_kind(ObjectKind::Host, other.kind())),
        }
    }
}

impl From<Lock> for Object {
    fn from(lock: Lock) -> Self {
        Object::Lock(lock)
    }
}

impl From<Instance> for Object {
    fn from(instance: Instance) -> Self {
        Object::Instance(instance)
    }
}

impl From<Host> for Object {
    fn from(host: Host) -> Self {
        Object::Host(host)
    }
}

/// Guards a mutation on the identity of the object the caller observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precondition {
    pub uid: Uuid,
}

impl Precondition {
    pub fn uid(uid: Uuid) -> Self {
        Self { uid }
    }
}
