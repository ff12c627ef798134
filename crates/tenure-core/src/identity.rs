//! Resolution of the running instance's own identity.
//!
//! An instance learns its name from an environment variable injected by the
//! platform (the downward API) and its namespace from the service-account
//! mount. Both can be overridden explicitly. Resolution never touches the
//! object store.

use crate::election::ElectionError;
use crate::store::OwnerReference;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Environment variable holding the instance name.
pub const POD_NAME_ENV: &str = "POD_NAME";

/// File holding the namespace the instance runs in.
pub const SERVICE_ACCOUNT_NAMESPACE_PATH: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Who "self" is in an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub namespace: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// The owner reference written into locks this instance creates.
    pub fn owner_reference(&self) -> OwnerReference {
        OwnerReference::instance(&self.name)
    }
}

/// Where the identity comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Environment variable read for the instance name.
    pub name_env: String,

    /// Explicit instance name; when set, `name_env` is not read.
    pub name_override: Option<String>,

    /// File read for the namespace.
    pub namespace_file: PathBuf,

    /// Explicit namespace; when set, `namespace_file` is not read.
    pub namespace_override: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name_env: POD_NAME_ENV.to_string(),
            name_override: None,
            namespace_file: PathBuf::from(SERVICE_ACCOUNT_NAMESPACE_PATH),
            namespace_override: None,
        }
    }
}

impl IdentityConfig {
    pub fn with_name_env(mut self, name_env: impl Into<String>) -> Self {
        self.name_env = name_env.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name_override = Some(name.into());
        self
    }

    pub fn with_namespace_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.namespace_file = path.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace_override = Some(namespace.into());
        self
    }
}

/// Reads the instance identity from its environment.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    config: IdentityConfig,
}

impl IdentityResolver {
    pub fn new(config: IdentityConfig) -> Self {
        Self { config }
    }

    /// Resolves the namespace, then the name.
    ///
    /// # Errors
    ///
    /// * [`ElectionError::NoNamespace`] if the namespace file cannot be read
    ///   or is blank and no override is configured
    /// * [`ElectionError::MissingIdentity`] if the name variable is unset or
    ///   empty and no override is configured
    pub fn resolve(&self) -> Result<Identity, ElectionError> {
        let namespace = self.namespace()?;
        let name = self.name()?;
        debug!(instance = %name, namespace = %namespace, "Resolved instance identity");
        Ok(Identity { name, namespace })
    }

    /// Resolves the namespace alone.
    pub fn namespace(&self) -> Result<String, ElectionError> {
        if let Some(namespace) = &self.config.namespace_override {
            return Ok(namespace.clone());
        }

        let path = &self.config.namespace_file;
        let raw = std::fs::read_to_string(path).map_err(|e| {
            debug!(path = %path.display(), error = %e, "Namespace file unreadable");
            ElectionError::NoNamespace
        })?;

        let namespace = raw.trim();
        if namespace.is_empty() {
            debug!(path = %path.display(), "Namespace file is empty");
            return Err(ElectionError::NoNamespace);
        }
        Ok(namespace.to_string())
    }

    /// Resolves the instance name alone.
    pub fn name(&self) -> Result<String, ElectionError> {
        if let Some(name) = &self.config.name_override {
            return Ok(name.clone());
        }

        match std::env::var(&self.config.name_env) {
            Ok(name) if !name.is_empty() => Ok(name),
            _ => Err(ElectionError::missing_identity(&self.config.name_env)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn namespace_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = IdentityConfig::default();
        assert_eq!(config.name_env, "POD_NAME");
        assert_eq!(
            config.namespace_file,
            PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/namespace")
        );
        assert!(config.name_override.is_none());
        assert!(config.namespace_override.is_none());
    }

    #[test]
    fn test_namespace_is_read_from_file() {
        let file = namespace_file("testnamespace");
        let resolver =
            IdentityResolver::new(IdentityConfig::default().with_namespace_file(file.path()));

        assert_eq!(resolver.namespace().unwrap(), "testnamespace");
    }

    #[test]
    fn test_namespace_is_trimmed() {
        let file = namespace_file("   testnamespace    \n");
        let resolver =
            IdentityResolver::new(IdentityConfig::default().with_namespace_file(file.path()));

        assert_eq!(resolver.namespace().unwrap(), "testnamespace");
    }

    #[test]
    fn test_missing_namespace_file() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = IdentityResolver::new(
            IdentityConfig::default().with_namespace_file(dir.path().join("namespace")),
        );

        assert!(matches!(
            resolver.namespace(),
            Err(ElectionError::NoNamespace)
        ));
    }

    #[test]
    fn test_blank_namespace_file() {
        let file = namespace_file("  \n");
        let resolver =
            IdentityResolver::new(IdentityConfig::default().with_namespace_file(file.path()));

        assert!(matches!(
            resolver.namespace(),
            Err(ElectionError::NoNamespace)
        ));
    }

    #[test]
    fn test_namespace_override_skips_file() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = IdentityResolver::new(
            IdentityConfig::default()
                .with_namespace_file(dir.path().join("namespace"))
                .with_namespace("override"),
        );

        assert_eq!(resolver.namespace().unwrap(), "override");
    }

    #[test]
    fn test_name_from_env() {
        let var = "TENURE_TEST_IDENTITY_NAME_FROM_ENV";
        std::env::set_var(var, "pod-a");
        let resolver = IdentityResolver::new(IdentityConfig::default().with_name_env(var));

        assert_eq!(resolver.name().unwrap(), "pod-a");
        std::env::remove_var(var);
    }

    #[test]
    fn test_unset_name_env() {
        let var = "TENURE_TEST_IDENTITY_UNSET";
        std::env::remove_var(var);
        let resolver = IdentityResolver::new(IdentityConfig::default().with_name_env(var));

        let err = resolver.name().unwrap_err();
        assert!(matches!(err, ElectionError::MissingIdentity { ref env_var } if env_var == var));
    }

    #[test]
    fn test_empty_name_env() {
        let var = "TENURE_TEST_IDENTITY_EMPTY";
        std::env::set_var(var, "");
        let resolver = IdentityResolver::new(IdentityConfig::default().with_name_env(var));

        assert!(resolver.name().is_err());
        std::env::remove_var(var);
    }

    #[test]
    fn test_resolve_checks_namespace_first() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = IdentityResolver::new(
            IdentityConfig::default()
                .with_name_env("TENURE_TEST_IDENTITY_NEVER_SET")
                .with_namespace_file(dir.path().join("namespace")),
        );

        assert!(matches!(resolver.resolve(), Err(ElectionError::NoNamespace)));
    }

    #[test]
    fn test_resolve_with_overrides() {
        let resolver = IdentityResolver::new(
            IdentityConfig::default()
                .with_name("pod-a")
                .with_namespace("testns"),
        );

        let identity = resolver.resolve().unwrap();
        assert_eq!(identity, Identity::new("pod-a", "testns"));
        assert_eq!(identity.owner_reference(), OwnerReference::instance("pod-a"));
    }
}
