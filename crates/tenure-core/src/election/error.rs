//! Error types for leader election.
//!
//! Configuration errors and unexpected store errors abort an election
//! immediately; contention is handled inside the engine and never surfaces
//! here.

use crate::store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Errors that end a [`become_leader`](super::LeaderElection::become_leader) call.
#[derive(Error, Debug, Clone)]
pub enum ElectionError {
    /// The instance name environment variable is unset or empty.
    #[error("required env {env_var} not set, please configure downward API")]
    MissingIdentity {
        /// The variable that was expected to hold the instance name.
        env_var: String,
    },

    /// The namespace source could not be read.
    #[error("namespace not found for current environment")]
    NoNamespace,

    /// The election configuration is invalid.
    #[error("Invalid election configuration: {0}")]
    InvalidConfig(String),

    /// The store returned an error the engine does not know how to handle.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The caller's shutdown signal fired while waiting.
    #[error("Leader election cancelled")]
    Cancelled,

    /// The configured deadline passed before leadership was acquired.
    #[error("Leader election did not complete within {deadline:?}")]
    DeadlineExceeded {
        /// The deadline that was configured.
        deadline: Duration,
    },
}

impl ElectionError {
    /// Creates a `MissingIdentity` error.
    pub fn missing_identity(env_var: impl Into<String>) -> Self {
        Self::MissingIdentity {
            env_var: env_var.into(),
        }
    }

    /// Creates an `InvalidConfig` error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Returns `true` for errors caused by the instance's own configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingIdentity { .. } | Self::NoNamespace | Self::InvalidConfig(_)
        )
    }

    /// Returns `true` if the election was cancelled or ran out of time.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded { .. })
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingIdentity { .. } => "missing_identity",
            Self::NoNamespace => "no_namespace",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Store(_) => "store",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded { .. } => "deadline_exceeded",
        }
    }
}
