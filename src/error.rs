//! Error types for the toolchain operator
//!
//! Errors fall into three groups that the reconciler treats differently:
//! - transient and expected (`AlreadyExists`, `NoKindMatch`): absorbed by the
//!   ensurer or watch registrar and turned into progress or a requeue
//! - blocking (`NamespaceNotActive`, `Kube`, ...): surfaced on the
//!   Installation as a `FailedToInstall` condition and returned for backoff
//! - `Step`: a blocking error wrapped with the stage and namespace that failed

use thiserror::Error;

use crate::steps::Stage;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for toolchain operator operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// The object store refused a create because the object is already there
    #[error("{kind} '{name}' already exists")]
    AlreadyExists {
        /// Kind of the object that already exists
        kind: String,
        /// Name of the object that already exists
        name: String,
    },

    /// The requested kind is not (yet) served by the API server
    #[error("no matches for kind {kind} in group {group}")]
    NoKindMatch {
        /// API group that was searched
        group: String,
        /// Kind that was not found
        kind: String,
    },

    /// The target namespace exists but cannot host dependents
    #[error("namespace {namespace} is not in active state (phase: {phase})")]
    NamespaceNotActive {
        /// Name of the namespace
        namespace: String,
        /// Observed namespace phase
        phase: String,
    },

    /// A convergence step failed
    #[error("{stage} failed in namespace '{namespace}': {source}")]
    Step {
        /// Stage of the sequence that failed
        stage: Stage,
        /// Namespace the step was operating on
        namespace: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Where the error occurred (e.g. "bootstrap", "watch")
        context: String,
    },
}

impl Error {
    /// Create an already-exists error for the given kind and name
    pub fn already_exists(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a no-kind-match error for the given group and kind
    pub fn no_kind_match(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::NoKindMatch {
            group: group.into(),
            kind: kind.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create an internal error without specific context
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Wrap this error with the stage and namespace it occurred in
    pub fn in_stage(self, stage: Stage, namespace: impl Into<String>) -> Self {
        Self::Step {
            stage,
            namespace: namespace.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, looking through `Step` wrapping
    pub fn root(&self) -> &Error {
        match self {
            Self::Step { source, .. } => source.root(),
            other => other,
        }
    }

    /// True if a create lost a race with another writer
    pub fn is_already_exists(&self) -> bool {
        match self.root() {
            Self::AlreadyExists { .. } => true,
            Self::Kube(kube::Error::Api(ae)) => ae.code == 409 && ae.reason == "AlreadyExists",
            _ => false,
        }
    }

    /// True if the kind is not registered with the API server yet
    pub fn is_no_kind_match(&self) -> bool {
        matches!(self.root(), Self::NoKindMatch { .. })
    }

    /// Check if this error is retryable
    ///
    /// Everything except serialization failures may clear up on its own: a
    /// terminating namespace finishes terminating, RBAC gets fixed, the API
    /// server comes back.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.root(), Self::Serialization(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
