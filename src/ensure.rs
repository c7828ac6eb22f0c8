//! Get-or-create for dependent resources
//!
//! [`ensure`] reads a resource and creates it only when absent. It never
//! updates an existing object. A create that loses a race with another writer
//! comes back as `AlreadyExists` and is reported as "already there", the same
//! as if the first read had found it.

use k8s_openapi::api::core::v1::Namespace;
use kube::ResourceExt;
use tracing::{debug, info};

use crate::store::{ObjectKey, ResourceStore};
use crate::Error;

/// Phase of a namespace that can host new objects
pub const NAMESPACE_ACTIVE: &str = "Active";

/// How to find the existing instance of a dependent
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup {
    /// Exact identity
    ByName(ObjectKey),
    /// First object in `namespace` matching a label selector
    BySelector {
        /// Namespace to search
        namespace: String,
        /// Label selector, e.g. `toolchain.dev/provider=toolchain-operator`
        selector: String,
    },
}

impl std::fmt::Display for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lookup::ByName(key) => write!(f, "{}", key),
            Lookup::BySelector {
                namespace,
                selector,
            } => write!(f, "{}[{}]", namespace, selector),
        }
    }
}

/// Ensure a resource exists.
///
/// Returns `Ok(true)` when this call created the resource and `Ok(false)`
/// when it was already present (including when a concurrent writer created it
/// first). `validate` runs against an existing object; its error is returned
/// unchanged. `desired` is only evaluated when a create is needed.
pub async fn ensure<K, S, V, D>(
    store: &S,
    lookup: &Lookup,
    validate: V,
    desired: D,
) -> Result<bool, Error>
where
    K: Send + Sync + 'static,
    S: ResourceStore<K> + ?Sized,
    V: FnOnce(&K) -> Result<(), Error>,
    D: FnOnce() -> K,
{
    let existing = match lookup {
        Lookup::ByName(key) => store.get(key).await?,
        Lookup::BySelector {
            namespace,
            selector,
        } => store.list(namespace, selector).await?.into_iter().next(),
    };

    if let Some(existing) = existing {
        validate(&existing)?;
        debug!(object = %lookup, "dependent already exists");
        return Ok(false);
    }

    match store.create(&desired()).await {
        Ok(()) => {
            info!(object = %lookup, "created dependent");
            Ok(true)
        }
        Err(e) if e.is_already_exists() => {
            debug!(object = %lookup, "dependent created concurrently");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Validator for dependents that need no checks beyond existing
pub fn exists<K>(_: &K) -> Result<(), Error> {
    Ok(())
}

/// Validator rejecting namespaces that are not `Active` (e.g. `Terminating`)
pub fn active_namespace(ns: &Namespace) -> Result<(), Error> {
    let phase = ns.status.as_ref().and_then(|s| s.phase.as_deref());
    match phase {
        Some(NAMESPACE_ACTIVE) => Ok(()),
        other => Err(Error::NamespaceNotActive {
            namespace: ns.name_any(),
            phase: other.unwrap_or("Unknown").to_string(),
        }),
    }
}
