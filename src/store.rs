//! Object store abstraction over the Kubernetes API
//!
//! The reconciler only talks to the API server through these traits so tests
//! can drive it against mocks or an in-memory store. Data writes
//! ([`ResourceStore::create`]) and status writes ([`StatusStore::patch_status`])
//! are separate capabilities, mirroring the status subresource split on the
//! API server.

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::crd::InstallationStatus;
use crate::{Error, FIELD_MANAGER};

/// Create a kube client from an optional kubeconfig path with custom timeouts
///
/// Without a path the config is inferred (in-cluster, then `~/.kube/config`).
pub async fn create_client_with_timeout(
    kubeconfig: Option<&Path>,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, Error> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::internal_with_context(
                    "create_client",
                    format!("failed to read kubeconfig: {}", e),
                )
            })?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    Error::internal_with_context(
                        "create_client",
                        format!("failed to load kubeconfig: {}", e),
                    )
                })?
        }
        None => kube::Config::infer().await.map_err(|e| {
            Error::internal_with_context("create_client", format!("failed to infer config: {}", e))
        })?,
    };
    config.connect_timeout = Some(connect_timeout);
    config.read_timeout = Some(read_timeout);
    Client::try_from(config).map_err(|e| {
        Error::internal_with_context("create_client", format!("failed to create client: {}", e))
    })
}

/// Identity of an object: optional namespace plus name
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    /// Namespace, `None` for cluster-scoped kinds
    pub namespace: Option<String>,
    /// Object name
    pub name: String,
}

impl ObjectKey {
    /// Key of a cluster-scoped object
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Key of a namespaced object
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Key of an existing object, read from its metadata
    pub fn of<K: Resource>(obj: &K) -> Self {
        Self {
            namespace: obj.namespace(),
            name: obj.name_any(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Read and create access to objects of one kind
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceStore<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    /// Get an object by key, `None` if it does not exist
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, Error>;

    /// List objects in a namespace matching a label selector
    async fn list(&self, namespace: &str, label_selector: &str) -> Result<Vec<K>, Error>;

    /// Create an object
    ///
    /// Returns [`Error::AlreadyExists`] when an object with the same identity
    /// is already present.
    async fn create(&self, object: &K) -> Result<(), Error>;
}

/// Status subresource writes for one kind
#[async_trait]
pub trait StatusStore<K>: Send + Sync {
    /// Replace the status of the named cluster-scoped object
    async fn patch_status(&self, name: &str, status: &InstallationStatus) -> Result<(), Error>;
}

/// Combined read and status access, as needed for Installation kinds
pub trait InstallationStore<K>: ResourceStore<K> + StatusStore<K>
where
    K: Send + Sync + 'static,
{
}

impl<K, T> InstallationStore<K> for T
where
    K: Send + Sync + 'static,
    T: ResourceStore<K> + StatusStore<K>,
{
}

/// [`ResourceStore`] and [`StatusStore`] backed by the Kubernetes API
pub struct KubeStore<K> {
    client: Client,
    api: fn(Client, Option<&str>) -> Api<K>,
}

impl<K> KubeStore<K>
where
    K: Resource<Scope = ClusterResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    /// Store for a cluster-scoped kind
    pub fn cluster(client: Client) -> Self {
        Self {
            client,
            api: |client, _| Api::all(client),
        }
    }
}

impl<K> KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    /// Store for a namespaced kind
    pub fn namespaced(client: Client) -> Self {
        Self {
            client,
            api: |client, namespace| match namespace {
                Some(ns) => Api::namespaced(client, ns),
                None => Api::all(client),
            },
        }
    }
}

impl<K> KubeStore<K> {
    fn api(&self, namespace: Option<&str>) -> Api<K> {
        (self.api)(self.client.clone(), namespace)
    }
}

#[async_trait]
impl<K> ResourceStore<K> for KubeStore<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Debug + Send + Sync + 'static,
    <K as Resource>::DynamicType: Default,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, Error> {
        let api = self.api(key.namespace.as_deref());
        Ok(api.get_opt(&key.name).await?)
    }

    async fn list(&self, namespace: &str, label_selector: &str) -> Result<Vec<K>, Error> {
        let api = self.api(Some(namespace));
        let list = api
            .list(&ListParams::default().labels(label_selector))
            .await?;
        Ok(list.items)
    }

    async fn create(&self, object: &K) -> Result<(), Error> {
        let key = ObjectKey::of(object);
        let api = self.api(key.namespace.as_deref());
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };

        match api.create(&params, object).await {
            Ok(_) => {
                debug!(kind = %K::kind(&Default::default()), object = %key, "created object");
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 409 && ae.reason == "AlreadyExists" => {
                Err(Error::already_exists(K::kind(&Default::default()), key.name))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl<K> StatusStore<K> for KubeStore<K>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    <K as Resource>::DynamicType: Default,
{
    async fn patch_status(&self, name: &str, status: &InstallationStatus) -> Result<(), Error> {
        let api = self.api(None);
        // Merge patch replaces the conditions list as a whole
        let patch = serde_json::json!({ "status": status });
        api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}
