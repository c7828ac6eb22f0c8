//! Controllers for the Installation CRDs
//!
//! Each pass re-reads its Installation, runs the ordered convergence steps for
//! that kind, and records the outcome as a `Ready` condition. Passes are
//! serialised per object by the `kube` runtime, so nothing here locks beyond
//! the watch registrar.

pub mod che;
pub mod tekton;

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::Namespace;
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use kube::{Client, Resource, ResourceExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::conditions::{find_condition, merge_conditions};
use crate::crd::{
    CheCluster, CheInstallation, Condition, HasConditions, InstallationStatus, OperatorGroup,
    Subscription, TektonInstallation,
};
use crate::manifests::OwnerReferencePolicy;
use crate::retry::{ErrorBackoff, RetryConfig};
use crate::store::{InstallationStore, KubeStore, ResourceStore};
use crate::watch::{CheClusterWatch, WatchRegistrar, WatchRegistration};
use crate::Error;

/// Timing and ownership knobs for reconcile passes
#[derive(Clone, Debug)]
pub struct ReconcileSettings {
    /// Requeue delay after a pass created a dependent
    pub created_requeue: Duration,
    /// Requeue delay while a watched kind is not served yet
    pub kind_poll_interval: Duration,
    /// Requeue delay while the CheCluster is still provisioning
    pub status_poll_interval: Duration,
    /// Whether dependents are owned by their Installation
    pub owner_references: OwnerReferencePolicy,
    /// Backoff applied to failed passes
    pub backoff: RetryConfig,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            created_requeue: Duration::from_secs(1),
            kind_poll_interval: Duration::from_secs(10),
            status_poll_interval: Duration::from_secs(10),
            owner_references: OwnerReferencePolicy::Controller,
            backoff: RetryConfig::default(),
        }
    }
}

/// Object stores used by the controllers, one per kind
pub struct Stores {
    /// Namespaces (cluster-scoped)
    pub namespaces: Arc<dyn ResourceStore<Namespace>>,
    /// OLM OperatorGroups
    pub operator_groups: Arc<dyn ResourceStore<OperatorGroup>>,
    /// OLM Subscriptions
    pub subscriptions: Arc<dyn ResourceStore<Subscription>>,
    /// CheClusters
    pub che_clusters: Arc<dyn ResourceStore<CheCluster>>,
    /// CheInstallations, including status writes
    pub che_installations: Arc<dyn InstallationStore<CheInstallation>>,
    /// TektonInstallations, including status writes
    pub tekton_installations: Arc<dyn InstallationStore<TektonInstallation>>,
}

impl Stores {
    /// Stores backed by the Kubernetes API
    pub fn from_client(client: Client) -> Self {
        Self {
            namespaces: Arc::new(KubeStore::<Namespace>::cluster(client.clone())),
            operator_groups: Arc::new(KubeStore::<OperatorGroup>::namespaced(client.clone())),
            subscriptions: Arc::new(KubeStore::<Subscription>::namespaced(client.clone())),
            che_clusters: Arc::new(KubeStore::<CheCluster>::namespaced(client.clone())),
            che_installations: Arc::new(KubeStore::<CheInstallation>::cluster(client.clone())),
            tekton_installations: Arc::new(KubeStore::<TektonInstallation>::cluster(client)),
        }
    }
}

/// Controller context shared by all passes
pub struct Context {
    /// Object stores
    pub stores: Stores,
    /// CheCluster watch registration state
    pub che_watch: WatchRegistrar,
    /// Requeue and ownership settings
    pub settings: ReconcileSettings,
    /// Per-object failure counters for the error policy
    pub backoff: ErrorBackoff,
}

impl Context {
    /// Create a context from explicit parts
    pub fn new(
        stores: Stores,
        che_watch: Arc<dyn WatchRegistration>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            stores,
            che_watch: WatchRegistrar::new(che_watch),
            backoff: ErrorBackoff::new(settings.backoff.clone()),
            settings,
        }
    }

    /// Context talking to the Kubernetes API.
    ///
    /// CheCluster events are mapped to their Installation and sent to
    /// `che_trigger` once the CheCluster watch is registered.
    pub fn from_client(
        client: Client,
        che_trigger: mpsc::Sender<ObjectRef<CheInstallation>>,
        settings: ReconcileSettings,
    ) -> Self {
        let watch = Arc::new(CheClusterWatch::new(client.clone(), che_trigger));
        Self::new(Stores::from_client(client), watch, settings)
    }
}

/// Merge `condition` into the Installation's conditions and write the status
/// if anything changed.
///
/// Write failures are logged; the next pass rewrites the condition.
pub(crate) async fn update_conditions<K>(
    store: &dyn InstallationStore<K>,
    installation: &K,
    condition: Condition,
) where
    K: HasConditions + Resource + Send + Sync + 'static,
{
    let previous = find_condition(installation.conditions(), &condition.type_)
        .map(|c| c.reason.clone())
        .unwrap_or_default();
    let reason = condition.reason.clone();
    let (conditions, changed) = merge_conditions(installation.conditions(), [condition]);
    if !changed {
        debug!("conditions unchanged, skipping status write");
        return;
    }

    let name = installation.name_any();
    debug!(installation = %name, %previous, %reason, "updating installation status");
    let status = InstallationStatus::with_conditions(conditions);
    if let Err(e) = store.patch_status(&name, &status).await {
        warn!(error = %e, installation = %name, "failed to update installation status");
    }
}

fn backoff_key<K: Resource<DynamicType = ()>>(name: &str) -> String {
    format!("{}/{}", K::kind(&()), name)
}

/// Forget the failure count of an Installation after a successful pass, or
/// once the Installation is gone
pub(crate) fn clear_backoff<K: Resource<DynamicType = ()>>(ctx: &Context, name: &str) {
    ctx.backoff.reset(&backoff_key::<K>(name));
}

/// Requeue a failed Installation with exponential backoff.
///
/// Non-retryable errors wait for the next change instead.
pub(crate) fn requeue_after_error<K: Resource<DynamicType = ()>>(
    installation: &K,
    error: &Error,
    ctx: &Context,
) -> Action {
    let name = installation.name_any();
    if !error.is_retryable() {
        error!(?error, installation = %name, "reconciliation failed permanently");
        return Action::await_change();
    }

    let delay = ctx.backoff.next_delay(&backoff_key::<K>(&name));
    error!(
        ?error,
        installation = %name,
        delay_ms = delay.as_millis(),
        "reconciliation failed"
    );
    Action::requeue(delay)
}
