//! CheInstallation controller
//!
//! Brings up, one dependent per pass: the target namespace, an OperatorGroup,
//! the Che operator Subscription, a watch on CheCluster (once OLM has
//! registered that kind), and finally the CheCluster. After that the pass
//! reports CheCluster provisioning progress on the `Ready` condition.

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, info, instrument, warn};

use super::{clear_backoff, requeue_after_error, update_conditions, Context};
use crate::conditions::{failed_to_install, installed, installing};
use crate::crd::{CheCluster, CheInstallation, PendingComponent};
use crate::ensure::{active_namespace, ensure, exists, Lookup};
use crate::manifests::{che, provider_selector};
use crate::steps::{run_in_order, Progress, Stage, Step, StepOutcome};
use crate::store::ObjectKey;
use crate::watch::WatchStatus;
use crate::Error;

/// Reconcile entry point for the `kube` controller runtime
pub async fn reconcile(installation: Arc<CheInstallation>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = installation.name_any();
    let result = reconcile_installation(&name, &ctx).await;
    if result.is_ok() {
        clear_backoff::<CheInstallation>(&ctx, &name);
    }
    result
}

/// Error policy for the `kube` controller runtime
pub fn error_policy(installation: Arc<CheInstallation>, error: &Error, ctx: Arc<Context>) -> Action {
    requeue_after_error(installation.as_ref(), error, &ctx)
}

/// Run one convergence pass for the named CheInstallation.
///
/// The Installation is re-read from the store; a missing Installation ends
/// the pass without writes.
#[instrument(skip(ctx))]
pub async fn reconcile_installation(name: &str, ctx: &Context) -> Result<Action, Error> {
    let Some(inst) = ctx
        .stores
        .che_installations
        .get(&ObjectKey::cluster(name))
        .await?
    else {
        debug!("installation not found");
        clear_backoff::<CheInstallation>(ctx, name);
        return Ok(Action::await_change());
    };

    let ns = inst.target_namespace().to_string();
    info!(namespace = %ns, "reconciling che installation");

    match converge(&inst, &ns, ctx).await {
        Ok(Progress::Created { stage }) => {
            info!(%stage, namespace = %ns, "created dependent");
            Ok(Action::requeue(ctx.settings.created_requeue))
        }
        Ok(Progress::AwaitingKind { stage }) => {
            info!(%stage, "CheCluster kind not served yet");
            Ok(Action::requeue(ctx.settings.kind_poll_interval))
        }
        Ok(Progress::Converged) => observe_che_cluster(&inst, &ns, ctx).await,
        Err(e) => {
            warn!(error = %e, "che installation failed");
            let store = ctx.stores.che_installations.as_ref();
            update_conditions(store, &inst, failed_to_install(e.to_string())).await;
            Err(e)
        }
    }
}

async fn converge(inst: &CheInstallation, ns: &str, ctx: &Context) -> Result<Progress, Error> {
    let policy = ctx.settings.owner_references;
    let stores = &ctx.stores;

    let namespace = Lookup::ByName(ObjectKey::cluster(ns));
    let operator_group = Lookup::BySelector {
        namespace: ns.to_string(),
        selector: provider_selector(),
    };
    let subscription = Lookup::ByName(ObjectKey::namespaced(ns, che::CHE_PACKAGE));
    let workload = Lookup::ByName(ObjectKey::namespaced(ns, che::CHE_CLUSTER_NAME));

    let steps = vec![
        Step::new(Stage::EnsuringNamespace, async {
            ensure(stores.namespaces.as_ref(), &namespace, active_namespace, || {
                che::namespace(inst, policy)
            })
            .await
            .map(StepOutcome::from_created)
        }),
        Step::new(Stage::EnsuringOperatorGroup, async {
            ensure(stores.operator_groups.as_ref(), &operator_group, exists, || {
                che::operator_group(inst, policy)
            })
            .await
            .map(StepOutcome::from_created)
        }),
        Step::new(Stage::EnsuringSubscription, async {
            ensure(stores.subscriptions.as_ref(), &subscription, exists, || {
                che::subscription(inst, policy)
            })
            .await
            .map(StepOutcome::from_created)
        }),
        Step::new(Stage::RegisteringWatch, async {
            ctx.che_watch.ensure_watch().await.map(|status| match status {
                WatchStatus::Registered => StepOutcome::Satisfied,
                WatchStatus::KindNotReady => StepOutcome::AwaitingKind,
            })
        }),
        Step::new(Stage::EnsuringWorkload, async {
            ensure(stores.che_clusters.as_ref(), &workload, exists, || {
                che::che_cluster(inst, policy)
            })
            .await
            .map(StepOutcome::from_created)
        }),
    ];

    run_in_order(ns, steps).await
}

/// Report CheCluster provisioning progress once every dependent exists
async fn observe_che_cluster(
    inst: &CheInstallation,
    ns: &str,
    ctx: &Context,
) -> Result<Action, Error> {
    let store = ctx.stores.che_installations.as_ref();
    let key = ObjectKey::namespaced(ns, che::CHE_CLUSTER_NAME);

    let cluster = match ctx.stores.che_clusters.get(&key).await {
        Ok(Some(cluster)) => cluster,
        Ok(None) => {
            // Deleted since the workload step saw it; the next pass recreates it
            debug!(checluster = %key, "CheCluster disappeared");
            return Ok(Action::requeue(ctx.settings.created_requeue));
        }
        Err(e) => {
            let e = e.in_stage(Stage::EnsuringWorkload, ns);
            update_conditions(store, inst, failed_to_install(e.to_string())).await;
            return Err(e);
        }
    };

    match cluster.pending_component() {
        Some(pending) => {
            let message = installing_message(&cluster, &pending);
            debug!(%message, "CheCluster still provisioning");
            update_conditions(store, inst, installing(message)).await;
            Ok(Action::requeue(ctx.settings.status_poll_interval))
        }
        None => {
            info!("che installation ready");
            update_conditions(store, inst, installed()).await;
            Ok(Action::await_change())
        }
    }
}

/// Human readable progress for the first component still provisioning
pub fn installing_message(cluster: &CheCluster, pending: &PendingComponent) -> String {
    let name = cluster.name_any();
    match pending {
        PendingComponent::Database => format!("Provisioning Database for CheCluster '{}'", name),
        PendingComponent::Keycloak => format!("Provisioning Keycloak for CheCluster '{}'", name),
        PendingComponent::OpenShiftOAuth => {
            format!("Provisioning OpenShift OAuth for CheCluster '{}'", name)
        }
        PendingComponent::DevfileRegistry => {
            format!("Provisioning DevfileRegistry for CheCluster '{}'", name)
        }
        PendingComponent::PluginRegistry => {
            format!("Provisioning PluginRegistry for CheCluster '{}'", name)
        }
        PendingComponent::CheServer => format!("Provisioning CheServer for CheCluster '{}'", name),
        PendingComponent::NotRunning(status) => format!(
            "CheCluster running status is '{}' for CheCluster '{}'",
            status, name
        ),
    }
}
