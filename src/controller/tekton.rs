//! TektonInstallation controller
//!
//! The OpenShift Pipelines operator installs cluster-wide into the
//! pre-existing `openshift-operators` namespace, so the only dependent is its
//! Subscription.

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, info, instrument, warn};

use super::{clear_backoff, requeue_after_error, update_conditions, Context};
use crate::conditions::{failed_to_install, installed};
use crate::crd::TektonInstallation;
use crate::ensure::{ensure, exists, Lookup};
use crate::manifests::tekton::{self, TEKTON_NAMESPACE, TEKTON_SUBSCRIPTION_NAME};
use crate::steps::{run_in_order, Progress, Stage, Step, StepOutcome};
use crate::store::ObjectKey;
use crate::Error;

/// Reconcile entry point for the `kube` controller runtime
pub async fn reconcile(
    installation: Arc<TektonInstallation>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let name = installation.name_any();
    let result = reconcile_installation(&name, &ctx).await;
    if result.is_ok() {
        clear_backoff::<TektonInstallation>(&ctx, &name);
    }
    result
}

/// Error policy for the `kube` controller runtime
pub fn error_policy(
    installation: Arc<TektonInstallation>,
    error: &Error,
    ctx: Arc<Context>,
) -> Action {
    requeue_after_error(installation.as_ref(), error, &ctx)
}

/// Run one convergence pass for the named TektonInstallation
#[instrument(skip(ctx))]
pub async fn reconcile_installation(name: &str, ctx: &Context) -> Result<Action, Error> {
    let Some(inst) = ctx
        .stores
        .tekton_installations
        .get(&ObjectKey::cluster(name))
        .await?
    else {
        debug!("installation not found");
        clear_backoff::<TektonInstallation>(ctx, name);
        return Ok(Action::await_change());
    };

    let policy = ctx.settings.owner_references;
    let subscription = Lookup::ByName(ObjectKey::namespaced(
        TEKTON_NAMESPACE,
        TEKTON_SUBSCRIPTION_NAME,
    ));
    let steps = vec![Step::new(Stage::EnsuringSubscription, async {
        ensure(ctx.stores.subscriptions.as_ref(), &subscription, exists, || {
            tekton::subscription(&inst, policy)
        })
        .await
        .map(StepOutcome::from_created)
    })];

    let store = ctx.stores.tekton_installations.as_ref();
    match run_in_order(TEKTON_NAMESPACE, steps).await {
        Ok(Progress::Created { stage }) => {
            info!(%stage, "created dependent");
            Ok(Action::requeue(ctx.settings.created_requeue))
        }
        Ok(Progress::AwaitingKind { .. }) => Ok(Action::requeue(ctx.settings.kind_poll_interval)),
        Ok(Progress::Converged) => {
            update_conditions(store, &inst, installed()).await;
            Ok(Action::await_change())
        }
        Err(e) => {
            warn!(error = %e, "tekton installation failed");
            update_conditions(store, &inst, failed_to_install(e.to_string())).await;
            Err(e)
        }
    }
}
