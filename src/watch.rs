//! Dynamic watch registration for kinds that may not be served yet
//!
//! The CheCluster CRD only appears once OLM has installed the Che operator,
//! which happens a few passes after the Subscription is created. Until then,
//! registering a watch fails with "no kind match". That failure is expected
//! and turns into a requeue instead of a failed Installation.
//!
//! Registration state lives in [`WatchRegistrar`], owned by the controller
//! context, so each context (and each test) starts from `Pending`.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use kube::discovery::Discovery;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::{self, watcher};
use kube::runtime::WatchStreamExt;
use kube::{Api, Client, Resource, ResourceExt};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

use crate::crd::{CheCluster, CheInstallation, CHE_CLUSTER_GROUP, CHE_CLUSTER_KIND};
use crate::{Error, INSTALLATION_KIND_LABEL, INSTALLATION_LABEL, WATCH_TIMEOUT_SECS};

/// Registers a watch on a kind that may not exist yet
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WatchRegistration: Send + Sync {
    /// Start watching.
    ///
    /// Returns [`Error::NoKindMatch`] while the kind is not served by the API
    /// server. Any other error is a real failure.
    async fn register(&self) -> Result<(), Error>;
}

/// Whether the watch still has to be registered
pub enum WatchState {
    /// Not registered yet; holds the registration to attempt
    Pending(Arc<dyn WatchRegistration>),
    /// Registered; later calls are no-ops
    Registered,
}

/// Outcome of [`WatchRegistrar::ensure_watch`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchStatus {
    /// The watch is in place
    Registered,
    /// The kind is not served yet; try again later
    KindNotReady,
}

/// One-shot watch registration with "no kind match" tolerance
pub struct WatchRegistrar {
    state: Mutex<WatchState>,
}

impl WatchRegistrar {
    /// Registrar that will attempt `registration` on first use
    pub fn new(registration: Arc<dyn WatchRegistration>) -> Self {
        Self {
            state: Mutex::new(WatchState::Pending(registration)),
        }
    }

    /// Make sure the watch is registered.
    ///
    /// Registers at most once per registrar. Concurrent callers queue on the
    /// state lock so only one registration is in flight.
    pub async fn ensure_watch(&self) -> Result<WatchStatus, Error> {
        let mut state = self.state.lock().await;
        let registration = match &*state {
            WatchState::Registered => return Ok(WatchStatus::Registered),
            WatchState::Pending(registration) => registration.clone(),
        };

        match registration.register().await {
            Ok(()) => {
                *state = WatchState::Registered;
                info!("watch registered");
                Ok(WatchStatus::Registered)
            }
            Err(e) if e.is_no_kind_match() => {
                debug!(error = %e, "kind not served yet, will retry");
                Ok(WatchStatus::KindNotReady)
            }
            Err(e) => Err(e),
        }
    }
}

/// Installation a dependent belongs to, read from its installation labels.
///
/// Dependents labelled with another Installation kind map to nothing, so one
/// mapper serves every dependent watch of every controller.
pub fn installation_for<D, I>(dependent: &D) -> Option<ObjectRef<I>>
where
    D: Resource,
    I: Resource<DynamicType = ()>,
{
    let labels = dependent.labels();
    if let Some(kind) = labels.get(INSTALLATION_KIND_LABEL) {
        if I::kind(&()) != kind.as_str() {
            return None;
        }
    }
    labels.get(INSTALLATION_LABEL).map(|name| ObjectRef::new(name))
}

/// Watches CheCluster objects and feeds their Installation into a controller
/// trigger channel
pub struct CheClusterWatch {
    client: Client,
    trigger: mpsc::Sender<ObjectRef<CheInstallation>>,
}

impl CheClusterWatch {
    /// Create a registration that sends triggers to `trigger`
    pub fn new(client: Client, trigger: mpsc::Sender<ObjectRef<CheInstallation>>) -> Self {
        Self { client, trigger }
    }
}

#[async_trait]
impl WatchRegistration for CheClusterWatch {
    async fn register(&self) -> Result<(), Error> {
        let discovery = Discovery::new(self.client.clone())
            .filter(&[CHE_CLUSTER_GROUP])
            .run()
            .await?;

        let served = discovery
            .groups()
            .filter(|g| g.name() == CHE_CLUSTER_GROUP)
            .flat_map(|g| g.resources_by_stability())
            .any(|(ar, _caps)| ar.kind == CHE_CLUSTER_KIND);
        if !served {
            return Err(Error::no_kind_match(CHE_CLUSTER_GROUP, CHE_CLUSTER_KIND));
        }

        let clusters: Api<CheCluster> = Api::all(self.client.clone());
        let trigger = self.trigger.clone();
        tokio::spawn(async move {
            let mut events = watcher(
                clusters,
                watcher::Config::default().timeout(WATCH_TIMEOUT_SECS),
            )
            .default_backoff()
            .touched_objects()
            .boxed();

            while let Some(event) = events.next().await {
                let cluster = match event {
                    Ok(cluster) => cluster,
                    Err(e) => {
                        warn!(error = %e, "CheCluster watch error");
                        continue;
                    }
                };
                let Some(installation) = installation_for::<_, CheInstallation>(&cluster) else {
                    continue;
                };
                debug!(
                    checluster = %cluster.name_any(),
                    installation = %installation.name,
                    "CheCluster changed, triggering reconcile"
                );
                if trigger.send(installation).await.is_err() {
                    info!("trigger channel closed, stopping CheCluster watch");
                    return;
                }
            }
        });

        Ok(())
    }
}
