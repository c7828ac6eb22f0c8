//! Custom Resource Definitions used by the toolchain operator
//!
//! `CheInstallation` and `TektonInstallation` are owned by this operator.
//! The OLM kinds and `CheCluster` are client-side views of CRDs installed by
//! other parties.

mod che_cluster;
mod installation;
mod olm;
mod types;

pub use che_cluster::{
    CheAuthSpec, CheCluster, CheClusterSpec, CheClusterStatus, CheDatabaseSpec, CheServerSpec,
    CheStorageSpec, PendingComponent, CHE_CLUSTER_AVAILABLE, CHE_CLUSTER_GROUP, CHE_CLUSTER_KIND,
};
pub use installation::{
    CheInstallation, CheInstallationSpec, CheOperatorSpec, HasConditions, TektonInstallation,
    TektonInstallationSpec,
};
pub use olm::{OperatorGroup, OperatorGroupSpec, Subscription, SubscriptionSpec, SubscriptionStatus};
pub use types::{reason, Condition, ConditionStatus, InstallationStatus, CONDITION_READY};
