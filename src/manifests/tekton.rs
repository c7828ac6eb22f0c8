//! Dependents of a TektonInstallation

use super::che::CATALOG_NAMESPACE;
use super::{dependent_meta, OwnerReferencePolicy};
use crate::crd::{Subscription, SubscriptionSpec, TektonInstallation};

/// Pre-existing namespace for cluster-wide operators
pub const TEKTON_NAMESPACE: &str = "openshift-operators";
/// Name of the Subscription
pub const TEKTON_SUBSCRIPTION_NAME: &str = "openshift-pipelines";
/// OLM package of the OpenShift Pipelines operator
pub const TEKTON_PACKAGE: &str = "openshift-pipelines-operator-rh";
/// Subscription channel
pub const TEKTON_CHANNEL: &str = "stable";
/// CatalogSource providing the package
pub const TEKTON_CATALOG_SOURCE: &str = "redhat-operators";

/// Subscription installing the OpenShift Pipelines operator cluster-wide
pub fn subscription(inst: &TektonInstallation, policy: OwnerReferencePolicy) -> Subscription {
    Subscription {
        metadata: dependent_meta(TEKTON_SUBSCRIPTION_NAME, Some(TEKTON_NAMESPACE), inst, policy),
        spec: SubscriptionSpec {
            channel: TEKTON_CHANNEL.to_string(),
            package: TEKTON_PACKAGE.to_string(),
            source: TEKTON_CATALOG_SOURCE.to_string(),
            source_namespace: CATALOG_NAMESPACE.to_string(),
            starting_csv: None,
            install_plan_approval: Some("Automatic".to_string()),
        },
        status: None,
    }
}
