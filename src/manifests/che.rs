//! Dependents of a CheInstallation

use k8s_openapi::api::core::v1::Namespace;

use super::{dependent_meta, OwnerReferencePolicy};
use crate::crd::{
    CheAuthSpec, CheCluster, CheClusterSpec, CheInstallation, CheServerSpec, CheStorageSpec,
    OperatorGroup, OperatorGroupSpec, Subscription, SubscriptionSpec,
};

/// OLM package of the Che operator
pub const CHE_PACKAGE: &str = "eclipse-che";
/// Subscription channel
pub const CHE_CHANNEL: &str = "stable";
/// CatalogSource providing the package
pub const CHE_CATALOG_SOURCE: &str = "community-operators";
/// Namespace of the CatalogSource
pub const CATALOG_NAMESPACE: &str = "openshift-marketplace";
/// Name of the CheCluster created in the target namespace
pub const CHE_CLUSTER_NAME: &str = "che";

/// Target namespace
pub fn namespace(inst: &CheInstallation, policy: OwnerReferencePolicy) -> Namespace {
    Namespace {
        metadata: dependent_meta(inst.target_namespace(), None, inst, policy),
        ..Default::default()
    }
}

/// OperatorGroup scoping the Che operator to its own namespace
pub fn operator_group(inst: &CheInstallation, policy: OwnerReferencePolicy) -> OperatorGroup {
    let ns = inst.target_namespace();
    OperatorGroup {
        metadata: dependent_meta(ns, Some(ns), inst, policy),
        spec: OperatorGroupSpec {
            target_namespaces: vec![ns.to_string()],
        },
    }
}

/// Subscription installing the Che operator
pub fn subscription(inst: &CheInstallation, policy: OwnerReferencePolicy) -> Subscription {
    let ns = inst.target_namespace();
    Subscription {
        metadata: dependent_meta(CHE_PACKAGE, Some(ns), inst, policy),
        spec: SubscriptionSpec {
            channel: CHE_CHANNEL.to_string(),
            package: CHE_PACKAGE.to_string(),
            source: CHE_CATALOG_SOURCE.to_string(),
            source_namespace: CATALOG_NAMESPACE.to_string(),
            starting_csv: None,
            install_plan_approval: Some("Automatic".to_string()),
        },
        status: None,
    }
}

/// CheCluster workload, labelled back to its Installation
pub fn che_cluster(inst: &CheInstallation, policy: OwnerReferencePolicy) -> CheCluster {
    CheCluster {
        metadata: dependent_meta(CHE_CLUSTER_NAME, Some(inst.target_namespace()), inst, policy),
        spec: CheClusterSpec {
            server: CheServerSpec {
                che_flavor: Some("che".to_string()),
                tls_support: true,
                self_signed_cert: false,
            },
            auth: CheAuthSpec {
                open_shift_oauth: true,
                external_identity_provider: false,
            },
            storage: CheStorageSpec {
                pvc_strategy: Some("per-workspace".to_string()),
                pvc_claim_size: Some("1Gi".to_string()),
                pre_create_sub_paths: true,
            },
            ..Default::default()
        },
        status: None,
    }
}
