//! Client-side view of the Che operator's CheCluster kind
//!
//! The CheCluster CRD is registered by the Che operator after OLM installs it,
//! which is why watching this kind has to tolerate it not existing yet.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group of the CheCluster kind
pub const CHE_CLUSTER_GROUP: &str = "org.eclipse.che";
/// Kind name of the CheCluster
pub const CHE_CLUSTER_KIND: &str = "CheCluster";
/// Value of `status.cheClusterRunning` once the server is up
pub const CHE_CLUSTER_AVAILABLE: &str = "Available";

/// Desired state of a Che server deployment
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "org.eclipse.che",
    version = "v1",
    kind = "CheCluster",
    derive = "PartialEq",
    namespaced,
    status = "CheClusterStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct CheClusterSpec {
    /// Che server settings
    #[serde(default)]
    pub server: CheServerSpec,
    /// Database settings
    #[serde(default)]
    pub database: CheDatabaseSpec,
    /// Authentication settings
    #[serde(default)]
    pub auth: CheAuthSpec,
    /// Workspace storage settings
    #[serde(default)]
    pub storage: CheStorageSpec,
}

#[allow(missing_docs)]
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheServerSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub che_flavor: Option<String>,
    #[serde(default)]
    pub tls_support: bool,
    #[serde(default)]
    pub self_signed_cert: bool,
}

#[allow(missing_docs)]
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheDatabaseSpec {
    #[serde(default)]
    pub external_db: bool,
}

#[allow(missing_docs)]
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheAuthSpec {
    #[serde(default, rename = "openShiftoAuth")]
    pub open_shift_oauth: bool,
    #[serde(default)]
    pub external_identity_provider: bool,
}

#[allow(missing_docs)]
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheStorageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pvc_strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pvc_claim_size: Option<String>,
    #[serde(default)]
    pub pre_create_sub_paths: bool,
}

/// Provisioning status reported by the Che operator
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheClusterStatus {
    /// Database deployed and initialised
    #[serde(default)]
    pub db_provisioned: bool,
    /// Keycloak identity provider deployed
    #[serde(default)]
    pub keycloak_provisioned: bool,
    /// OpenShift OAuth client configured
    #[serde(default, rename = "openShiftoAuthProvisioned")]
    pub open_shift_oauth_provisioned: bool,
    /// Devfile registry endpoint, empty until deployed
    #[serde(default, rename = "devfileRegistryURL")]
    pub devfile_registry_url: String,
    /// Plugin registry endpoint, empty until deployed
    #[serde(default, rename = "pluginRegistryURL")]
    pub plugin_registry_url: String,
    /// Che server endpoint, empty until deployed
    #[serde(default, rename = "cheURL")]
    pub che_url: String,
    /// Overall running state (`Available` when up)
    #[serde(default)]
    pub che_cluster_running: String,
}

/// A CheCluster component that has not finished provisioning
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingComponent {
    /// `dbProvisioned` is false
    Database,
    /// `keycloakProvisioned` is false
    Keycloak,
    /// `openShiftoAuthProvisioned` is false while OpenShift OAuth is enabled
    OpenShiftOAuth,
    /// `devfileRegistryURL` is empty
    DevfileRegistry,
    /// `pluginRegistryURL` is empty
    PluginRegistry,
    /// `cheURL` is empty
    CheServer,
    /// `cheClusterRunning` is not `Available`; carries the observed value
    NotRunning(String),
}

impl CheCluster {
    /// First component still provisioning, in the order the Che operator
    /// brings them up. `None` means the CheCluster is fully available.
    pub fn pending_component(&self) -> Option<PendingComponent> {
        let default = CheClusterStatus::default();
        let status = self.status.as_ref().unwrap_or(&default);

        if !status.db_provisioned {
            return Some(PendingComponent::Database);
        }
        if !status.keycloak_provisioned {
            return Some(PendingComponent::Keycloak);
        }
        if self.spec.auth.open_shift_oauth && !status.open_shift_oauth_provisioned {
            return Some(PendingComponent::OpenShiftOAuth);
        }
        if status.devfile_registry_url.is_empty() {
            return Some(PendingComponent::DevfileRegistry);
        }
        if status.plugin_registry_url.is_empty() {
            return Some(PendingComponent::PluginRegistry);
        }
        if status.che_url.is_empty() {
            return Some(PendingComponent::CheServer);
        }
        if status.che_cluster_running != CHE_CLUSTER_AVAILABLE {
            return Some(PendingComponent::NotRunning(
                status.che_cluster_running.clone(),
            ));
        }
        None
    }
}
