//! Installation CRDs: the root objects this operator reconciles
//!
//! Both kinds are cluster-scoped. Their spec is immutable input used to
//! compute the identity and shape of every dependent resource; their status
//! is written only by the reconciler.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, InstallationStatus};

/// CheInstallation drives installation of the Che operator and a CheCluster.
///
/// Example:
/// ```yaml
/// apiVersion: toolchain.dev/v1alpha1
/// kind: CheInstallation
/// metadata:
///   name: che-installation
/// spec:
///   cheOperatorSpec:
///     namespace: toolchain-che
/// ```
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "toolchain.dev",
    version = "v1alpha1",
    kind = "CheInstallation",
    status = "InstallationStatus",
    printcolumn = r#"{"name":"Namespace","type":"string","jsonPath":".spec.cheOperatorSpec.namespace"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Reason","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].reason"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CheInstallationSpec {
    /// Settings for the Che operator deployment
    pub che_operator_spec: CheOperatorSpec,
}

/// Che operator settings
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheOperatorSpec {
    /// Namespace that hosts the Che operator and the CheCluster
    pub namespace: String,
}

/// TektonInstallation drives installation of the OpenShift Pipelines operator.
///
/// The operator is installed cluster-wide into a fixed, pre-existing
/// namespace, so `TektonInstallationSpec` has no fields.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "toolchain.dev",
    version = "v1alpha1",
    kind = "TektonInstallation",
    status = "InstallationStatus",
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Reason","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].reason"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct TektonInstallationSpec {}

/// Access to the condition set shared by every Installation kind
pub trait HasConditions {
    /// Conditions currently persisted on the object
    fn conditions(&self) -> &[Condition];
}

impl HasConditions for CheInstallation {
    fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }
}

impl HasConditions for TektonInstallation {
    fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }
}

impl CheInstallation {
    /// Namespace that hosts the Che operator and workload
    pub fn target_namespace(&self) -> &str {
        &self.spec.che_operator_spec.namespace
    }
}
