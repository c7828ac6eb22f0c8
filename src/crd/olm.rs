//! Client-side views of the Operator Lifecycle Manager kinds
//!
//! These CRDs are owned by OLM, not by this operator. Only the fields the
//! installer writes or reads are modelled; the CRDs themselves are never
//! installed from here.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// OperatorGroup selects the namespaces an operator installed by OLM watches
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "operators.coreos.com",
    version = "v1",
    kind = "OperatorGroup",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct OperatorGroupSpec {
    /// Namespaces the member operators watch
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_namespaces: Vec<String>,
}

/// Subscription asks OLM to install and keep an operator package up to date
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "operators.coreos.com",
    version = "v1alpha1",
    kind = "Subscription",
    derive = "PartialEq",
    namespaced,
    status = "SubscriptionStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSpec {
    /// Update channel to follow
    pub channel: String,
    /// Package name in the catalog
    #[serde(rename = "name")]
    pub package: String,
    /// CatalogSource providing the package
    pub source: String,
    /// Namespace of the CatalogSource
    pub source_namespace: String,
    /// CSV to install first, when pinned
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "startingCSV")]
    pub starting_csv: Option<String>,
    /// Automatic or Manual install plan approval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_plan_approval: Option<String>,
}

/// Subscription status as reported by OLM
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatus {
    /// Subscription state (e.g. AtLatestKnown, UpgradePending)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// CSV currently installed by this subscription
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "installedCSV")]
    pub installed_csv: Option<String>,
}
