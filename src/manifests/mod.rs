//! Desired shapes of the dependents an Installation brings up
//!
//! Every builder is a pure function of the Installation plus constants, so
//! the same Installation always yields the same identities. Dependents are
//! labelled with [`PROVIDER_LABEL`] plus the name and kind of their
//! Installation, which is how dependent watch events find their way back to
//! it. When the [`OwnerReferencePolicy`] allows it they also carry a
//! controller owner reference so the API server garbage-collects them with
//! the Installation.

pub mod che;
pub mod tekton;

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};

use crate::{INSTALLATION_KIND_LABEL, INSTALLATION_LABEL};

/// Label marking objects created by this operator
pub const PROVIDER_LABEL: &str = "toolchain.dev/provider";
/// Value of [`PROVIDER_LABEL`]
pub const PROVIDER_VALUE: &str = "toolchain-operator";

/// Label selector matching every dependent this operator creates
pub fn provider_selector() -> String {
    format!("{}={}", PROVIDER_LABEL, PROVIDER_VALUE)
}

/// Label selector matching the dependents of Installations of kind `K`
pub fn dependents_selector<K: Resource<DynamicType = ()>>() -> String {
    format!(
        "{},{}={}",
        provider_selector(),
        INSTALLATION_KIND_LABEL,
        K::kind(&())
    )
}

/// Whether dependents get an owner reference to their Installation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OwnerReferencePolicy {
    /// Set a controller owner reference (cascade deletion)
    #[default]
    Controller,
    /// Leave dependents unowned
    None,
}

impl OwnerReferencePolicy {
    /// Owner references for a dependent of `owner`.
    ///
    /// Empty when the policy is `None` or `owner` has not been persisted yet
    /// (no uid).
    pub fn owner_references<K>(&self, owner: &K) -> Option<Vec<OwnerReference>>
    where
        K: Resource<DynamicType = ()>,
    {
        match self {
            OwnerReferencePolicy::Controller => owner.controller_owner_ref(&()).map(|r| vec![r]),
            OwnerReferencePolicy::None => None,
        }
    }
}

/// Metadata shared by all dependents
pub(crate) fn dependent_meta<K>(
    name: &str,
    namespace: Option<&str>,
    owner: &K,
    policy: OwnerReferencePolicy,
) -> ObjectMeta
where
    K: Resource<DynamicType = ()>,
{
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        labels: Some(BTreeMap::from([
            (PROVIDER_LABEL.to_string(), PROVIDER_VALUE.to_string()),
            (INSTALLATION_LABEL.to_string(), owner.name_any()),
            (INSTALLATION_KIND_LABEL.to_string(), K::kind(&()).to_string()),
        ])),
        owner_references: policy.owner_references(owner),
        ..Default::default()
    }
}
