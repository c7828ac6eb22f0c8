//! Startup bootstrap: the operator's own CRDs and the default Installations
//!
//! Both steps are idempotent, so restarting the operator is always safe.
//! CRDs are server-side applied so their schema tracks the running binary.
//! Installations go through the same get-or-create as any dependent and are
//! never updated once present.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, CustomResourceExt, ResourceExt};
use tracing::info;

use crate::controller::Stores;
use crate::crd::{
    CheInstallation, CheInstallationSpec, CheOperatorSpec, TektonInstallation,
    TektonInstallationSpec,
};
use crate::ensure::{ensure, exists, Lookup};
use crate::store::ObjectKey;
use crate::{Error, FIELD_MANAGER};

/// Installations created at startup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Name of the CheInstallation
    pub che_installation: String,
    /// Target namespace of the CheInstallation
    pub che_namespace: String,
    /// Name of the TektonInstallation
    pub tekton_installation: String,
}

/// CRDs owned by this operator
pub fn crds() -> Vec<CustomResourceDefinition> {
    vec![CheInstallation::crd(), TektonInstallation::crd()]
}

/// All owned CRDs as a multi-document YAML stream
pub fn crds_yaml() -> Result<String, Error> {
    let docs = crds()
        .iter()
        .map(|crd| serde_yaml::to_string(crd).map_err(|e| Error::serialization(e.to_string())))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(docs.join("---\n"))
}

/// Install or update the operator's CRDs with server-side apply
pub async fn ensure_crds_installed(client: &Client) -> Result<(), Error> {
    let api: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    for crd in crds() {
        let name = crd.name_any();
        info!(crd = %name, "installing CRD");
        api.patch(&name, &params, &Patch::Apply(&crd)).await?;
    }

    info!("all toolchain CRDs installed/updated");
    Ok(())
}

/// Create the default Installations if they do not exist yet.
///
/// The Installations are roots and carry no owner reference.
pub async fn ensure_installations(stores: &Stores, config: &BootstrapConfig) -> Result<(), Error> {
    let che_lookup = Lookup::ByName(ObjectKey::cluster(&config.che_installation));
    let created = ensure(stores.che_installations.as_ref(), &che_lookup, exists, || {
        CheInstallation::new(
            &config.che_installation,
            CheInstallationSpec {
                che_operator_spec: CheOperatorSpec {
                    namespace: config.che_namespace.clone(),
                },
            },
        )
    })
    .await
    .map_err(|e| Error::internal_with_context("bootstrap", e.to_string()))?;
    if created {
        info!(installation = %config.che_installation, "created CheInstallation");
    }

    let tekton_lookup = Lookup::ByName(ObjectKey::cluster(&config.tekton_installation));
    let created = ensure(stores.tekton_installations.as_ref(), &tekton_lookup, exists, || {
        TektonInstallation::new(&config.tekton_installation, TektonInstallationSpec {})
    })
    .await
    .map_err(|e| Error::internal_with_context("bootstrap", e.to_string()))?;
    if created {
        info!(installation = %config.tekton_installation, "created TektonInstallation");
    }

    Ok(())
}
