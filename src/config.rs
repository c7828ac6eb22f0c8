//! Operator configuration from command line flags and environment
//!
//! Every flag has a `TOOLCHAIN_*` environment fallback so the operator can
//! be configured from a Deployment manifest without changing its args.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::bootstrap::BootstrapConfig;
use crate::controller::ReconcileSettings;
use crate::manifests::OwnerReferencePolicy;
use crate::retry::RetryConfig;
use crate::telemetry::{LogFormat, TelemetryConfig};

/// Settings for the `controller` command
#[derive(Args, Clone, Debug)]
pub struct OperatorConfig {
    /// Path to a kubeconfig; in-cluster config or ~/.kube/config when unset
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Namespace the default CheInstallation installs Che into
    #[arg(long, env = "TOOLCHAIN_CHE_NAMESPACE", default_value = "toolchain-che")]
    pub che_namespace: String,

    /// Name of the CheInstallation created at startup
    #[arg(
        long,
        env = "TOOLCHAIN_CHE_INSTALLATION",
        default_value = "che-installation"
    )]
    pub che_installation: String,

    /// Name of the TektonInstallation created at startup
    #[arg(
        long,
        env = "TOOLCHAIN_TEKTON_INSTALLATION",
        default_value = "tekton-installation"
    )]
    pub tekton_installation: String,

    /// Do not create the default Installations at startup
    #[arg(long, env = "TOOLCHAIN_SKIP_BOOTSTRAP")]
    pub skip_bootstrap: bool,

    /// Leave dependents without an owner reference to their Installation
    #[arg(long, env = "TOOLCHAIN_DISABLE_OWNER_REFERENCES")]
    pub disable_owner_references: bool,

    /// Seconds to wait before the next pass after creating a dependent
    #[arg(long, env = "TOOLCHAIN_CREATED_REQUEUE_SECS", default_value_t = 1)]
    pub created_requeue_secs: u64,

    /// Seconds between checks for the CheCluster kind
    #[arg(long, env = "TOOLCHAIN_KIND_POLL_SECS", default_value_t = 10)]
    pub kind_poll_secs: u64,

    /// Seconds between CheCluster provisioning status checks
    #[arg(long, env = "TOOLCHAIN_STATUS_POLL_SECS", default_value_t = 10)]
    pub status_poll_secs: u64,

    /// Upper bound in seconds for the failure backoff
    #[arg(long, env = "TOOLCHAIN_MAX_BACKOFF_SECS", default_value_t = 300)]
    pub max_backoff_secs: u64,

    /// Kubernetes client connect timeout in seconds
    #[arg(long, env = "TOOLCHAIN_CONNECT_TIMEOUT_SECS", default_value_t = 5)]
    pub connect_timeout_secs: u64,

    /// Kubernetes client read timeout in seconds (must exceed the 25s watch timeout)
    #[arg(long, env = "TOOLCHAIN_READ_TIMEOUT_SECS", default_value_t = 30)]
    pub read_timeout_secs: u64,

    /// Log output format
    #[arg(long, env = "TOOLCHAIN_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

impl OperatorConfig {
    /// Reconcile timing and ownership settings
    pub fn reconcile_settings(&self) -> ReconcileSettings {
        let owner_references = if self.disable_owner_references {
            OwnerReferencePolicy::None
        } else {
            OwnerReferencePolicy::Controller
        };
        ReconcileSettings {
            created_requeue: Duration::from_secs(self.created_requeue_secs),
            kind_poll_interval: Duration::from_secs(self.kind_poll_secs),
            status_poll_interval: Duration::from_secs(self.status_poll_secs),
            owner_references,
            backoff: RetryConfig {
                max_delay: Duration::from_secs(self.max_backoff_secs),
                ..RetryConfig::default()
            },
        }
    }

    /// Installations to create at startup, `None` when bootstrap is skipped
    pub fn bootstrap(&self) -> Option<BootstrapConfig> {
        if self.skip_bootstrap {
            return None;
        }
        Some(BootstrapConfig {
            che_installation: self.che_installation.clone(),
            che_namespace: self.che_namespace.clone(),
            tekton_installation: self.tekton_installation.clone(),
        })
    }

    /// Logging settings
    pub fn telemetry(&self) -> TelemetryConfig {
        TelemetryConfig {
            format: self.log_format,
            ..Default::default()
        }
    }

    /// Client connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Client read timeout
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}
