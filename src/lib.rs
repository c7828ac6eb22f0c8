//! Toolchain operator - installs Che and Tekton through ordered, idempotent reconciliation
//!
//! Each Installation CRD (`CheInstallation`, `TektonInstallation`) describes a
//! product that should end up running in the cluster. The operator brings up
//! the dependents of an Installation one at a time, in a fixed order, and
//! reports progress on the Installation's `Ready` condition.
//!
//! # Architecture
//!
//! - Every pass re-reads the cluster state; nothing is cached between passes
//! - A pass stops at the first dependent it creates, so each pass makes at most
//!   one change and the next event or requeue picks up from there
//! - Creates that lose a race count as "already exists"; status is written
//!   only when the merged conditions differ
//!
//! # Modules
//!
//! - [`crd`] - Installation CRDs and typed views of OLM and Che kinds
//! - [`conditions`] - Condition merging and the `Ready` vocabulary
//! - [`store`] - Object store traits and the Kubernetes-backed implementation
//! - [`ensure`] - Get-or-create for dependents
//! - [`steps`] - Ordered, short-circuiting convergence steps
//! - [`watch`] - Watch registration for kinds that may not exist yet
//! - [`manifests`] - Desired shapes of dependents
//! - [`controller`] - Reconcile entry points and error policies
//! - [`bootstrap`] - CRD installation and default Installations at startup
//! - [`config`] - Command line and environment configuration
//! - [`retry`] - Backoff with jitter
//! - [`telemetry`] - Logging setup
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod bootstrap;
pub mod conditions;
pub mod config;
pub mod controller;
pub mod crd;
pub mod ensure;
pub mod error;
pub mod manifests;
pub mod retry;
pub mod steps;
pub mod store;
pub mod telemetry;
pub mod watch;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager recorded on every write
pub const FIELD_MANAGER: &str = "toolchain-operator";

/// Label on every dependent naming the Installation it belongs to
pub const INSTALLATION_LABEL: &str = "toolchain.dev/installation";

/// Label on every dependent naming the kind of its Installation
pub const INSTALLATION_KIND_LABEL: &str = "toolchain.dev/installation-kind";

/// Watcher timeout (seconds); must stay below the client read timeout so the
/// API server closes idle watches before the client gives up on them
pub const WATCH_TIMEOUT_SECS: u32 = 25;
