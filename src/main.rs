//! Toolchain operator - installs Che and Tekton through OLM

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Namespace;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use toolchain_operator::bootstrap::{crds_yaml, ensure_crds_installed, ensure_installations};
use toolchain_operator::config::OperatorConfig;
use toolchain_operator::controller::{che, tekton, Context};
use toolchain_operator::crd::{CheInstallation, OperatorGroup, Subscription, TektonInstallation};
use toolchain_operator::manifests::dependents_selector;
use toolchain_operator::retry::{retry_with_backoff, RetryConfig};
use toolchain_operator::store::create_client_with_timeout;
use toolchain_operator::telemetry::init_logging;
use toolchain_operator::watch::installation_for;
use toolchain_operator::WATCH_TIMEOUT_SECS;

/// Buffered CheCluster events waiting to trigger a CheInstallation pass
const CHE_TRIGGER_BUFFER: usize = 64;

/// Startup calls (CRD install, bootstrap) give up after this many attempts
const STARTUP_ATTEMPTS: u32 = 5;

/// Toolchain operator - installs Che and Tekton through ordered, idempotent reconciliation
#[derive(Parser, Debug)]
#[command(name = "toolchain-operator", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    config: OperatorConfig,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the controllers (default mode)
    ///
    /// Installs the Installation CRDs, creates the default Installations
    /// unless bootstrap is skipped, then reconciles CheInstallation and
    /// TektonInstallation objects until a shutdown signal arrives.
    Controller,

    /// Print the Installation CRDs as YAML and exit
    Crd,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Crd) => {
            print!("{}", crds_yaml()?);
            Ok(())
        }
        Some(Commands::Controller) | None => run_controller(cli.config).await,
    }
}

/// Run both Installation controllers
async fn run_controller(config: OperatorConfig) -> anyhow::Result<()> {
    init_logging(&config.telemetry())?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting toolchain operator");

    let client = create_client_with_timeout(
        config.kubeconfig.as_deref(),
        config.connect_timeout(),
        config.read_timeout(),
    )
    .await?;

    let startup = RetryConfig::with_max_attempts(STARTUP_ATTEMPTS);
    retry_with_backoff(&startup, "install_crds", || ensure_crds_installed(&client)).await?;

    let (che_trigger, che_events) = mpsc::channel(CHE_TRIGGER_BUFFER);
    let ctx = Arc::new(Context::from_client(
        client.clone(),
        che_trigger,
        config.reconcile_settings(),
    ));

    match config.bootstrap() {
        Some(bootstrap) => {
            retry_with_backoff(&startup, "bootstrap_installations", || {
                ensure_installations(&ctx.stores, &bootstrap)
            })
            .await?;
        }
        None => tracing::info!("skipping installation bootstrap"),
    }

    tracing::info!("Starting controllers:");
    let mut controllers = build_che_controllers(client.clone(), ctx.clone(), che_events);
    controllers.extend(build_tekton_controllers(client, ctx));

    futures::future::join_all(controllers).await;
    tracing::info!("controllers stopped");
    Ok(())
}

/// Watch config for the dependents of Installations of kind `K`
fn dependents_watch<K: kube::Resource<DynamicType = ()>>() -> WatcherConfig {
    WatcherConfig::default()
        .labels(&dependents_selector::<K>())
        .timeout(WATCH_TIMEOUT_SECS)
}

/// Build the CheInstallation controller.
///
/// Changes to the Namespace, OperatorGroup and Subscription it created map
/// back to the CheInstallation through their installation labels. CheCluster
/// events arrive on `che_events`, fed by the CheCluster watch once that kind
/// is served.
fn build_che_controllers(
    client: Client,
    ctx: Arc<Context>,
    che_events: mpsc::Receiver<ObjectRef<CheInstallation>>,
) -> Vec<Pin<Box<dyn Future<Output = ()> + Send>>> {
    let installations: Api<CheInstallation> = Api::all(client.clone());
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let operator_groups: Api<OperatorGroup> = Api::all(client.clone());
    let subscriptions: Api<Subscription> = Api::all(client);

    tracing::info!("- CheInstallation controller");

    vec![Box::pin(
        Controller::new(
            installations,
            WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
        )
        .watches(
            namespaces,
            dependents_watch::<CheInstallation>(),
            |ns: Namespace| installation_for::<_, CheInstallation>(&ns),
        )
        .watches(
            operator_groups,
            dependents_watch::<CheInstallation>(),
            |og: OperatorGroup| installation_for::<_, CheInstallation>(&og),
        )
        .watches(
            subscriptions,
            dependents_watch::<CheInstallation>(),
            |sub: Subscription| installation_for::<_, CheInstallation>(&sub),
        )
        .reconcile_on(ReceiverStream::new(che_events))
        .shutdown_on_signal()
        .run(che::reconcile, che::error_policy, ctx)
        .for_each(log_reconcile_result("CheInstallation")),
    )]
}

/// Build the TektonInstallation controller; its Subscription re-triggers it
fn build_tekton_controllers(
    client: Client,
    ctx: Arc<Context>,
) -> Vec<Pin<Box<dyn Future<Output = ()> + Send>>> {
    let installations: Api<TektonInstallation> = Api::all(client.clone());
    let subscriptions: Api<Subscription> = Api::all(client);

    tracing::info!("- TektonInstallation controller");

    vec![Box::pin(
        Controller::new(
            installations,
            WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
        )
        .watches(
            subscriptions,
            dependents_watch::<TektonInstallation>(),
            |sub: Subscription| installation_for::<_, TektonInstallation>(&sub),
        )
        .shutdown_on_signal()
        .run(tekton::reconcile, tekton::error_policy, ctx)
        .for_each(log_reconcile_result("TektonInstallation")),
    )]
}

/// Creates a closure for logging reconciliation results.
fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
