//! workspace-fleet operator - creates the missing instances of WorkspaceTemplates

use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};

use workspace_fleet::config::{ControllerArgs, OperatorConfig};
use workspace_fleet::controller::{error_policy, reconcile, Context};
use workspace_fleet::crd::WorkspaceTemplate;
use workspace_fleet::telemetry::{init_tracing, LogFormat, TelemetryConfig};
use workspace_fleet::DEFAULT_FIELD_MANAGER;

/// workspace-fleet - keeps numbered workspace instances in sync with their template
#[derive(Parser, Debug)]
#[command(name = "workspace-fleet", version, about, long_about = None)]
struct Cli {
    /// Generate the CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// Log output format
    #[arg(long, global = true, env = "FLEET_LOG_FORMAT", value_enum, default_value_t = LogFormat::Plain)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Watches WorkspaceTemplates and creates each missing Service and
    /// Deployment instance. Existing instances are left untouched.
    Controller(ControllerArgs),
}

/// Controller arguments resolved from defaults and `FLEET_*` variables only
#[derive(Parser, Debug)]
struct EnvOnly {
    #[command(flatten)]
    args: ControllerArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&WorkspaceTemplate::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    init_tracing(TelemetryConfig::with_format(cli.log_format))?;

    let args = match cli.command {
        Some(Commands::Controller(args)) => args,
        // Environment fallbacks still apply without the subcommand
        None => EnvOnly::parse_from(["workspace-fleet"]).args,
    };

    run_controller(args.into()).await
}

/// Install or update the WorkspaceTemplate CRD using server-side apply
async fn ensure_crd_installed(client: &Client) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(DEFAULT_FIELD_MANAGER).force();

    tracing::info!("Installing WorkspaceTemplate CRD...");
    crds.patch(
        "workspacetemplates.workspaces.dev",
        &params,
        &Patch::Apply(&WorkspaceTemplate::crd()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install WorkspaceTemplate CRD: {}", e))?;

    tracing::info!("WorkspaceTemplate CRD installed/updated");
    Ok(())
}

/// Run the WorkspaceTemplate controller until a shutdown signal arrives
async fn run_controller(config: OperatorConfig) -> anyhow::Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    if config.install_crd {
        ensure_crd_installed(&client).await?;
    }

    let (templates, services, deployments) = match config.watch_namespace.as_deref() {
        Some(ns) => (
            Api::<WorkspaceTemplate>::namespaced(client.clone(), ns),
            Api::<Service>::namespaced(client.clone(), ns),
            Api::<Deployment>::namespaced(client.clone(), ns),
        ),
        None => (
            Api::<WorkspaceTemplate>::all(client.clone()),
            Api::<Service>::all(client.clone()),
            Api::<Deployment>::all(client.clone()),
        ),
    };

    let ctx = Arc::new(
        Context::builder(client)
            .field_manager(config.field_manager.clone())
            .failure_requeue(config.failure_requeue)
            .manifests(config.manifest_source())
            .build(),
    );

    tracing::info!(
        namespace = config.watch_namespace.as_deref().unwrap_or("*"),
        manifest_dir = ?config.manifest_dir,
        failure_requeue_secs = config.failure_requeue.as_secs(),
        "Starting WorkspaceTemplate controller"
    );

    // Deleting an owned Service or Deployment re-triggers its template
    Controller::new(templates, WatcherConfig::default())
        .owns(services, WatcherConfig::default())
        .owns(deployments, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "Template reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Template reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("workspace-fleet controller shutting down");
    Ok(())
}
