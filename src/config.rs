//! Operator configuration
//!
//! Flags fall back to `FLEET_*` environment variables so the controller can
//! be configured from a Deployment spec without changing its arguments.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use crate::manifest::{DirectoryManifests, EmbeddedManifests, ManifestSource};
use crate::DEFAULT_FIELD_MANAGER;

/// Controller mode arguments
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ControllerArgs {
    /// Watch WorkspaceTemplates in this namespace only (default: all namespaces)
    #[arg(long, env = "FLEET_WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Directory holding endpoint.yaml and workload.yaml
    ///
    /// When unset the manifests compiled into the binary are used.
    #[arg(long, env = "FLEET_MANIFEST_DIR")]
    pub manifest_dir: Option<PathBuf>,

    /// Seconds before a pass that left instances missing is retried
    #[arg(long, env = "FLEET_FAILURE_REQUEUE_SECS", default_value_t = 30)]
    pub failure_requeue_secs: u64,

    /// Field manager recorded on created Services and Deployments
    #[arg(long, env = "FLEET_FIELD_MANAGER", default_value = DEFAULT_FIELD_MANAGER)]
    pub field_manager: String,

    /// Server-side apply the WorkspaceTemplate CRD before starting
    #[arg(long)]
    pub install_crd: bool,
}

impl Default for ControllerArgs {
    fn default() -> Self {
        Self {
            namespace: None,
            manifest_dir: None,
            failure_requeue_secs: 30,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            install_crd: false,
        }
    }
}

/// Resolved controller configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace to watch, `None` for all
    pub watch_namespace: Option<String>,
    /// Manifest directory, `None` for embedded manifests
    pub manifest_dir: Option<PathBuf>,
    /// Requeue delay after an incomplete pass
    pub failure_requeue: Duration,
    /// Field manager for create calls
    pub field_manager: String,
    /// Whether to install the CRD on startup
    pub install_crd: bool,
}

impl OperatorConfig {
    /// Manifest source selected by this configuration
    pub fn manifest_source(&self) -> Arc<dyn ManifestSource> {
        match &self.manifest_dir {
            Some(dir) => Arc::new(DirectoryManifests::new(dir.clone())),
            None => Arc::new(EmbeddedManifests),
        }
    }
}

impl From<ControllerArgs> for OperatorConfig {
    fn from(args: ControllerArgs) -> Self {
        Self {
            watch_namespace: args.namespace.filter(|ns| !ns.is_empty()),
            manifest_dir: args.manifest_dir,
            failure_requeue: Duration::from_secs(args.failure_requeue_secs),
            field_manager: args.field_manager,
            install_crd: args.install_crd,
        }
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        ControllerArgs::default().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        args: ControllerArgs,
    }

    #[test]
    fn defaults_match_documented_values() {
        let cli = TestCli::try_parse_from(["workspace-fleet"]).unwrap();
        // Environment fallbacks may be set on a developer machine
        if std::env::var("FLEET_FAILURE_REQUEUE_SECS").is_err() {
            assert_eq!(cli.args.failure_requeue_secs, 30);
        }
        if std::env::var("FLEET_FIELD_MANAGER").is_err() {
            assert_eq!(cli.args.field_manager, "workspace-fleet");
        }
        assert!(!cli.args.install_crd);
    }

    #[test]
    fn flags_resolve_into_operator_config() {
        let cli = TestCli::try_parse_from([
            "workspace-fleet",
            "--namespace",
            "team-a",
            "--manifest-dir",
            "/etc/fleet",
            "--failure-requeue-secs",
            "90",
            "--field-manager",
            "fleet-test",
            "--install-crd",
        ])
        .unwrap();

        let config = OperatorConfig::from(cli.args);
        assert_eq!(config.watch_namespace.as_deref(), Some("team-a"));
        assert_eq!(config.manifest_dir, Some(PathBuf::from("/etc/fleet")));
        assert_eq!(config.failure_requeue, Duration::from_secs(90));
        assert_eq!(config.field_manager, "fleet-test");
        assert!(config.install_crd);
    }

    #[test]
    fn empty_namespace_means_all_namespaces() {
        let args = ControllerArgs {
            namespace: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(OperatorConfig::from(args).watch_namespace, None);
    }

    #[test]
    fn rejects_non_numeric_requeue() {
        let result =
            TestCli::try_parse_from(["workspace-fleet", "--failure-requeue-secs", "soon"]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn embedded_manifests_are_the_default_source() {
        let source = OperatorConfig::default().manifest_source();
        let manifest = source
            .load_manifest(crate::fleet::ManagedResourceKind::Endpoint)
            .await
            .unwrap();
        assert_eq!(manifest, crate::manifest::ENDPOINT_MANIFEST);
    }
}
