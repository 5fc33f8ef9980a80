//! Reconciliation orchestrator
//!
//! Runs list → diff → create once per managed kind. Kinds are independent: a
//! failed inventory of Services does not stop the Deployment pass. Within a
//! kind, every missing index is attempted even when earlier ones fail.
//!
//! There is no retry here. A pass that leaves instances missing is repeated
//! when the template is reconciled again, which is safe because existing
//! instances are never recreated.

use tracing::{debug, error, info, instrument, warn};

use super::creator::{create_instance, CreateOutcome};
use super::descriptor::TemplateDescriptor;
use super::error::{CreationError, IndexParseError};
use super::inventory::list_owned_instances;
use super::kind::ManagedResourceKind;
use super::missing::{all_instances, compute_missing, MissingInstances};
use super::pass::PassContext;
use crate::events::{actions, reasons};
use crate::manifest::ManifestSource;
use crate::store::{ResourceStore, StoreError};

/// Outcome of one (template, kind) pass
#[derive(Debug)]
pub struct KindReport {
    /// Kind this report is about
    pub kind: ManagedResourceKind,
    /// Indices created by this pass
    pub created: Vec<u32>,
    /// Indices found already existing at create time
    pub already_existed: Vec<u32>,
    /// Indices whose creation failed
    pub failed: Vec<CreationError>,
    /// Existing resources whose name carries no valid index
    pub parse_errors: Vec<IndexParseError>,
    /// Inventory failure that aborted this kind's pass
    pub list_error: Option<StoreError>,
}

impl KindReport {
    fn new(kind: ManagedResourceKind) -> Self {
        Self {
            kind,
            created: Vec::new(),
            already_existed: Vec::new(),
            failed: Vec::new(),
            parse_errors: Vec::new(),
            list_error: None,
        }
    }

    /// Whether some instance of this kind may still be missing
    pub fn has_failures(&self) -> bool {
        self.list_error.is_some() || !self.failed.is_empty()
    }
}

/// Outcome of a full reconciliation pass over all kinds
#[derive(Debug)]
pub struct FleetReport {
    /// One report per managed kind, in reconcile order
    pub kinds: Vec<KindReport>,
}

impl FleetReport {
    /// Report for one kind
    pub fn kind(&self, kind: ManagedResourceKind) -> Option<&KindReport> {
        self.kinds.iter().find(|report| report.kind == kind)
    }

    /// Whether any kind or instance failed
    pub fn has_failures(&self) -> bool {
        self.kinds.iter().any(KindReport::has_failures)
    }

    /// Total number of resources created
    pub fn created_count(&self) -> usize {
        self.kinds.iter().map(|report| report.created.len()).sum()
    }

    /// Total number of failed instances
    pub fn failed_count(&self) -> usize {
        self.kinds.iter().map(|report| report.failed.len()).sum()
    }

    /// First inventory error, when no kind could be listed at all
    pub fn inventory_failure(&self) -> Option<&StoreError> {
        let errors = self
            .kinds
            .iter()
            .map(|report| report.list_error.as_ref())
            .collect::<Option<Vec<_>>>()?;
        errors.into_iter().next()
    }
}

/// Bring the instances of `template` in `namespace` to `1..=N` for every kind
#[instrument(
    skip_all,
    fields(
        correlation_id = %pass.correlation_id(),
        template = %template.resource_name,
        namespace = %namespace,
        instances = template.instance_count,
    )
)]
pub async fn reconcile_fleet(
    pass: &PassContext,
    store: &dyn ResourceStore,
    manifests: &dyn ManifestSource,
    namespace: &str,
    template: &TemplateDescriptor,
) -> FleetReport {
    info!(template_id = %template.template_id, image = %template.image, "reconciling fleet");

    let mut kinds = Vec::with_capacity(ManagedResourceKind::ALL.len());
    for kind in ManagedResourceKind::ALL {
        kinds.push(reconcile_kind(pass, store, manifests, namespace, template, kind).await);
    }

    FleetReport { kinds }
}

#[instrument(skip_all, fields(kind = %kind))]
async fn reconcile_kind(
    pass: &PassContext,
    store: &dyn ResourceStore,
    manifests: &dyn ManifestSource,
    namespace: &str,
    template: &TemplateDescriptor,
    kind: ManagedResourceKind,
) -> KindReport {
    let mut report = KindReport::new(kind);

    let existing =
        match list_owned_instances(store, namespace, kind, &template.owner_link()).await {
            Ok(existing) => existing,
            Err(e) => {
                error!(error = %e, "failed to list existing instances");
                pass.warning(reasons::INVENTORY_FAILED, actions::RECONCILE, e.to_string())
                    .await;
                report.list_error = Some(e);
                return report;
            }
        };

    let missing = if existing.is_empty() {
        debug!("no existing instances");
        MissingInstances {
            indices: all_instances(template.instance_count),
            parse_errors: Vec::new(),
        }
    } else {
        let prefix_length = kind.name_prefix(&template.template_id).chars().count();
        compute_missing(&existing, template.instance_count, prefix_length)
    };

    for parse_error in &missing.parse_errors {
        error!(error = %parse_error, "existing instance has a malformed name");
        pass.warning(
            reasons::MALFORMED_INSTANCE_NAME,
            actions::RECONCILE,
            parse_error.to_string(),
        )
        .await;
    }
    report.parse_errors = missing.parse_errors;

    if missing.indices.is_empty() {
        debug!(existing = existing.len(), "all instances exist already");
        return report;
    }
    debug!(missing = ?missing.indices, "some instances need to be created");

    for index in missing.indices {
        match create_instance(store, manifests, namespace, kind, template, index).await {
            Ok(CreateOutcome::Created) => {
                let name = kind.instance_name(&template.template_id, index);
                info!(index, %name, "created instance");
                pass.normal(
                    reasons::INSTANCE_CREATED,
                    actions::CREATE,
                    format!("created {kind} {name}"),
                )
                .await;
                report.created.push(index);
            }
            Ok(CreateOutcome::AlreadyExists) => {
                debug!(index, "instance was created concurrently");
                report.already_existed.push(index);
            }
            Err(e) => {
                warn!(index, error = %e, "failed to create instance");
                pass.warning(
                    reasons::INSTANCE_CREATION_FAILED,
                    actions::CREATE,
                    format!("{kind} {e}"),
                )
                .await;
                report.failed.push(e);
            }
        }
    }

    report
}
