//! Resource creation for a single instance

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{debug, trace};

use super::descriptor::TemplateDescriptor;
use super::error::CreationError;
use super::kind::ManagedResourceKind;
use super::materializer::{materialize, ConcreteResource};
use crate::manifest::ManifestSource;
use crate::store::ResourceStore;
use crate::TEMPLATE_LABEL_KEY;

/// How a successful creation came about
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The resource was created by this call
    Created,
    /// A resource with the same name already existed; nothing was changed
    AlreadyExists,
}

/// Build the resource of one instance without submitting it
///
/// Metadata is rebuilt rather than patched: name and namespace are pinned to
/// the instance, the template label is set, and the owner references are
/// replaced by a single link to `template`, whatever the manifest declared.
pub fn build_instance(
    manifest: &str,
    namespace: &str,
    kind: ManagedResourceKind,
    template: &TemplateDescriptor,
    index: u32,
) -> Result<ConcreteResource, CreationError> {
    let substitutions = kind.substitutions(template, namespace, index);
    let materialized = materialize(kind, manifest, &substitutions)
        .map_err(|source| CreationError::Template { index, source })?;

    let declared = materialized.metadata().clone();
    let mut labels = declared.labels.clone().unwrap_or_default();
    labels.insert(
        TEMPLATE_LABEL_KEY.to_string(),
        template.template_id.clone(),
    );

    let metadata = ObjectMeta {
        name: Some(kind.instance_name(&template.template_id, index)),
        namespace: Some(namespace.to_string()),
        labels: Some(labels),
        owner_references: Some(vec![template.owner_link().owner_reference()]),
        ..declared
    };

    Ok(materialized.with_metadata(metadata))
}

/// Create instance `index` of `kind` for `template` in `namespace`
///
/// An `AlreadyExists` answer from the store is a success: a concurrent pass
/// created the same instance first.
pub async fn create_instance(
    store: &dyn ResourceStore,
    manifests: &dyn ManifestSource,
    namespace: &str,
    kind: ManagedResourceKind,
    template: &TemplateDescriptor,
    index: u32,
) -> Result<CreateOutcome, CreationError> {
    let manifest = manifests
        .load_manifest(kind)
        .await
        .map_err(|source| CreationError::Template { index, source })?;

    let resource = build_instance(&manifest, namespace, kind, template, index)?;
    trace!(%kind, index, name = resource.name(), "materialized instance");

    match store.create(namespace, &resource).await {
        Ok(()) => Ok(CreateOutcome::Created),
        Err(e) if e.is_already_exists() => {
            debug!(%kind, index, name = resource.name(), "instance already exists");
            Ok(CreateOutcome::AlreadyExists)
        }
        Err(source) => Err(CreationError::Store { index, source }),
    }
}
