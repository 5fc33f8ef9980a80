//! Instance inventory: existing resources that belong to a template

use tracing::debug;

use super::descriptor::OwnerLink;
use super::kind::ManagedResourceKind;
use crate::store::{ResourceHandle, ResourceStore, StoreError};

/// List the resources of `kind` in `namespace` owned by `owner`
///
/// Ownership requires an owner link matching both uid and name. Resources of
/// other templates sharing the namespace are filtered out.
pub async fn list_owned_instances(
    store: &dyn ResourceStore,
    namespace: &str,
    kind: ManagedResourceKind,
    owner: &OwnerLink,
) -> Result<Vec<ResourceHandle>, StoreError> {
    let all = store.list(namespace, kind).await?;
    let total = all.len();

    let owned: Vec<ResourceHandle> = all
        .into_iter()
        .filter(|resource| resource.is_owned_by(owner))
        .collect();

    debug!(%kind, namespace, total, owned = owned.len(), "inventoried instances");
    Ok(owned)
}
