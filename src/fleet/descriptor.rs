//! Template identity and ownership links

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

use crate::crd::WorkspaceTemplate;
use crate::Error;

/// Everything the reconciliation core needs to know about one template
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateDescriptor {
    /// `metadata.name` of the template resource
    pub resource_name: String,
    /// `metadata.uid` of the template resource
    pub resource_uid: String,
    /// Template id, used as the name prefix of every instance
    pub template_id: String,
    /// Workload container image
    pub image: String,
    /// Desired number of instances (N)
    pub instance_count: u32,
}

impl TemplateDescriptor {
    /// Owner link every managed resource of this template carries
    pub fn owner_link(&self) -> OwnerLink {
        OwnerLink {
            uid: self.resource_uid.clone(),
            name: self.resource_name.clone(),
        }
    }
}

impl TryFrom<&WorkspaceTemplate> for TemplateDescriptor {
    type Error = Error;

    fn try_from(template: &WorkspaceTemplate) -> Result<Self, Self::Error> {
        template.spec.validate()?;

        let resource_uid = template
            .uid()
            .ok_or_else(|| Error::validation("WorkspaceTemplate has no metadata.uid"))?;

        Ok(Self {
            resource_name: template.name_any(),
            resource_uid,
            template_id: template.spec.name.clone(),
            image: template.spec.image.clone(),
            instance_count: template.spec.instances,
        })
    }
}

/// Back-reference from a managed resource to the template that created it
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OwnerLink {
    /// uid of the owning template
    pub uid: String,
    /// name of the owning template
    pub name: String,
}

impl OwnerLink {
    /// Whether this link identifies the same template as `other`
    ///
    /// Both uid and name must match exactly.
    pub fn matches(&self, other: &OwnerLink) -> bool {
        self.uid == other.uid && self.name == other.name
    }

    /// Full Kubernetes owner reference for this link
    ///
    /// The template is the controlling owner so garbage collection removes
    /// instances with their template and owned-object watches map back to it.
    pub fn owner_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: WorkspaceTemplate::api_version(&()).into_owned(),
            kind: WorkspaceTemplate::kind(&()).into_owned(),
            name: self.name.clone(),
            uid: self.uid.clone(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }
}

impl From<&OwnerReference> for OwnerLink {
    fn from(reference: &OwnerReference) -> Self {
        Self {
            uid: reference.uid.clone(),
            name: reference.name.clone(),
        }
    }
}
