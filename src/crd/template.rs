//! WorkspaceTemplate Custom Resource Definition
//!
//! A WorkspaceTemplate describes a fleet of N identical workspace instances.
//! The operator realizes each instance as one Service and one Deployment named
//! `<name>-service-<i>` / `<name>-deployment-<i>` for `i` in `1..=N`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::fleet::ManagedResourceKind;

/// Longest Service name or label value Kubernetes accepts (RFC 1035 label)
pub const MAX_LABEL_LENGTH: usize = 63;

/// Specification for a WorkspaceTemplate
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "workspaces.dev",
    version = "v1alpha1",
    kind = "WorkspaceTemplate",
    plural = "workspacetemplates",
    shortname = "wst",
    namespaced,
    printcolumn = r#"{"name":"Template","type":"string","jsonPath":".spec.name"}"#,
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".spec.image"}"#,
    printcolumn = r#"{"name":"Instances","type":"integer","jsonPath":".spec.instances"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceTemplateSpec {
    /// Template id, the name prefix of every instance
    pub name: String,

    /// Container image of the workload
    pub image: String,

    /// Desired number of instances
    #[serde(default)]
    pub instances: u32,
}

impl WorkspaceTemplateSpec {
    /// Validate the template specification
    ///
    /// The template id must be a DNS-1035 label. The Service name and the
    /// `app` label value of the highest instance must still fit in one label;
    /// Deployment names are DNS subdomains and have far more room.
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_template_id(&self.name)?;

        if self.image.trim().is_empty() {
            return Err(crate::Error::validation("image cannot be empty"));
        }

        let highest = self.instances.max(1);
        let service_name = ManagedResourceKind::Endpoint.instance_name(&self.name, highest);
        let app_label = format!("{}-{}", self.name, highest);

        for (what, value) in [("Service name", service_name), ("app label", app_label)] {
            if value.len() > MAX_LABEL_LENGTH {
                return Err(crate::Error::validation(format!(
                    "{what} '{value}' for {} instances would be {} characters, limit is {}",
                    self.instances,
                    value.len(),
                    MAX_LABEL_LENGTH
                )));
            }
        }

        Ok(())
    }
}

fn validate_template_id(id: &str) -> Result<(), crate::Error> {
    let Some(first) = id.chars().next() else {
        return Err(crate::Error::validation("name cannot be empty"));
    };

    if !first.is_ascii_lowercase() {
        return Err(crate::Error::validation(format!(
            "name '{id}' must start with a lowercase letter"
        )));
    }

    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(crate::Error::validation(format!(
            "name '{id}' contains invalid character '{bad}'"
        )));
    }

    if id.ends_with('-') {
        return Err(crate::Error::validation(format!(
            "name '{id}' must end with a letter or digit"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    fn spec(name: &str, image: &str, instances: u32) -> WorkspaceTemplateSpec {
        WorkspaceTemplateSpec {
            name: name.to_string(),
            image: image.to_string(),
            instances,
        }
    }

    #[test]
    fn plain_template_is_valid() {
        assert!(spec("ping", "img:1", 2).validate().is_ok());
        assert!(spec("team-a-shell2", "registry.local/shell:v3", 40).validate().is_ok());
    }

    #[test]
    fn zero_instances_is_valid() {
        assert!(spec("ping", "img:1", 0).validate().is_ok());
    }

    #[test]
    fn rejects_malformed_names() {
        for name in ["", "Ping", "1ping", "ping-", "ping_pong", "pïng", "ping.svc"] {
            let err = spec(name, "img:1", 1).validate().unwrap_err();
            assert!(
                matches!(err, crate::Error::Validation(_)),
                "expected validation error for {name:?}"
            );
        }
    }

    #[test]
    fn rejects_empty_image() {
        let err = spec("ping", "  ", 1).validate().unwrap_err();
        assert!(err.to_string().contains("image"));
    }

    #[test]
    fn rejects_service_names_that_overflow_with_the_largest_index() {
        // 51 + "-service-999" is 63, one more digit is 64
        let name = format!("w{}", "x".repeat(50));
        assert!(spec(&name, "img:1", 999).validate().is_ok());

        let err = spec(&name, "img:1", 1000).validate().unwrap_err();
        assert!(err.to_string().contains("Service name"));
        assert!(err.to_string().contains("limit is 63"));
    }

    /// Story: a long id whose Deployment name passes 63 characters is still fine
    #[test]
    fn deployment_names_are_not_held_to_the_label_limit() {
        let name = format!("w{}", "x".repeat(50));
        let spec = spec(&name, "img:1", 9);
        let deployment = ManagedResourceKind::Workload.instance_name(&spec.name, 9);
        assert!(deployment.len() > MAX_LABEL_LENGTH);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn instances_default_to_zero() {
        let parsed: WorkspaceTemplateSpec =
            serde_json::from_str(r#"{"name":"ping","image":"img:1"}"#).unwrap();
        assert_eq!(parsed.instances, 0);
    }

    #[test]
    fn crd_is_namespaced_under_workspaces_dev() {
        let crd = WorkspaceTemplate::crd();
        assert_eq!(
            crd.metadata.name.as_deref(),
            Some("workspacetemplates.workspaces.dev")
        );
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(crd.spec.names.short_names, Some(vec!["wst".to_string()]));
    }
}
