//! Managed resource kinds, instance naming and placeholder substitutions

use std::fmt;

use super::descriptor::TemplateDescriptor;

/// Kind of resource managed for every workspace instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ManagedResourceKind {
    /// Network-facing access point of an instance (a Service)
    Endpoint,
    /// Running unit backing an instance (a Deployment)
    Workload,
}

impl ManagedResourceKind {
    /// All managed kinds, in the order they are reconciled
    pub const ALL: [ManagedResourceKind; 2] =
        [ManagedResourceKind::Endpoint, ManagedResourceKind::Workload];

    /// Separator between the template id and the instance index
    pub fn separator(self) -> &'static str {
        match self {
            Self::Endpoint => "-service-",
            Self::Workload => "-deployment-",
        }
    }

    /// Kubernetes kind of the resource
    pub fn k8s_kind(self) -> &'static str {
        match self {
            Self::Endpoint => "Service",
            Self::Workload => "Deployment",
        }
    }

    /// Kubernetes apiVersion of the resource
    pub fn api_version(self) -> &'static str {
        match self {
            Self::Endpoint => "v1",
            Self::Workload => "apps/v1",
        }
    }

    /// File name of this kind's manifest inside a manifest directory
    pub fn manifest_file_name(self) -> &'static str {
        match self {
            Self::Endpoint => "endpoint.yaml",
            Self::Workload => "workload.yaml",
        }
    }

    /// Name prefix shared by all instances of a template: `<template-id><separator>`
    pub fn name_prefix(self, template_id: &str) -> String {
        format!("{}{}", template_id, self.separator())
    }

    /// Deterministic resource name of one instance
    pub fn instance_name(self, template_id: &str, index: u32) -> String {
        format!("{}{}", self.name_prefix(template_id), index)
    }

    /// Build the substitution map for one instance of this kind
    pub fn substitutions(
        self,
        template: &TemplateDescriptor,
        namespace: &str,
        index: u32,
    ) -> SubstitutionMap {
        let app = format!("{}-{}", template.template_id, index);
        let name = self.instance_name(&template.template_id, index);

        match self {
            Self::Endpoint => SubstitutionMap::new()
                .with(Placeholder::ServiceName, name)
                .with(Placeholder::App, app)
                .with(Placeholder::Namespace, namespace),
            Self::Workload => SubstitutionMap::new()
                .with(Placeholder::DeploymentName, name)
                .with(Placeholder::Namespace, namespace)
                .with(Placeholder::App, app)
                .with(Placeholder::TemplateName, template.template_id.clone())
                .with(Placeholder::Image, template.image.clone()),
        }
    }
}

impl fmt::Display for ManagedResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.k8s_kind())
    }
}

/// Placeholder tokens recognized in manifest templates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// Name of the Service
    ServiceName,
    /// Name of the Deployment
    DeploymentName,
    /// `app` label shared by the Service selector and the Deployment pods
    App,
    /// Target namespace
    Namespace,
    /// Template id
    TemplateName,
    /// Workload container image
    Image,
}

impl Placeholder {
    /// Literal token as it appears in manifests
    pub fn token(self) -> &'static str {
        match self {
            Self::ServiceName => "placeholder-servicename",
            Self::DeploymentName => "placeholder-depname",
            Self::App => "placeholder-app",
            Self::Namespace => "placeholder-namespace",
            Self::TemplateName => "placeholder-templatename",
            Self::Image => "placeholder-image",
        }
    }
}

/// Ordered placeholder → value record for one instance
///
/// Substitutions are applied in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubstitutionMap {
    entries: Vec<(Placeholder, String)>,
}

impl SubstitutionMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a placeholder value and return self for chaining
    ///
    /// Setting a placeholder twice keeps its original position.
    pub fn with(mut self, placeholder: Placeholder, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.entries.iter_mut().find(|(p, _)| *p == placeholder) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((placeholder, value)),
        }
        self
    }

    /// Value mapped for a placeholder
    pub fn get(&self, placeholder: Placeholder) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| *p == placeholder)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate entries in substitution order
    pub fn iter(&self) -> impl Iterator<Item = (Placeholder, &str)> {
        self.entries.iter().map(|(p, v)| (*p, v.as_str()))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace every occurrence of every token in `text`
    pub fn apply(&self, text: &str) -> String {
        self.entries
            .iter()
            .fold(text.to_string(), |acc, (placeholder, value)| {
                acc.replace(placeholder.token(), value)
            })
    }
}
