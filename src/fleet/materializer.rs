//! Template materializer
//!
//! Turns a manifest template plus a [`SubstitutionMap`] into a typed resource.
//! The manifest is parsed as YAML before any substitution happens and tokens are
//! only replaced inside string scalars and string mapping keys. A replacement
//! value therefore can never change the shape of the document, whatever
//! characters it contains.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_yaml::Value;

use super::error::TemplateError;
use super::kind::{ManagedResourceKind, SubstitutionMap};

/// A fully materialized resource ready to be submitted to the store
#[derive(Clone, Debug, PartialEq)]
pub enum ConcreteResource {
    /// Endpoint instance
    Endpoint(Service),
    /// Workload instance
    Workload(Deployment),
}

impl ConcreteResource {
    /// Managed kind of this resource
    pub fn kind(&self) -> ManagedResourceKind {
        match self {
            Self::Endpoint(_) => ManagedResourceKind::Endpoint,
            Self::Workload(_) => ManagedResourceKind::Workload,
        }
    }

    /// Object metadata
    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::Endpoint(service) => &service.metadata,
            Self::Workload(deployment) => &deployment.metadata,
        }
    }

    /// `metadata.name`, empty when unset
    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    /// Replace the object metadata, returning the updated resource
    pub fn with_metadata(self, metadata: ObjectMeta) -> Self {
        match self {
            Self::Endpoint(service) => Self::Endpoint(Service {
                metadata,
                ..service
            }),
            Self::Workload(deployment) => Self::Workload(Deployment {
                metadata,
                ..deployment
            }),
        }
    }
}

/// Materialize `manifest` for `kind` with the given substitutions
///
/// Same inputs always yield the same resource.
pub fn materialize(
    kind: ManagedResourceKind,
    manifest: &str,
    substitutions: &SubstitutionMap,
) -> Result<ConcreteResource, TemplateError> {
    let mut document: Value =
        serde_yaml::from_str(manifest).map_err(|e| TemplateError::parse(kind, e.to_string()))?;

    substitute(&mut document, substitutions).map_err(|msg| TemplateError::invalid(kind, msg))?;
    check_type_meta(kind, &document)?;

    let resource = match kind {
        ManagedResourceKind::Endpoint => {
            serde_yaml::from_value::<Service>(document).map(ConcreteResource::Endpoint)
        }
        ManagedResourceKind::Workload => {
            serde_yaml::from_value::<Deployment>(document).map(ConcreteResource::Workload)
        }
    };

    resource.map_err(|e| TemplateError::invalid(kind, e.to_string()))
}

/// The document must be a mapping declaring exactly the apiVersion and kind of `kind`
fn check_type_meta(kind: ManagedResourceKind, document: &Value) -> Result<(), TemplateError> {
    let Value::Mapping(mapping) = document else {
        return Err(TemplateError::invalid(kind, "manifest is not a mapping"));
    };

    for (field, expected) in [("apiVersion", kind.api_version()), ("kind", kind.k8s_kind())] {
        match mapping.get(field).and_then(Value::as_str) {
            Some(found) if found == expected => {}
            Some(found) => {
                return Err(TemplateError::invalid(
                    kind,
                    format!("{field} is {found:?}, expected {expected:?}"),
                ))
            }
            None => {
                return Err(TemplateError::invalid(
                    kind,
                    format!("{field} is missing, expected {expected:?}"),
                ))
            }
        }
    }

    Ok(())
}

fn substitute(value: &mut Value, substitutions: &SubstitutionMap) -> Result<(), String> {
    match value {
        Value::String(text) => *text = substitutions.apply(text),
        Value::Sequence(items) => {
            for item in items {
                substitute(item, substitutions)?;
            }
        }
        Value::Mapping(mapping) => {
            // keys may carry tokens too, so the mapping is rebuilt
            let entries = std::mem::take(mapping);
            for (mut key, mut item) in entries {
                substitute(&mut key, substitutions)?;
                substitute(&mut item, substitutions)?;
                if mapping.contains_key(&key) {
                    return Err(format!("duplicate key {key:?} after substitution"));
                }
                mapping.insert(key, item);
            }
        }
        Value::Tagged(tagged) => substitute(&mut tagged.value, substitutions)?,
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
    Ok(())
}
