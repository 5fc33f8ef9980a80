//! Resource store abstraction
//!
//! The reconciliation core only needs two operations from the cluster: list the
//! resources of a managed kind in a namespace, and create one resource. This
//! module defines that seam as a trait so the core can be driven by mocks in
//! tests and by the Kubernetes API in production.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, ListParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::fleet::{ConcreteResource, ManagedResourceKind, OwnerLink};

/// Store call failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A resource with the same name already exists
    #[error("{kind} {name} already exists in {namespace}")]
    AlreadyExists {
        /// Kind of the rejected resource
        kind: ManagedResourceKind,
        /// Namespace of the rejected resource
        namespace: String,
        /// Name of the rejected resource
        name: String,
    },

    /// Transport, authorization or server-side failure
    #[error("{operation} {kind} in {namespace} failed: {message}")]
    Transport {
        /// Store operation (`list` or `create`)
        operation: &'static str,
        /// Kind the operation targeted
        kind: ManagedResourceKind,
        /// Namespace the operation targeted
        namespace: String,
        /// Description of what failed
        message: String,
    },
}

impl StoreError {
    /// Create an already-exists error
    pub fn already_exists(
        kind: ManagedResourceKind,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::AlreadyExists {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create a transport error
    pub fn transport(
        operation: &'static str,
        kind: ManagedResourceKind,
        namespace: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Transport {
            operation,
            kind,
            namespace: namespace.into(),
            message: msg.into(),
        }
    }

    /// Classify a kube error returned by a store call
    ///
    /// A 409 on create means the name is taken.
    pub fn from_kube(
        error: kube::Error,
        operation: &'static str,
        kind: ManagedResourceKind,
        namespace: &str,
        name: &str,
    ) -> Self {
        match error {
            kube::Error::Api(ae) if ae.code == 409 && operation == "create" => {
                Self::already_exists(kind, namespace, name)
            }
            other => Self::transport(operation, kind, namespace, other.to_string()),
        }
    }

    /// Whether this is an `AlreadyExists` outcome
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Whether retrying the call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Projection of an existing resource: its name and owner links
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceHandle {
    /// `metadata.name`
    pub name: String,
    /// Owner links from `metadata.ownerReferences`
    pub owner_links: Vec<OwnerLink>,
}

impl ResourceHandle {
    /// Create a handle
    pub fn new(name: impl Into<String>, owner_links: Vec<OwnerLink>) -> Self {
        Self {
            name: name.into(),
            owner_links,
        }
    }

    /// Project a Kubernetes object onto a handle
    pub fn from_resource<K: Resource>(resource: &K) -> Self {
        Self {
            name: resource.name_any(),
            owner_links: resource
                .owner_references()
                .iter()
                .map(OwnerLink::from)
                .collect(),
        }
    }

    /// Whether this resource carries the given owner link
    pub fn is_owned_by(&self, owner: &OwnerLink) -> bool {
        self.owner_links.iter().any(|link| link.matches(owner))
    }
}

/// Operations the reconciliation core needs from the cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// List every resource of `kind` in `namespace`
    async fn list(
        &self,
        namespace: &str,
        kind: ManagedResourceKind,
    ) -> Result<Vec<ResourceHandle>, StoreError>;

    /// Create `resource` in `namespace`
    ///
    /// Fails with [`StoreError::AlreadyExists`] when the name is taken.
    async fn create(&self, namespace: &str, resource: &ConcreteResource) -> Result<(), StoreError>;
}

/// Resource store backed by the Kubernetes API
pub struct KubeResourceStore {
    client: Client,
    field_manager: String,
}

impl KubeResourceStore {
    /// Create a store using the given client and field manager
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    async fn list_kind<K>(
        &self,
        namespace: &str,
        kind: ManagedResourceKind,
    ) -> Result<Vec<ResourceHandle>, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| StoreError::from_kube(e, "list", kind, namespace, ""))?;

        debug!(%kind, namespace, count = list.items.len(), "listed resources");
        Ok(list.items.iter().map(ResourceHandle::from_resource).collect())
    }

    async fn create_kind<K>(
        &self,
        namespace: &str,
        kind: ManagedResourceKind,
        resource: &K,
    ) -> Result<(), StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        K::DynamicType: Default,
    {
        let name = resource.name_any();
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let params = PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        };

        api.create(&params, resource)
            .await
            .map_err(|e| StoreError::from_kube(e, "create", kind, namespace, &name))?;
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for KubeResourceStore {
    async fn list(
        &self,
        namespace: &str,
        kind: ManagedResourceKind,
    ) -> Result<Vec<ResourceHandle>, StoreError> {
        match kind {
            ManagedResourceKind::Endpoint => self.list_kind::<Service>(namespace, kind).await,
            ManagedResourceKind::Workload => self.list_kind::<Deployment>(namespace, kind).await,
        }
    }

    async fn create(&self, namespace: &str, resource: &ConcreteResource) -> Result<(), StoreError> {
        let kind = resource.kind();
        match resource {
            ConcreteResource::Endpoint(service) => {
                self.create_kind(namespace, kind, service).await
            }
            ConcreteResource::Workload(deployment) => {
                self.create_kind(namespace, kind, deployment).await
            }
        }
    }
}
