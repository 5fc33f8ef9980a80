//! WorkspaceTemplate controller implementation
//!
//! Each reconcile is one pass of the fleet core: inventory the owned Services
//! and Deployments, work out which instance indices are missing, and create
//! them. Existing instances are never updated or deleted.

use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::{Client, Resource, ResourceExt};
use tracing::{error, info, instrument, warn, Span};

use crate::crd::WorkspaceTemplate;
use crate::events::{actions, reasons, EventPublisher, KubeEventPublisher};
use crate::fleet::{reconcile_fleet, PassContext, TemplateDescriptor};
use crate::manifest::{EmbeddedManifests, ManifestSource};
use crate::store::{KubeResourceStore, ResourceStore};
use crate::{Error, DEFAULT_FIELD_MANAGER};

/// Name the controller reports events under
pub const CONTROLLER_NAME: &str = "workspace-fleet-controller";

/// Requeue delay after a pass with failed instances or kinds
pub const DEFAULT_FAILURE_REQUEUE: Duration = Duration::from_secs(30);

/// Requeue delay for retryable reconcile errors
const ERROR_REQUEUE: Duration = Duration::from_secs(5);

/// Controller context containing shared state and clients
///
/// Use [`ContextBuilder`] to construct instances:
///
/// ```ignore
/// let ctx = Context::builder(client)
///     .manifests(Arc::new(DirectoryManifests::new("/etc/workspace-fleet")))
///     .failure_requeue(Duration::from_secs(60))
///     .build();
/// ```
pub struct Context {
    /// Store the fleet core lists and creates resources through
    pub store: Arc<dyn ResourceStore>,
    /// Source of the Endpoint and Workload manifests
    pub manifests: Arc<dyn ManifestSource>,
    /// Sink for Kubernetes Events on the template
    pub events: Arc<dyn EventPublisher>,
    /// Requeue delay after a pass that left instances missing
    pub failure_requeue: Duration,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client) -> ContextBuilder {
        ContextBuilder::new(client)
    }

    /// Create a context for testing with mock collaborators
    #[cfg(test)]
    pub fn for_testing(
        store: Arc<dyn ResourceStore>,
        manifests: Arc<dyn ManifestSource>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            manifests,
            events,
            failure_requeue: DEFAULT_FAILURE_REQUEUE,
        }
    }
}

/// Builder for constructing [`Context`] instances
pub struct ContextBuilder {
    client: Client,
    field_manager: String,
    failure_requeue: Duration,
    store: Option<Arc<dyn ResourceStore>>,
    manifests: Option<Arc<dyn ManifestSource>>,
    events: Option<Arc<dyn EventPublisher>>,
}

impl ContextBuilder {
    fn new(client: Client) -> Self {
        Self {
            client,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            failure_requeue: DEFAULT_FAILURE_REQUEUE,
            store: None,
            manifests: None,
            events: None,
        }
    }

    /// Field manager recorded on created resources
    pub fn field_manager(mut self, field_manager: impl Into<String>) -> Self {
        self.field_manager = field_manager.into();
        self
    }

    /// Requeue delay after a pass with failures
    pub fn failure_requeue(mut self, delay: Duration) -> Self {
        self.failure_requeue = delay;
        self
    }

    /// Override the manifest source (embedded manifests by default)
    pub fn manifests(mut self, manifests: Arc<dyn ManifestSource>) -> Self {
        self.manifests = Some(manifests);
        self
    }

    /// Override the resource store (primarily for testing)
    pub fn store(mut self, store: Arc<dyn ResourceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Override the event publisher (primarily for testing)
    pub fn events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the Context
    pub fn build(self) -> Context {
        let client = self.client;
        let field_manager = self.field_manager;

        Context {
            store: self
                .store
                .unwrap_or_else(|| Arc::new(KubeResourceStore::new(client.clone(), field_manager))),
            manifests: self
                .manifests
                .unwrap_or_else(|| Arc::new(EmbeddedManifests)),
            events: self
                .events
                .unwrap_or_else(|| Arc::new(KubeEventPublisher::new(client, CONTROLLER_NAME))),
            failure_requeue: self.failure_requeue,
        }
    }
}

/// Reconcile a WorkspaceTemplate
///
/// Creates every missing instance of the template. A template whose spec
/// fails validation gets a `ValidationFailed` event and waits for the next
/// spec change. A pass that leaves instances missing is requeued after
/// [`Context::failure_requeue`]. When no kind could be inventoried at all the
/// store error is returned so [`error_policy`] decides the retry.
#[instrument(
    skip(template, ctx),
    fields(template = %template.name_any(), correlation_id = tracing::field::Empty)
)]
pub async fn reconcile(template: Arc<WorkspaceTemplate>, ctx: Arc<Context>) -> Result<Action, Error> {
    let namespace = template
        .namespace()
        .ok_or_else(|| Error::validation("WorkspaceTemplate has no namespace"))?;

    let pass = PassContext::new(template.object_ref(&()), ctx.events.clone());
    Span::current().record("correlation_id", pass.correlation_id());
    info!("reconciling template");

    let descriptor = match TemplateDescriptor::try_from(template.as_ref()) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            warn!(error = %e, "template validation failed");
            pass.warning(reasons::VALIDATION_FAILED, actions::RECONCILE, e.to_string())
                .await;
            return Ok(Action::await_change());
        }
    };

    let report = reconcile_fleet(
        &pass,
        ctx.store.as_ref(),
        ctx.manifests.as_ref(),
        &namespace,
        &descriptor,
    )
    .await;

    if let Some(e) = report.inventory_failure() {
        return Err(Error::Store(e.clone()));
    }

    if report.has_failures() {
        warn!(
            created = report.created_count(),
            failed = report.failed_count(),
            requeue_secs = ctx.failure_requeue.as_secs(),
            "fleet pass incomplete"
        );
        return Ok(Action::requeue(ctx.failure_requeue));
    }

    info!(created = report.created_count(), "fleet complete");
    Ok(Action::await_change())
}

/// Error policy for the controller
///
/// Retryable errors are requeued after a short delay; anything else waits
/// for the template to change.
pub fn error_policy(template: Arc<WorkspaceTemplate>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        template = %template.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(ERROR_REQUEUE)
    } else {
        Action::await_change()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::WorkspaceTemplateSpec;
    use crate::fleet::ManagedResourceKind;
    use crate::manifest::MockManifestSource;
    use crate::store::{MockResourceStore, StoreError};
    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::ObjectReference;
    use kube::runtime::events::EventType;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<(EventType, String)>>,
    }

    impl RecordingPublisher {
        fn reasons(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|(_, reason)| reason.clone())
                .collect()
        }
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(
            &self,
            _resource_ref: &ObjectReference,
            type_: EventType,
            reason: &str,
            _action: &str,
            _note: Option<String>,
        ) {
            self.events.lock().unwrap().push((type_, reason.to_string()));
        }
    }

    fn template(name: &str, image: &str, instances: u32) -> Arc<WorkspaceTemplate> {
        let mut template = WorkspaceTemplate::new(
            "ping-template",
            WorkspaceTemplateSpec {
                name: name.to_string(),
                image: image.to_string(),
                instances,
            },
        );
        template.metadata.namespace = Some("team-a".to_string());
        template.metadata.uid = Some("uid-1".to_string());
        Arc::new(template)
    }

    fn context(store: MockResourceStore, events: Arc<RecordingPublisher>) -> Arc<Context> {
        Arc::new(Context::for_testing(
            Arc::new(store),
            Arc::new(EmbeddedManifests),
            events,
        ))
    }

    fn empty_store() -> MockResourceStore {
        let mut store = MockResourceStore::new();
        store.expect_list().returning(|_, _| Ok(Vec::new()));
        store.expect_create().returning(|_, _| Ok(()));
        store
    }

    mod reconcile_outcomes {
        use super::*;

        /// Story: a healthy pass waits for the next change
        #[tokio::test]
        async fn complete_fleet_awaits_change() {
            let events = Arc::new(RecordingPublisher::default());
            let ctx = context(empty_store(), events.clone());

            let action = reconcile(template("ping", "img:1", 2), ctx).await.unwrap();

            assert_eq!(action, Action::await_change());
            let created = events
                .reasons()
                .iter()
                .filter(|r| r.as_str() == reasons::INSTANCE_CREATED)
                .count();
            assert_eq!(created, 4);
        }

        /// Story: one kind cannot be listed, the other is still reconciled
        #[tokio::test]
        async fn single_inventory_failure_requeues_without_error() {
            let mut store = MockResourceStore::new();
            store.expect_list().returning(|namespace, kind| match kind {
                ManagedResourceKind::Endpoint => {
                    Err(StoreError::transport("list", kind, namespace, "forbidden"))
                }
                ManagedResourceKind::Workload => Ok(Vec::new()),
            });
            store.expect_create().returning(|_, _| Ok(()));

            let ctx = context(store, Arc::new(RecordingPublisher::default()));
            let action = reconcile(template("ping", "img:1", 1), ctx).await.unwrap();
            assert_eq!(action, Action::requeue(DEFAULT_FAILURE_REQUEUE));
        }

        /// Story: a rejected create leaves the fleet short, so the pass is retried
        #[tokio::test]
        async fn failed_instance_requeues_after_failure_delay() {
            let mut store = MockResourceStore::new();
            store.expect_list().returning(|_, _| Ok(Vec::new()));
            store.expect_create().returning(|namespace, resource| {
                if resource.kind() == ManagedResourceKind::Workload {
                    Err(StoreError::transport("create", resource.kind(), namespace, "quota exceeded"))
                } else {
                    Ok(())
                }
            });

            let events = Arc::new(RecordingPublisher::default());
            let ctx = context(store, events.clone());

            let action = reconcile(template("ping", "img:1", 1), ctx).await.unwrap();

            assert_eq!(action, Action::requeue(DEFAULT_FAILURE_REQUEUE));
            assert!(events
                .reasons()
                .contains(&reasons::INSTANCE_CREATION_FAILED.to_string()));
        }

        #[tokio::test]
        async fn unreadable_manifests_requeue() {
            let mut manifests = MockManifestSource::new();
            manifests.expect_load_manifest().returning(|kind| {
                Err(crate::fleet::TemplateError::load(kind, "no such file"))
            });

            let mut store = MockResourceStore::new();
            store.expect_list().returning(|_, _| Ok(Vec::new()));
            store.expect_create().never();

            let ctx = Arc::new(Context::for_testing(
                Arc::new(store),
                Arc::new(manifests),
                Arc::new(RecordingPublisher::default()),
            ));

            let action = reconcile(template("ping", "img:1", 1), ctx).await.unwrap();
            assert_eq!(action, Action::requeue(DEFAULT_FAILURE_REQUEUE));
        }
    }

    mod validation {
        use super::*;

        /// Story: a bad spec is reported on the template and nothing is touched
        #[tokio::test]
        async fn invalid_spec_publishes_event_and_awaits_change() {
            let mut store = MockResourceStore::new();
            store.expect_list().never();
            store.expect_create().never();

            let events = Arc::new(RecordingPublisher::default());
            let ctx = context(store, events.clone());

            let action = reconcile(template("Not_Valid", "img:1", 2), ctx)
                .await
                .unwrap();

            assert_eq!(action, Action::await_change());
            let recorded = events.events.lock().unwrap().clone();
            assert_eq!(recorded.len(), 1);
            assert_eq!(recorded[0].0, EventType::Warning);
            assert_eq!(recorded[0].1, reasons::VALIDATION_FAILED);
        }

        #[tokio::test]
        async fn template_without_namespace_is_a_validation_error() {
            let mut template = (*template("ping", "img:1", 1)).clone();
            template.metadata.namespace = None;

            let ctx = context(MockResourceStore::new(), Arc::new(RecordingPublisher::default()));
            let err = reconcile(Arc::new(template), ctx).await.unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
    }

    mod error_policy_tests {
        use super::*;

        #[test]
        fn retryable_errors_requeue_quickly() {
            let ctx = context(MockResourceStore::new(), Arc::new(RecordingPublisher::default()));
            let action = error_policy(
                template("ping", "img:1", 1),
                &Error::Store(StoreError::transport(
                    "list",
                    ManagedResourceKind::Endpoint,
                    "team-a",
                    "connection reset",
                )),
                ctx,
            );
            assert_eq!(action, Action::requeue(Duration::from_secs(5)));
        }

        /// Story: the API server is unreachable, so the whole pass is retried soon
        #[tokio::test]
        async fn unreachable_store_is_retried_through_error_policy() {
            let mut store = MockResourceStore::new();
            store.expect_list().returning(|namespace, kind| {
                Err(StoreError::transport("list", kind, namespace, "connection refused"))
            });
            store.expect_create().never();
            let ctx = context(store, Arc::new(RecordingPublisher::default()));

            let err = reconcile(template("ping", "img:1", 2), ctx.clone())
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Store(_)));
            assert!(err.is_retryable());

            let action = error_policy(template("ping", "img:1", 2), &err, ctx);
            assert_eq!(action, Action::requeue(Duration::from_secs(5)));
        }

        #[test]
        fn permanent_errors_await_change() {
            let ctx = context(MockResourceStore::new(), Arc::new(RecordingPublisher::default()));
            let action = error_policy(
                template("ping", "img:1", 1),
                &Error::validation("WorkspaceTemplate has no namespace"),
                ctx,
            );
            assert_eq!(action, Action::await_change());
        }
    }
}
