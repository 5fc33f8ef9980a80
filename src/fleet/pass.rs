//! Per-invocation reconciliation context

use std::sync::Arc;

use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::EventType;
use uuid::Uuid;

use crate::events::EventPublisher;

/// Context of one reconciliation invocation
///
/// Carries the correlation id that ties together every log line of the pass
/// and the sink that Kubernetes Events about the template are published to.
/// A fresh value is built for every invocation; nothing in it outlives the pass.
pub struct PassContext {
    correlation_id: String,
    subject: ObjectReference,
    events: Arc<dyn EventPublisher>,
}

impl PassContext {
    /// Create a context with a new random correlation id
    pub fn new(subject: ObjectReference, events: Arc<dyn EventPublisher>) -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            subject,
            events,
        }
    }

    /// Use a caller-supplied correlation id
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// Correlation id of this pass
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Object events are reported on
    pub fn subject(&self) -> &ObjectReference {
        &self.subject
    }

    /// Publish a Normal event on the subject
    pub async fn normal(&self, reason: &str, action: &str, note: impl Into<String>) {
        self.events
            .publish(
                &self.subject,
                EventType::Normal,
                reason,
                action,
                Some(note.into()),
            )
            .await;
    }

    /// Publish a Warning event on the subject
    pub async fn warning(&self, reason: &str, action: &str, note: impl Into<String>) {
        self.events
            .publish(
                &self.subject,
                EventType::Warning,
                reason,
                action,
                Some(note.into()),
            )
            .await;
    }
}
