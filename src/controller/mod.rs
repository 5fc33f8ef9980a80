//! Controller implementations for workspace-fleet CRDs
//!
//! The WorkspaceTemplate controller drives the fleet core: every reconcile
//! observes the owned instances and creates the missing ones.

mod template;

pub use template::{
    error_policy, reconcile, Context, ContextBuilder, CONTROLLER_NAME, DEFAULT_FAILURE_REQUEUE,
};
