//! Custom Resource Definitions for workspace-fleet
//!
//! This module contains all CRD definitions used by the operator.

mod template;

pub use template::{WorkspaceTemplate, WorkspaceTemplateSpec, MAX_LABEL_LENGTH};
