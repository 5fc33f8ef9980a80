//! workspace-fleet - keeps a fleet of numbered workspace instances in sync with its template
//!
//! A `WorkspaceTemplate` describes N identical workspace instances. Each instance
//! is realized as one Service (the endpoint) and one Deployment (the workload),
//! named `<template-id>-service-<n>` and `<template-id>-deployment-<n>`.
//! Reconciliation creates exactly the instances that are missing and never
//! touches the ones that already exist, so it is safe to run any number of times.
//!
//! # Modules
//!
//! - [`crd`] - The `WorkspaceTemplate` Custom Resource Definition
//! - [`fleet`] - Inventory, diff and creation of instances (the reconciliation core)
//! - [`store`] - Resource store abstraction over the Kubernetes API
//! - [`manifest`] - Sources of the templated Service/Deployment manifests
//! - [`controller`] - kube-runtime reconcile and error policy
//! - [`events`] - Kubernetes Event publishing
//! - [`config`] - Operator configuration
//! - [`telemetry`] - Tracing subscriber setup
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod events;
pub mod fleet;
pub mod manifest;
pub mod store;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Default field manager used for create and server-side apply calls
pub const DEFAULT_FIELD_MANAGER: &str = "workspace-fleet";

/// Label carrying the template id on every managed resource
pub const TEMPLATE_LABEL_KEY: &str = "workspaces.dev/template";
