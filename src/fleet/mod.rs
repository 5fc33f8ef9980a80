//! Fleet reconciliation core
//!
//! A fleet is the set of numbered instances `1..=N` a template asks for. Each
//! instance is one Endpoint (Service) and one Workload (Deployment). One pass:
//!
//! 1. [`list_owned_instances`] - existing resources owned by the template
//! 2. [`compute_missing`] - indices in `1..=N` with no existing resource
//! 3. [`create_instance`] - materialize and submit each missing resource
//!
//! [`reconcile_fleet`] sequences the three steps for every managed kind.

mod creator;
mod descriptor;
mod error;
mod inventory;
mod kind;
mod materializer;
mod missing;
mod orchestrator;
mod pass;

pub use creator::{build_instance, create_instance, CreateOutcome};
pub use descriptor::{OwnerLink, TemplateDescriptor};
pub use error::{CreationError, IndexParseError, TemplateError};
pub use inventory::list_owned_instances;
pub use kind::{ManagedResourceKind, Placeholder, SubstitutionMap};
pub use materializer::{materialize, ConcreteResource};
pub use missing::{all_instances, compute_missing, parse_instance_index, MissingInstances};
pub use orchestrator::{reconcile_fleet, FleetReport, KindReport};
pub use pass::PassContext;
