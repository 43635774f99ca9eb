//! Sidecar bootstrap for mesh workloads running outside the cluster
//!
//! For each WorkloadEntry the crate derives the sidecar parameters, an
//! identity token and a pure [`BootstrapPlan`] of files and commands.
//! Executors consume the plan: [`DirectoryWriter`] lays out an offline
//! bundle with a start script, [`copy_bundle`] drives a [`RemoteHost`].

#![deny(missing_docs)]

pub mod annotations;
pub mod bundle;
pub mod executor;
pub mod gateway;
pub mod identity;
pub mod script;
pub mod sidecar;
pub mod workflow;

pub use annotations::RemoteTarget;
pub use bundle::{compose, BootstrapBundle, BootstrapPlan, PlannedCommand, PlannedFile};
pub use executor::{copy_bundle, DirectoryWriter, DryRunHost, RemoteHost};
pub use gateway::{infer_gateway_address, GatewayService, LoadBalancerIngress, ServiceLookup};
pub use identity::{issue_identities, TokenIssuer, TOKEN_AUDIENCE};
pub use script::{start_script, write_bundle, BundleWriter};
pub use sidecar::{SidecarData, WorkloadSidecar};
pub use workflow::{prepare_workloads, PreparedWorkload};
