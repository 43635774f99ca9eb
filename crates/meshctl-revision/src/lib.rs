//! Control plane revision reports
//!
//! [`list_revisions`] builds the inventory of revisions in a cluster and
//! [`describe_revision`] gathers everything belonging to one of them. Both
//! read the cluster through [`RevisionSource`] and compare installed
//! IstioOperator specs against profiles produced by a [`ProfileRenderer`].

#![deny(missing_docs)]

pub mod components;
pub mod describe;
pub mod diff;
pub mod list;
pub mod model;
pub mod printer;
pub mod profile;
pub mod source;

pub use describe::{describe_revision, RevisionReport};
pub use diff::{customizations, diff_walk, IopDiff};
pub use list::{list_revisions, RevisionMap};
pub use model::{IstioOperatorCrInfo, PodInfo, RevisionDescription, Section, WebhookInfo};
pub use profile::{ProfileRenderer, ProfileSet};
pub use source::{MutatingWebhook, RevisionSource};
