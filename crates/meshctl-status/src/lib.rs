//! Proxy configuration sync status
//!
//! Controllers report, per connected proxy, which configuration pushes the
//! proxy has acknowledged. This crate reduces those reports to one label
//! per discovery stream and renders them as a table, either from JSON
//! syncz payloads ([`StatusWriter`]) or from discovery responses carrying
//! `ClientConfig` resources ([`XdsStatusWriter`]).

#![deny(missing_docs)]

pub mod model;
pub mod sync;
pub mod writer;
pub mod xds;

pub use model::{NormalizedStatus, SyncStatus, XdsNonces};
pub use sync::{short_type, SyncLabel};
pub use writer::{StatusWriter, DEFAULT_XDS_COLUMNS};
pub use xds::{ControlPlaneInfo, XdsStatusWriter, CLIENT_CONFIG_TYPE_URL};
