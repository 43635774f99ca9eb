//! WorkloadEntry: a non-Kubernetes workload (typically a VM) in the mesh

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Spec for a WorkloadEntry
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "networking.istio.io",
    version = "v1beta1",
    kind = "WorkloadEntry",
    plural = "workloadentries",
    shortname = "we",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadEntrySpec {
    /// Address of the workload (IP or DNS name)
    #[serde(default)]
    pub address: String,

    /// Named ports exposed by the workload
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ports: BTreeMap<String, u32>,

    /// Labels identifying the workload
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Network the workload sits in
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network: String,

    /// Locality (region/zone/subzone)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub locality: String,

    /// Load balancing weight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,

    /// Service account the workload runs as
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account: String,
}
