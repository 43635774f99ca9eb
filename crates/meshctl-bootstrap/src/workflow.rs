//! Per-workload bundle preparation

use std::collections::BTreeMap;

use meshctl_common::crd::WorkloadEntry;
use meshctl_common::Result;
use tracing::{debug, warn};

use crate::annotations::RemoteTarget;
use crate::bundle::{compose, BootstrapBundle, BootstrapPlan};
use crate::identity::identity_key;
use crate::sidecar::SidecarData;

/// Everything needed to bootstrap one workload
#[derive(Clone, Debug)]
pub struct PreparedWorkload {
    /// Workload name
    pub name: String,
    /// Workload namespace
    pub namespace: String,
    /// Node the bundle goes to
    pub target: RemoteTarget,
    /// Bundle contents
    pub bundle: BootstrapBundle,
    /// Files and commands for `target.remote_dir`
    pub plan: BootstrapPlan,
}

/// Build a bundle for every entry that has an identity in `identities`.
/// Entries without one are skipped.
pub fn prepare_workloads(
    data: &SidecarData,
    entries: &[WorkloadEntry],
    identities: &BTreeMap<String, Vec<u8>>,
    default_user: &str,
) -> Result<Vec<PreparedWorkload>> {
    let mut prepared = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = entry.metadata.name.clone().unwrap_or_default();
        let namespace = entry.metadata.namespace.clone().unwrap_or_default();
        let key = identity_key(&namespace, &entry.spec.service_account);
        let Some(token) = identities.get(&key) else {
            warn!(workload = %format!("{}.{}", name, namespace), "skipping workload without an identity");
            continue;
        };

        let target = RemoteTarget::for_entry(entry, default_user);
        let bundle = BootstrapBundle {
            ca_cert: data.ca_cert.clone(),
            gateway_address: data.gateway_address.clone(),
            workload_name: name.clone(),
            workload_namespace: namespace.clone(),
            token: token.clone(),
            sidecar: data.for_workload(entry)?,
        };
        let plan = compose(&bundle, &target.remote_dir);
        debug!(workload = %name, namespace = %namespace, host = %target.host, "prepared bundle");
        prepared.push(PreparedWorkload {
            name,
            namespace,
            target,
            bundle,
            plan,
        });
    }
    Ok(prepared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::SSH_USER;
    use meshctl_common::crd::WorkloadEntrySpec;
    use meshctl_common::mesh::MeshConfig;
    use serde_json::json;

    fn data() -> SidecarData {
        SidecarData {
            istio_namespace: "istio-system".to_string(),
            mesh_config: MeshConfig::default(),
            values: json!({"global": {"hub": "docker.io/istio", "tag": "1.8.0"}}),
            ca_cert: b"CERT".to_vec(),
            gateway_address: "1.2.3.4".to_string(),
            proxy_config_overrides: vec![],
        }
    }

    fn entry(name: &str, sa: &str) -> WorkloadEntry {
        let mut we = WorkloadEntry::new(
            name,
            WorkloadEntrySpec {
                address: "10.0.0.7".to_string(),
                service_account: sa.to_string(),
                ..Default::default()
            },
        );
        we.metadata.namespace = Some("bookinfo".to_string());
        we
    }

    #[test]
    fn workloads_without_identity_are_skipped() {
        let identities: BTreeMap<_, _> = [("bookinfo/ratings".to_string(), b"TOKEN".to_vec())].into();
        let entries = vec![entry("ratings-vm", "ratings"), entry("details-vm", "details")];

        let prepared = prepare_workloads(&data(), &entries, &identities, "root").unwrap();
        assert_eq!(prepared.len(), 1);
        let only = &prepared[0];
        assert_eq!(only.name, "ratings-vm");
        assert_eq!(only.bundle.token, b"TOKEN");
        assert_eq!(only.bundle.ca_cert, b"CERT");
        assert_eq!(only.plan.files.len(), 3);
        assert_eq!(only.plan.files[0].dir, "/tmp/istio-proxy");
        assert_eq!(only.target.user, "root");
    }

    #[test]
    fn remote_target_comes_from_annotations() {
        let identities: BTreeMap<_, _> = [("bookinfo/ratings".to_string(), b"TOKEN".to_vec())].into();
        let mut we = entry("ratings-vm", "ratings");
        we.metadata.annotations = Some([(SSH_USER.to_string(), "ops".to_string())].into());

        let prepared = prepare_workloads(&data(), &[we], &identities, "root").unwrap();
        assert_eq!(prepared[0].target.user, "ops");
        assert_eq!(prepared[0].target.host, "10.0.0.7");
    }

    #[test]
    fn sidecar_errors_propagate() {
        let identities: BTreeMap<_, _> = [("bookinfo/ratings".to_string(), b"TOKEN".to_vec())].into();
        let mut no_hub = data();
        no_hub.values = json!({});
        assert!(prepare_workloads(&no_hub, &[entry("ratings-vm", "ratings")], &identities, "root").is_err());
    }
}
