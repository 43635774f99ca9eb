//! Sidecar runtime parameters
//!
//! [`SidecarData`] holds the mesh-wide facts read once per run. Combined with
//! a WorkloadEntry it yields a [`WorkloadSidecar`]: the container image,
//! arguments, host aliases and environment file for that workload.

use std::collections::BTreeMap;

use meshctl_common::crd::WorkloadEntry;
use meshctl_common::merge::merge_into;
use meshctl_common::mesh::MeshConfig;
use meshctl_common::yaml::parse_yaml;
use meshctl_common::{Error, Result};
use serde_json::Value;

use crate::annotations::{annotation, AGENT_LOG_LEVEL, COMPONENT_LOG_LEVEL, LOG_LEVEL, PROXY_CONFIG, PROXY_IMAGE};

/// Name of the sidecar container on the remote node
pub const PROXY_CONTAINER_NAME: &str = "istio-proxy";

/// The only token policy the bootstrap supports
pub const REQUIRED_JWT_POLICY: &str = "third-party-jwt";

/// The only certificate provider the bootstrap supports
pub const REQUIRED_CERT_PROVIDER: &str = "istiod";

const DEFAULT_CLUSTER_ID: &str = "Kubernetes";

/// Mesh-wide inputs shared by every workload of a run
#[derive(Clone, Debug, Default)]
pub struct SidecarData {
    /// Namespace of the control plane
    pub istio_namespace: String,
    /// Mesh configuration
    pub mesh_config: MeshConfig,
    /// Installation values (`global.*` and friends)
    pub values: Value,
    /// Root certificate of the mesh CA
    pub ca_cert: Vec<u8>,
    /// Address of the ingress gateway the proxy reaches the control plane through
    pub gateway_address: String,
    /// ProxyConfig YAML overlays, applied in order before the workload's own
    pub proxy_config_overrides: Vec<String>,
}

/// Sidecar parameters of one workload
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkloadSidecar {
    /// Container name
    pub container_name: String,
    /// Container image
    pub image: String,
    /// Process arguments after the image
    pub args: Vec<String>,
    /// Host names mapped to the gateway address
    pub hosts: Vec<String>,
    /// Environment file contents
    pub environment: Vec<u8>,
}

fn value_str(values: &Value, path: &[&str]) -> Option<String> {
    let mut cur = values;
    for key in path {
        cur = cur.get(key)?;
    }
    match cur {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl SidecarData {
    fn global(&self, key: &str) -> Option<String> {
        value_str(&self.values, &["global", key])
    }

    /// Fail unless the installation uses the token policy and certificate
    /// provider the generated bundle relies on
    pub fn check_preconditions(&self) -> Result<()> {
        let jwt = self.global("jwtPolicy").unwrap_or_default();
        if jwt != REQUIRED_JWT_POLICY {
            return Err(Error::bootstrap(
                "preconditions",
                format!(
                    "jwt policy is set to {:?}. At the moment, only jwt policy {:?} is supported",
                    jwt, REQUIRED_JWT_POLICY
                ),
            ));
        }
        let provider = self.global("pilotCertProvider").unwrap_or_default();
        if provider != REQUIRED_CERT_PROVIDER {
            return Err(Error::bootstrap(
                "preconditions",
                format!(
                    "pilot cert provider is set to {:?}. At the moment, only pilot cert provider {:?} is supported",
                    provider, REQUIRED_CERT_PROVIDER
                ),
            ));
        }
        Ok(())
    }

    /// Mesh default ProxyConfig with every overlay for `entry` applied
    fn proxy_config(&self, entry: &WorkloadEntry) -> Result<Value> {
        let mut config = serde_json::to_value(&self.mesh_config.default_config)
            .map_err(|e| Error::serialization_for("ProxyConfig", e.to_string()))?;
        let workload = annotation(entry, PROXY_CONFIG);
        for overlay in self
            .proxy_config_overrides
            .iter()
            .map(String::as_str)
            .chain(workload)
            .filter(|o| !o.trim().is_empty())
        {
            let parsed = parse_yaml(overlay)?;
            if !parsed.is_null() && !parsed.is_object() {
                return Err(Error::bootstrap("proxy-config", "ProxyConfig overrides must be a mapping"));
            }
            merge_into(&mut config, &parsed);
        }
        Ok(config)
    }

    fn image(&self, entry: &WorkloadEntry) -> Result<String> {
        if let Some(image) = annotation(entry, PROXY_IMAGE) {
            return Ok(image.to_string());
        }
        let hub = self
            .global("hub")
            .ok_or_else(|| Error::bootstrap("sidecar", "global.hub is not set"))?;
        let tag = self
            .global("tag")
            .ok_or_else(|| Error::bootstrap("sidecar", "global.tag is not set"))?;
        Ok(format!("{}/proxyv2:{}", hub, tag))
    }

    fn args(entry: &WorkloadEntry) -> Vec<String> {
        let mut args = vec!["proxy".to_string(), "sidecar".to_string()];
        for (key, flag) in [
            (LOG_LEVEL, "--proxyLogLevel"),
            (COMPONENT_LOG_LEVEL, "--proxyComponentLogLevel"),
            (AGENT_LOG_LEVEL, "--log_output_level"),
        ] {
            if let Some(level) = annotation(entry, key) {
                args.push(format!("{}={}", flag, level));
            }
        }
        args
    }

    fn hosts(&self, discovery_host: &str) -> Vec<String> {
        let istiod = format!("istiod.{}.svc", self.istio_namespace);
        let mut hosts = vec![istiod.clone()];
        if !discovery_host.is_empty() && discovery_host != istiod {
            hosts.push(discovery_host.to_string());
        }
        hosts
    }

    fn environment(&self, entry: &WorkloadEntry, proxy_config: &Value, discovery_address: &str) -> Result<Vec<u8>> {
        let name = entry.metadata.name.clone().unwrap_or_default();
        let namespace = entry.metadata.namespace.clone().unwrap_or_default();
        let mesh_id = if self.mesh_config.mesh_id.is_empty() {
            self.global("meshID")
                .unwrap_or_else(|| self.mesh_config.trust_domain.clone())
        } else {
            self.mesh_config.mesh_id.clone()
        };
        let labels = serde_json::to_string(&entry.spec.labels)
            .map_err(|e| Error::serialization_for("WorkloadEntry", e.to_string()))?;
        let proxy_config = serde_json::to_string(proxy_config)
            .map_err(|e| Error::serialization_for("ProxyConfig", e.to_string()))?;

        let mut env = BTreeMap::new();
        env.insert(
            "CA_ADDR",
            self.global("caAddress")
                .unwrap_or_else(|| discovery_address.to_string()),
        );
        env.insert(
            "ISTIO_META_CLUSTER_ID",
            value_str(&self.values, &["global", "multiCluster", "clusterName"])
                .unwrap_or_else(|| DEFAULT_CLUSTER_ID.to_string()),
        );
        env.insert("ISTIO_META_MESH_ID", mesh_id);
        env.insert("ISTIO_META_NETWORK", entry.spec.network.clone());
        env.insert("ISTIO_META_WORKLOAD_NAME", name);
        env.insert("ISTIO_NAMESPACE", self.istio_namespace.clone());
        env.insert("JWT_POLICY", REQUIRED_JWT_POLICY.to_string());
        env.insert("PILOT_CERT_PROVIDER", REQUIRED_CERT_PROVIDER.to_string());
        env.insert("POD_NAMESPACE", namespace);
        env.insert("SERVICE_ACCOUNT", entry.spec.service_account.clone());
        env.insert("INSTANCE_IP", entry.spec.address.clone());
        env.insert("PROXY_CONFIG", proxy_config);
        env.insert("ISTIO_METAJSON_LABELS", labels);

        let mut out = String::new();
        for (key, value) in env.into_iter().filter(|(_, v)| !v.is_empty()) {
            out.push_str(&format!("{}={}\n", key, value));
        }
        Ok(out.into_bytes())
    }

    /// Sidecar parameters for `entry`
    pub fn for_workload(&self, entry: &WorkloadEntry) -> Result<WorkloadSidecar> {
        let proxy_config = self.proxy_config(entry)?;
        let discovery_address = proxy_config
            .get("discoveryAddress")
            .and_then(Value::as_str)
            .unwrap_or(&self.mesh_config.default_config.discovery_address)
            .to_string();
        let discovery_host = discovery_address
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(&discovery_address);

        Ok(WorkloadSidecar {
            container_name: PROXY_CONTAINER_NAME.to_string(),
            image: self.image(entry)?,
            args: Self::args(entry),
            hosts: self.hosts(discovery_host),
            environment: self.environment(entry, &proxy_config, &discovery_address)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshctl_common::crd::WorkloadEntrySpec;
    use serde_json::json;

    fn data() -> SidecarData {
        SidecarData {
            istio_namespace: "istio-system".to_string(),
            mesh_config: MeshConfig::default(),
            values: json!({
                "global": {
                    "hub": "docker.io/istio",
                    "tag": "1.8.0",
                    "jwtPolicy": "third-party-jwt",
                    "pilotCertProvider": "istiod",
                    "meshID": "mesh1",
                    "multiCluster": {"clusterName": "cluster-east"}
                }
            }),
            ca_cert: b"CERT".to_vec(),
            gateway_address: "1.2.3.4".to_string(),
            proxy_config_overrides: vec![],
        }
    }

    fn entry(annotations: &[(&str, &str)]) -> WorkloadEntry {
        let mut we = WorkloadEntry::new(
            "ratings-vm",
            WorkloadEntrySpec {
                address: "10.0.0.7".to_string(),
                labels: [("app".to_string(), "ratings".to_string())].into(),
                network: "on-prem".to_string(),
                service_account: "ratings-sa".to_string(),
                ..Default::default()
            },
        );
        we.metadata.namespace = Some("bookinfo".to_string());
        if !annotations.is_empty() {
            we.metadata.annotations = Some(
                annotations
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
        }
        we
    }

    fn env_lines(sidecar: &WorkloadSidecar) -> Vec<String> {
        String::from_utf8(sidecar.environment.clone())
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    #[test]
    fn preconditions_require_third_party_jwt_and_istiod() {
        assert!(data().check_preconditions().is_ok());

        let mut first_party = data();
        first_party.values["global"]["jwtPolicy"] = json!("first-party-jwt");
        let err = first_party.check_preconditions().unwrap_err();
        assert!(err.to_string().contains("first-party-jwt"));

        let mut citadel = data();
        citadel.values["global"]["pilotCertProvider"] = json!("kubernetes");
        assert!(citadel.check_preconditions().is_err());
    }

    #[test]
    fn default_sidecar_parameters() {
        let sidecar = data().for_workload(&entry(&[])).unwrap();
        assert_eq!(sidecar.container_name, "istio-proxy");
        assert_eq!(sidecar.image, "docker.io/istio/proxyv2:1.8.0");
        assert_eq!(sidecar.args, vec!["proxy", "sidecar"]);
        assert_eq!(sidecar.hosts, vec!["istiod.istio-system.svc"]);
    }

    #[test]
    fn environment_is_sorted_and_complete() {
        let sidecar = data().for_workload(&entry(&[])).unwrap();
        let lines = env_lines(&sidecar);
        let keys: Vec<&str> = lines.iter().filter_map(|l| l.split_once('=')).map(|(k, _)| k).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(keys.len(), 13);
        assert!(lines.contains(&"CA_ADDR=istiod.istio-system.svc:15012".to_string()));
        assert!(lines.contains(&"ISTIO_META_CLUSTER_ID=cluster-east".to_string()));
        assert!(lines.contains(&"ISTIO_META_MESH_ID=mesh1".to_string()));
        assert!(lines.contains(&"ISTIO_META_NETWORK=on-prem".to_string()));
        assert!(lines.contains(&"ISTIO_META_WORKLOAD_NAME=ratings-vm".to_string()));
        assert!(lines.contains(&"POD_NAMESPACE=bookinfo".to_string()));
        assert!(lines.contains(&"SERVICE_ACCOUNT=ratings-sa".to_string()));
        assert!(lines.contains(&"INSTANCE_IP=10.0.0.7".to_string()));
        assert!(lines.contains(&r#"ISTIO_METAJSON_LABELS={"app":"ratings"}"#.to_string()));
    }

    #[test]
    fn proxy_config_overlays_apply_in_order() {
        let mut data = data();
        data.proxy_config_overrides = vec![
            "concurrency: 1\ndiscoveryAddress: istiod.mesh.example.com:15012\n".to_string(),
            String::new(),
        ];
        let sidecar = data
            .for_workload(&entry(&[(PROXY_CONFIG, "concurrency: 3")]))
            .unwrap();
        let lines = env_lines(&sidecar);
        let proxy_config = lines
            .iter()
            .find_map(|l| l.strip_prefix("PROXY_CONFIG="))
            .unwrap();
        let parsed: Value = serde_json::from_str(proxy_config).unwrap();
        assert_eq!(parsed["concurrency"], 3);
        assert_eq!(parsed["discoveryAddress"], "istiod.mesh.example.com:15012");
        assert_eq!(
            sidecar.hosts,
            vec!["istiod.istio-system.svc", "istiod.mesh.example.com"]
        );
        assert!(lines.contains(&"CA_ADDR=istiod.mesh.example.com:15012".to_string()));
    }

    #[test]
    fn annotations_pick_image_and_log_levels() {
        let sidecar = data()
            .for_workload(&entry(&[
                (PROXY_IMAGE, "registry.local/proxy:dev"),
                (LOG_LEVEL, "debug"),
                (AGENT_LOG_LEVEL, "default:info"),
            ]))
            .unwrap();
        assert_eq!(sidecar.image, "registry.local/proxy:dev");
        assert_eq!(
            sidecar.args,
            vec!["proxy", "sidecar", "--proxyLogLevel=debug", "--log_output_level=default:info"]
        );
    }

    #[test]
    fn missing_hub_is_an_error() {
        let mut data = data();
        data.values = json!({"global": {"tag": "1.8.0"}});
        assert!(data.for_workload(&entry(&[])).is_err());
    }
}
