//! Cluster reads for sidecar bootstrap

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::authentication::v1::{TokenRequest, TokenRequestSpec};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Service, ServiceAccount};
use kube::{Api, Client};
use meshctl_bootstrap::annotations::MESH_EXPANSION_CONFIG_MAP;
use meshctl_bootstrap::{GatewayService, LoadBalancerIngress, ServiceLookup, TokenIssuer};
use meshctl_common::mesh::{MeshConfig, MeshNetworks};
use meshctl_common::{Error, Result, INJECTOR_CONFIG_MAP, MESH_CONFIG_MAP, ROOT_CERT_CONFIG_MAP};
use serde_json::Value;
use tracing::debug;

const MESH_KEY: &str = "mesh";
const MESH_NETWORKS_KEY: &str = "meshNetworks";
const VALUES_KEY: &str = "values";
const ROOT_CERT_KEY: &str = "root-cert.pem";
const PROXY_CONFIG_KEY: &str = "PROXY_CONFIG";

// =============================================================================
// Tokens
// =============================================================================

/// Issues ServiceAccount tokens with the TokenRequest API
pub struct KubeTokenIssuer {
    client: Client,
}

impl KubeTokenIssuer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenIssuer for KubeTokenIssuer {
    async fn issue_token(
        &self,
        namespace: &str,
        service_account: &str,
        audience: &str,
        lifetime: Duration,
    ) -> Result<String> {
        let api: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);
        let request = TokenRequest {
            metadata: Default::default(),
            spec: TokenRequestSpec {
                audiences: vec![audience.to_string()],
                expiration_seconds: Some(lifetime.as_secs() as i64),
                bound_object_ref: None,
            },
            status: None,
        };
        let response = api
            .create_token_request(service_account, &Default::default(), &request)
            .await?;
        let token = response
            .status
            .map(|s| s.token)
            .unwrap_or_default();
        if token.is_empty() {
            return Err(Error::bootstrap("identity", "server returned empty token"));
        }
        Ok(token)
    }
}

// =============================================================================
// Services
// =============================================================================

/// Reads Services through the Kubernetes API
pub struct KubeServiceLookup {
    client: Client,
}

impl KubeServiceLookup {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn gateway_service(namespace: &str, name: &str, svc: Service) -> GatewayService {
    let ports = svc
        .spec
        .and_then(|s| s.ports)
        .unwrap_or_default()
        .into_iter()
        .map(|p| p.port)
        .collect();
    let ingress = svc
        .status
        .and_then(|s| s.load_balancer)
        .and_then(|lb| lb.ingress)
        .unwrap_or_default()
        .into_iter()
        .map(|i| LoadBalancerIngress {
            hostname: i.hostname.unwrap_or_default(),
            ip: i.ip.unwrap_or_default(),
        })
        .collect();
    GatewayService {
        namespace: namespace.to_string(),
        name: name.to_string(),
        ports,
        ingress,
    }
}

#[async_trait]
impl ServiceLookup for KubeServiceLookup {
    async fn get_service(&self, namespace: &str, name: &str) -> Result<GatewayService> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let svc = api
            .get_opt(name)
            .await?
            .ok_or_else(|| Error::not_found("Service", format!("{}/{}", namespace, name)))?;
        Ok(gateway_service(namespace, name, svc))
    }
}

// =============================================================================
// Mesh-wide inputs
// =============================================================================

/// Mesh-wide documents the bootstrap reads from the control plane namespace
#[derive(Clone, Debug, Default)]
pub struct MeshInputs {
    pub mesh_config: MeshConfig,
    pub mesh_networks: MeshNetworks,
    pub values: Value,
    pub ca_cert: Vec<u8>,
}

async fn config_map_data(
    client: &Client,
    namespace: &str,
    name: &str,
) -> Result<BTreeMap<String, String>> {
    let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    let cm = api
        .get_opt(name)
        .await?
        .ok_or_else(|| Error::not_found("ConfigMap", format!("{}/{}", namespace, name)))?;
    Ok(cm.data.unwrap_or_default())
}

fn required_key<'a>(
    data: &'a BTreeMap<String, String>,
    namespace: &str,
    name: &str,
    key: &str,
) -> Result<&'a str> {
    data.get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            Error::validation_for(
                format!("ConfigMap {}/{}", namespace, name),
                format!("missing configuration map key {:?}", key),
            )
        })
}

impl MeshInputs {
    /// Read mesh config, mesh networks, installation values and the root
    /// certificate from `istio_namespace`
    pub async fn load(client: &Client, istio_namespace: &str) -> Result<Self> {
        let mesh = config_map_data(client, istio_namespace, MESH_CONFIG_MAP).await?;
        let mesh_config = MeshConfig::from_yaml(required_key(
            &mesh,
            istio_namespace,
            MESH_CONFIG_MAP,
            MESH_KEY,
        )?)?;
        let mesh_networks = match mesh.get(MESH_NETWORKS_KEY) {
            Some(yaml) => MeshNetworks::from_yaml(yaml)?,
            None => {
                debug!("no mesh networks configured");
                MeshNetworks::default()
            }
        };

        let injector = config_map_data(client, istio_namespace, INJECTOR_CONFIG_MAP).await?;
        let raw_values = required_key(&injector, istio_namespace, INJECTOR_CONFIG_MAP, VALUES_KEY)?;
        let values = serde_json::from_str(raw_values).map_err(|e| {
            Error::serialization_for("Values", format!("failed to unmarshal Istio config values: {}", e))
        })?;

        let root = config_map_data(client, istio_namespace, ROOT_CERT_CONFIG_MAP).await?;
        let ca_cert = required_key(&root, istio_namespace, ROOT_CERT_CONFIG_MAP, ROOT_CERT_KEY)?
            .as_bytes()
            .to_vec();

        Ok(Self {
            mesh_config,
            mesh_networks,
            values,
            ca_cert,
        })
    }
}

/// ProxyConfig overlay from the ConfigMap a Namespace names in its
/// mesh expansion annotation, if any
pub async fn namespace_proxy_config(client: &Client, namespace: &str) -> Result<Option<String>> {
    let api: Api<Namespace> = Api::all(client.clone());
    let ns = api.get(namespace).await?;
    let Some(config_map) = ns
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(MESH_EXPANSION_CONFIG_MAP))
        .filter(|name| !name.is_empty())
    else {
        return Ok(None);
    };
    debug!(namespace = %namespace, config_map = %config_map, "reading ProxyConfig overrides");
    let data = config_map_data(client, namespace, config_map).await?;
    Ok(data.get(PROXY_CONFIG_KEY).filter(|v| !v.is_empty()).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        LoadBalancerIngress as K8sIngress, LoadBalancerStatus, ServicePort, ServiceSpec,
        ServiceStatus,
    };

    #[test]
    fn gateway_service_from_k8s_service() {
        let svc = Service {
            spec: Some(ServiceSpec {
                ports: Some(vec![
                    ServicePort {
                        port: 443,
                        ..Default::default()
                    },
                    ServicePort {
                        port: 15443,
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }),
            status: Some(ServiceStatus {
                load_balancer: Some(LoadBalancerStatus {
                    ingress: Some(vec![K8sIngress {
                        ip: Some("34.1.2.3".to_string()),
                        ..Default::default()
                    }]),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let gw = gateway_service("istio-system", "istio-ingressgateway", svc);
        assert_eq!(gw.ports, vec![443, 15443]);
        assert!(gw.verify_mesh_expansion_ports().is_ok());
        assert_eq!(gw.load_balancer_address().unwrap(), "34.1.2.3");
    }

    #[test]
    fn missing_key_names_config_map() {
        let data = BTreeMap::new();
        let err = required_key(&data, "istio-system", "istio", "mesh").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("istio-system/istio"));
        assert!(msg.contains("\"mesh\""));
    }
}
