//! Ingress gateway address inference
//!
//! Workloads outside the cluster reach the control plane through the
//! ingress gateway. Its address comes from, in order: the gateways of the
//! workload network in MeshNetworks, the ingress service named in
//! MeshConfig, and finally the default `istio-ingressgateway` Service.

use async_trait::async_trait;
use meshctl_common::mesh::{MeshConfig, MeshNetworks};
use meshctl_common::{Error, Result};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

/// Port the gateway must expose for mesh expansion (TLS auto passthrough)
pub const MESH_EXPANSION_PORT: i32 = 15443;

/// Service name used when nothing else names the gateway
pub const DEFAULT_INGRESS_SERVICE: &str = "istio-ingressgateway";

/// Load balancer entry point of a Service
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadBalancerIngress {
    /// DNS name, empty when unset
    pub hostname: String,
    /// IP address, empty when unset
    pub ip: String,
}

/// The parts of a gateway Service the inference looks at
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GatewayService {
    /// Namespace
    pub namespace: String,
    /// Name
    pub name: String,
    /// Service ports
    pub ports: Vec<i32>,
    /// Load balancer entry points
    pub ingress: Vec<LoadBalancerIngress>,
}

impl GatewayService {
    fn uri(&self) -> String {
        format!("v1/services/{}/{}", self.namespace, self.name)
    }

    /// Check the Service exposes every port mesh expansion needs
    pub fn verify_mesh_expansion_ports(&self) -> Result<()> {
        if self.ports.contains(&MESH_EXPANSION_PORT) {
            return Ok(());
        }
        Err(Error::bootstrap(
            "gateway",
            format!(
                "mesh expansion is not possible because Istio Ingress Gateway Service {} is missing a port '{} (TLS AUTO_PASSTHROUGH)'",
                self.uri(),
                MESH_EXPANSION_PORT
            ),
        ))
    }

    /// Load balancer address, preferring host names over IPs
    pub fn load_balancer_address(&self) -> Result<String> {
        if self.ingress.is_empty() {
            return Err(Error::bootstrap(
                "gateway",
                format!("k8s Service {} has no ingress points", self.uri()),
            ));
        }
        self.ingress
            .iter()
            .find(|i| !i.hostname.is_empty())
            .map(|i| i.hostname.clone())
            .or_else(|| {
                self.ingress
                    .iter()
                    .find(|i| !i.ip.is_empty())
                    .map(|i| i.ip.clone())
            })
            .ok_or_else(|| {
                Error::bootstrap(
                    "gateway",
                    format!("k8s Service {} has no valid ingress points", self.uri()),
                )
            })
    }
}

/// Read access to Services
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ServiceLookup: Send + Sync {
    /// The Service `namespace/name`
    async fn get_service(&self, namespace: &str, name: &str) -> Result<GatewayService>;
}

/// Split `name.namespace[.svc...]` into name and namespace, using
/// `default_namespace` when the namespace part is missing
pub fn split_service_and_namespace(service: &str, default_namespace: &str) -> (String, String) {
    let mut parts = service.splitn(3, '.');
    let name = parts.next().unwrap_or_default().to_string();
    let namespace = parts
        .next()
        .filter(|ns| !ns.is_empty())
        .unwrap_or(default_namespace)
        .to_string();
    (name, namespace)
}

/// Address of the ingress gateway for workloads on `network`
pub async fn infer_gateway_address(
    lookup: &dyn ServiceLookup,
    istio_namespace: &str,
    mesh: &MeshConfig,
    networks: &MeshNetworks,
    network: &str,
) -> Result<String> {
    let mut service: Option<(String, String, &str)> = None;
    let mut address = String::new();

    if let Some(net) = networks.networks.get(network) {
        for gw in &net.gateways {
            if let Some(svc) = gw.registry_service_name.as_deref().filter(|s| !s.is_empty()) {
                if service.is_none() {
                    let (name, ns) = split_service_and_namespace(svc, istio_namespace);
                    service = Some((name, ns, "MeshNetworks"));
                }
            }
            if let Some(addr) = gw.address.as_deref().filter(|a| !a.is_empty()) {
                if address.is_empty() {
                    address = addr.to_string();
                }
            }
        }
    }

    if service.is_none() && address.is_empty() {
        service = Some(if mesh.ingress_service.is_empty() {
            (DEFAULT_INGRESS_SERVICE.to_string(), istio_namespace.to_string(), "default")
        } else {
            (
                mesh.ingress_service.clone(),
                istio_namespace.to_string(),
                "MeshConfig.IngressService",
            )
        });
    }

    if let Some((name, namespace, source)) = service {
        debug!(service = %name, namespace = %namespace, source, "inferring gateway address");
        let svc = lookup.get_service(&namespace, &name).await.map_err(|e| {
            Error::bootstrap(
                "gateway",
                format!("unable to find Istio Ingress Gateway inferred from {} settings: {}", source, e),
            )
        })?;
        svc.verify_mesh_expansion_ports().map_err(|e| {
            Error::bootstrap(
                "gateway",
                format!(
                    "it appears that Istio Ingress Gateway inferred from {} settings is not configured for mesh expansion: {}",
                    source, e
                ),
            )
        })?;
        address = svc.load_balancer_address().map_err(|e| {
            Error::bootstrap(
                "gateway",
                format!(
                    "unable to determine address of the Istio Ingress Gateway inferred from {} settings: {}",
                    source, e
                ),
            )
        })?;
    }

    if address.is_empty() {
        return Err(Error::bootstrap(
            "gateway",
            "unable to infer address of the Istio Ingress Gateway neither from MeshNetworks, nor from MeshConfig, nor from default settings",
        ));
    }
    Ok(address)
}
