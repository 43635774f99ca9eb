//! Mesh-wide runtime configuration
//!
//! [`MeshConfig`] and [`ProxyConfig`] decode leniently: keys meshctl does not
//! model are captured in `extra` instead of failing, so configs written for
//! newer control planes still load. Callers that want strict decoding check
//! [`MeshConfig::unknown_fields`].

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::merge::merge_into;
use crate::yaml::{from_value, parse_yaml};
use crate::{Error, Result, DEFAULT_ISTIO_NAMESPACE};

/// Port the proxy's status server listens on by default
pub const DEFAULT_STATUS_PORT: i64 = 15020;

/// Default cluster-local trust domain
pub const DEFAULT_TRUST_DOMAIN: &str = "cluster.local";

/// Mesh-wide settings, as stored under the `mesh` key of the mesh config map
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct MeshConfig {
    /// Port the sidecar's outbound capture listener binds to
    pub proxy_listen_port: i64,
    /// Upstream connection timeout
    pub connect_timeout: String,
    /// Time to wait for client bytes before falling back to TCP
    pub protocol_detection_timeout: String,
    /// Ingress class handled by the mesh ingress
    pub ingress_class: String,
    /// Service name of the default ingress gateway
    pub ingress_service: String,
    /// How Kubernetes Ingress resources are picked up
    pub ingress_controller_mode: String,
    /// Whether tracing is enabled
    pub enable_tracing: bool,
    /// File the proxies write access logs to (empty disables)
    pub access_log_file: String,
    /// Access log line format
    pub access_log_format: String,
    /// TEXT or JSON access log encoding
    pub access_log_encoding: String,
    /// Default proxy settings, overridable per workload
    pub default_config: ProxyConfig,
    /// Whether client-side mTLS is configured automatically
    pub enable_auto_mtls: bool,
    /// Trust domain workload identities are issued in
    pub trust_domain: String,
    /// Additional trust domains treated as equivalent
    pub trust_domain_aliases: Vec<String>,
    /// Namespace holding mesh-wide config resources
    pub root_namespace: String,
    /// Mesh identifier
    pub mesh_id: String,
    /// Egress behaviour for unknown destinations
    pub outbound_traffic_policy: OutboundTrafficPolicy,
    /// DNS refresh rate for STRICT_DNS clusters
    pub dns_refresh_rate: String,
    /// Whether application metrics are merged into the proxy's endpoint
    pub enable_prometheus_merge: bool,
    /// Keys not modelled above
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            proxy_listen_port: 15001,
            connect_timeout: "10s".to_string(),
            protocol_detection_timeout: "0s".to_string(),
            ingress_class: "istio".to_string(),
            ingress_service: "istio-ingressgateway".to_string(),
            ingress_controller_mode: "STRICT".to_string(),
            enable_tracing: true,
            access_log_file: String::new(),
            access_log_format: String::new(),
            access_log_encoding: "TEXT".to_string(),
            default_config: ProxyConfig::default(),
            enable_auto_mtls: true,
            trust_domain: DEFAULT_TRUST_DOMAIN.to_string(),
            trust_domain_aliases: Vec::new(),
            root_namespace: DEFAULT_ISTIO_NAMESPACE.to_string(),
            mesh_id: String::new(),
            outbound_traffic_policy: OutboundTrafficPolicy::default(),
            dns_refresh_rate: "5s".to_string(),
            enable_prometheus_merge: true,
            extra: BTreeMap::new(),
        }
    }
}

/// Egress policy for destinations outside the service registry
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct OutboundTrafficPolicy {
    /// ALLOW_ANY or REGISTRY_ONLY
    pub mode: String,
}

impl Default for OutboundTrafficPolicy {
    fn default() -> Self {
        Self {
            mode: "ALLOW_ANY".to_string(),
        }
    }
}

/// Per-proxy settings
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Directory for generated proxy configuration
    pub config_path: String,
    /// Path to the proxy binary
    pub binary_path: String,
    /// Service cluster reported to the control plane
    pub service_cluster: String,
    /// Connection drain time on hot restart
    pub drain_duration: String,
    /// Time before the parent process is terminated on hot restart
    pub parent_shutdown_duration: String,
    /// Address of the discovery service (`host:port`)
    pub discovery_address: String,
    /// Port of the proxy admin server
    pub proxy_admin_port: i64,
    /// NONE, MUTUAL_TLS or INHERIT
    pub control_plane_auth_policy: String,
    /// Maximum length of stat names
    pub stat_name_length: i64,
    /// Number of worker threads (0 means one per core)
    pub concurrency: Option<i64>,
    /// Port of the proxy status server
    pub status_port: i64,
    /// Drain time applied on proxy termination
    pub termination_drain_duration: String,
    /// Extra environment exposed to the proxy
    pub proxy_metadata: BTreeMap<String, String>,
    /// Keys not modelled above
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            config_path: "./etc/istio/proxy".to_string(),
            binary_path: "/usr/local/bin/envoy".to_string(),
            service_cluster: "istio-proxy".to_string(),
            drain_duration: "45s".to_string(),
            parent_shutdown_duration: "60s".to_string(),
            discovery_address: format!("istiod.{}.svc:15012", DEFAULT_ISTIO_NAMESPACE),
            proxy_admin_port: 15000,
            control_plane_auth_policy: "MUTUAL_TLS".to_string(),
            stat_name_length: 189,
            concurrency: Some(2),
            status_port: DEFAULT_STATUS_PORT,
            termination_drain_duration: "5s".to_string(),
            proxy_metadata: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }
}

/// Gateways and endpoint ranges of each network in a multi-network mesh
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct MeshNetworks {
    /// Networks keyed by name
    pub networks: BTreeMap<String, Network>,
}

/// One network of a multi-network mesh
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Network {
    /// Endpoint sources belonging to the network
    pub endpoints: Vec<NetworkEndpoint>,
    /// Gateways through which the network is reached
    pub gateways: Vec<NetworkGateway>,
}

/// Endpoint source of a network
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkEndpoint {
    /// Endpoints in this CIDR belong to the network
    pub from_cidr: Option<String>,
    /// Endpoints from this registry belong to the network
    pub from_registry: Option<String>,
}

/// Gateway of a network
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkGateway {
    /// Fully qualified name of the gateway Service
    pub registry_service_name: Option<String>,
    /// Fixed gateway address
    pub address: Option<String>,
    /// Gateway port
    pub port: u32,
}

impl MeshConfig {
    /// Decode mesh config YAML on top of the defaults
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::with_overlay(&parse_yaml(yaml)?)
    }

    /// Merge `overlay` onto the defaults and decode the result
    pub fn with_overlay(overlay: &Value) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default())
            .map_err(|e| Error::serialization_for("MeshConfig", e.to_string()))?;
        if !overlay.is_null() {
            merge_into(&mut merged, overlay);
        }
        from_value("MeshConfig", merged)
    }

    /// Dotted names of keys that are not part of the modelled schema
    pub fn unknown_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self.extra.keys().cloned().collect();
        fields.extend(
            self.default_config
                .extra
                .keys()
                .map(|k| format!("defaultConfig.{}", k)),
        );
        fields
    }

    /// Semantic checks, returning one message per problem
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errs = Vec::new();

        if let Err(e) = validate_port(self.proxy_listen_port) {
            errs.push(format!("invalid proxy listen port: {}", e));
        }
        if let Err(e) = validate_positive_duration(&self.connect_timeout) {
            errs.push(format!("invalid connect timeout: {}", e));
        }
        if let Err(e) = parse_duration(&self.protocol_detection_timeout) {
            errs.push(format!("invalid protocol detection timeout: {}", e));
        }
        if let Err(e) = validate_positive_duration(&self.dns_refresh_rate) {
            errs.push(format!("invalid dns refresh rate: {}", e));
        }
        check_enum(
            &mut errs,
            "ingressControllerMode",
            &self.ingress_controller_mode,
            &["UNSPECIFIED", "OFF", "DEFAULT", "STRICT"],
        );
        check_enum(
            &mut errs,
            "accessLogEncoding",
            &self.access_log_encoding,
            &["TEXT", "JSON"],
        );
        check_enum(
            &mut errs,
            "outboundTrafficPolicy.mode",
            &self.outbound_traffic_policy.mode,
            &["REGISTRY_ONLY", "ALLOW_ANY"],
        );
        if let Err(e) = validate_trust_domain(&self.trust_domain) {
            errs.push(format!("invalid trust domain: {}", e));
        }
        for alias in &self.trust_domain_aliases {
            if let Err(e) = validate_trust_domain(alias) {
                errs.push(format!("invalid trust domain alias {}: {}", alias, e));
            }
        }
        if let Err(proxy_errs) = self.default_config.validate() {
            errs.extend(proxy_errs.into_iter().map(|e| format!("invalid default config: {}", e)));
        }

        if errs.is_empty() {
            Ok(())
        } else {
            Err(errs)
        }
    }
}

impl ProxyConfig {
    /// Semantic checks, returning one message per problem
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errs = Vec::new();

        if self.config_path.is_empty() {
            errs.push("config path must be set".to_string());
        }
        if self.binary_path.is_empty() {
            errs.push("binary path must be set".to_string());
        }
        if self.service_cluster.is_empty() {
            errs.push("service cluster must be set".to_string());
        }

        let drain = validate_positive_duration(&self.drain_duration);
        if let Err(e) = &drain {
            errs.push(format!("invalid drain duration: {}", e));
        }
        let parent = validate_positive_duration(&self.parent_shutdown_duration);
        if let Err(e) = &parent {
            errs.push(format!("invalid parent shutdown duration: {}", e));
        }
        if let (Ok(drain), Ok(parent)) = (drain, parent) {
            if drain >= parent {
                errs.push(format!(
                    "drain duration {} must be less than parent shutdown duration {}",
                    self.drain_duration, self.parent_shutdown_duration
                ));
            }
        }
        if let Err(e) = parse_duration(&self.termination_drain_duration) {
            errs.push(format!("invalid termination drain duration: {}", e));
        }

        if let Err(e) = validate_address(&self.discovery_address) {
            errs.push(format!("invalid discovery address: {}", e));
        }
        if let Err(e) = validate_port(self.proxy_admin_port) {
            errs.push(format!("invalid proxy admin port: {}", e));
        }
        if let Err(e) = validate_port(self.status_port) {
            errs.push(format!("invalid status port: {}", e));
        }
        check_enum(
            &mut errs,
            "controlPlaneAuthPolicy",
            &self.control_plane_auth_policy,
            &["NONE", "MUTUAL_TLS", "INHERIT"],
        );
        if self.stat_name_length < 0 {
            errs.push("stat name length must be >= 0".to_string());
        }
        if self.concurrency.is_some_and(|c| c < 0) {
            errs.push("concurrency must be >= 0".to_string());
        }

        if errs.is_empty() {
            Ok(())
        } else {
            Err(errs)
        }
    }

    /// Host part of the discovery address
    pub fn discovery_host(&self) -> &str {
        split_host_port(&self.discovery_address)
            .map(|(host, _)| host)
            .unwrap_or(&self.discovery_address)
    }
}

impl MeshNetworks {
    /// Decode mesh networks YAML; empty input is an empty set of networks
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value = parse_yaml(yaml)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        from_value("MeshNetworks", value)
    }
}

/// Parse a duration such as `10s`, `1m30s`, `1.5h` or `250ms`
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut nanos = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration {:?}", s))?;
        if num_end == 0 {
            return Err(format!("invalid duration {:?}", s));
        }
        let number: f64 = rest[..num_end]
            .parse()
            .map_err(|_| format!("invalid duration {:?}", s))?;
        let after = &rest[num_end..];
        let unit_end = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let scale = match &after[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            unit => return Err(format!("unknown unit {:?} in duration {:?}", unit, s)),
        };
        nanos += number * scale;
        rest = &after[unit_end..];
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}

fn validate_positive_duration(s: &str) -> std::result::Result<Duration, String> {
    let d = parse_duration(s)?;
    if d < Duration::from_millis(1) {
        return Err(format!("duration {} must be at least 1ms", s));
    }
    Ok(d)
}

fn validate_port(port: i64) -> std::result::Result<(), String> {
    if (1..=65535).contains(&port) {
        Ok(())
    } else {
        Err(format!("port number {} must be in the range 1..65535", port))
    }
}

fn split_host_port(addr: &str) -> Option<(&str, &str)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, port) = rest.split_once("]:")?;
        return Some((host, port));
    }
    addr.rsplit_once(':')
}

fn validate_address(addr: &str) -> std::result::Result<(), String> {
    let (host, port) = split_host_port(addr)
        .ok_or_else(|| format!("{} is not of the form host:port", addr))?;
    if host.is_empty() {
        return Err(format!("{} has an empty host", addr));
    }
    let port: i64 = port
        .parse()
        .map_err(|_| format!("{} has a non-numeric port", addr))?;
    validate_port(port)?;
    if host.parse::<IpAddr>().is_err() && !is_dns_name(host) {
        return Err(format!("{} is neither an IP address nor a DNS name", host));
    }
    Ok(())
}

fn is_dns_name(host: &str) -> bool {
    host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                && !label.starts_with('-')
                && !label.ends_with('-')
        })
}

fn validate_trust_domain(domain: &str) -> std::result::Result<(), String> {
    if domain.is_empty() {
        return Err("empty domain name not allowed".to_string());
    }
    let valid = domain.split('.').all(|label| {
        !label.is_empty()
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    });
    if valid {
        Ok(())
    } else {
        Err(format!("{} is not a valid domain name", domain))
    }
}

fn check_enum(errs: &mut Vec<String>, field: &str, value: &str, allowed: &[&str]) {
    if !allowed.contains(&value) {
        errs.push(format!(
            "invalid {}: {:?}, expected one of {}",
            field,
            value,
            allowed.join(", ")
        ));
    }
}
