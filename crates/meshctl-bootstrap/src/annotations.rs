//! WorkloadEntry annotations that tune the bootstrap

use meshctl_common::crd::WorkloadEntry;

/// Host to connect to instead of the entry address
pub const SSH_HOST: &str = "sidecar-bootstrap.istio.io/ssh-host";
/// Port of the remote shell service
pub const SSH_PORT: &str = "sidecar-bootstrap.istio.io/ssh-port";
/// User to log in as
pub const SSH_USER: &str = "sidecar-bootstrap.istio.io/ssh-user";
/// Absolute path of the copy binary on the remote node
pub const SCP_PATH: &str = "sidecar-bootstrap.istio.io/scp-path";
/// Remote directory the bundle files are copied into
pub const PROXY_CONFIG_DIR: &str = "sidecar-bootstrap.istio.io/proxy-config-dir";

/// Namespace annotation naming a ConfigMap with `PROXY_CONFIG` overrides
pub const MESH_EXPANSION_CONFIG_MAP: &str = "sidecar-bootstrap.istio.io/mesh-expansion-configmap";

/// Per-workload ProxyConfig overrides
pub const PROXY_CONFIG: &str = "proxy.istio.io/config";
/// Replacement sidecar image
pub const PROXY_IMAGE: &str = "sidecar.istio.io/proxyImage";
/// Proxy log level
pub const LOG_LEVEL: &str = "sidecar.istio.io/logLevel";
/// Proxy per-component log levels
pub const COMPONENT_LOG_LEVEL: &str = "sidecar.istio.io/componentLogLevel";
/// Agent log output level
pub const AGENT_LOG_LEVEL: &str = "sidecar.istio.io/agentLogLevel";

/// Default remote directory for bundle files
pub const DEFAULT_PROXY_CONFIG_DIR: &str = "/tmp/istio-proxy";
/// Default remote copy binary
pub const DEFAULT_SCP_PATH: &str = "/usr/bin/scp";
/// Default remote shell port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Every annotation the bootstrap reads, with a description
pub const SUPPORTED: &[(&str, &str)] = &[
    (SSH_HOST, "host to connect to (defaults to spec.address)"),
    (SSH_PORT, "port to connect to (defaults to 22)"),
    (SSH_USER, "user to connect as (defaults to the current user)"),
    (SCP_PATH, "path of the scp binary on the remote node (defaults to /usr/bin/scp)"),
    (PROXY_CONFIG_DIR, "remote directory for generated files (defaults to /tmp/istio-proxy)"),
    (PROXY_CONFIG, "ProxyConfig overrides for this workload"),
    (PROXY_IMAGE, "sidecar image to run instead of <hub>/proxyv2:<tag>"),
    (LOG_LEVEL, "proxy log level"),
    (COMPONENT_LOG_LEVEL, "proxy per-component log levels"),
    (AGENT_LOG_LEVEL, "agent log output level"),
];

/// Value of a non-empty annotation on `entry`
pub fn annotation<'a>(entry: &'a WorkloadEntry, key: &str) -> Option<&'a str> {
    entry
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

/// Where and how a bundle reaches a remote node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteTarget {
    /// Host name or address
    pub host: String,
    /// Shell port, kept as written in the annotation
    pub port: String,
    /// Login user
    pub user: String,
    /// Remote copy binary
    pub scp_path: String,
    /// Remote directory for bundle files
    pub remote_dir: String,
}

impl RemoteTarget {
    /// Resolve the target of `entry`, falling back to `default_user` and
    /// the built-in defaults for anything not annotated
    pub fn for_entry(entry: &WorkloadEntry, default_user: &str) -> Self {
        let or = |key: &str, default: &str| annotation(entry, key).unwrap_or(default).to_string();
        Self {
            host: or(SSH_HOST, &entry.spec.address),
            port: or(SSH_PORT, &DEFAULT_SSH_PORT.to_string()),
            user: or(SSH_USER, default_user),
            scp_path: or(SCP_PATH, DEFAULT_SCP_PATH),
            remote_dir: or(PROXY_CONFIG_DIR, DEFAULT_PROXY_CONFIG_DIR),
        }
    }

    /// `host:port`, bracketing IPv6 literals
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
