//! meshctl CLI configuration stored at `~/.meshctl/config.json`.
//!
//! Holds defaults for flags that are tedious to repeat: kubeconfig, kube
//! context, control plane namespace and manifests directory.
//!
//! The kubeconfig resolution chain (highest priority first):
//! 1. Explicit `--kubeconfig` flag
//! 2. `MESHCTL_KUBECONFIG` environment variable
//! 3. `kubeconfig` from `~/.meshctl/config.json`
//! 4. Fall back to kube default (`KUBECONFIG` env / `~/.kube/config`)

use std::path::{Path, PathBuf};

use meshctl_common::DEFAULT_ISTIO_NAMESPACE;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const CONFIG_DIR_NAME: &str = ".meshctl";
const CONFIG_FILE_NAME: &str = "config.json";
const MESHCTL_KUBECONFIG_ENV: &str = "MESHCTL_KUBECONFIG";

/// Persistent CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MeshctlConfig {
    /// Kubeconfig used when no flag or env var is given.
    pub kubeconfig: Option<String>,
    /// Kube context selected from the kubeconfig.
    pub context: Option<String>,
    /// Namespace the control plane is installed into.
    pub istio_namespace: Option<String>,
    /// Manifests directory holding `profiles/*.yaml`.
    pub manifests: Option<String>,
}

/// Path to `~/.meshctl/config.json`.
pub fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::command_failed("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load config from `~/.meshctl/config.json`, returning default if missing.
pub fn load_config() -> Result<MeshctlConfig> {
    load_config_from(&config_path()?)
}

/// Load config from `path`, returning default if missing.
pub fn load_config_from(path: &Path) -> Result<MeshctlConfig> {
    if !path.exists() {
        return Ok(MeshctlConfig::default());
    }
    let data = std::fs::read_to_string(path)
        .map_err(|e| Error::command_failed(format!("failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&data)
        .map_err(|e| Error::command_failed(format!("failed to parse {}: {}", path.display(), e)))
}

/// Resolve a kubeconfig path using the priority chain.
///
/// Returns `None` to use kube defaults.
pub fn resolve_kubeconfig(explicit: Option<&str>, config: &MeshctlConfig) -> Option<String> {
    let env = std::env::var(MESHCTL_KUBECONFIG_ENV).ok();
    resolve_kubeconfig_with(explicit, env.as_deref(), config)
}

fn resolve_kubeconfig_with(
    explicit: Option<&str>,
    env: Option<&str>,
    config: &MeshctlConfig,
) -> Option<String> {
    explicit
        .or(env)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .or_else(|| config.kubeconfig.clone().filter(|p| !p.is_empty()))
}

/// Control plane namespace: flag, then config, then `istio-system`.
pub fn resolve_istio_namespace(explicit: Option<&str>, config: &MeshctlConfig) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| config.istio_namespace.clone())
        .filter(|ns| !ns.is_empty())
        .unwrap_or_else(|| DEFAULT_ISTIO_NAMESPACE.to_string())
}
