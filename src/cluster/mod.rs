//! Kubernetes-backed implementations of the library collaborator traits

mod bootstrap;
mod revision;

pub use bootstrap::{namespace_proxy_config, KubeServiceLookup, KubeTokenIssuer, MeshInputs};
pub use revision::KubeRevisionSource;

use chrono::{DateTime, Utc};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

use crate::commands::CommandErrorExt;
use crate::config::{resolve_kubeconfig, MeshctlConfig};
use crate::{Error, GlobalArgs, Result};

/// Build a kube [`Client`] using the meshctl kubeconfig resolution chain.
///
/// The context comes from `--context`, then the config file, then the
/// kubeconfig's current context.
pub async fn kube_client(global: &GlobalArgs, config: &MeshctlConfig) -> Result<Client> {
    let context = global.context.clone().or_else(|| config.context.clone());
    let resolved = resolve_kubeconfig(global.kubeconfig.as_deref(), config);

    if resolved.is_none() && context.is_none() {
        return Client::try_default().await.cmd_err();
    }

    let kubeconfig = match resolved.as_deref() {
        Some(path) => Kubeconfig::read_from(path).map_err(|e| {
            Error::command_failed(format!("failed to read kubeconfig {}: {}", path, e))
        })?,
        None => Kubeconfig::read()
            .map_err(|e| Error::command_failed(format!("failed to read kubeconfig: {}", e)))?,
    };
    let options = KubeConfigOptions {
        context,
        ..Default::default()
    };
    let config = Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .cmd_err()?;
    Client::try_from(config).cmd_err()
}

/// Human-readable age of a timestamp (e.g. `3d`, `5h`, `12m`, `40s`)
pub fn format_age(timestamp: &DateTime<Utc>) -> String {
    format_age_at(timestamp, Utc::now())
}

fn format_age_at(timestamp: &DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(*timestamp);

    let total_secs = duration.num_seconds();
    if total_secs < 0 {
        return "0s".to_string();
    }

    let days = duration.num_days();
    if days > 0 {
        return format!("{}d", days);
    }

    let hours = duration.num_hours();
    if hours > 0 {
        return format!("{}h", hours);
    }

    let minutes = duration.num_minutes();
    if minutes > 0 {
        return format!("{}m", minutes);
    }

    format!("{}s", total_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn age_uses_largest_unit() {
        let now = Utc::now();
        assert_eq!(format_age_at(&(now - Duration::days(3)), now), "3d");
        assert_eq!(format_age_at(&(now - Duration::hours(5)), now), "5h");
        assert_eq!(format_age_at(&(now - Duration::minutes(12)), now), "12m");
        assert_eq!(format_age_at(&(now - Duration::seconds(40)), now), "40s");
    }

    #[test]
    fn future_timestamp_is_zero() {
        let now = Utc::now();
        assert_eq!(format_age_at(&(now + Duration::minutes(1)), now), "0s");
    }
}
