//! Sync status table from discovery responses
//!
//! Controllers answer a status request with a `DiscoveryResponse` whose
//! resources are `ClientConfig` messages, one per connected proxy. Any other
//! resource type is written through untouched.

use std::collections::BTreeMap;
use std::io::Write;

use envoy_types::pb::envoy::service::discovery::v3::DiscoveryResponse;
use envoy_types::pb::envoy::service::status::v3::{per_xds_config, ClientConfig, PerXdsConfig};
use meshctl_common::table::{TableWriter, DEFAULT_PADDING};
use meshctl_common::{Error, Result};
use prost::Message;
use serde::Deserialize;
use tracing::{debug, info};

/// Type URL of the per-proxy status resource
pub const CLIENT_CONFIG_TYPE_URL: &str = "type.googleapis.com/envoy.service.status.v3.ClientConfig";

/// Identity a controller stamps on its responses
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ControlPlaneInfo {
    /// Component name (`istiod`)
    #[serde(rename = "Component", default)]
    pub component: String,
    /// Instance id
    #[serde(rename = "ID", default)]
    pub id: String,
    /// Build information
    #[serde(rename = "Info", default)]
    pub info: BuildInfo,
}

/// Build information of a controller
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct BuildInfo {
    /// Release version
    #[serde(default)]
    pub version: String,
}

impl ControlPlaneInfo {
    fn placeholder(id: &str, version: &str) -> Self {
        Self {
            component: id.to_string(),
            id: id.to_string(),
            info: BuildInfo {
                version: version.to_string(),
            },
        }
    }

    /// Parse the identifier of `response`. Controllers too old to send one
    /// report `MISSING`; unparsable identifiers report `PARSE ERROR`.
    pub fn from_response(response: &DiscoveryResponse) -> Self {
        let Some(cp) = response.control_plane.as_ref() else {
            return Self::placeholder("MISSING", "1.7 or earlier");
        };
        serde_json::from_str(&cp.identifier)
            .unwrap_or_else(|_| Self::placeholder("PARSE ERROR", "PARSE ERROR"))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct XdsRow {
    proxy_id: String,
    istiod_id: String,
    istiod_version: String,
    cds: String,
    lds: String,
    eds: String,
    rds: String,
}

fn fill_sync_status(row: &mut XdsRow, configs: &[PerXdsConfig]) {
    for config in configs {
        #[allow(deprecated)]
        let status = config.status().as_str_name().to_string();
        match &config.per_xds_config {
            Some(per_xds_config::PerXdsConfig::ListenerConfig(_)) => row.lds = status,
            Some(per_xds_config::PerXdsConfig::ClusterConfig(_)) => row.cds = status,
            Some(per_xds_config::PerXdsConfig::RouteConfig(_)) => row.rds = status,
            Some(per_xds_config::PerXdsConfig::EndpointConfig(_)) => row.eds = status,
            Some(per_xds_config::PerXdsConfig::ScopedRouteConfig(_)) => {}
            _ => info!("unexpected per-xds config"),
        }
    }
}

/// Renders proxy sync status from controller discovery responses
#[derive(Clone, Copy, Debug, Default)]
pub struct XdsStatusWriter;

impl XdsStatusWriter {
    /// Write one row per proxy, sorted by proxy id. `responses` maps
    /// controller id to its response.
    pub fn print_all<W: Write + ?Sized>(
        &self,
        w: &mut W,
        responses: &BTreeMap<String, DiscoveryResponse>,
    ) -> Result<()> {
        let mut rows = Vec::new();
        let mut passthrough = false;

        for (controller, response) in responses {
            let cp = ControlPlaneInfo::from_response(response);
            for resource in &response.resources {
                if resource.type_url != CLIENT_CONFIG_TYPE_URL {
                    debug!(controller = %controller, type_url = %resource.type_url, "raw passthrough");
                    w.write_all(&resource.value)
                        .map_err(|e| Error::io("<output>", e))?;
                    passthrough = true;
                    continue;
                }
                let config = ClientConfig::decode(resource.value.as_slice()).map_err(|e| {
                    Error::serialization_for("ClientConfig", format!("could not unmarshal ClientConfig: {}", e))
                })?;
                let mut row = XdsRow {
                    proxy_id: config.node.as_ref().map(|n| n.id.clone()).unwrap_or_default(),
                    istiod_id: cp.id.clone(),
                    istiod_version: cp.info.version.clone(),
                    ..Default::default()
                };
                #[allow(deprecated)]
                fill_sync_status(&mut row, &config.xds_config);
                rows.push(row);
            }
        }

        if rows.is_empty() {
            if passthrough {
                return Ok(());
            }
            return Err(Error::internal_with_context(
                "proxy-status",
                format!("no proxies found (checked {} istiods)", responses.len()),
            ));
        }

        rows.sort_by(|a, b| a.proxy_id.cmp(&b.proxy_id));
        let mut table = TableWriter::new(DEFAULT_PADDING);
        table.line("NAME\tCDS\tLDS\tEDS\tRDS\tISTIOD\tVERSION");
        for row in rows {
            table.row([
                row.proxy_id,
                row.cds,
                row.lds,
                row.eds,
                row.rds,
                row.istiod_id,
                row.istiod_version,
            ]);
        }
        table.flush_to(w).map_err(|e| Error::io("<output>", e))
    }
}
