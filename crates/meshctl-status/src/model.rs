//! Sync status records
//!
//! Controllers report per-proxy status in two shapes: a generic map keyed by
//! discovery type and older per-stream fields. [`NormalizedStatus`] folds
//! both into one record at ingestion.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::sync::{short_type, SyncLabel};

/// Nonces of one discovery stream
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XdsNonces {
    /// Nonce of the last push
    #[serde(default)]
    pub nonce_sent: String,
    /// Nonce the proxy last acknowledged
    #[serde(default)]
    pub nonce_acked: String,
}

/// One proxy as reported by a controller's sync endpoint
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncStatus {
    /// Proxy identifier (`pod.namespace`)
    #[serde(rename = "proxy")]
    pub proxy_id: String,
    /// Version the proxy reports for itself
    pub proxy_version: String,
    /// Version of the controller serving the proxy
    pub istio_version: String,
    /// Cluster the proxy runs in
    pub cluster_id: String,
    /// Legacy cluster stream nonce sent
    pub cluster_sent: String,
    /// Legacy cluster stream nonce acked
    pub cluster_acked: String,
    /// Legacy listener stream nonce sent
    pub listener_sent: String,
    /// Legacy listener stream nonce acked
    pub listener_acked: String,
    /// Legacy route stream nonce sent
    pub route_sent: String,
    /// Legacy route stream nonce acked
    pub route_acked: String,
    /// Legacy endpoint stream nonce sent
    pub endpoint_sent: String,
    /// Legacy endpoint stream nonce acked
    pub endpoint_acked: String,
    /// Per-type nonces, keyed by short or full type name
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub statuses: BTreeMap<String, XdsNonces>,
}

/// A proxy's sync state in one shape
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizedStatus {
    /// Proxy identifier
    pub proxy_id: String,
    /// Controller that reported the proxy
    pub controller: String,
    /// Version the proxy reports for itself
    pub proxy_version: String,
    /// Controller version, empty when not reported
    pub istio_version: String,
    /// Nonces keyed by short type name
    pub nonces: BTreeMap<String, XdsNonces>,
}

impl NormalizedStatus {
    /// Fold a reported status into one record. Per-type entries win; legacy
    /// fields fill in the four classic streams when the map lacks them.
    pub fn from_sync(controller: &str, status: SyncStatus) -> Self {
        let mut nonces: BTreeMap<String, XdsNonces> = status
            .statuses
            .into_iter()
            .map(|(ty, n)| (short_type(&ty).to_string(), n))
            .collect();

        for (ty, sent, acked) in [
            ("CDS", status.cluster_sent, status.cluster_acked),
            ("LDS", status.listener_sent, status.listener_acked),
            ("RDS", status.route_sent, status.route_acked),
            ("EDS", status.endpoint_sent, status.endpoint_acked),
        ] {
            if sent.is_empty() && acked.is_empty() {
                continue;
            }
            nonces.entry(ty.to_string()).or_insert(XdsNonces {
                nonce_sent: sent,
                nonce_acked: acked,
            });
        }

        Self {
            proxy_id: status.proxy_id,
            controller: controller.to_string(),
            proxy_version: status.proxy_version,
            istio_version: status.istio_version,
            nonces,
        }
    }

    /// Label of the stream named by `column` (short name or type URL)
    pub fn label(&self, column: &str) -> SyncLabel {
        self.nonces
            .get(short_type(column))
            .map(|n| SyncLabel::from_nonces(&n.nonce_sent, &n.nonce_acked))
            .unwrap_or(SyncLabel::NotSent)
    }

    /// Controller version, or the proxy version marked with `*` when the
    /// controller did not report one
    pub fn version(&self) -> String {
        if self.istio_version.is_empty() {
            format!("{}*", self.proxy_version)
        } else {
            self.istio_version.clone()
        }
    }
}
