//! Sync labels and discovery type names

use std::fmt;

/// Qualitative state of one discovery stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncLabel {
    /// Nothing pushed yet
    NotSent,
    /// Last push acknowledged
    Synced,
    /// Pushed but never acknowledged
    NeverAcknowledged,
    /// Acknowledged nonce lags the last push
    Stale,
}

impl SyncLabel {
    /// Label for a (sent, acked) nonce pair
    pub fn from_nonces(sent: &str, acked: &str) -> Self {
        if sent.is_empty() {
            SyncLabel::NotSent
        } else if sent == acked {
            SyncLabel::Synced
        } else if acked.is_empty() {
            SyncLabel::NeverAcknowledged
        } else {
            SyncLabel::Stale
        }
    }

    /// Table text for the label
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncLabel::NotSent => "NOT SENT",
            SyncLabel::Synced => "SYNCED",
            SyncLabel::NeverAcknowledged => "STALE (Never Acknowledged)",
            SyncLabel::Stale => "STALE",
        }
    }
}

impl fmt::Display for SyncLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short name (`CDS`, `LDS`, ...) for a full discovery type URL. Anything
/// that is not a recognised type URL is returned unchanged.
pub fn short_type(type_url: &str) -> &str {
    let Some((_, message)) = type_url.rsplit_once('/') else {
        return type_url;
    };
    let name = message.rsplit('.').next().unwrap_or(message);
    match name {
        "Cluster" => "CDS",
        "Listener" => "LDS",
        "RouteConfiguration" => "RDS",
        "ClusterLoadAssignment" => "EDS",
        "NameTable" => "NDS",
        "ProxyConfig" => "PCDS",
        "ExtensionConfig" | "TypedExtensionConfig" => "ECDS",
        _ => type_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_boundaries() {
        assert_eq!(SyncLabel::from_nonces("", "").as_str(), "NOT SENT");
        assert_eq!(SyncLabel::from_nonces("", "n1").as_str(), "NOT SENT");
        assert_eq!(SyncLabel::from_nonces("n1", "n1").as_str(), "SYNCED");
        assert_eq!(
            SyncLabel::from_nonces("n1", "").as_str(),
            "STALE (Never Acknowledged)"
        );
        assert_eq!(SyncLabel::from_nonces("n1", "n2").as_str(), "STALE");
    }

    #[test]
    fn type_urls_map_to_short_names() {
        assert_eq!(short_type("type.googleapis.com/envoy.config.cluster.v3.Cluster"), "CDS");
        assert_eq!(short_type("type.googleapis.com/envoy.config.listener.v3.Listener"), "LDS");
        assert_eq!(
            short_type("type.googleapis.com/envoy.config.route.v3.RouteConfiguration"),
            "RDS"
        );
        assert_eq!(
            short_type("type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment"),
            "EDS"
        );
        assert_eq!(short_type("type.googleapis.com/istio.networking.nds.v1.NameTable"), "NDS");
        assert_eq!(short_type("type.googleapis.com/istio.mesh.v1alpha1.ProxyConfig"), "PCDS");
        assert_eq!(
            short_type("type.googleapis.com/envoy.config.core.v3.TypedExtensionConfig"),
            "ECDS"
        );
    }

    #[test]
    fn short_and_unknown_names_pass_through() {
        assert_eq!(short_type("CDS"), "CDS");
        assert_eq!(short_type("type.googleapis.com/example.Custom"), "type.googleapis.com/example.Custom");
    }
}
