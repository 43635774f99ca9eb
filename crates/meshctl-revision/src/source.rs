//! Cluster reads the revision reports depend on

use std::collections::BTreeMap;

use async_trait::async_trait;
use meshctl_common::crd::IstioOperator;
use meshctl_common::{Result, DEFAULT_REVISION, REVISION_LABEL, TAG_LABEL};

#[cfg(test)]
use mockall::automock;

use crate::model::PodInfo;

/// A mutating webhook configuration, reduced to name and labels
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutatingWebhook {
    /// Configuration name
    pub name: String,
    /// Metadata labels
    pub labels: BTreeMap<String, String>,
}

impl MutatingWebhook {
    /// Value of the revision label, empty when unset
    pub fn revision(&self) -> &str {
        self.labels.get(REVISION_LABEL).map(String::as_str).unwrap_or("")
    }

    /// Value of the tag label, empty when unset
    pub fn tag(&self) -> &str {
        self.labels.get(TAG_LABEL).map(String::as_str).unwrap_or("")
    }

    /// True when the webhook serves `revision`. The `default` revision
    /// also claims webhooks without a revision label.
    pub fn matches_revision(&self, revision: &str) -> bool {
        let own = self.revision();
        own == revision || (revision == DEFAULT_REVISION && own.is_empty())
    }
}

/// Read access to the cluster objects a revision is made of
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RevisionSource: Send + Sync {
    /// All mutating webhook configurations
    async fn list_webhooks(&self) -> Result<Vec<MutatingWebhook>>;

    /// All IstioOperator resources
    async fn list_operators(&self) -> Result<Vec<IstioOperator>>;

    /// Control plane namespace pods of one installer component
    /// (`Pilot`, `IngressGateways`, `EgressGateways`) for `revision`
    async fn list_component_pods(&self, revision: &str, component: &str) -> Result<Vec<PodInfo>>;

    /// Pods in any namespace labelled with `revision`
    async fn list_revision_pods(&self, revision: &str) -> Result<Vec<PodInfo>>;
}

/// Installer component label value of the control plane
pub const PILOT_COMPONENT: &str = "Pilot";
/// Installer component label value of ingress gateways
pub const INGRESS_COMPONENT: &str = "IngressGateways";
/// Installer component label value of egress gateways
pub const EGRESS_COMPONENT: &str = "EgressGateways";

#[cfg(test)]
mod tests {
    use super::*;

    fn webhook(labels: &[(&str, &str)]) -> MutatingWebhook {
        MutatingWebhook {
            name: "istio-sidecar-injector".to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn unlabelled_webhook_belongs_to_default() {
        let wh = webhook(&[]);
        assert!(wh.matches_revision("default"));
        assert!(!wh.matches_revision("canary"));
    }

    #[test]
    fn labelled_webhook_matches_its_revision() {
        let wh = webhook(&[(REVISION_LABEL, "canary"), (TAG_LABEL, "prod")]);
        assert!(wh.matches_revision("canary"));
        assert!(!wh.matches_revision("default"));
        assert_eq!(wh.tag(), "prod");
    }
}
