//! Report model for revision inventory and descriptions

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diff::IopDiff;

/// A pod, reduced to what the revision report shows
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodInfo {
    /// Pod namespace
    pub namespace: String,
    /// Pod name
    pub name: String,
    /// Pod IP
    pub address: String,
    /// Pod phase
    pub status: String,
    /// Human readable age (`3d`, `5h`, ...)
    pub age: String,
}

/// An installed IstioOperator, summarised
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IstioOperatorCrInfo {
    /// Namespace of the resource
    pub namespace: String,
    /// Name of the resource
    pub name: String,
    /// Profile as written in the spec (may be empty)
    pub profile: String,
    /// Enabled components (`base`, `istiod`, `ingress:<name>`, ...)
    pub components: Vec<String>,
    /// Values overridden relative to the profile
    #[serde(default)]
    pub customizations: Vec<IopDiff>,
}

/// A mutating webhook configuration belonging to a revision
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookInfo {
    /// Webhook configuration name
    pub name: String,
    /// Revision label value
    pub revision: String,
    /// Tag label value
    pub tag: String,
}

/// Everything known about one revision
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionDescription {
    /// IstioOperator resources installing this revision
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub istio_operator_crs: Vec<IstioOperatorCrInfo>,
    /// Injection webhooks of this revision
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub webhooks: Vec<WebhookInfo>,
    /// Control plane pods
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub control_plane_pods: Vec<PodInfo>,
    /// Ingress gateway pods
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress_gateways: Vec<PodInfo>,
    /// Egress gateway pods
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub egress_gateways: Vec<PodInfo>,
    /// Pods pointing at this revision, counted per namespace
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub namespace_summary: BTreeMap<String, u32>,
    /// Pods pointing at this revision
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pods: Vec<PodInfo>,
}

impl RevisionDescription {
    fn gateway_enabled(&self, prefix: &str) -> bool {
        self.istio_operator_crs
            .iter()
            .flat_map(|iop| iop.components.iter())
            .any(|c| c.starts_with(prefix))
    }

    /// True when any IstioOperator of the revision enables an ingress gateway
    pub fn ingress_gateway_enabled(&self) -> bool {
        self.gateway_enabled("ingress")
    }

    /// True when any IstioOperator of the revision enables an egress gateway
    pub fn egress_gateway_enabled(&self) -> bool {
        self.gateway_enabled("egress")
    }
}

/// A part of the revision description
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Section {
    /// Installed IstioOperator resources
    IstioOperatorCr,
    /// Injection webhooks
    Webhooks,
    /// Control plane pods
    ControlPlane,
    /// Ingress and egress gateway pods
    Gateways,
    /// Pod count per namespace
    NamespaceSummary,
    /// Every pod of the revision
    Pods,
}

impl Section {
    /// Sections shown by default
    pub const DEFAULT: &'static [Section] = &[
        Section::IstioOperatorCr,
        Section::Webhooks,
        Section::ControlPlane,
        Section::Gateways,
    ];

    /// Sections shown with `--verbose`
    pub const VERBOSE: &'static [Section] = &[
        Section::IstioOperatorCr,
        Section::Webhooks,
        Section::ControlPlane,
        Section::Gateways,
        Section::NamespaceSummary,
        Section::Pods,
    ];

    /// Heading of the section
    pub fn name(&self) -> &'static str {
        match self {
            Section::IstioOperatorCr => "ISTIO-OPERATOR-CR",
            Section::Webhooks => "MUTATING-WEBHOOKS",
            Section::ControlPlane => "CONTROL-PLANE",
            Section::Gateways => "GATEWAYS",
            Section::NamespaceSummary => "NAMESPACE-SUMMARY",
            Section::Pods => "PODS",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `<def>` for empty strings
pub fn render_with_default(s: &str, def: &str) -> String {
    if s.is_empty() {
        format!("<{}>", def)
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sections_are_omitted_from_json() {
        let desc = RevisionDescription {
            webhooks: vec![WebhookInfo {
                name: "istio-sidecar-injector".to_string(),
                revision: "default".to_string(),
                tag: String::new(),
            }],
            ..Default::default()
        };
        let json = serde_json::to_value(&desc).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "webhooks": [{"name": "istio-sidecar-injector", "revision": "default", "tag": ""}]
            })
        );
    }

    #[test]
    fn gateway_enablement_comes_from_components() {
        let desc = RevisionDescription {
            istio_operator_crs: vec![IstioOperatorCrInfo {
                components: vec!["istiod".to_string(), "ingress:istio-ingressgateway".to_string()],
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(desc.ingress_gateway_enabled());
        assert!(!desc.egress_gateway_enabled());
    }

    #[test]
    fn render_with_default_wraps_placeholder() {
        assert_eq!(render_with_default("", "no-tag"), "<no-tag>");
        assert_eq!(render_with_default("stable", "no-tag"), "stable");
    }
}
