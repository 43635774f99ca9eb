//! IstioOperator install configuration
//!
//! Only the fields meshctl validates, diffs or inspects are modelled as
//! typed fields. Free-form sections (`meshConfig`, `values`, `k8s`) stay as
//! JSON so unknown keys survive a decode/encode cycle.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// CRD
// =============================================================================

/// Desired state of a control plane installation
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "install.istio.io",
    version = "v1alpha1",
    kind = "IstioOperator",
    plural = "istiooperators",
    shortname = "iop",
    namespaced,
    status = "IstioOperatorStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct IstioOperatorSpec {
    /// Base profile the spec is overlaid on (`default` when empty)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub profile: String,

    /// Path to charts and profiles on disk
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub install_package_path: String,

    /// Root image registry for all components
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hub: String,

    /// Image tag for all components
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,

    /// Suffix appended to generated resource names
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_suffix: String,

    /// Namespace the control plane is installed into
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Control plane revision this install belongs to
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub revision: String,

    /// Mesh-wide runtime config, overlaid on the mesh defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh_config: Option<Value>,

    /// Per-component install settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<IstioComponentSetSpec>,

    /// Third-party addon components, keyed by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub addon_components: BTreeMap<String, ExternalComponentSpec>,

    /// Helm values passed through to charts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Value>,

    /// Values passed through without schema checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unvalidated_values: Option<Value>,
}

/// Observed state of an installation
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IstioOperatorStatus {
    /// Overall install status (e.g. HEALTHY, RECONCILING, ERROR)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Human readable detail for the current status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// The set of installable components
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IstioComponentSetSpec {
    /// CRDs and cluster roles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<ComponentSpec>,

    /// Control plane discovery service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pilot: Option<ComponentSpec>,

    /// CNI node agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cni: Option<ComponentSpec>,

    /// Remote control plane config for external istiod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub istiod_remote: Option<ComponentSpec>,

    /// Ingress gateways
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress_gateways: Vec<GatewaySpec>,

    /// Egress gateways
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub egress_gateways: Vec<GatewaySpec>,
}

/// Settings common to every core component
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    /// Whether the component is installed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Namespace override for this component
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Image registry override
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hub: String,

    /// Image tag override
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,

    /// Kubernetes resource overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k8s: Option<Value>,
}

/// An ingress or egress gateway deployment
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySpec {
    /// Whether the gateway is installed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Gateway deployment name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Namespace the gateway runs in
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Labels applied to the gateway pods
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub label: BTreeMap<String, String>,

    /// Image registry override
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hub: String,

    /// Image tag override
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,

    /// Kubernetes resource overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k8s: Option<Value>,
}

/// An addon component installed from an external chart
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalComponentSpec {
    /// Whether the addon is installed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Namespace the addon runs in
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Chart location
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub chart_path: String,

    /// Chart values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<Value>,

    /// Kubernetes resource overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k8s: Option<Value>,
}

impl IstioOperatorSpec {
    /// Profile name, falling back to `default`
    pub fn effective_profile(&self) -> &str {
        if self.profile.is_empty() {
            crate::DEFAULT_REVISION
        } else {
            &self.profile
        }
    }

    /// True when this install belongs to `revision`. The `default`
    /// revision also claims installs that carry no revision at all.
    pub fn matches_revision(&self, revision: &str) -> bool {
        self.revision == revision
            || (revision == crate::DEFAULT_REVISION && self.revision.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
apiVersion: install.istio.io/v1alpha1
kind: IstioOperator
metadata:
  name: installed-state
  namespace: istio-system
spec:
  profile: demo
  hub: docker.io/istio
  tag: 1.8.0
  revision: canary
  meshConfig:
    accessLogFile: /dev/stdout
  components:
    pilot:
      enabled: true
    ingressGateways:
      - name: istio-ingressgateway
        enabled: true
  addonComponents:
    grafana:
      enabled: false
  values:
    global:
      proxy:
        includeIPRanges: "10.0.0.0/8"
"#;

    #[test]
    fn decodes_istio_operator_manifest() {
        let iop: IstioOperator = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(iop.spec.profile, "demo");
        assert_eq!(iop.spec.tag, "1.8.0");
        let components = iop.spec.components.as_ref().unwrap();
        assert_eq!(components.pilot.as_ref().unwrap().enabled, Some(true));
        assert_eq!(components.ingress_gateways[0].name, "istio-ingressgateway");
        assert!(iop.spec.addon_components.contains_key("grafana"));
        assert_eq!(
            iop.spec.mesh_config.as_ref().unwrap()["accessLogFile"],
            "/dev/stdout"
        );
    }

    #[test]
    fn empty_fields_are_not_serialized() {
        let spec = IstioOperatorSpec {
            hub: "docker.io/istio".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json, serde_json::json!({"hub": "docker.io/istio"}));
    }

    #[test]
    fn effective_profile_defaults() {
        assert_eq!(IstioOperatorSpec::default().effective_profile(), "default");
    }

    #[test]
    fn default_revision_matches_unrevisioned_installs() {
        let spec = IstioOperatorSpec::default();
        assert!(spec.matches_revision("default"));
        assert!(!spec.matches_revision("canary"));

        let canary = IstioOperatorSpec {
            revision: "canary".to_string(),
            ..Default::default()
        };
        assert!(canary.matches_revision("canary"));
        assert!(!canary.matches_revision("default"));
    }
}
