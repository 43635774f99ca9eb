//! Path-keyed validation of IstioOperator configuration trees
//!
//! [`check_istio_operator_spec`] walks a spec with the built-in rule table
//! and returns every problem found. The walker, rule table and individual
//! rules are public so other document types can reuse them.

#![deny(missing_docs)]

pub mod error;
pub mod node;
pub mod rules;
mod schema;
pub mod validations;
pub mod values;
pub mod walker;

use std::sync::LazyLock;

use meshctl_common::crd::{IstioOperator, IstioOperatorSpec};
use meshctl_common::Path;

pub use error::{ValidationError, ValidationErrors};
pub use node::{Field, Node, NodeKind, Scalar};
pub use rules::{Rule, RuleTable};
pub use walker::Validator;

static DEFAULT_VALIDATOR: LazyLock<Validator> =
    LazyLock::new(|| Validator::new(validations::default_rules()));

/// The validator used for IstioOperator specs
pub fn default_validator() -> &'static Validator {
    &DEFAULT_VALIDATOR
}

/// Validate an IstioOperator spec with the built-in rules
pub fn check_istio_operator_spec(spec: &IstioOperatorSpec, check_required: bool) -> ValidationErrors {
    default_validator().validate(spec, &Path::root(), check_required)
}

/// Validate a full IstioOperator resource
pub fn check_istio_operator(iop: &IstioOperator, check_required: bool) -> ValidationErrors {
    check_istio_operator_spec(&iop.spec, check_required)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> IstioOperator {
        serde_yaml::from_str(yaml).unwrap()
    }

    const VALID: &str = r#"
apiVersion: install.istio.io/v1alpha1
kind: IstioOperator
metadata:
  name: control-plane
spec:
  hub: docker.io/istio
  tag: 1.8.0
  meshConfig:
    accessLogFile: /dev/stdout
  components:
    ingressGateways:
      - name: istio-ingressgateway
        enabled: true
      - enabled: true
    egressGateways:
      - name: istio-egressgateway
  addonComponents:
    custom-addon:
      enabled: true
  values:
    global:
      proxy:
        includeIPRanges: "*"
  unvalidatedValues:
    global:
      proxy:
        includeIPRanges: "not a cidr"
"#;

    #[test]
    fn valid_operator_passes() {
        let errs = check_istio_operator(&parse(VALID), true);
        assert!(errs.is_empty(), "unexpected errors: {errs}");
    }

    #[test]
    fn every_invalid_field_is_reported() {
        let iop = parse(
            r#"
apiVersion: install.istio.io/v1alpha1
kind: IstioOperator
metadata:
  name: broken
spec:
  hub: "not a hub"
  tag: "bad tag!"
  meshConfig:
    bogusField: 1
  components:
    ingressGateways:
      - name: Invalid_Name!
  addonComponents:
    Kiali:
      enabled: true
  values:
    global:
      proxy:
        excludeInboundPorts: "http"
"#,
        );
        let errs = check_istio_operator(&iop, false);
        let paths: Vec<&str> = errs.iter().map(|e| e.path()).collect();
        assert_eq!(
            paths,
            vec![
                "Hub",
                "Tag",
                "MeshConfig",
                "Components.IngressGateways[0].Name",
                "AddonComponents.Kiali",
                "global.proxy.excludeInboundPorts",
            ]
        );
    }

    #[test]
    fn repeated_validation_is_identical() {
        let iop = parse(VALID);
        assert_eq!(
            check_istio_operator(&iop, true),
            check_istio_operator(&iop, true)
        );
    }

    #[test]
    fn unvalidated_values_are_never_checked() {
        let iop = parse(VALID);
        assert!(iop.spec.unvalidated_values.is_some());
        assert!(check_istio_operator_spec(&iop.spec, false).is_empty());
    }
}
