//! Enabled component listing

use meshctl_common::crd::{ComponentSpec, GatewaySpec, IstioOperatorSpec};

fn enabled(component: &Option<ComponentSpec>) -> bool {
    component
        .as_ref()
        .and_then(|c| c.enabled)
        .unwrap_or(false)
}

fn gateway_enabled(gw: &GatewaySpec) -> bool {
    gw.enabled.unwrap_or(false)
}

/// Components an IstioOperator spec explicitly enables, in install order
pub fn enabled_components(spec: &IstioOperatorSpec) -> Vec<String> {
    let Some(components) = spec.components.as_ref() else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for (name, component) in [
        ("base", &components.base),
        ("cni", &components.cni),
        ("istiod", &components.pilot),
        ("istiod-remote", &components.istiod_remote),
    ] {
        if enabled(component) {
            out.push(name.to_string());
        }
    }
    out.extend(
        components
            .ingress_gateways
            .iter()
            .filter(|gw| gateway_enabled(gw))
            .map(|gw| format!("ingress:{}", gw.name)),
    );
    out.extend(
        components
            .egress_gateways
            .iter()
            .filter(|gw| gateway_enabled(gw))
            .map(|gw| format!("egress:{}", gw.name)),
    );
    out
}
