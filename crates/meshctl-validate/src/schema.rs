//! Node views of the IstioOperator types

use meshctl_common::crd::{
    ComponentSpec, ExternalComponentSpec, GatewaySpec, IstioComponentSetSpec, IstioOperatorSpec,
};

use crate::node::{Field, Node, NodeKind};

impl Node for IstioOperatorSpec {
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Struct(vec![
            Field::new("Profile", &self.profile),
            Field::new("InstallPackagePath", &self.install_package_path),
            Field::new("Hub", &self.hub),
            Field::new("Tag", &self.tag),
            Field::new("ResourceSuffix", &self.resource_suffix),
            Field::new("Namespace", &self.namespace),
            Field::new("Revision", &self.revision),
            Field::new("MeshConfig", &self.mesh_config),
            Field::new("Components", &self.components),
            Field::new("AddonComponents", &self.addon_components),
            Field::new("Values", &self.values),
            Field::skipped("UnvalidatedValues", &self.unvalidated_values),
        ])
    }
}

impl Node for IstioComponentSetSpec {
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Struct(vec![
            Field::new("Base", &self.base),
            Field::new("Pilot", &self.pilot),
            Field::new("Cni", &self.cni),
            Field::new("IstiodRemote", &self.istiod_remote),
            Field::new("IngressGateways", &self.ingress_gateways),
            Field::new("EgressGateways", &self.egress_gateways),
        ])
    }
}

impl Node for ComponentSpec {
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Struct(vec![
            Field::new("Enabled", &self.enabled),
            Field::new("Namespace", &self.namespace),
            Field::new("Hub", &self.hub),
            Field::new("Tag", &self.tag),
            Field::new("K8s", &self.k8s),
        ])
    }
}

impl Node for GatewaySpec {
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Struct(vec![
            Field::new("Enabled", &self.enabled),
            Field::new("Name", &self.name),
            Field::new("Namespace", &self.namespace),
            Field::new("Label", &self.label),
            Field::new("Hub", &self.hub),
            Field::new("Tag", &self.tag),
            Field::new("K8s", &self.k8s),
        ])
    }
}

impl Node for ExternalComponentSpec {
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Struct(vec![
            Field::new("Enabled", &self.enabled),
            Field::new("Namespace", &self.namespace),
            Field::new("ChartPath", &self.chart_path),
            Field::new("Spec", &self.spec),
            Field::new("K8s", &self.k8s),
        ])
    }
}
