//! Custom resources meshctl reads from the cluster

mod istio_operator;
mod workload_entry;

pub use istio_operator::{
    ComponentSpec, ExternalComponentSpec, GatewaySpec, IstioComponentSetSpec, IstioOperator,
    IstioOperatorSpec, IstioOperatorStatus,
};
pub use workload_entry::{WorkloadEntry, WorkloadEntrySpec};
