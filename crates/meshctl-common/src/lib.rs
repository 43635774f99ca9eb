//! Common types for meshctl: errors, config paths, mesh CRDs and output helpers

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod merge;
pub mod mesh;
pub mod path;
pub mod table;
pub mod yaml;

pub use error::Error;
pub use path::Path;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Namespace the control plane is installed into unless told otherwise
pub const DEFAULT_ISTIO_NAMESPACE: &str = "istio-system";

/// Revision name used when an install does not carry an explicit revision
pub const DEFAULT_REVISION: &str = "default";

/// Label carrying the control plane revision on webhooks, pods and namespaces
pub const REVISION_LABEL: &str = "istio.io/rev";

/// Label carrying a revision tag on mutating webhooks
pub const TAG_LABEL: &str = "istio.io/tag";

/// Label set by the installer on every object it owns
pub const OPERATOR_COMPONENT_LABEL: &str = "operator.istio.io/component";

/// Name of the config map holding mesh config and sidecar injector values
pub const MESH_CONFIG_MAP: &str = "istio";

/// Name of the config map holding sidecar injector values
pub const INJECTOR_CONFIG_MAP: &str = "istio-sidecar-injector";

/// Name of the config map holding the mesh root certificate
pub const ROOT_CERT_CONFIG_MAP: &str = "istio-ca-root-cert";

/// Append the revision suffix to a config map name (`istio` -> `istio-canary`)
pub fn revisioned_name(base: &str, revision: &str) -> String {
    if revision.is_empty() || revision == DEFAULT_REVISION {
        base.to_string()
    } else {
        format!("{}-{}", base, revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_revision_keeps_base_name() {
        assert_eq!(revisioned_name(MESH_CONFIG_MAP, ""), "istio");
        assert_eq!(revisioned_name(MESH_CONFIG_MAP, "default"), "istio");
    }

    #[test]
    fn named_revision_is_suffixed() {
        assert_eq!(
            revisioned_name(INJECTOR_CONFIG_MAP, "canary"),
            "istio-sidecar-injector-canary"
        );
    }
}
