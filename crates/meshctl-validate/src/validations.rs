//! Built-in rules for IstioOperator specs
//!
//! Each rule is a plain function of `(path, value)` so it can be tested
//! without a walker and registered under any pattern.

use std::sync::LazyLock;

use meshctl_common::mesh::MeshConfig;
use meshctl_common::Path;
use regex::Regex;
use tracing::debug;

use crate::error::{ValidationError, ValidationErrors};
use crate::node::{as_str, describe, to_json, Node, NodeKind};
use crate::rules::RuleTable;
use crate::values::check_values;

/// Addon names reserved for components bundled with the installer
pub const BUNDLED_ADDON_COMPONENTS: &[&str] = &[
    "Prometheus",
    "PrometheusOperator",
    "Grafana",
    "Kiali",
    "Tracing",
    "Zipkin",
    "Istiocoredns",
];

// Image reference grammar (registry/name[:tag][@digest]).
const ALPHA_NUMERIC: &str = r"[a-z0-9]+";
const SEPARATOR: &str = r"(?:[._]|__|[-]*)";
const DOMAIN_COMPONENT: &str = r"(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])";
const TAG: &str = r"[\w][\w.-]{0,127}";
const DIGEST: &str = r"[A-Za-z][A-Za-z0-9]*(?:[-_+.][A-Za-z][A-Za-z0-9]*)*[:][[:xdigit:]]{32,}";
const DNS_LABEL: &str = r"[a-z0-9](?:[-a-z0-9]{0,61}[a-z0-9])?";

fn reference_pattern() -> String {
    let name_component = format!("{a}(?:{s}{a})*", a = ALPHA_NUMERIC, s = SEPARATOR);
    let domain = format!(r"{d}(?:\.{d})*(?::[0-9]+)?", d = DOMAIN_COMPONENT);
    let name = format!("(?:{}/)?{n}(?:/{n})*", domain, n = name_component);
    format!("^(?:{})(?::{})?(?:@{})?$", name, TAG, DIGEST)
}

static REFERENCE_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(&reference_pattern()));
static TAG_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(&format!("^{}$", TAG)));
static DNS_LABEL_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(&format!("^{}$", DNS_LABEL)));

/// The rule table applied to IstioOperator specs
pub fn default_rules() -> RuleTable {
    RuleTable::new()
        .with_rule("Values", validate_values)
        .with_rule("MeshConfig", validate_mesh_config)
        .with_rule("Hub", validate_hub)
        .with_rule("Tag", validate_tag)
        .with_rule("AddonComponents", validate_addon_components)
        .with_rule("Components.IngressGateways[*].Name", validate_gateway_name)
        .with_rule("Components.EgressGateways[*].Name", validate_gateway_name)
}

/// Image registry must be a valid image reference
pub fn validate_hub(path: &Path, value: &dyn Node) -> ValidationErrors {
    validate_with_regex(path, value, &REFERENCE_RE)
}

/// Image tag must be a valid tag
pub fn validate_tag(path: &Path, value: &dyn Node) -> ValidationErrors {
    validate_with_regex(path, value, &TAG_RE)
}

/// Gateway names are DNS labels; empty means "use the default name"
pub fn validate_gateway_name(path: &Path, value: &dyn Node) -> ValidationErrors {
    if as_str(value) == Some("") {
        return ValidationErrors::new();
    }
    validate_with_regex(path, value, &DNS_LABEL_RE)
}

/// True when `name` is a DNS-1123 label (lower case alphanumerics and
/// dashes, at most 63 characters)
pub fn is_dns1123_label(name: &str) -> bool {
    matches!(&*DNS_LABEL_RE, Ok(re) if re.is_match(name))
}

/// Addon names must not collide with a bundled component name
pub fn validate_addon_components(path: &Path, value: &dyn Node) -> ValidationErrors {
    let NodeKind::Map(entries) = value.kind() else {
        return bad_type(path, value, "map");
    };
    entries
        .into_iter()
        .filter(|(name, _)| {
            BUNDLED_ADDON_COMPONENTS.contains(name) && *name == title_case(name)
        })
        .map(|(name, _)| ValidationError::Rule {
            path: path.child(name).to_string(),
            message: format!(
                "invalid addon component name: {}, expect component name starting with lower-case character",
                name
            ),
        })
        .collect()
}

/// Mesh config is merged onto the defaults, decoded strictly and checked
pub fn validate_mesh_config(path: &Path, value: &dyn Node) -> ValidationErrors {
    let overlay = to_json(value);
    let config = match MeshConfig::with_overlay(&overlay) {
        Ok(config) => config,
        Err(e) => {
            return document_error(path, format!("failed to unmarshal mesh config: {}", e)).into()
        }
    };

    let mut errs: ValidationErrors = config
        .unknown_fields()
        .into_iter()
        .map(|field| document_error(path, format!("unknown field {:?} in mesh config", field)))
        .collect();
    if let Err(messages) = config.validate() {
        errs.extend(messages.into_iter().map(|m| document_error(path, m)));
    }
    debug!(path = %path, errors = errs.len(), "validated mesh config");
    errs
}

/// Helm values are checked by their own path table
pub fn validate_values(_path: &Path, value: &dyn Node) -> ValidationErrors {
    check_values(value)
}

fn validate_with_regex(
    path: &Path,
    value: &dyn Node,
    re: &LazyLock<Result<Regex, regex::Error>>,
) -> ValidationErrors {
    let Some(s) = as_str(value) else {
        return bad_type(path, value, "string");
    };
    match re.as_ref() {
        Ok(re) if re.is_match(s) => ValidationErrors::new(),
        Ok(_) => ValidationError::InvalidValue {
            path: path.to_string(),
            value: s.to_string(),
        }
        .into(),
        Err(e) => document_error(path, format!("grammar failed to compile: {}", e)).into(),
    }
}

fn bad_type(path: &Path, value: &dyn Node, expected: &str) -> ValidationErrors {
    ValidationError::Rule {
        path: path.to_string(),
        message: format!(
            "validate path {}, value: {}, expected {}, got {}",
            path,
            describe(value),
            expected,
            value.kind().shape()
        ),
    }
    .into()
}

fn document_error(path: &Path, message: String) -> ValidationError {
    ValidationError::Document {
        path: path.to_string(),
        message,
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
