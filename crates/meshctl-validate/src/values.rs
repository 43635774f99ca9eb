//! Checks for the free-form `values` section
//!
//! Values are plain nested maps. Every node, container or leaf, is looked
//! up by its dotted path (`global.proxy.includeIPRanges`) and checked if a
//! rule exists; maps are then descended key by key.

use std::net::IpAddr;
use std::sync::LazyLock;

use meshctl_common::Path;

use crate::error::{ValidationError, ValidationErrors};
use crate::node::{as_str, describe, Node, NodeKind};
use crate::rules::RuleTable;

static VALUES_RULES: LazyLock<RuleTable> = LazyLock::new(values_rules);

/// The rule table applied to values
pub fn values_rules() -> RuleTable {
    RuleTable::new()
        .with_rule("global.proxy.includeIPRanges", validate_ip_ranges)
        .with_rule("global.proxy.excludeIPRanges", validate_ip_ranges)
        .with_rule("global.proxy.includeInboundPorts", validate_port_list)
        .with_rule("global.proxy.excludeInboundPorts", validate_port_list)
}

/// Validate a values tree against the built-in values rules
pub fn check_values(root: &dyn Node) -> ValidationErrors {
    match root.kind() {
        NodeKind::Absent | NodeKind::Scalar(crate::node::Scalar::Null) => ValidationErrors::new(),
        NodeKind::Map(_) => validate_values_tree(&VALUES_RULES, root, &Path::root()),
        other => ValidationError::Rule {
            path: "values".to_string(),
            message: format!("values must be a map, got {}", other.shape()),
        }
        .into(),
    }
}

/// Walk a values tree, applying rules at every node
pub fn validate_values_tree(rules: &RuleTable, node: &dyn Node, path: &Path) -> ValidationErrors {
    let mut errs = match rules.lookup(path) {
        Some(rule) => rule(path, node),
        None => ValidationErrors::new(),
    };
    if let NodeKind::Map(entries) = node.kind() {
        for (key, value) in entries {
            errs.append(validate_values_tree(rules, value, &path.child(key)));
        }
    }
    errs
}

/// Comma separated CIDR list, or `*` for everything
pub fn validate_ip_ranges(path: &Path, value: &dyn Node) -> ValidationErrors {
    let Some(ranges) = as_str(value) else {
        return not_a_string(path, value);
    };
    if ranges.trim() == "*" {
        return ValidationErrors::new();
    }
    split_list(ranges)
        .filter(|cidr| parse_cidr(cidr).is_none())
        .map(|cidr| ValidationError::Rule {
            path: path.to_string(),
            message: format!("{}: invalid CIDR {:?}", path, cidr),
        })
        .collect()
}

/// Comma separated port list, or `*` for every port
pub fn validate_port_list(path: &Path, value: &dyn Node) -> ValidationErrors {
    let Some(ports) = as_str(value) else {
        return not_a_string(path, value);
    };
    if ports.trim() == "*" {
        return ValidationErrors::new();
    }
    split_list(ports)
        .filter(|port| !matches!(port.parse::<u16>(), Ok(p) if p > 0))
        .map(|port| ValidationError::Rule {
            path: path.to_string(),
            message: format!("{}: invalid port {:?}", path, port),
        })
        .collect()
}

fn split_list(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn parse_cidr(cidr: &str) -> Option<(IpAddr, u8)> {
    let (addr, prefix) = cidr.split_once('/')?;
    let addr: IpAddr = addr.parse().ok()?;
    let prefix: u8 = prefix.parse().ok()?;
    let max = if addr.is_ipv4() { 32 } else { 128 };
    (prefix <= max).then_some((addr, prefix))
}

fn not_a_string(path: &Path, value: &dyn Node) -> ValidationErrors {
    ValidationError::Rule {
        path: path.to_string(),
        message: format!("{}: expected a string, got {}", path, describe(value)),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_ranges_and_ports_pass() {
        let values = json!({
            "global": {
                "proxy": {
                    "includeIPRanges": "10.0.0.0/8, 192.168.0.0/16",
                    "excludeIPRanges": "",
                    "includeInboundPorts": "*",
                    "excludeInboundPorts": "15090,8080"
                }
            }
        });
        assert!(check_values(&values).is_empty());
    }

    #[test]
    fn bad_cidr_is_reported_with_path() {
        let values = json!({"global": {"proxy": {"includeIPRanges": "10.0.0.0/8,10.0.0.1/40,nope"}}});
        let errs = check_values(&values);
        assert_eq!(errs.len(), 2);
        assert!(errs.iter().all(|e| e.path() == "global.proxy.includeIPRanges"));
    }

    #[test]
    fn bad_port_is_reported() {
        let values = json!({"global": {"proxy": {"excludeInboundPorts": "80,0,70000"}}});
        assert_eq!(check_values(&values).len(), 2);
    }

    #[test]
    fn ipv6_ranges_are_accepted() {
        let values = json!({"global": {"proxy": {"includeIPRanges": "fd00::/8"}}});
        assert!(check_values(&values).is_empty());
    }

    #[test]
    fn unrelated_values_are_ignored() {
        let values = json!({"pilot": {"traceSampling": 100.0}, "global": {"hub": "x"}});
        assert!(check_values(&values).is_empty());
    }

    #[test]
    fn non_map_values_rejected() {
        assert_eq!(check_values(&json!(["a"])).len(), 1);
        assert!(check_values(&serde_json::Value::Null).is_empty());
    }
}
