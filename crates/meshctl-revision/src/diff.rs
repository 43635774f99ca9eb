//! Customization diffs between an installed spec and its profile
//!
//! Only overrides are reported: a value is listed when the profile also
//! sets it and the installed value differs. Values the profile leaves
//! unset produce no record, nor does anything below them.

use meshctl_common::path::escape_segment;
use meshctl_common::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use meshctl_common::crd::IstioOperatorSpec;

use crate::profile::ProfileRenderer;

/// One overridden value
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IopDiff {
    /// Dotted path of the value (`components.pilot.k8s.replicaCount`)
    pub path: String,
    /// Installed value; strings are quoted
    pub value: String,
}

/// Walk `current` alongside `baseline`, collecting overridden values.
///
/// `separator` goes between `path` and the next key; pass `""` at the root
/// so top-level keys are not prefixed.
pub fn diff_walk(path: &str, separator: &str, current: &Value, baseline: Option<&Value>) -> Vec<IopDiff> {
    let baseline = baseline.filter(|b| !b.is_null());
    match current {
        Value::Object(map) => {
            let Some(Value::Object(base_map)) = baseline else {
                return Vec::new();
            };
            map.iter()
                .flat_map(|(key, value)| {
                    let child = format!("{}{}{}", path, separator, escape_segment(key));
                    diff_walk(&child, ".", value, base_map.get(key))
                })
                .collect()
        }
        Value::Array(items) => {
            let Some(Value::Array(base_items)) = baseline else {
                return Vec::new();
            };
            items
                .iter()
                .enumerate()
                .flat_map(|(index, value)| {
                    diff_walk(&format!("{}[{}]", path, index), ".", value, base_items.get(index))
                })
                .collect()
        }
        scalar => match baseline {
            Some(base) if base != scalar => vec![IopDiff {
                path: path.to_string(),
                value: render_scalar(scalar),
            }],
            _ => Vec::new(),
        },
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{:?}", s),
        Value::Null => "<nil>".to_string(),
        other => other.to_string(),
    }
}

/// Overrides of `installed` relative to the profile it names
pub fn customizations(installed: &IstioOperatorSpec, renderer: &dyn ProfileRenderer) -> Result<Vec<IopDiff>> {
    let baseline = renderer.render(installed.effective_profile())?;
    let current = serde_json::to_value(installed)
        .map_err(|e| meshctl_common::Error::serialization_for("IstioOperator", e.to_string()))?;
    Ok(diff_walk("", "", &current, Some(&baseline)))
}
