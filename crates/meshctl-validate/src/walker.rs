//! Tree walker
//!
//! Visits every field of a struct-shaped tree, builds the path of each
//! value on the way down and hands leaves to the [`RuleTable`]. Errors are
//! collected across the whole tree; one bad leaf never hides another.

use std::collections::BTreeSet;

use meshctl_common::Path;
use tracing::trace;

use crate::error::{ValidationError, ValidationErrors};
use crate::node::{describe, is_empty, Field, Node, NodeKind};
use crate::rules::RuleTable;

/// A rule table plus the set of paths that must be non-empty
#[derive(Debug, Default)]
pub struct Validator {
    rules: RuleTable,
    required: BTreeSet<String>,
}

impl Validator {
    /// Validator over `rules` with no required paths
    pub fn new(rules: RuleTable) -> Self {
        Self {
            rules,
            required: BTreeSet::new(),
        }
    }

    /// Mark the exact path `path` (rendered form, e.g. `Components.Pilot.Hub`) as required
    pub fn with_required(mut self, path: &str) -> Self {
        self.required.insert(path.to_string());
        self
    }

    /// The rule table
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Validate a struct-shaped tree rooted at `path`.
    ///
    /// An absent root validates trivially. Any other non-struct root is a
    /// [`ValidationError::TypeMismatch`].
    pub fn validate(&self, node: &dyn Node, path: &Path, check_required: bool) -> ValidationErrors {
        match node.kind() {
            NodeKind::Struct(fields) => self.walk_fields(fields, path, check_required),
            NodeKind::Absent => ValidationErrors::new(),
            _ => ValidationError::TypeMismatch {
                path: path.to_string(),
                value: describe(node),
                expected: "struct".to_string(),
            }
            .into(),
        }
    }

    fn walk_fields(&self, fields: Vec<Field<'_>>, path: &Path, check_required: bool) -> ValidationErrors {
        let mut errs = ValidationErrors::new();
        for field in fields {
            if field.skip {
                trace!(path = %path.child(field.name), "skipping field");
                continue;
            }
            errs.append(self.walk_field(field.name, field.value, path, check_required));
        }
        errs
    }

    fn walk_field(
        &self,
        name: &str,
        value: &dyn Node,
        parent: &Path,
        check_required: bool,
    ) -> ValidationErrors {
        let path = parent.child(name);
        match value.kind() {
            NodeKind::Absent => ValidationErrors::new(),
            NodeKind::Struct(fields) => self.walk_fields(fields, &path, check_required),
            NodeKind::Map(entries) => {
                let mut errs = self.validate_leaf(&path, value, check_required);
                for (key, entry) in entries {
                    errs.append(self.validate_leaf(&path.child(key), entry, check_required));
                }
                errs
            }
            NodeKind::Seq(items) => {
                let mut errs = ValidationErrors::new();
                for (index, item) in items.into_iter().enumerate() {
                    let item_path = parent.indexed_child(name, index);
                    match item.kind() {
                        NodeKind::Struct(fields) => {
                            errs.append(self.walk_fields(fields, &item_path, check_required))
                        }
                        NodeKind::Absent => {}
                        _ => errs.append(self.validate_leaf(&item_path, item, check_required)),
                    }
                }
                errs
            }
            NodeKind::Scalar(_) => self.validate_leaf(&path, value, check_required),
        }
    }

    /// Check one leaf: the required rule for empty values, otherwise the
    /// rule registered for `path`. Paths without a rule are valid.
    pub fn validate_leaf(&self, path: &Path, value: &dyn Node, check_required: bool) -> ValidationErrors {
        let rendered = path.to_string();
        if is_empty(value) {
            if check_required && self.required.contains(&rendered) {
                return ValidationError::RequiredField {
                    path: path.to_yaml_path(),
                }
                .into();
            }
            trace!(path = %rendered, "empty value, nothing to validate");
            return ValidationErrors::new();
        }
        match self.rules.lookup(path) {
            Some(rule) => {
                trace!(path = %rendered, "applying rule");
                rule(path, value)
            }
            None => ValidationErrors::new(),
        }
    }
}
