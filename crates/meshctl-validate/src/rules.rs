//! Path-keyed rule table
//!
//! Patterns are dotted paths whose segments are either literal (`Hub`),
//! any-index (`IngressGateways[*]`, matching `IngressGateways[0]`,
//! `IngressGateways[1]`, ...) or any-key (`*`). Patterns are compiled into
//! a segment trie once; a lookup walks it preferring literal children, so
//! a rule for a specific element wins over the wildcard rule.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use meshctl_common::path::split_index;
use meshctl_common::Path;

use crate::error::ValidationErrors;
use crate::node::Node;

/// A validation rule: inspects one value at one path
pub type Rule = Arc<dyn Fn(&Path, &dyn Node) -> ValidationErrors + Send + Sync>;

const ANY_KEY: &str = "*";
const ANY_INDEX_SUFFIX: &str = "[*]";

#[derive(Default)]
struct Trie {
    literal: HashMap<String, Trie>,
    any_index: HashMap<String, Trie>,
    any_key: Option<Box<Trie>>,
    rule: Option<usize>,
}

impl Trie {
    fn insert(&mut self, segments: &[String], rule: usize) {
        let Some((head, rest)) = segments.split_first() else {
            self.rule = Some(rule);
            return;
        };
        let child = if head == ANY_KEY {
            self.any_key.get_or_insert_with(Default::default).as_mut()
        } else if let Some(field) = head.strip_suffix(ANY_INDEX_SUFFIX) {
            self.any_index.entry(field.to_string()).or_default()
        } else {
            self.literal.entry(head.clone()).or_default()
        };
        child.insert(rest, rule);
    }

    fn find(&self, segments: &[String]) -> Option<usize> {
        let Some((head, rest)) = segments.split_first() else {
            return self.rule;
        };
        if let Some(found) = self.literal.get(head).and_then(|c| c.find(rest)) {
            return Some(found);
        }
        if let Some((field, _)) = split_index(head) {
            if let Some(found) = self.any_index.get(field).and_then(|c| c.find(rest)) {
                return Some(found);
            }
        }
        self.any_key.as_ref().and_then(|c| c.find(rest))
    }
}

/// Rules keyed by path pattern
#[derive(Default)]
pub struct RuleTable {
    trie: Trie,
    rules: Vec<(String, Rule)>,
}

impl RuleTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `rule` for `pattern`, builder style
    pub fn with_rule<F>(mut self, pattern: &str, rule: F) -> Self
    where
        F: Fn(&Path, &dyn Node) -> ValidationErrors + Send + Sync + 'static,
    {
        self.insert(pattern, rule);
        self
    }

    /// Register `rule` for `pattern`, replacing any rule already there
    pub fn insert<F>(&mut self, pattern: &str, rule: F)
    where
        F: Fn(&Path, &dyn Node) -> ValidationErrors + Send + Sync + 'static,
    {
        let segments = Path::parse(pattern);
        if let Some(existing) = self.trie.find_exact(segments.segments()) {
            self.rules[existing].1 = Arc::new(rule);
            return;
        }
        let index = self.rules.len();
        self.rules.push((pattern.to_string(), Arc::new(rule)));
        self.trie.insert(segments.segments(), index);
    }

    /// Rule matching `path`, if any
    pub fn lookup(&self, path: &Path) -> Option<&Rule> {
        self.trie
            .find(path.segments())
            .map(|index| &self.rules[index].1)
    }

    /// Registered patterns, in registration order
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(pattern, _)| pattern.as_str())
    }

    /// Number of registered rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rules are registered
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Trie {
    // Exact pattern lookup (wildcards matched literally), used for replacement.
    fn find_exact(&self, segments: &[String]) -> Option<usize> {
        let Some((head, rest)) = segments.split_first() else {
            return self.rule;
        };
        let child = if head == ANY_KEY {
            self.any_key.as_deref()
        } else if let Some(field) = head.strip_suffix(ANY_INDEX_SUFFIX) {
            self.any_index.get(field)
        } else {
            self.literal.get(head)
        };
        child.and_then(|c| c.find_exact(rest))
    }
}

impl fmt::Debug for RuleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleTable")
            .field("patterns", &self.patterns().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    fn tagged(tag: &'static str) -> impl Fn(&Path, &dyn Node) -> ValidationErrors + Send + Sync {
        move |path: &Path, _: &dyn Node| {
            ValidationError::Rule {
                path: path.to_string(),
                message: tag.to_string(),
            }
            .into()
        }
    }

    fn which(table: &RuleTable, path: &str) -> Option<String> {
        let rule = table.lookup(&Path::parse(path))?;
        let errs = rule(&Path::parse(path), &String::new());
        errs.iter().next().map(|e| e.to_string())
    }

    #[test]
    fn literal_pattern_matches_exactly() {
        let table = RuleTable::new().with_rule("Hub", tagged("hub"));
        assert_eq!(which(&table, "Hub").as_deref(), Some("hub"));
        assert_eq!(which(&table, "Tag"), None);
        assert_eq!(which(&table, "Hub.Extra"), None);
    }

    #[test]
    fn indexed_wildcard_matches_any_index() {
        let table = RuleTable::new()
            .with_rule("Components.IngressGateways[*].Name", tagged("gateway"));
        assert_eq!(
            which(&table, "Components.IngressGateways[0].Name").as_deref(),
            Some("gateway")
        );
        assert_eq!(
            which(&table, "Components.IngressGateways[12].Name").as_deref(),
            Some("gateway")
        );
        assert_eq!(which(&table, "Components.EgressGateways[0].Name"), None);
        assert_eq!(which(&table, "Components.IngressGateways.Name"), None);
    }

    #[test]
    fn exact_match_wins_over_wildcard() {
        let table = RuleTable::new()
            .with_rule("Gateways[*].Name", tagged("any"))
            .with_rule("Gateways[1].Name", tagged("second"));
        assert_eq!(which(&table, "Gateways[1].Name").as_deref(), Some("second"));
        assert_eq!(which(&table, "Gateways[0].Name").as_deref(), Some("any"));
    }

    #[test]
    fn any_key_segment_matches_map_keys() {
        let table = RuleTable::new().with_rule("AddonComponents.*.Namespace", tagged("ns"));
        assert_eq!(
            which(&table, "AddonComponents.grafana.Namespace").as_deref(),
            Some("ns")
        );
    }

    #[test]
    fn literal_dead_end_falls_back_to_wildcard() {
        let table = RuleTable::new()
            .with_rule("Values.global.hub", tagged("literal"))
            .with_rule("Values.*.tag", tagged("wild"));
        assert_eq!(which(&table, "Values.global.tag").as_deref(), Some("wild"));
    }

    #[test]
    fn reinserting_pattern_replaces_rule() {
        let mut table = RuleTable::new().with_rule("Hub", tagged("old"));
        table.insert("Hub", tagged("new"));
        assert_eq!(table.len(), 1);
        assert_eq!(which(&table, "Hub").as_deref(), Some("new"));
    }

    #[test]
    fn escaped_separator_in_pattern_is_one_segment() {
        let table = RuleTable::new().with_rule(r"Labels.app\.kubernetes\.io/name", tagged("label"));
        let path = Path::from_segments(["Labels", "app.kubernetes.io/name"]);
        assert!(table.lookup(&path).is_some());
    }
}
