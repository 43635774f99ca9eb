//! Shape-tagged view over configuration trees
//!
//! Every type the walker can visit implements [`Node`] by describing its
//! own children. Structs list their fields, maps their entries, sequences
//! their elements, and everything else is a [`Scalar`].

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// A value the tree walker can visit
pub trait Node {
    /// Describe this node's shape and children
    fn kind(&self) -> NodeKind<'_>;
}

/// The shape of a node
pub enum NodeKind<'a> {
    /// Named fields, in declaration order
    Struct(Vec<Field<'a>>),
    /// String-keyed entries
    Map(Vec<(&'a str, &'a dyn Node)>),
    /// Ordered elements
    Seq(Vec<&'a dyn Node>),
    /// A single value
    Scalar(Scalar<'a>),
    /// An unset optional value
    Absent,
}

/// A struct field as seen by the walker
pub struct Field<'a> {
    /// Declared field name (`Hub`, `IngressGateways`, ...)
    pub name: &'static str,
    /// Field value
    pub value: &'a dyn Node,
    /// Excluded from validation
    pub skip: bool,
}

impl<'a> Field<'a> {
    /// A field the walker descends into
    pub fn new(name: &'static str, value: &'a dyn Node) -> Self {
        Self {
            name,
            value,
            skip: false,
        }
    }

    /// A field the walker ignores
    pub fn skipped(name: &'static str, value: &'a dyn Node) -> Self {
        Self {
            name,
            value,
            skip: true,
        }
    }
}

/// Leaf values
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar<'a> {
    /// String
    Str(&'a str),
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Floating point number
    Float(f64),
    /// Explicit null
    Null,
}

impl NodeKind<'_> {
    /// Short name of the shape, for messages
    pub fn shape(&self) -> &'static str {
        match self {
            NodeKind::Struct(_) => "struct",
            NodeKind::Map(_) => "map",
            NodeKind::Seq(_) => "sequence",
            NodeKind::Scalar(_) => "scalar",
            NodeKind::Absent => "absent",
        }
    }
}

/// True for absent values, nulls, empty strings and empty maps
pub fn is_empty(node: &dyn Node) -> bool {
    match node.kind() {
        NodeKind::Absent | NodeKind::Scalar(Scalar::Null) => true,
        NodeKind::Scalar(Scalar::Str(s)) => s.is_empty(),
        NodeKind::Map(entries) => entries.is_empty(),
        _ => false,
    }
}

/// The string value of a node, if it is a string scalar
pub fn as_str(node: &dyn Node) -> Option<&str> {
    match node.kind() {
        NodeKind::Scalar(Scalar::Str(s)) => Some(s),
        _ => None,
    }
}

/// Render a node for error messages
pub fn describe(node: &dyn Node) -> String {
    match node.kind() {
        NodeKind::Scalar(Scalar::Str(s)) => s.to_string(),
        NodeKind::Scalar(Scalar::Bool(b)) => b.to_string(),
        NodeKind::Scalar(Scalar::Int(i)) => i.to_string(),
        NodeKind::Scalar(Scalar::UInt(u)) => u.to_string(),
        NodeKind::Scalar(Scalar::Float(f)) => f.to_string(),
        NodeKind::Scalar(Scalar::Null) | NodeKind::Absent => "<nil>".to_string(),
        _ => to_json(node).to_string(),
    }
}

/// Re-serialize a node as JSON. Struct field names are written with a
/// lower-case first letter, matching their YAML spelling.
pub fn to_json(node: &dyn Node) -> Value {
    match node.kind() {
        NodeKind::Struct(fields) => {
            let mut out = Map::new();
            for field in fields {
                if matches!(field.value.kind(), NodeKind::Absent) {
                    continue;
                }
                out.insert(lower_first(field.name), to_json(field.value));
            }
            Value::Object(out)
        }
        NodeKind::Map(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), to_json(v)))
                .collect(),
        ),
        NodeKind::Seq(items) => Value::Array(items.into_iter().map(to_json).collect()),
        NodeKind::Scalar(Scalar::Str(s)) => Value::String(s.to_string()),
        NodeKind::Scalar(Scalar::Bool(b)) => Value::Bool(b),
        NodeKind::Scalar(Scalar::Int(i)) => Value::from(i),
        NodeKind::Scalar(Scalar::UInt(u)) => Value::from(u),
        NodeKind::Scalar(Scalar::Float(f)) => Value::from(f),
        NodeKind::Scalar(Scalar::Null) | NodeKind::Absent => Value::Null,
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

// =============================================================================
// Primitive and container impls
// =============================================================================

impl Node for String {
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Scalar(Scalar::Str(self))
    }
}

impl Node for bool {
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Scalar(Scalar::Bool(*self))
    }
}

impl Node for i64 {
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Scalar(Scalar::Int(*self))
    }
}

impl Node for u32 {
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Scalar(Scalar::UInt(u64::from(*self)))
    }
}

impl<T: Node> Node for Option<T> {
    fn kind(&self) -> NodeKind<'_> {
        match self {
            Some(inner) => inner.kind(),
            None => NodeKind::Absent,
        }
    }
}

impl<T: Node> Node for Vec<T> {
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Seq(self.iter().map(|item| item as &dyn Node).collect())
    }
}

impl<T: Node> Node for BTreeMap<String, T> {
    fn kind(&self) -> NodeKind<'_> {
        NodeKind::Map(
            self.iter()
                .map(|(k, v)| (k.as_str(), v as &dyn Node))
                .collect(),
        )
    }
}

impl Node for Value {
    fn kind(&self) -> NodeKind<'_> {
        match self {
            Value::Null => NodeKind::Scalar(Scalar::Null),
            Value::Bool(b) => NodeKind::Scalar(Scalar::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    NodeKind::Scalar(Scalar::Int(i))
                } else if let Some(u) = n.as_u64() {
                    NodeKind::Scalar(Scalar::UInt(u))
                } else {
                    NodeKind::Scalar(Scalar::Float(n.as_f64().unwrap_or_default()))
                }
            }
            Value::String(s) => NodeKind::Scalar(Scalar::Str(s)),
            Value::Array(items) => NodeKind::Seq(items.iter().map(|v| v as &dyn Node).collect()),
            Value::Object(map) => NodeKind::Map(
                map.iter()
                    .map(|(k, v)| (k.as_str(), v as &dyn Node))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Pair {
        left: String,
        right: Option<bool>,
    }

    impl Node for Pair {
        fn kind(&self) -> NodeKind<'_> {
            NodeKind::Struct(vec![
                Field::new("Left", &self.left),
                Field::new("Right", &self.right),
            ])
        }
    }

    #[test]
    fn empty_values() {
        assert!(is_empty(&String::new()));
        assert!(is_empty(&Option::<String>::None));
        assert!(is_empty(&Value::Null));
        assert!(is_empty(&json!({})));
        assert!(!is_empty(&false));
        assert!(!is_empty(&json!([])));
        assert!(!is_empty(&"x".to_string()));
    }

    #[test]
    fn struct_to_json_lowercases_and_drops_absent() {
        let p = Pair {
            left: "a".to_string(),
            right: None,
        };
        assert_eq!(to_json(&p), json!({"left": "a"}));
    }

    #[test]
    fn json_round_trips_through_node_view() {
        let v = json!({"a": [1, "two", {"three": 3.5}], "b": null});
        assert_eq!(to_json(&v), v);
    }

    #[test]
    fn describe_renders_scalars_plainly() {
        assert_eq!(describe(&"hub".to_string()), "hub");
        assert_eq!(describe(&json!(7)), "7");
        assert_eq!(describe(&Value::Null), "<nil>");
        assert_eq!(describe(&json!({"k": "v"})), r#"{"k":"v"}"#);
    }
}
